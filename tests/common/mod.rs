//! Shared test utilities for the console pipeline tests.
//!
//! This module provides common test infrastructure including:
//! - Mock ports with pre-programmed device output
//! - Handles and queues wired up the way the service wires them
//! - Polling helpers with a hard deadline

#![allow(dead_code)]

use irblaster_console::handle::SerialHandle;
use irblaster_console::port::MockSerialPort;
use irblaster_console::queue::LineQueue;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Read timeout used by mock ports unless a test needs something else.
pub const MOCK_TIMEOUT: Duration = Duration::from_millis(20);

/// How long any wait in a test may take before it counts as a failure.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Create a mock serial port with pre-programmed device output.
///
/// # Arguments
/// * `port_name` - The name for the mock port (e.g., "MOCK0")
/// * `responses` - Byte chunks the device "sends", in order
///
/// # Example
/// ```ignore
/// let mock = create_mock_port_with_responses("MOCK0", vec![b"OK\r\n", b"READY\r\n"]);
/// ```
pub fn create_mock_port_with_responses(port_name: &str, responses: Vec<&[u8]>) -> MockSerialPort {
    let mock = MockSerialPort::with_settings(port_name, 19_200, MOCK_TIMEOUT);
    for response in responses {
        mock.enqueue_read(response);
    }
    mock
}

/// A mock device, the handle that owns a clone of it, and an empty queue.
pub fn open_mock(port_name: &str, timeout: Duration) -> (MockSerialPort, Arc<SerialHandle>, Arc<LineQueue>) {
    let device = MockSerialPort::with_settings(port_name, 19_200, timeout);
    let handle = SerialHandle::from_adapter(Box::new(device.clone())).expect("mock handle");
    (device, Arc::new(handle), Arc::new(LineQueue::new()))
}

/// Poll `done` until it holds or [`TEST_DEADLINE`] passes.
pub fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let end = Instant::now() + TEST_DEADLINE;
    while Instant::now() < end {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    done()
}

/// Device output of `count` numbered lines, CRLF terminated.
pub fn numbered_lines(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| format!("line-{i}\r\n").into_bytes())
        .collect()
}
