//! Tests requiring an attached IR blaster.
//!
//! These tests are ignored by default and skipped if no hardware is configured.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=COM3                  # or /dev/ttyUSB0 on Linux
//! export TEST_BAUD=19200                 # optional, default: 19200
//!
//! cargo test --features hardware-tests -- --ignored
//! ```

#![cfg(feature = "hardware-tests")]

use irblaster_console::commands::Preset;
use irblaster_console::config::Config;
use irblaster_console::port::list_ports;
use irblaster_console::service::{ConsoleService, StatusResult};
use std::env;
use std::time::{Duration, Instant};

/// Get the test port from environment variable.
fn get_test_port() -> Option<String> {
    env::var("TEST_PORT").ok()
}

/// Get the test baud rate from environment variable (default: 19200).
fn get_test_baud() -> u32 {
    env::var("TEST_BAUD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(19_200)
}

/// Skip test if hardware is not available.
fn skip_without_hardware() -> Option<String> {
    let port = get_test_port();
    if port.is_none() {
        println!("Skipping hardware test: TEST_PORT not set");
    }
    port
}

fn service_for_hardware() -> ConsoleService {
    let mut config = Config::default();
    config.serial.baud_rate = get_test_baud();
    ConsoleService::new(config)
}

#[test]
#[ignore] // Run with --ignored flag
fn test_configured_port_is_listed() {
    let Some(port_name) = skip_without_hardware() else {
        return;
    };

    let ports = list_ports().expect("port enumeration");
    assert!(
        ports.iter().any(|p| p.name == port_name),
        "{port_name} not among {ports:?}"
    );
}

#[test]
#[ignore]
fn test_open_and_close_real_port() {
    let Some(port_name) = skip_without_hardware() else {
        return;
    };

    let mut service = service_for_hardware();
    let opened = service.open(Some(&port_name)).expect("open");
    assert_eq!(opened.baud_rate, get_test_baud());
    assert!(matches!(service.status(), StatusResult::Open { .. }));

    let started = Instant::now();
    service.close().expect("close");
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
#[ignore]
fn test_product_info_gets_a_reply() {
    let Some(port_name) = skip_without_hardware() else {
        return;
    };

    let mut service = service_for_hardware();
    service.open(Some(&port_name)).expect("open");
    service.send_preset(Preset::ProductInfo).expect("send");

    let deadline = Instant::now() + Duration::from_secs(3);
    while Instant::now() < deadline && service.received().is_empty() {
        service.wait_for_lines(Duration::from_millis(50));
        service.tick();
    }

    println!("Device replied: {:?}", service.received().lines());
    assert!(!service.received().is_empty(), "no reply within 3s");
    service.close().expect("close");
}
