//! Stock observers: transcripts, console output and the sentinel auto-response.

use super::{LineObserver, ObserverError};
use crate::handle::SerialHandle;
use chrono::{DateTime, Local};
use clap::ValueEnum;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// Line the firmware sends when it is ready to accept a control sequence.
pub const SENTINEL: &str = ".";

/// Written back once for every sentinel line.
pub const AUTO_RESPONSE: [u8; 5] = [0x1B; 5];

/// True if `line` is the ready marker, ignoring surrounding whitespace.
pub fn is_sentinel(line: &str) -> bool {
    line.trim() == SENTINEL
}

/// Render outbound bytes the way the send log shows them.
pub fn format_sent(data: &[u8]) -> String {
    format!(">> Sent: {}", data.escape_ascii())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Rx,
    Tx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub at: DateTime<Local>,
    pub direction: Direction,
    pub text: String,
}

/// Bounded, shareable history of received and sent lines.
///
/// Clones share the same buffer, so one clone can be registered with the
/// poller while the owner keeps another for display. When full, the oldest
/// entry is evicted; a capacity of 0 means unbounded.
#[derive(Debug, Clone)]
pub struct Transcript {
    entries: Arc<Mutex<VecDeque<TranscriptEntry>>>,
    capacity: usize,
}

impl Transcript {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::new())),
            capacity,
        }
    }

    pub fn unbounded() -> Self {
        Self::new(0)
    }

    pub fn record(&self, direction: Direction, text: impl Into<String>) {
        let mut entries = self.entries.lock();
        if self.capacity > 0 && entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(TranscriptEntry {
            at: Local::now(),
            direction,
            text: text.into(),
        });
    }

    /// Text of every entry, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.text.clone()).collect()
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LineObserver for Transcript {
    fn on_line(&mut self, line: &str) -> Result<(), ObserverError> {
        self.record(Direction::Rx, line);
        Ok(())
    }
}

/// Answers the ready marker with [`AUTO_RESPONSE`].
///
/// Fires once per matching line: three `.` lines produce three writes.
pub struct SentinelResponder {
    handle: Arc<SerialHandle>,
    outbound: Option<Transcript>,
    responses: u64,
}

impl SentinelResponder {
    pub fn new(handle: Arc<SerialHandle>) -> Self {
        Self {
            handle,
            outbound: None,
            responses: 0,
        }
    }

    /// Also log each auto-response into `transcript`.
    pub fn with_outbound_log(mut self, transcript: Transcript) -> Self {
        self.outbound = Some(transcript);
        self
    }

    pub fn responses(&self) -> u64 {
        self.responses
    }
}

impl LineObserver for SentinelResponder {
    fn on_line(&mut self, line: &str) -> Result<(), ObserverError> {
        if !is_sentinel(line) {
            return Ok(());
        }

        self.handle.write(&AUTO_RESPONSE)?;
        self.responses += 1;
        info!(port = %self.handle.name(), "device in listening mode, auto-response sent");

        if let Some(log) = &self.outbound {
            log.record(Direction::Tx, format_sent(&AUTO_RESPONSE));
        }
        Ok(())
    }
}

/// How [`ConsolePrinter`] renders lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Plain,
    /// One JSON object per line.
    Json,
}

/// Writes received lines to a terminal or any other `Write`.
pub struct ConsolePrinter<W> {
    out: W,
    format: OutputFormat,
    show_timestamps: bool,
}

impl<W: Write + Send> ConsolePrinter<W> {
    pub fn new(out: W, format: OutputFormat, show_timestamps: bool) -> Self {
        Self {
            out,
            format,
            show_timestamps,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print one entry in the configured format.
    pub fn print(&mut self, direction: Direction, text: &str) -> Result<(), ObserverError> {
        let now = Local::now();
        match self.format {
            OutputFormat::Plain if self.show_timestamps => {
                writeln!(self.out, "[{}] {}", now.format("%H:%M:%S%.3f"), text)?
            }
            OutputFormat::Plain => writeln!(self.out, "{text}")?,
            OutputFormat::Json => {
                let entry = TranscriptEntry {
                    at: now,
                    direction,
                    text: text.to_string(),
                };
                let json = serde_json::to_string(&entry)
                    .map_err(|e| ObserverError::Other(e.to_string()))?;
                writeln!(self.out, "{json}")?
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

impl<W: Write + Send> LineObserver for ConsolePrinter<W> {
    fn on_line(&mut self, line: &str) -> Result<(), ObserverError> {
        self.print(Direction::Rx, line)
    }
}
