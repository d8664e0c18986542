//! Configuration schema definitions.
//!
//! Every section carries `#[serde(default)]`, so a partial file fills the
//! gaps from the defaults below.

use crate::commands::PayloadFormat;
use crate::poller::OutputFormat;
use crate::port::{DataBits, FlowControl, Parity, PortConfiguration, StopBits, DEFAULT_BAUD_RATE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line settings
    pub serial: SerialSettings,
    /// Console / poller behaviour
    pub monitor: MonitorConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be positive"));
        }
        if self.serial.timeout_ms == 0 {
            return Err(ConfigError::validation(
                "serial.timeout_ms",
                "must be at least 1 ms",
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "monitor.poll_interval_ms",
                "must be at least 1 ms",
            ));
        }
        Ok(())
    }
}

/// Serial line settings, as edited in the configuration window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Port to open when none is given on the command line
    pub port: Option<String>,
    /// Line speed; the reader aborts if the open port runs at anything else
    pub baud_rate: u32,
    pub data_bits: DataBitsCfg,
    pub stop_bits: StopBitsCfg,
    pub parity: ParityCfg,
    /// Bound on a single blocking read, in milliseconds
    pub timeout_ms: u64,
    /// Friendly names for port paths
    #[serde(default)]
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DataBitsCfg::Eight,
            stop_bits: StopBitsCfg::One,
            parity: ParityCfg::None,
            timeout_ms: 500,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve a port name through aliases.
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    /// Transport configuration for opening a port with these settings.
    pub fn port_configuration(&self) -> PortConfiguration {
        PortConfiguration {
            baud_rate: self.baud_rate,
            data_bits: self.data_bits.into(),
            flow_control: FlowControl::None,
            parity: self.parity.into(),
            stop_bits: self.stop_bits.into(),
            timeout: self.timeout(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataBitsCfg {
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
}

impl From<DataBitsCfg> for DataBits {
    fn from(bits: DataBitsCfg) -> Self {
        match bits {
            DataBitsCfg::Five => DataBits::Five,
            DataBitsCfg::Six => DataBits::Six,
            DataBitsCfg::Seven => DataBits::Seven,
            DataBitsCfg::Eight => DataBits::Eight,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopBitsCfg {
    #[serde(rename = "1")]
    One,
    #[serde(rename = "2")]
    Two,
}

impl From<StopBitsCfg> for StopBits {
    fn from(bits: StopBitsCfg) -> Self {
        match bits {
            StopBitsCfg::One => StopBits::One,
            StopBitsCfg::Two => StopBits::Two,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParityCfg {
    None,
    Odd,
    Even,
}

impl From<ParityCfg> for Parity {
    fn from(parity: ParityCfg) -> Self {
        match parity {
            ParityCfg::None => Parity::None,
            ParityCfg::Odd => Parity::Odd,
            ParityCfg::Even => Parity::Even,
        }
    }
}

/// Console and poller configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Longest the poller sleeps between drains when no line arrives
    pub poll_interval_ms: u64,
    /// Entries kept per transcript (0 = unbounded)
    pub transcript_lines: usize,
    /// Rendering of received lines on stdout
    pub output: OutputFormat,
    pub show_timestamps: bool,
    /// Answer the ready marker with the escape sequence
    pub sentinel_response: bool,
    /// Format used for typed input
    pub send_format: PayloadFormat,
    /// Append CRLF to typed input
    pub append_crlf: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            transcript_lines: 1000,
            output: OutputFormat::Plain,
            show_timestamps: false,
            sentinel_response: true,
            send_format: PayloadFormat::String,
            append_crlf: true,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset: "trace" .. "error"
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
    Compact,
}
