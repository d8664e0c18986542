//! Import of the old four-line `settings.txt`.
//!
//! The file holds baud rate, data bits, stop bits and parity, one per line,
//! exactly as chosen in the settings window. Files without exactly four lines
//! are ignored. Values this crate cannot drive (1.5 stop bits, Mark/Space
//! parity, garbage) fall back to the default for that field only.

use super::error::{ConfigError, ConfigResult};
use super::schema::{DataBitsCfg, ParityCfg, SerialSettings, StopBitsCfg};
use std::path::Path;
use tracing::warn;

/// Read a legacy settings file into serial settings.
///
/// # Errors
///
/// Returns [`ConfigError::ReadError`] if the file cannot be read.
pub fn import_legacy(path: impl AsRef<Path>) -> ConfigResult<SerialSettings> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(parse_legacy(&content))
}

/// Parse legacy settings text. Never fails; see the module docs.
pub fn parse_legacy(content: &str) -> SerialSettings {
    let mut settings = SerialSettings::default();
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() != 4 {
        warn!(lines = lines.len(), "legacy settings need exactly 4 lines, using defaults");
        return settings;
    }

    match lines[0].trim().parse::<u32>() {
        Ok(baud) if baud > 0 => settings.baud_rate = baud,
        _ => warn!(value = lines[0], "unusable legacy baud rate"),
    }

    match lines[1].trim() {
        "5" => settings.data_bits = DataBitsCfg::Five,
        "6" => settings.data_bits = DataBitsCfg::Six,
        "7" => settings.data_bits = DataBitsCfg::Seven,
        "8" => settings.data_bits = DataBitsCfg::Eight,
        other => warn!(value = other, "unusable legacy data bits"),
    }

    match lines[2].trim() {
        "1" => settings.stop_bits = StopBitsCfg::One,
        "2" => settings.stop_bits = StopBitsCfg::Two,
        other => warn!(value = other, "unsupported legacy stop bits"),
    }

    match lines[3].trim() {
        "None" => settings.parity = ParityCfg::None,
        "Odd" => settings.parity = ParityCfg::Odd,
        "Even" => settings.parity = ParityCfg::Even,
        other => warn!(value = other, "unsupported legacy parity"),
    }

    settings
}
