//! Configuration for the console.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `IRBLASTER_CONFIG` environment variable (explicit path)
//! 2. `./irblaster.toml` (current directory)
//! 3. `irblaster.toml` in the platform config directory
//!    (`~/.config/irblaster-console/` on Linux, `%APPDATA%` on Windows)
//! 4. Built-in defaults (no file required): 19200 baud, 8N1
//!
//! # Environment Overrides
//!
//! The pattern is: `IRBLASTER_<SECTION>_<KEY>`
//!
//! Examples:
//! - `IRBLASTER_SERIAL_PORT=/dev/ttyUSB0`
//! - `IRBLASTER_SERIAL_BAUD_RATE=9600`
//! - `IRBLASTER_LOGGING_FORMAT=json`
//!
//! # Example
//!
//! ```rust,no_run
//! use irblaster_console::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load_or_default();
//! let config = loader.config();
//! println!("Baud: {}", config.serial.baud_rate);
//! ```

mod error;
mod legacy;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use legacy::{import_legacy, parse_legacy};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{
    Config, DataBitsCfg, LogFormat, LoggingConfig, MonitorConfig, ParityCfg, SerialSettings,
    StopBitsCfg,
};
