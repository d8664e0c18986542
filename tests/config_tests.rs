//! Configuration loading, persistence and legacy import.
//!
//! These tests touch process-wide environment variables and the working
//! directory's view of config files, so they run serially.

use irblaster_console::config::{
    import_legacy, Config, ConfigError, ConfigLoader, DataBitsCfg, LogFormat, ParityCfg,
    StopBitsCfg,
};
use irblaster_console::poller::OutputFormat;
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn load_from_reads_every_section() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "irblaster.toml",
        r#"
            [serial]
            port = "blaster"
            baud_rate = 38400
            parity = "Odd"
            timeout_ms = 250

            [serial.port_aliases]
            blaster = "/dev/ttyACM0"

            [monitor]
            output = "json"
            sentinel_response = false

            [logging]
            level = "debug"
            format = "compact"
        "#,
    );

    let loader = ConfigLoader::load_from(&path).unwrap();
    let config = loader.config();
    assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));
    assert_eq!(config.serial.baud_rate, 38_400);
    assert_eq!(config.serial.parity, ParityCfg::Odd);
    assert_eq!(config.serial.resolve_port("blaster"), "/dev/ttyACM0");
    assert_eq!(config.serial.timeout().as_millis(), 250);
    assert_eq!(config.monitor.output, OutputFormat::Json);
    assert!(!config.monitor.sentinel_response);
    assert_eq!(config.logging.format, LogFormat::Compact);
    // Untouched keys keep their defaults
    assert_eq!(config.serial.data_bits, DataBitsCfg::Eight);
    assert_eq!(config.monitor.poll_interval_ms, 1);
}

#[test]
#[serial]
fn malformed_file_is_a_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.toml", "[serial\nbaud_rate = ");

    assert!(matches!(
        ConfigLoader::load_from(&path),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
#[serial]
fn load_or_default_falls_back_on_malformed_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "broken.toml", "serial = 12");
    env::set_var("IRBLASTER_CONFIG", &path);

    let loader = ConfigLoader::load_or_default();
    assert_eq!(loader.config(), &Config::default());
    assert_eq!(loader.config_path.as_deref(), Some(path.as_path()));

    env::remove_var("IRBLASTER_CONFIG");
}

#[test]
#[serial]
fn invalid_values_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "zero.toml", "[serial]\nbaud_rate = 0\n");

    assert!(matches!(
        ConfigLoader::load_from(&path),
        Err(ConfigError::ValidationError { .. })
    ));
}

#[test]
#[serial]
fn explicit_config_env_wins() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "custom.toml", "[serial]\nbaud_rate = 115200\n");
    env::set_var("IRBLASTER_CONFIG", &path);

    let loader = ConfigLoader::load().unwrap();
    assert_eq!(loader.config().serial.baud_rate, 115_200);

    env::remove_var("IRBLASTER_CONFIG");
}

#[test]
#[serial]
fn env_overrides_beat_file_values() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "irblaster.toml", "[serial]\nbaud_rate = 9600\n");
    env::set_var("IRBLASTER_SERIAL_BAUD_RATE", "57600");
    env::set_var("IRBLASTER_SERIAL_PORT", "COM7");

    let config = ConfigLoader::load_from(&path).unwrap().into_config();
    assert_eq!(config.serial.baud_rate, 57_600);
    assert_eq!(config.serial.port.as_deref(), Some("COM7"));

    env::remove_var("IRBLASTER_SERIAL_BAUD_RATE");
    env::remove_var("IRBLASTER_SERIAL_PORT");
}

#[test]
#[serial]
fn save_then_reload_keeps_settings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("irblaster.toml");

    let mut loader = ConfigLoader::with_defaults();
    loader.config_mut().serial.baud_rate = 115_200;
    loader.config_mut().serial.stop_bits = StopBitsCfg::Two;
    loader.save_to(&path).unwrap();

    let saved = fs::read_to_string(&path).unwrap();
    assert!(saved.contains("baud_rate = 115200"));
    assert!(saved.contains("stop_bits = \"2\""));

    let mut reloaded = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(reloaded.config(), loader.config());

    fs::write(&path, "[serial]\nbaud_rate = 9600\n").unwrap();
    reloaded.reload().unwrap();
    assert_eq!(reloaded.config().serial.baud_rate, 9_600);
}

#[test]
#[serial]
fn save_uses_loaded_path() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "irblaster.toml", "");

    let mut loader = ConfigLoader::load_from(&path).unwrap();
    loader.config_mut().serial.parity = ParityCfg::Even;
    assert_eq!(loader.save().unwrap(), path);

    let reloaded = ConfigLoader::load_from(&path).unwrap();
    assert_eq!(reloaded.config().serial.parity, ParityCfg::Even);
}

#[test]
#[serial]
fn legacy_settings_file_is_imported() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "settings.txt", "57600\n7\n2\nOdd\n");

    let serial = import_legacy(&path).unwrap();
    assert_eq!(serial.baud_rate, 57_600);
    assert_eq!(serial.data_bits, DataBitsCfg::Seven);
    assert_eq!(serial.stop_bits, StopBitsCfg::Two);
    assert_eq!(serial.parity, ParityCfg::Odd);
}

#[test]
#[serial]
fn legacy_import_of_missing_file_is_read_error() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        import_legacy(dir.path().join("settings.txt")),
        Err(ConfigError::ReadError { .. })
    ));
}
