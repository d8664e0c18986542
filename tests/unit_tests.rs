//! Unit tests for the console's public surface
//!
//! This module contains tests for:
//! - `commands`: presets and send-format encoding
//! - `service`: ConsoleService lifecycle and status reporting
//! - `error`: AppError display and conversions
//!
//! Tests follow the Arrange-Act-Assert pattern.

mod common;

use common::{create_mock_port_with_responses, wait_until};
use irblaster_console::commands::{encode_payload, PayloadError, PayloadFormat, Preset};
use irblaster_console::config::Config;
use irblaster_console::error::AppError;
use irblaster_console::poller::{ObserverError, AUTO_RESPONSE};
use irblaster_console::service::{ConsoleService, ServiceError, StatusResult};
use irblaster_console::port::PortError;
use parking_lot::Mutex;
use std::sync::Arc;

// ============================================================================
// Command Tests
// ============================================================================

#[cfg(test)]
mod command_tests {
    use super::*;

    #[test]
    fn test_preset_labels_are_distinct() {
        let labels: Vec<&str> = Preset::ALL.iter().map(|p| p.label()).collect();
        assert_eq!(
            labels,
            vec!["Product Info", "Firmware Version", "Set IR Library"]
        );
    }

    #[test]
    fn test_ir_library_is_sent_verbatim() {
        // Arrange: a mock device on an open service
        let device = create_mock_port_with_responses("MOCK0", vec![]);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device.clone())).unwrap();

        // Act
        let written = service.send_preset(Preset::SetIrLibrary).unwrap();

        // Assert: exactly the blob, in one write
        assert_eq!(written.bytes_written, Preset::SetIrLibrary.payload().len());
        assert_eq!(
            device.get_write_log(),
            vec![Preset::SetIrLibrary.payload().to_vec()]
        );
    }

    #[test]
    fn test_each_format_encodes() {
        let cases: [(&str, PayloadFormat, Vec<u8>); 4] = [
            ("hi", PayloadFormat::String, b"hi\r\n".to_vec()),
            ("0d0a", PayloadFormat::Hex, vec![0x0D, 0x0A]),
            ("11111111", PayloadFormat::Binary, vec![0xFF]),
            ("377", PayloadFormat::Octal, vec![0x00, 0xFF]),
        ];

        for (text, format, expected) in cases {
            assert_eq!(
                encode_payload(text, format, true).unwrap(),
                expected,
                "{text} as {format:?}"
            );
        }
    }

    #[test]
    fn test_octal_rejects_eight() {
        assert!(matches!(
            encode_payload("18", PayloadFormat::Octal, false),
            Err(PayloadError::InvalidDigit { digit: '8', .. })
        ));
    }
}

// ============================================================================
// Service Tests
// ============================================================================

#[cfg(test)]
mod service_tests {
    use super::*;

    #[test]
    fn test_custom_observer_sees_lines_after_transcript() {
        // Arrange
        let device = create_mock_port_with_responses("MOCK0", vec![b"PRD:IR-8\r\n"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut service = ConsoleService::new(Config::default());
        service.register_observer("sink", move |line: &str| -> Result<(), ObserverError> {
            sink.lock().push(line.to_string());
            Ok(())
        });

        // Act
        service.open_with_adapter(Box::new(device)).unwrap();
        assert!(wait_until(|| {
            service.tick();
            !seen.lock().is_empty()
        }));

        // Assert
        assert_eq!(*seen.lock(), vec!["PRD:IR-8"]);
        assert_eq!(service.received().lines(), vec!["PRD:IR-8"]);
    }

    #[test]
    fn test_failing_observer_does_not_block_sentinel() {
        let device = create_mock_port_with_responses("MOCK0", vec![b".\r\n"]);
        let mut service = ConsoleService::new(Config::default());
        service.register_observer("broken", |_: &str| -> Result<(), ObserverError> {
            Err(ObserverError::Other("display gone".into()))
        });

        service.open_with_adapter(Box::new(device.clone())).unwrap();
        assert!(wait_until(|| {
            service.tick();
            !device.get_write_log().is_empty()
        }));

        assert_eq!(device.get_write_log(), vec![AUTO_RESPONSE.to_vec()]);
    }

    #[test]
    fn test_write_failure_is_reported() {
        let device = create_mock_port_with_responses("MOCK0", vec![]);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device.clone())).unwrap();

        device.fail_next_write(std::io::ErrorKind::BrokenPipe);
        assert!(matches!(
            service.send_preset(Preset::ProductInfo),
            Err(ServiceError::PortError(_))
        ));
        assert!(service.sent().is_empty());
    }

    #[test]
    fn test_status_json_when_open() {
        let device = create_mock_port_with_responses("MOCK0", vec![]);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device)).unwrap();

        let json = serde_json::to_value(service.status()).unwrap();
        assert_eq!(json["state"], "Open");
        assert_eq!(json["port_name"], "MOCK0");
        assert_eq!(json["baud_rate"], 19_200);
        assert_eq!(json["reader"], "running");
    }

    #[test]
    fn test_clean_close_reports_no_fault() {
        let device = create_mock_port_with_responses("MOCK0", vec![]);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device)).unwrap();
        service.close().unwrap();

        match service.status() {
            StatusResult::Closed { last_fault } => assert_eq!(last_fault, None),
            other => panic!("unexpected status {other:?}"),
        }
    }

    #[test]
    fn test_clear_transcripts() {
        let device = create_mock_port_with_responses("MOCK0", vec![b"a\nb\n"]);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device)).unwrap();
        service.send_text("x", PayloadFormat::String, false).unwrap();
        assert!(wait_until(|| {
            service.tick();
            service.received().len() == 2
        }));

        service.clear_transcripts();
        assert!(service.received().is_empty());
        assert!(service.sent().is_empty());
    }
}

// ============================================================================
// AppError Tests
// ============================================================================

#[cfg(test)]
mod app_error_tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = AppError::from(ServiceError::PortAlreadyOpen);
        assert_eq!(err.to_string(), "Port is already open");

        let err = AppError::from(PortError::NotOpen);
        assert_eq!(
            err.to_string(),
            "A serial port error occurred: Port is not open"
        );

        let err = AppError::from(PayloadError::Empty);
        assert_eq!(err.to_string(), "The payload is invalid: nothing to send");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(AppError::from(io), AppError::IoError(_)));
    }
}
