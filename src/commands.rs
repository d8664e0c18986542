//! Outbound payloads: the preset command panel and free-form send encoding.
//!
//! Payload bytes are opaque to this crate; presets are sent exactly as
//! written here.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Line terminator appended when a send asks for CRLF.
pub const CRLF: &[u8] = b"\r\n";

const PRODUCT_INFO: &[u8] = b"3:PRD?\r\n";
const FIRMWARE_VERSION: &[u8] = b"3:FWV?\r\n";
const SET_IR_LIBRARY: &[u8] = b"3:irdev-\
B079010FE20FE20FE20F000100103600240ED80100000000100010001000320100000200051E0900001003C9008600\
41090800100536008600410910001005360086004100240011DA2700C50000D711DA27004200005411DA2700003920\
00A0000006600000C18000C5151E051501D4D80F051502D4D800081E003840004048D7081E013840104048E70B1003\
C8CC0A03C8CC0303C8CC0503C8CC071616045F004806043F003606083F04123704153F091E37040C0803CCD00F03CC\
D00000D4070104000216080605040111232302030217020A1A03B0B40303B0B40403B0B40006B0B406B8C03206B0B4\
02B8C0C0170A1E05010300051E010100147F04090A081205036108064807801603F016010A078089C008890B062001\
00021B1C4149C13C007800B400F0002C016801A401E0011C0258029402D002010505036109063607801603F016010D\
078089C009890B061A0100021C1D414991C6038607460B060FC6128616461A061EC6210105060001A11E0001060001\
B1210084\r\n";

/// Fixed commands from the device's command panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Query product information.
    ProductInfo,
    /// Query the firmware version.
    FirmwareVersion,
    /// Program the IR code library.
    SetIrLibrary,
}

impl Preset {
    pub const ALL: [Preset; 3] = [
        Preset::ProductInfo,
        Preset::FirmwareVersion,
        Preset::SetIrLibrary,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Preset::ProductInfo => "Product Info",
            Preset::FirmwareVersion => "Firmware Version",
            Preset::SetIrLibrary => "Set IR Library",
        }
    }

    pub fn payload(self) -> &'static [u8] {
        match self {
            Preset::ProductInfo => PRODUCT_INFO,
            Preset::FirmwareVersion => FIRMWARE_VERSION,
            Preset::SetIrLibrary => SET_IR_LIBRARY,
        }
    }
}

/// How typed text is turned into bytes before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    /// Hex byte pairs, whitespace ignored: `1B 1B 0A`.
    Hex,
    /// A base-2 number, sent big-endian.
    Binary,
    /// A base-8 number, sent big-endian.
    Octal,
    /// UTF-8 text as typed.
    #[default]
    String,
}

#[derive(Debug, Error, PartialEq)]
pub enum PayloadError {
    #[error("nothing to send")]
    Empty,

    #[error("invalid hex payload: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("'{digit}' is not a valid {format:?} digit")]
    InvalidDigit { digit: char, format: PayloadFormat },
}

/// Encode `text` in `format`.
///
/// `append_crlf` only terminates `String` payloads; hex, binary and octal
/// input is a byte value and never carries a line terminator.
///
/// Binary and octal input is read as one unsigned number and emitted in the
/// fewest bytes that hold every digit (`"101"` is one byte, `"777"` is two).
pub fn encode_payload(
    text: &str,
    format: PayloadFormat,
    append_crlf: bool,
) -> Result<Vec<u8>, PayloadError> {
    if text.is_empty() {
        return Err(PayloadError::Empty);
    }

    let mut bytes = match format {
        PayloadFormat::String => text.as_bytes().to_vec(),
        PayloadFormat::Hex => {
            let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            if compact.is_empty() {
                return Err(PayloadError::Empty);
            }
            hex::decode(compact)?
        }
        PayloadFormat::Binary => digits_to_bytes(text, format, 2, 1)?,
        PayloadFormat::Octal => digits_to_bytes(text, format, 8, 3)?,
    };

    if append_crlf && format == PayloadFormat::String {
        bytes.extend_from_slice(CRLF);
    }
    Ok(bytes)
}

fn digits_to_bytes(
    text: &str,
    format: PayloadFormat,
    radix: u32,
    bits_per_digit: usize,
) -> Result<Vec<u8>, PayloadError> {
    let digits = text
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| {
            c.to_digit(radix)
                .ok_or(PayloadError::InvalidDigit { digit: c, format })
        })
        .collect::<Result<Vec<u32>, _>>()?;
    if digits.is_empty() {
        return Err(PayloadError::Empty);
    }

    let width = (digits.len() * bits_per_digit).div_ceil(8);
    let mut out = vec![0u8; width];
    for digit in digits {
        // out = out * radix + digit, big-endian
        let mut carry = digit;
        for byte in out.iter_mut().rev() {
            let value = u32::from(*byte) * radix + carry;
            *byte = (value & 0xFF) as u8;
            carry = value >> 8;
        }
    }
    Ok(out)
}
