//! Command checksums
//!
//! Checksums are computed over the trimmed `"<command> <args>"` text and
//! rendered in base 41 so they travel as ordinary payload characters:
//!
//! - 16 bit: CRC-16/KERMIT (reflected poly 0x8408, init 0, no final xor), 3 chars
//! - 32 bit: CRC-32/ISO-HDLC, 6 chars

use openham_core::bits::{pack_radix, unpack_radix, CHECKSUM_ALPHABET};
use serde::{Deserialize, Serialize};

/// CRC-16 polynomial, bit reversed
const CRC16_KERMIT_POLY: u16 = 0x8408;

/// Checksum width attached to a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumKind {
    #[default]
    None,
    Crc16,
    Crc32,
}

impl ChecksumKind {
    /// Number of characters of the rendered checksum
    pub const fn len(self) -> usize {
        match self {
            ChecksumKind::None => 0,
            ChecksumKind::Crc16 => 3,
            ChecksumKind::Crc32 => 6,
        }
    }

    pub const fn is_none(self) -> bool {
        matches!(self, ChecksumKind::None)
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(ChecksumKind::None),
            16 => Some(ChecksumKind::Crc16),
            32 => Some(ChecksumKind::Crc32),
            _ => None,
        }
    }
}

/// CRC-16/KERMIT
pub fn crc16_kermit(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ CRC16_KERMIT_POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// CRC-32/ISO-HDLC
pub fn crc32(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Render the checksum of `text` (trimmed first); empty for [`ChecksumKind::None`]
pub fn checksum(text: &str, kind: ChecksumKind) -> String {
    let data = text.trim().as_bytes();
    let (value, width) = match kind {
        ChecksumKind::None => return String::new(),
        ChecksumKind::Crc16 => (crc16_kermit(data) as u64, 3),
        ChecksumKind::Crc32 => (crc32(data) as u64, 6),
    };
    // 41^3 > 2^16 and 41^6 > 2^32, so the value always fits
    pack_radix(value, width, CHECKSUM_ALPHABET).unwrap_or_default()
}

/// True when `check` is the rendered checksum of `text`
pub fn checksum_valid(text: &str, check: &str, kind: ChecksumKind) -> bool {
    if kind.is_none() {
        return true;
    }
    if check.len() != kind.len() || unpack_radix(check, kind.len(), CHECKSUM_ALPHABET).is_err() {
        return false;
    }
    checksum(text, kind) == check
}

/// Text the checksum of a directed command covers
pub fn command_text(command: &str, args: &str) -> String {
    format!("{} {}", command, args).trim().to_string()
}
