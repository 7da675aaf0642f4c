//! Grid locator, numeric report and power level fields

use crate::{PackError, Result};

/// Width of the grid field inside a frame (the flag bit is carried separately)
pub const GRID_BITS: usize = 15;

/// Grid value meaning "no locator"
pub const NO_GRID: u16 = 0x7FFF;

/// Caller flag stored in the top bit of a packed grid
pub const GRID_FLAG: u16 = 0x8000;

/// Width of a numeric report field
pub const NUM_BITS: usize = 6;

/// Lowest and highest representable report
pub const NUM_MIN: i32 = -31;
pub const NUM_MAX: i32 = 31;

/// Packed "no value" report
pub const NO_NUM: u8 = 0;

/// Width of a power level field
pub const POWER_BITS: usize = 5;

/// Power levels in dBm addressable by the 5-bit power field
pub const POWER_LEVELS: [u8; 19] = [
    0, 3, 7, 10, 13, 17, 20, 23, 27, 30, 33, 37, 40, 43, 47, 50, 53, 57, 60,
];

const FIELD_LETTERS: u16 = 18;

fn invalid_grid(value: &str) -> PackError {
    PackError::InvalidGrid {
        value: value.to_string(),
    }
}

/// Pack a 4-character Maidenhead locator into a 16-bit field
///
/// An empty locator packs as [`NO_GRID`]. The top bit is left clear for the
/// caller, see [`GRID_FLAG`].
pub fn pack_grid(grid: &str) -> Result<u16> {
    let grid = grid.trim().to_ascii_uppercase();
    if grid.is_empty() {
        return Ok(NO_GRID);
    }
    let b = grid.as_bytes();
    if b.len() != 4 {
        return Err(invalid_grid(&grid));
    }
    let field = |ch: u8| -> Option<u16> {
        (b'A'..b'A' + FIELD_LETTERS as u8)
            .contains(&ch)
            .then(|| (ch - b'A') as u16)
    };
    let digit = |ch: u8| ch.is_ascii_digit().then(|| (ch - b'0') as u16);

    match (field(b[0]), field(b[1]), digit(b[2]), digit(b[3])) {
        (Some(f0), Some(f1), Some(d0), Some(d1)) => {
            Ok(((f0 * FIELD_LETTERS + f1) * 10 + d0) * 10 + d1)
        }
        _ => Err(invalid_grid(&grid)),
    }
}

/// Unpack a grid field; the flag bit is ignored and [`NO_GRID`] yields `None`
pub fn unpack_grid(value: u16) -> Result<Option<String>> {
    let value = value & !GRID_FLAG;
    if value == NO_GRID {
        return Ok(None);
    }
    if value >= FIELD_LETTERS * FIELD_LETTERS * 100 {
        return Err(invalid_grid(&format!("code {}", value)));
    }
    let d1 = value % 10;
    let d0 = (value / 10) % 10;
    let f1 = (value / 100) % FIELD_LETTERS;
    let f0 = value / 100 / FIELD_LETTERS;
    let grid = [
        b'A' + f0 as u8,
        b'A' + f1 as u8,
        b'0' + d0 as u8,
        b'0' + d1 as u8,
    ];
    Ok(Some(grid.iter().map(|&b| b as char).collect()))
}

/// True when `grid` is a 4-character locator
pub fn is_grid(grid: &str) -> bool {
    !grid.trim().is_empty() && pack_grid(grid).is_ok()
}

/// Pack a signed report, failing outside `-31..=31`
pub fn pack_num(value: i32) -> Result<u8> {
    if !(NUM_MIN..=NUM_MAX).contains(&value) {
        return Err(PackError::NumberOutOfRange {
            value,
            min: NUM_MIN,
            max: NUM_MAX,
        });
    }
    Ok((value + 32) as u8)
}

/// Pack a signed report, saturating at the range limits
pub fn pack_num_clamped(value: i32) -> u8 {
    (value.clamp(NUM_MIN, NUM_MAX) + 32) as u8
}

/// Unpack a report; [`NO_NUM`] yields `None`
pub fn unpack_num(packed: u8) -> Result<Option<i32>> {
    match packed {
        NO_NUM => Ok(None),
        1..=63 => Ok(Some(packed as i32 - 32)),
        _ => Err(PackError::ValueTooWide {
            value: packed as u64,
            bits: NUM_BITS,
        }),
    }
}

/// Pack a power level given in dBm
pub fn pack_power(dbm: u8) -> Result<u8> {
    POWER_LEVELS
        .iter()
        .position(|&p| p == dbm)
        .map(|p| p as u8)
        .ok_or(PackError::InvalidPower { dbm })
}

pub fn unpack_power(packed: u8) -> Result<u8> {
    POWER_LEVELS
        .get(packed as usize)
        .copied()
        .ok_or(PackError::ValueTooWide {
            value: packed as u64,
            bits: POWER_BITS,
        })
}
