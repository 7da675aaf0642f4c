//! OpenHam Core - bit packing primitives and submode timing
//!
//! This crate provides the fixed-width field codecs (callsigns, grid
//! locators, reports, power levels), MSB-first bit helpers, the compact
//! transport alphabets and the submode timing table shared by every other
//! OpenHam crate.

pub mod bits;
pub mod callsign;
pub mod error;
pub mod packing;
pub mod submode;

pub use error::{PackError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        bits::{BitReader, Bits, Codeword, FRAME_BITS},
        callsign::{pack_callsign, pack_compound, unpack_callsign, unpack_compound},
        error::{PackError, Result},
        packing::{pack_grid, pack_num, unpack_grid, unpack_num},
        submode::Submode,
    };
}
