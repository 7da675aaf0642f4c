//! Frame structure and the 72-bit frame codec
//!
//! Layouts, MSB first:
//!
//! ```text
//! Heartbeat         [000][50 callsign][1 cq][15 grid][3 kind]
//! Compound          [001][50 callsign][1 0][15 grid][3 0]
//! CompoundDirected  [010][50 callsign][5 cmd][6 num][5 0][3 0]
//! Directed          [011][28 from][28 to][5 cmd][2 0][6 num]
//! Data              [1][1 compressed][payload][0][1 ... 1]
//! ```
//!
//! Data frames spend only two header bits; a leading `1` is enough to tell
//! them from the other kinds, all of which start with `0`.

use std::fmt;
use std::ops::BitOr;

use openham_codecs::dictionary::DictionaryCodec;
use openham_codecs::text::{HuffmanCodec, TextCodec};
use openham_core::bits::{push_field, BitReader, Bits, Codeword, FRAME_BITS};
use openham_core::callsign::{
    pack_callsign, pack_compound, unpack_callsign, unpack_compound, CALLSIGN_BITS, COMPOUND_BITS,
};
use openham_core::packing::{pack_grid, pack_num, unpack_grid, unpack_num, GRID_BITS, NUM_BITS};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directed::{Command, COMMAND_BITS};
use crate::{FrameError, Result};

/// Width of the type header of non-data frames
pub const FRAME_TYPE_BITS: usize = 3;

/// Payload budget of a data frame: 72 bits minus 2 header bits and the terminator
pub const DATA_PAYLOAD_BITS: usize = FRAME_BITS - 3;

/// Heartbeat kinds, indexed by the 3-bit kind field
pub const HB_KINDS: [&str; 8] = [
    "HB",
    "HB AUTO",
    "HB AUTO RELAY",
    "HB AUTO RELAY SPOT",
    "HB RELAY",
    "HB RELAY SPOT",
    "HB SPOT",
    "HB AUTO SPOT",
];

/// CQ kinds, indexed by the 3-bit kind field
pub const CQ_KINDS: [&str; 8] = [
    "CQ CQ CQ",
    "CQ DX",
    "CQ QRP",
    "CQ CONTEST",
    "CQ FIELD",
    "CQ FD",
    "CQ CQ",
    "CQ",
];

/// Frame type identifiers of the 3-bit header
pub mod frame_types {
    pub const HEARTBEAT: u8 = 0b000;
    pub const COMPOUND: u8 = 0b001;
    pub const COMPOUND_DIRECTED: u8 = 0b010;
    pub const DIRECTED: u8 = 0b011;
}

/// Position of a frame within its transmission
///
/// Carried by the physical layer next to the 72 payload bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TransmissionFlags(u8);

impl TransmissionFlags {
    pub const NONE: TransmissionFlags = TransmissionFlags(0);
    pub const FIRST: TransmissionFlags = TransmissionFlags(0b001);
    pub const LAST: TransmissionFlags = TransmissionFlags(0b010);
    pub const RESERVED: TransmissionFlags = TransmissionFlags(0b100);

    /// Keep only the three defined bits
    pub const fn from_bits(bits: u8) -> Self {
        TransmissionFlags(bits & 0b111)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: TransmissionFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_first(self) -> bool {
        self.contains(Self::FIRST)
    }

    pub const fn is_last(self) -> bool {
        self.contains(Self::LAST)
    }

    pub fn insert(&mut self, other: TransmissionFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for TransmissionFlags {
    type Output = TransmissionFlags;

    fn bitor(self, rhs: Self) -> Self::Output {
        TransmissionFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for TransmissionFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = if self.is_first() { 'F' } else { '-' };
        let last = if self.is_last() { 'L' } else { '-' };
        write!(f, "{}{}", first, last)
    }
}

/// One decoded (or to-be-encoded) frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Heartbeat {
        callsign: String,
        cq: bool,
        grid: Option<String>,
        kind: u8,
    },
    Compound {
        callsign: String,
        grid: Option<String>,
    },
    CompoundDirected {
        callsign: String,
        command: Command,
        num: Option<i32>,
    },
    Directed {
        from: String,
        to: String,
        command: Command,
        num: Option<i32>,
    },
    Data {
        text: String,
        compressed: bool,
    },
}

impl Frame {
    /// Heartbeat or CQ text for a kind index
    pub fn heartbeat_text(cq: bool, kind: u8) -> &'static str {
        let table = if cq { &CQ_KINDS } else { &HB_KINDS };
        table.get(kind as usize).copied().unwrap_or(table[0])
    }

    /// Match heartbeat text (`HB AUTO`, `CQ DX`, ...) to `(cq, kind)`
    pub fn parse_heartbeat_kind(text: &str) -> Option<(bool, u8)> {
        let text = text.trim();
        if let Some(kind) = HB_KINDS.iter().position(|k| *k == text) {
            return Some((false, kind as u8));
        }
        CQ_KINDS
            .iter()
            .position(|k| *k == text)
            .map(|kind| (true, kind as u8))
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Frame::Data { .. })
    }

    /// True for the side-channel compound callsign frames
    pub fn is_fragment(&self) -> bool {
        matches!(self, Frame::Compound { .. } | Frame::CompoundDirected { .. })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Heartbeat {
                callsign,
                cq,
                grid,
                kind,
            } => {
                write!(f, "{}: {}", callsign, Frame::heartbeat_text(*cq, *kind))?;
                if let Some(grid) = grid {
                    write!(f, " {}", grid)?;
                }
                Ok(())
            }
            Frame::Compound { callsign, grid } => {
                write!(f, "<{}", callsign)?;
                if let Some(grid) = grid {
                    write!(f, " {}", grid)?;
                }
                write!(f, ">")
            }
            Frame::CompoundDirected {
                callsign,
                command,
                num,
            } => {
                write!(f, "<{} {}", callsign, command)?;
                if let Some(num) = num {
                    write!(f, " {:+}", num)?;
                }
                write!(f, ">")
            }
            Frame::Directed {
                from,
                to,
                command,
                num,
            } => {
                write!(f, "{}: {} {}", from, to, command)?;
                if let Some(num) = num {
                    write!(f, " {:+}", num)?;
                }
                Ok(())
            }
            Frame::Data { text, .. } => f.write_str(text),
        }
    }
}

/// A data frame together with the amount of text it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub frame: Frame,
    pub bits: Codeword,
    /// Bytes of the input text represented by this frame
    pub consumed: usize,
}

/// Encoder/decoder for all frame kinds
#[derive(Debug, Default)]
pub struct FrameCodec {
    dictionary: DictionaryCodec,
    huffman: HuffmanCodec,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dictionary(&self) -> &DictionaryCodec {
        &self.dictionary
    }

    fn text_codec(&self, compressed: bool) -> &dyn TextCodec {
        if compressed {
            &self.dictionary
        } else {
            &self.huffman
        }
    }

    /// Encode a frame into exactly [`FRAME_BITS`] bits
    ///
    /// Data text that does not fit is truncated; use [`pack_data`](Self::pack_data)
    /// to learn how much was kept.
    pub fn encode(&self, frame: &Frame) -> Result<Codeword> {
        let mut bits = Codeword::with_capacity(FRAME_BITS);
        match frame {
            Frame::Heartbeat {
                callsign,
                cq,
                grid,
                kind,
            } => {
                push_field(&mut bits, frame_types::HEARTBEAT as u64, FRAME_TYPE_BITS)?;
                push_field(&mut bits, pack_compound(callsign)?, COMPOUND_BITS)?;
                push_field(&mut bits, *cq as u64, 1)?;
                push_field(&mut bits, grid_value(grid)?, GRID_BITS)?;
                push_field(&mut bits, *kind as u64, 3)?;
            }
            Frame::Compound { callsign, grid } => {
                push_field(&mut bits, frame_types::COMPOUND as u64, FRAME_TYPE_BITS)?;
                push_field(&mut bits, pack_compound(callsign)?, COMPOUND_BITS)?;
                push_field(&mut bits, 0, 1)?;
                push_field(&mut bits, grid_value(grid)?, GRID_BITS)?;
                push_field(&mut bits, 0, 3)?;
            }
            Frame::CompoundDirected {
                callsign,
                command,
                num,
            } => {
                push_field(&mut bits, frame_types::COMPOUND_DIRECTED as u64, FRAME_TYPE_BITS)?;
                push_field(&mut bits, pack_compound(callsign)?, COMPOUND_BITS)?;
                push_field(&mut bits, command.code() as u64, COMMAND_BITS)?;
                push_field(&mut bits, num_value(*num)?, NUM_BITS)?;
                push_field(&mut bits, 0, 8)?;
            }
            Frame::Directed {
                from,
                to,
                command,
                num,
            } => {
                push_field(&mut bits, frame_types::DIRECTED as u64, FRAME_TYPE_BITS)?;
                push_field(&mut bits, pack_callsign(from)? as u64, CALLSIGN_BITS)?;
                push_field(&mut bits, pack_callsign(to)? as u64, CALLSIGN_BITS)?;
                push_field(&mut bits, command.code() as u64, COMMAND_BITS)?;
                push_field(&mut bits, 0, 2)?;
                push_field(&mut bits, num_value(*num)?, NUM_BITS)?;
            }
            Frame::Data { text, compressed } => {
                let packed = self.text_codec(*compressed).pack(text, DATA_PAYLOAD_BITS);
                bits = data_bits(*compressed, &packed.bits);
            }
        }

        if bits.len() != FRAME_BITS {
            return Err(FrameError::SizeMismatch {
                expected: FRAME_BITS,
                actual: bits.len(),
            });
        }
        Ok(bits)
    }

    /// Decode a 72-bit vector into a frame
    pub fn decode(&self, bits: &Bits) -> Result<Frame> {
        if bits.len() != FRAME_BITS {
            return Err(FrameError::SizeMismatch {
                expected: FRAME_BITS,
                actual: bits.len(),
            });
        }
        if bits[0] {
            return self.decode_data(bits);
        }

        let mut reader = BitReader::new(bits);
        let frame_type = reader.read(FRAME_TYPE_BITS)? as u8;
        let frame = match frame_type {
            frame_types::HEARTBEAT => {
                let callsign = unpack_compound(reader.read(COMPOUND_BITS)?)?;
                let cq = reader.read(1)? == 1;
                let grid = unpack_grid(reader.read(GRID_BITS)? as u16)?;
                let kind = reader.read(3)? as u8;
                Frame::Heartbeat {
                    callsign,
                    cq,
                    grid,
                    kind,
                }
            }
            frame_types::COMPOUND => {
                let callsign = unpack_compound(reader.read(COMPOUND_BITS)?)?;
                reader.read(1)?;
                let grid = unpack_grid(reader.read(GRID_BITS)? as u16)?;
                Frame::Compound { callsign, grid }
            }
            frame_types::COMPOUND_DIRECTED => {
                let callsign = unpack_compound(reader.read(COMPOUND_BITS)?)?;
                let command = read_command(&mut reader)?;
                let num = unpack_num(reader.read(NUM_BITS)? as u8)?;
                Frame::CompoundDirected {
                    callsign,
                    command,
                    num,
                }
            }
            frame_types::DIRECTED => {
                let from = unpack_callsign(reader.read(CALLSIGN_BITS)? as u32)?;
                let to = unpack_callsign(reader.read(CALLSIGN_BITS)? as u32)?;
                let command = read_command(&mut reader)?;
                reader.read(2)?;
                let num = unpack_num(reader.read(NUM_BITS)? as u8)?;
                Frame::Directed {
                    from,
                    to,
                    command,
                    num,
                }
            }
            other => {
                return Err(FrameError::InvalidFormat {
                    msg: format!("unknown frame type {:03b}", other),
                })
            }
        };
        Ok(frame)
    }

    fn decode_data(&self, bits: &Bits) -> Result<Frame> {
        let compressed = bits[1];
        let body = &bits[2..];
        let end = body
            .last_zero()
            .ok_or_else(|| FrameError::InvalidFormat {
                msg: "data frame without terminator".to_string(),
            })?;
        let text = self.text_codec(compressed).unpack(&body[..end])?;
        Ok(Frame::Data { text, compressed })
    }

    /// Pack as much of `text` as fits into one data frame
    ///
    /// Both codecs are tried; whichever consumes more text wins, with ties
    /// going to the dictionary.
    pub fn pack_data(&self, text: &str) -> Result<DataPacket> {
        let dict = self.dictionary.pack(text, DATA_PAYLOAD_BITS);
        let huff = self.huffman.pack(text, DATA_PAYLOAD_BITS);
        let (compressed, packed) = if dict.consumed >= huff.consumed {
            (true, dict)
        } else {
            (false, huff)
        };
        if packed.is_empty() {
            return Err(FrameError::Unencodable {
                text: text.to_string(),
            });
        }
        debug!(
            "data frame via {}: {} of {} bytes",
            self.text_codec(compressed).name(),
            packed.consumed,
            text.len()
        );

        let bits = data_bits(compressed, &packed.bits);
        Ok(DataPacket {
            frame: Frame::Data {
                text: text[..packed.consumed].to_string(),
                compressed,
            },
            bits,
            consumed: packed.consumed,
        })
    }

    /// Build and encode a heartbeat (or CQ) frame
    pub fn pack_heartbeat(&self, callsign: &str, grid: &str, cq: bool, kind: u8) -> Result<(Frame, Codeword)> {
        let grid = grid.trim();
        let frame = Frame::Heartbeat {
            callsign: callsign.trim().to_ascii_uppercase(),
            cq,
            grid: (!grid.is_empty()).then(|| grid.to_ascii_uppercase()),
            kind: kind & 0b111,
        };
        let bits = self.encode(&frame)?;
        Ok((frame, bits))
    }
}

fn data_bits(compressed: bool, payload: &Bits) -> Codeword {
    let mut bits = Codeword::with_capacity(FRAME_BITS);
    bits.push(true);
    bits.push(compressed);
    bits.extend_from_bitslice(payload);
    bits.push(false);
    bits.resize(FRAME_BITS, true);
    bits
}

fn grid_value(grid: &Option<String>) -> Result<u64> {
    Ok(pack_grid(grid.as_deref().unwrap_or(""))? as u64)
}

fn num_value(num: Option<i32>) -> Result<u64> {
    Ok(match num {
        Some(n) => pack_num(n)? as u64,
        None => 0,
    })
}

fn read_command(reader: &mut BitReader<'_>) -> Result<Command> {
    let code = reader.read(COMMAND_BITS)? as u8;
    Command::from_code(code).ok_or_else(|| FrameError::InvalidFormat {
        msg: format!("command code {} out of range", code),
    })
}
