//! OpenHam Frame - Frame codec and message layer
//!
//! This crate turns text into flagged 72-bit frames for transmission and
//! reassembles received frames into messages, including directed commands
//! and their checksums.

pub mod assembler;
pub mod checksum;
pub mod directed;
pub mod error;
pub mod frame;
pub mod message_buffer;

pub use error::{FrameError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        assembler::{AssemblerConfig, MessageAssembler, MessageKind, OutgoingFrame, OutgoingMessage},
        checksum::{checksum, checksum_valid, ChecksumKind},
        directed::{parse_directed, ChecksumPolicy, Command},
        error::{FrameError, Result},
        frame::{DataPacket, Frame, FrameCodec, TransmissionFlags},
        message_buffer::{
            AssembledMessage, BufferEvent, DecodedFrame, DiscardReason, MessageBuffer,
            MessageBufferConfig, RxMeta,
        },
    };
}
