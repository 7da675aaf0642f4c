//! Physical layer seams

use openham_core::bits::{Bits, FRAME_BITS};
use openham_core::submode::Submode;
use openham_frame::assembler::OutgoingMessage;
use openham_frame::frame::TransmissionFlags;
use openham_frame::message_buffer::DecodedFrame;
use tracing::debug;

use crate::scheduler::DecodeRequest;
use crate::{ModemError, Result};

/// Tone generator for one 72-bit frame
pub trait Modulator {
    /// Queue the tones for `bits`, with `flags` carried alongside
    fn modulate(&mut self, bits: &Bits, flags: TransmissionFlags) -> Result<()>;

    /// Submode the tones are generated for
    fn submode(&self) -> Submode;

    /// Drop any queued tones
    fn reset(&mut self);
}

/// External demodulator
///
/// Runs on a blocking thread; one call covers every span of the request.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, request: &DecodeRequest) -> Vec<DecodedFrame>;
}

/// Hand the next unsent frame of `message` to `modulator`
///
/// The frame is marked sent only once the modulator accepted it. Returns the
/// flags of the transmitted frame, or `None` when nothing is left.
pub fn transmit_next<M: Modulator + ?Sized>(
    message: &mut OutgoingMessage,
    modulator: &mut M,
) -> Result<Option<TransmissionFlags>> {
    let Some(frame) = message.next_unsent() else {
        return Ok(None);
    };
    if frame.bits.len() != FRAME_BITS {
        return Err(ModemError::InvalidParameters {
            msg: format!("frame has {} bits, expected {}", frame.bits.len(), FRAME_BITS),
        });
    }
    let flags = frame.flags;
    modulator.modulate(&frame.bits, flags)?;
    message.mark_sent();
    debug!("{} frame {} handed to modulator", modulator.submode(), flags);
    Ok(Some(flags))
}
