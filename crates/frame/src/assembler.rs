//! Outgoing message assembly
//!
//! Text is classified as a heartbeat, a directed command or free text, turned
//! into header frames plus a payload string, and the payload is cut into data
//! frames. The resulting [`OutgoingMessage`] is consumed one frame at a time;
//! the unsent tail may be edited while the head is on the air.
//!
//! Data frames are cut at word boundaries. A single space at a cut is not
//! transmitted; [`join_payload`] puts it back on the receive side. A word too
//! long for one frame is still split and arrives with a space inserted.

use openham_core::bits::Codeword;
use openham_core::callsign::looks_like_callsign;
use openham_core::packing::is_grid;
use openham_codecs::text::sanitize;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::directed::{pack_directed, ChecksumPolicy};
use crate::frame::{DataPacket, Frame, FrameCodec, TransmissionFlags};
use crate::{FrameError, Result};

/// Station settings used while composing messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerConfig {
    /// Local callsign
    pub callsign: String,
    /// Local 4-character grid, empty for none
    pub grid: String,
    /// Prefix free text with `CALL: ` on the first frame
    ///
    /// The prefix is left out when it would not fit a single data frame.
    pub identify: bool,
    pub checksums: ChecksumPolicy,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            callsign: String::new(),
            grid: String::new(),
            identify: true,
            checksums: ChecksumPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Heartbeat,
    Directed,
    FreeText,
}

/// Header frames and payload text derived from one composed text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePlan {
    pub kind: MessageKind,
    pub header: Vec<Frame>,
    pub payload: String,
}

/// One queued frame of an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub frame: Frame,
    pub bits: Codeword,
    pub flags: TransmissionFlags,
    pub sent: bool,
    /// Payload bytes accounted for by this frame, including a dropped
    /// separator space; zero for header frames
    pub payload_chars: usize,
}

/// Ordered frames of one transmission plus typeahead bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingMessage {
    kind: Option<MessageKind>,
    frames: Vec<OutgoingFrame>,
    header: Vec<Frame>,
    payload: String,
    sent_payload_chars: usize,
}

impl OutgoingMessage {
    pub fn kind(&self) -> Option<MessageKind> {
        self.kind
    }

    pub fn frames(&self) -> &[OutgoingFrame] {
        &self.frames
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn sent_count(&self) -> usize {
        self.frames.iter().filter(|f| f.sent).count()
    }

    /// Payload bytes already on the air
    pub fn sent_payload_chars(&self) -> usize {
        self.sent_payload_chars
    }

    pub fn next_unsent(&self) -> Option<&OutgoingFrame> {
        self.frames.iter().find(|f| !f.sent)
    }

    pub fn is_complete(&self) -> bool {
        !self.frames.is_empty() && self.frames.iter().all(|f| f.sent)
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Mark the next frame as irrevocably sent and return it
    pub fn mark_sent(&mut self) -> Option<&OutgoingFrame> {
        let index = self.frames.iter().position(|f| !f.sent)?;
        let frame = &mut self.frames[index];
        frame.sent = true;
        self.sent_payload_chars += frame.payload_chars;
        Some(&self.frames[index])
    }

    /// Drop every frame, sent or not
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Replace the unsent tail with the frames of `new_text`
    ///
    /// Accepted only when the frames already sent are unaffected: sent header
    /// frames must be identical and the new payload must start with the
    /// payload already transmitted.
    pub fn edit(&mut self, assembler: &MessageAssembler, new_text: &str) -> Result<()> {
        let sent = self.sent_count();
        if sent == 0 {
            *self = assembler.assemble(new_text)?;
            return Ok(());
        }

        let plan = assembler.plan(new_text)?;
        let sent_headers = sent.min(self.header.len());
        if plan.header.get(..sent_headers) != self.header.get(..sent_headers) {
            return Err(conflict("header frames already sent"));
        }
        if sent > self.header.len() && plan.header.len() != self.header.len() {
            return Err(conflict("message type changed after payload was sent"));
        }
        let sent_text = &self.payload[..self.sent_payload_chars];
        if !plan.payload.starts_with(sent_text) {
            return Err(conflict("payload already sent differs"));
        }

        let mut tail = Vec::new();
        for frame in &plan.header[sent_headers..] {
            let bits = assembler.codec.encode(frame)?;
            tail.push(OutgoingFrame {
                frame: frame.clone(),
                bits,
                flags: TransmissionFlags::NONE,
                sent: false,
                payload_chars: 0,
            });
        }
        tail.extend(assembler.payload_frames(&plan.payload[self.sent_payload_chars..])?);

        let already_ended = self.frames[..sent].last().map_or(false, |f| f.flags.is_last());
        match (tail.last_mut(), already_ended) {
            (None, false) => return Err(conflict("nothing left to carry the last flag")),
            (Some(_), true) => return Err(conflict("last frame already sent")),
            (Some(last), false) => last.flags.insert(TransmissionFlags::LAST),
            (None, true) => {}
        }

        debug!("typeahead edit: {} sent, {} requeued", sent, tail.len());
        self.frames.truncate(sent);
        self.frames.extend(tail);
        self.kind = Some(plan.kind);
        self.header = plan.header;
        self.payload = plan.payload;
        Ok(())
    }
}

fn conflict(msg: &str) -> FrameError {
    FrameError::TypeaheadConflict {
        msg: msg.to_string(),
    }
}

/// Splits outgoing text into flagged frames
#[derive(Debug, Default)]
pub struct MessageAssembler {
    codec: FrameCodec,
    config: AssemblerConfig,
}

impl MessageAssembler {
    pub fn new(config: AssemblerConfig) -> Self {
        Self {
            codec: FrameCodec::new(),
            config,
        }
    }

    pub fn config(&self) -> &AssemblerConfig {
        &self.config
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Classify `text` and derive its header frames and payload
    pub fn plan(&self, text: &str) -> Result<MessagePlan> {
        let text = sanitize(text);
        if text.is_empty() {
            return Err(FrameError::EmptyMessage);
        }

        if let Some(frame) = self.heartbeat(&text) {
            return Ok(MessagePlan {
                kind: MessageKind::Heartbeat,
                header: vec![frame],
                payload: String::new(),
            });
        }

        if let Some(directed) = pack_directed(&text, &self.config.callsign, &self.config.checksums) {
            return Ok(MessagePlan {
                kind: MessageKind::Directed,
                header: directed.frames,
                payload: directed.payload,
            });
        }

        let payload = match self.identity() {
            Some(prefix) => prefix + &text,
            None => text,
        };
        Ok(MessagePlan {
            kind: MessageKind::FreeText,
            header: Vec::new(),
            payload,
        })
    }

    /// `CALL: ` prefix for free text
    ///
    /// Only used when it fits one data frame, so the identity always arrives
    /// whole in the FIRST frame.
    fn identity(&self) -> Option<String> {
        let mycall = self.config.callsign.trim().to_ascii_uppercase();
        if !self.config.identify || mycall.is_empty() {
            return None;
        }
        let prefix = format!("{}: ", mycall);
        match self.codec.pack_data(&prefix) {
            Ok(packet) if packet.consumed == prefix.len() => Some(prefix),
            _ => {
                warn!("identity {:?} does not fit one data frame, sending without it", mycall);
                None
            }
        }
    }

    /// `[CALL:] HB...|CQ... [GRID]`
    fn heartbeat(&self, text: &str) -> Option<Frame> {
        let (callsign, rest) = match text.split_once(':') {
            Some((call, rest)) if looks_like_callsign(call) => (call.trim().to_string(), rest.trim()),
            _ => (self.config.callsign.trim().to_ascii_uppercase(), text),
        };
        if callsign.is_empty() {
            return None;
        }

        let (body, grid) = match rest.rsplit_once(' ') {
            Some((body, last)) if is_grid(last) => (body, last.to_string()),
            _ => (rest, self.config.grid.trim().to_ascii_uppercase()),
        };
        let (cq, kind) = Frame::parse_heartbeat_kind(body)?;
        let grid = (!grid.is_empty() && is_grid(&grid)).then_some(grid);
        Some(Frame::Heartbeat {
            callsign,
            cq,
            grid,
            kind,
        })
    }

    /// Build the complete flagged frame sequence for `text`
    pub fn assemble(&self, text: &str) -> Result<OutgoingMessage> {
        let plan = self.plan(text)?;

        let mut frames = Vec::new();
        for frame in &plan.header {
            frames.push(OutgoingFrame {
                bits: self.codec.encode(frame)?,
                frame: frame.clone(),
                flags: TransmissionFlags::NONE,
                sent: false,
                payload_chars: 0,
            });
        }
        frames.extend(self.payload_frames(&plan.payload)?);
        if frames.is_empty() {
            return Err(FrameError::EmptyMessage);
        }

        if let Some(first) = frames.first_mut() {
            first.flags.insert(TransmissionFlags::FIRST);
        }
        if let Some(last) = frames.last_mut() {
            last.flags.insert(TransmissionFlags::LAST);
        }

        info!("assembled {:?} message in {} frames", plan.kind, frames.len());
        Ok(OutgoingMessage {
            kind: Some(plan.kind),
            frames,
            header: plan.header,
            payload: plan.payload,
            sent_payload_chars: 0,
        })
    }

    fn payload_frames(&self, payload: &str) -> Result<Vec<OutgoingFrame>> {
        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < payload.len() {
            let (packet, advance) = self.next_data_frame(&payload[offset..])?;
            offset += advance;
            frames.push(OutgoingFrame {
                frame: packet.frame,
                bits: packet.bits,
                flags: TransmissionFlags::NONE,
                sent: false,
                payload_chars: advance,
            });
        }
        Ok(frames)
    }

    /// Pack the next data frame of `rest`, moving a mid-word cut back to the
    /// previous space
    ///
    /// Returns the packet and the bytes of `rest` it accounts for.
    fn next_data_frame(&self, rest: &str) -> Result<(DataPacket, usize)> {
        let mut packet = self.codec.pack_data(rest)?;
        loop {
            let cut = packet.consumed;
            if cut >= rest.len() || rest[..cut].ends_with(' ') {
                return Ok((packet, cut));
            }
            let next = &rest[cut..];
            if next.starts_with(' ') {
                // a lone separator is implied by the join; a run of spaces is kept
                let skip = usize::from(!next[1..].starts_with(' '));
                return Ok((packet, cut + skip));
            }
            match rest[..cut].rfind(' ').filter(|&space| space > 0) {
                Some(space) => packet = self.codec.pack_data(&rest[..space])?,
                None => {
                    debug!("word does not fit one frame, splitting after {} bytes", cut);
                    return Ok((packet, cut));
                }
            }
        }
    }
}

/// Append the text of the next data frame to `text`
///
/// One space is inserted unless either side already has whitespace at the
/// boundary, matching how [`MessageAssembler`] cuts the payload.
pub fn join_payload(text: &mut String, next: &str) {
    if !text.is_empty()
        && !next.is_empty()
        && !text.ends_with(char::is_whitespace)
        && !next.starts_with(char::is_whitespace)
    {
        text.push(' ');
    }
    text.push_str(next);
}
