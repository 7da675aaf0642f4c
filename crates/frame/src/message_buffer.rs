//! Incoming message reassembly
//!
//! Frames are grouped by audio offset bucket. An entry opens on a FIRST frame
//! (or on a compound fragment / placeholder-bearing directed frame that
//! arrives out of order), collects header, fragments and data text, and
//! closes once the LAST frame has arrived and every placeholder is resolved.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::{Duration, Instant};

use openham_core::bits::Codeword;
use openham_core::callsign::{looks_like_callsign, COMPOUND_PLACEHOLDER};
use openham_core::submode::Submode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::assembler::join_payload;
use crate::checksum::{checksum_valid, command_text};
use crate::directed::{ChecksumPolicy, Command};
use crate::frame::{Frame, FrameCodec, TransmissionFlags};
use crate::Result;

/// Receive metadata supplied by the demodulator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RxMeta {
    /// Audio offset of the signal in Hz
    pub offset_hz: i32,
    pub submode: Submode,
    pub flags: TransmissionFlags,
    pub snr: i32,
    /// Start time relative to the cycle boundary in seconds
    pub time_offset: f32,
}

/// Bit vector plus metadata as produced by the demodulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedFrame {
    pub bits: Codeword,
    pub meta: RxMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBufferConfig {
    /// Width of an offset bucket in Hz
    pub bucket_hz: i32,
    /// Seconds after the newest frame before an entry is collected
    pub max_age_secs: u64,
    pub checksums: ChecksumPolicy,
}

impl Default for MessageBufferConfig {
    fn default() -> Self {
        Self {
            bucket_hz: 10,
            max_age_secs: 90,
            checksums: ChecksumPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// A new FIRST frame took over the bucket
    Replaced,
    ChecksumMismatch,
    /// No LAST frame within the age limit
    Stale,
}

/// A fully reassembled message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssembledMessage {
    pub offset_hz: i32,
    pub submode: Submode,
    pub from: Option<String>,
    pub to: Option<String>,
    pub command: Option<Command>,
    pub num: Option<i32>,
    pub grid: Option<String>,
    pub text: String,
    pub snr: i32,
    pub frame_count: usize,
}

impl AssembledMessage {
    /// Display line for the message
    pub fn render(&self) -> String {
        let mut line = String::new();
        if let Some(from) = &self.from {
            line.push_str(from);
            line.push(':');
        }
        if let Some(to) = &self.to {
            push_word(&mut line, to);
        }
        if let Some(command) = self.command {
            push_word(&mut line, command.text());
        }
        if let Some(num) = self.num {
            push_word(&mut line, &format!("{:+}", num));
        }
        let body = if self.command.is_none() && self.from.is_some() {
            strip_identity(&self.text).unwrap_or(&self.text)
        } else {
            &self.text
        };
        push_word(&mut line, body.trim());
        if let Some(grid) = &self.grid {
            push_word(&mut line, grid);
        }
        line
    }
}

impl fmt::Display for AssembledMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn push_word(line: &mut String, word: &str) {
    if word.is_empty() {
        return;
    }
    if !line.is_empty() {
        line.push(' ');
    }
    line.push_str(word);
}

/// `"CALL: rest"` -> `rest`
fn strip_identity(text: &str) -> Option<&str> {
    identity(text).map(|(_, rest)| rest)
}

fn identity(text: &str) -> Option<(&str, &str)> {
    let (call, rest) = text.split_once(':')?;
    let call = call.trim();
    looks_like_callsign(call).then(|| (call, rest.trim_start()))
}

/// Outcome of feeding frames or collecting garbage
#[derive(Debug, Clone, PartialEq)]
pub enum BufferEvent {
    Delivered(AssembledMessage),
    Discarded { offset_hz: i32, reason: DiscardReason },
}

#[derive(Debug, Clone, PartialEq)]
enum Header {
    Heartbeat {
        callsign: String,
        cq: bool,
        kind: u8,
        grid: Option<String>,
    },
    Directed {
        from: String,
        to: String,
        command: Command,
        num: Option<i32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct Fragment {
    callsign: String,
    grid: Option<String>,
}

#[derive(Debug, Clone)]
struct Entry {
    submode: Submode,
    offset_hz: i32,
    header: Option<Header>,
    fragments: VecDeque<Fragment>,
    grid: Option<String>,
    text: String,
    last_seen: bool,
    newest: Instant,
    snr: i32,
    frame_count: usize,
}

impl Entry {
    fn new(meta: &RxMeta, now: Instant) -> Self {
        Self {
            submode: meta.submode,
            offset_hz: meta.offset_hz,
            header: None,
            fragments: VecDeque::new(),
            grid: None,
            text: String::new(),
            last_seen: false,
            newest: now,
            snr: meta.snr,
            frame_count: 0,
        }
    }

    fn unresolved(&self) -> usize {
        match &self.header {
            Some(Header::Directed { from, to, .. }) => {
                (from == COMPOUND_PLACEHOLDER) as usize + (to == COMPOUND_PLACEHOLDER) as usize
            }
            _ => 0,
        }
    }

    /// Fill the next placeholder slot (from, then to); false when none is open
    fn fill_slot(&mut self, callsign: &str) -> bool {
        let Some(Header::Directed { from, to, .. }) = &mut self.header else {
            return false;
        };
        for slot in [from, to] {
            if *slot == COMPOUND_PLACEHOLDER {
                *slot = callsign.to_string();
                return true;
            }
        }
        false
    }

    fn drain_fragments(&mut self) {
        while self.unresolved() > 0 {
            let Some(fragment) = self.fragments.pop_front() else {
                break;
            };
            self.fill_slot(&fragment.callsign);
        }
    }

    fn add_fragment(&mut self, fragment: Fragment) {
        if self.grid.is_none() {
            self.grid = fragment.grid.clone();
        }
        if !self.fill_slot(&fragment.callsign) {
            self.fragments.push_back(fragment);
        }
    }

    fn apply(&mut self, frame: Frame, meta: &RxMeta, now: Instant) {
        self.frame_count += 1;
        self.newest = now;
        self.offset_hz = meta.offset_hz;
        match frame {
            Frame::Heartbeat {
                callsign,
                cq,
                grid,
                kind,
            } => {
                self.header = Some(Header::Heartbeat {
                    callsign,
                    cq,
                    kind,
                    grid,
                });
            }
            Frame::Compound { callsign, grid } => self.add_fragment(Fragment { callsign, grid }),
            Frame::CompoundDirected { callsign, .. } => {
                self.add_fragment(Fragment { callsign, grid: None })
            }
            Frame::Directed {
                from,
                to,
                command,
                num,
            } => {
                self.header = Some(Header::Directed {
                    from,
                    to,
                    command,
                    num,
                });
                self.drain_fragments();
            }
            Frame::Data { text, .. } => join_payload(&mut self.text, &text),
        }
        if meta.flags.is_last() {
            self.last_seen = true;
        }
    }

    fn is_complete(&self) -> bool {
        self.last_seen && self.unresolved() == 0
    }

    fn into_message(self, policy: &ChecksumPolicy) -> std::result::Result<AssembledMessage, DiscardReason> {
        let mut message = AssembledMessage {
            offset_hz: self.offset_hz,
            submode: self.submode,
            from: None,
            to: None,
            command: None,
            num: None,
            grid: self.grid,
            text: self.text,
            snr: self.snr,
            frame_count: self.frame_count,
        };

        match self.header {
            Some(Header::Heartbeat {
                callsign,
                cq,
                kind,
                grid,
            }) => {
                message.from = Some(callsign);
                let kind_text = Frame::heartbeat_text(cq, kind);
                message.text = format!("{} {}", kind_text, message.text).trim().to_string();
                message.grid = grid.or(message.grid);
            }
            Some(Header::Directed {
                from,
                to,
                command,
                num,
            }) => {
                let kind = policy.kind_for(command);
                if !kind.is_none() {
                    let body = message.text.trim();
                    let (args, check) = match body.rsplit_once(' ') {
                        Some((args, check)) => (args.trim(), check),
                        None => ("", body),
                    };
                    if !checksum_valid(&command_text(command.text(), args), check, kind) {
                        return Err(DiscardReason::ChecksumMismatch);
                    }
                    message.text = args.to_string();
                }
                message.from = Some(from);
                message.to = Some(to);
                message.command = Some(command);
                message.num = num;
            }
            None => {
                message.from = identity(&message.text).map(|(call, _)| call.to_string());
            }
        }
        Ok(message)
    }
}

/// Reassembly state for every active offset bucket
#[derive(Debug, Default)]
pub struct MessageBuffer {
    config: MessageBufferConfig,
    codec: FrameCodec,
    entries: BTreeMap<i32, Entry>,
}

impl MessageBuffer {
    pub fn new(config: MessageBufferConfig) -> Self {
        Self {
            config,
            codec: FrameCodec::new(),
            entries: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &MessageBufferConfig {
        &self.config
    }

    /// Number of open entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bucket key of an offset
    pub fn bucket_of(&self, offset_hz: i32) -> i32 {
        let width = self.config.bucket_hz.max(1);
        offset_hz.div_euclid(width) * width
    }

    /// Find the entry for a frame, following drift into this bucket
    fn locate(&mut self, bucket: i32, submode: Submode) -> Option<i32> {
        if self.entries.contains_key(&bucket) {
            return Some(bucket);
        }
        let width = self.config.bucket_hz.max(1);
        let steps = submode.drift_tolerance_hz() / width;
        for step in 1..=steps {
            for neighbour in [bucket - step * width, bucket + step * width] {
                let matches = self
                    .entries
                    .get(&neighbour)
                    .map_or(false, |e| e.submode == submode);
                if matches {
                    if let Some(entry) = self.entries.remove(&neighbour) {
                        debug!("offset drift {} -> {} Hz", neighbour, bucket);
                        self.entries.insert(bucket, entry);
                        return Some(bucket);
                    }
                }
            }
        }
        None
    }

    /// Decode a raw frame and feed it
    pub fn handle_decoded(&mut self, decoded: &DecodedFrame, now: Instant) -> Result<Vec<BufferEvent>> {
        let frame = self.codec.decode(&decoded.bits)?;
        Ok(self.handle_frame(frame, &decoded.meta, now))
    }

    /// Feed one frame received at `meta.offset_hz`
    pub fn handle_frame(&mut self, frame: Frame, meta: &RxMeta, now: Instant) -> Vec<BufferEvent> {
        let mut events = Vec::new();
        let bucket = self.bucket_of(meta.offset_hz);
        let located = self.locate(bucket, meta.submode);

        let key = match located {
            Some(key) if meta.flags.is_first() => {
                let waiting = self.entries.get(&key).map_or(false, |e| e.unresolved() > 0);
                if waiting && frame.is_fragment() {
                    key
                } else {
                    debug!("FIRST frame replaces open entry at {} Hz", key);
                    self.entries.remove(&key);
                    events.push(BufferEvent::Discarded {
                        offset_hz: key,
                        reason: DiscardReason::Replaced,
                    });
                    self.entries.insert(bucket, Entry::new(meta, now));
                    bucket
                }
            }
            Some(key) => key,
            None => {
                let opens = meta.flags.is_first()
                    || frame.is_fragment()
                    || matches!(
                        &frame,
                        Frame::Directed { from, to, .. }
                            if from == COMPOUND_PLACEHOLDER || to == COMPOUND_PLACEHOLDER
                    );
                if !opens {
                    debug!("ignoring orphan frame at {} Hz: {}", meta.offset_hz, frame);
                    return events;
                }
                self.entries.insert(bucket, Entry::new(meta, now));
                bucket
            }
        };

        let complete = match self.entries.get_mut(&key) {
            Some(entry) => {
                entry.apply(frame, meta, now);
                entry.is_complete()
            }
            None => false,
        };
        if complete {
            if let Some(entry) = self.entries.remove(&key) {
                events.push(self.close(key, entry));
            }
        }
        events
    }

    fn close(&self, key: i32, entry: Entry) -> BufferEvent {
        match entry.into_message(&self.config.checksums) {
            Ok(message) => {
                info!("message at {} Hz: {}", message.offset_hz, message.render());
                BufferEvent::Delivered(message)
            }
            Err(reason) => {
                warn!("discarding message at {} Hz: {:?}", key, reason);
                BufferEvent::Discarded {
                    offset_hz: key,
                    reason,
                }
            }
        }
    }

    /// Close or drop entries whose newest frame is older than the age limit
    pub fn collect_garbage(&mut self, now: Instant) -> Vec<BufferEvent> {
        let max_age = Duration::from_secs(self.config.max_age_secs);
        let stale: Vec<i32> = self
            .entries
            .iter()
            .filter(|(_, e)| now.saturating_duration_since(e.newest) > max_age)
            .map(|(k, _)| *k)
            .collect();

        let mut events = Vec::new();
        for key in stale {
            let Some(entry) = self.entries.remove(&key) else {
                continue;
            };
            if entry.last_seen {
                debug!("force closing entry at {} Hz", key);
                events.push(self.close(key, entry));
            } else {
                debug!("dropping stale entry at {} Hz", key);
                events.push(BufferEvent::Discarded {
                    offset_hz: key,
                    reason: DiscardReason::Stale,
                });
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{AssemblerConfig, MessageAssembler, MessageKind, OutgoingMessage};
    use crate::checksum::{checksum, ChecksumKind};
    use openham_codecs::text::sanitize;
    use quickcheck::{Arbitrary, Gen, TestResult};
    use quickcheck_macros::quickcheck;

    fn meta(offset_hz: i32, flags: TransmissionFlags) -> RxMeta {
        RxMeta {
            offset_hz,
            submode: Submode::Normal,
            flags,
            snr: -10,
            time_offset: 0.1,
        }
    }

    fn data(text: &str) -> Frame {
        Frame::Data {
            text: text.into(),
            compressed: true,
        }
    }

    fn delivered(events: &[BufferEvent]) -> Vec<&AssembledMessage> {
        events
            .iter()
            .filter_map(|e| match e {
                BufferEvent::Delivered(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    /// Feed every frame of `msg` through the bit level decoder
    fn reassemble(msg: &OutgoingMessage) -> Vec<AssembledMessage> {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        let mut messages = Vec::new();
        for out in msg.frames() {
            let decoded = DecodedFrame {
                bits: out.bits.clone(),
                meta: meta(1250, out.flags),
            };
            let events = buffer.handle_decoded(&decoded, now).unwrap();
            messages.extend(delivered(&events).into_iter().cloned());
        }
        messages
    }

    #[test]
    fn test_first_data_then_last_scenario() {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        let events = buffer.handle_frame(
            data("KN4CRD: HB AUTO EM73"),
            &meta(1500, TransmissionFlags::FIRST),
            now,
        );
        assert!(events.is_empty());
        assert_eq!(buffer.len(), 1);

        let events = buffer.handle_frame(data("MSG ID 1"), &meta(1503, TransmissionFlags::LAST), now);
        let messages = delivered(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, "KN4CRD: HB AUTO EM73 MSG ID 1");
        assert_eq!(messages[0].from.as_deref(), Some("KN4CRD"));
        assert_eq!(messages[0].frame_count, 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_multi_frame_free_text_roundtrip() {
        let asm = MessageAssembler::new(AssemblerConfig {
            callsign: "KN4CRD".into(),
            ..AssemblerConfig::default()
        });
        let text = "THE QUICK BROWN FOX JUMPS OVER THE LAZY DOG WHILE HELLOXYZ 73 TNX QSL  RPRT 599";
        let msg = asm.assemble(text).unwrap();
        assert!(msg.frames().len() >= 3);

        let messages = reassemble(&msg);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].text, format!("KN4CRD: {}", text));
        assert_eq!(messages[0].from.as_deref(), Some("KN4CRD"));
        assert_eq!(messages[0].frame_count, msg.frames().len());
        assert_eq!(messages[0].render(), format!("KN4CRD: {}", text));
    }

    #[derive(Debug, Clone)]
    struct FreeText(String);

    impl Arbitrary for FreeText {
        fn arbitrary(g: &mut Gen) -> Self {
            let alphabet: Vec<char> = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.,?/-".chars().collect();
            let words = usize::arbitrary(g) % 24 + 1;
            let mut text = String::new();
            for i in 0..words {
                if i > 0 {
                    text.push_str(if u8::arbitrary(g) % 5 == 0 { "  " } else { " " });
                }
                // words of up to 7 characters always fit one frame
                let len = usize::arbitrary(g) % 7 + 1;
                text.extend((0..len).map(|_| *g.choose(&alphabet).unwrap_or(&'A')));
            }
            FreeText(text)
        }
    }

    #[quickcheck]
    fn prop_free_text_survives_reassembly(text: FreeText) -> TestResult {
        let asm = MessageAssembler::new(AssemblerConfig::default());
        let msg = match asm.assemble(&text.0) {
            Ok(msg) => msg,
            Err(_) => return TestResult::failed(),
        };
        if msg.kind() != Some(MessageKind::FreeText) {
            return TestResult::discard();
        }
        let messages = reassemble(&msg);
        TestResult::from_bool(messages.len() == 1 && messages[0].text == sanitize(&text.0))
    }

    #[test]
    fn test_never_delivered_without_last() {
        let mut buffer = MessageBuffer::default();
        let start = Instant::now();
        let mut events = buffer.handle_frame(data("HELLO "), &meta(800, TransmissionFlags::FIRST), start);
        for i in 0..20 {
            events.extend(buffer.handle_frame(data("MORE "), &meta(800, TransmissionFlags::NONE), start + Duration::from_secs(i)));
        }
        assert!(delivered(&events).is_empty());

        let events = buffer.collect_garbage(start + Duration::from_secs(200));
        assert_eq!(
            events,
            vec![BufferEvent::Discarded {
                offset_hz: 800,
                reason: DiscardReason::Stale
            }]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_first_and_last_delivers_immediately() {
        let mut buffer = MessageBuffer::default();
        let events = buffer.handle_frame(
            Frame::Heartbeat {
                callsign: "KN4CRD".into(),
                cq: false,
                grid: Some("EM73".into()),
                kind: 1,
            },
            &meta(1200, TransmissionFlags::FIRST | TransmissionFlags::LAST),
            Instant::now(),
        );
        let messages = delivered(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].render(), "KN4CRD: HB AUTO EM73");
    }

    #[test]
    fn test_new_first_replaces() {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        buffer.handle_frame(data("OLD "), &meta(1000, TransmissionFlags::FIRST), now);
        let events = buffer.handle_frame(data("NEW"), &meta(1000, TransmissionFlags::FIRST), now);
        assert_eq!(
            events,
            vec![BufferEvent::Discarded {
                offset_hz: 1000,
                reason: DiscardReason::Replaced
            }]
        );
        let events = buffer.handle_frame(data("TEXT"), &meta(1000, TransmissionFlags::LAST), now);
        assert_eq!(delivered(&events)[0].text, "NEW TEXT");
    }

    #[test]
    fn test_orphans_are_ignored() {
        let mut buffer = MessageBuffer::default();
        let events = buffer.handle_frame(data("STRAY"), &meta(500, TransmissionFlags::LAST), Instant::now());
        assert!(events.is_empty());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drift_migrates_entry() {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        buffer.handle_frame(data("DRIFT "), &meta(1000, TransmissionFlags::FIRST), now);
        // normal tolerates 10 Hz: one bucket up
        buffer.handle_frame(data("ING "), &meta(1012, TransmissionFlags::NONE), now);
        let events = buffer.handle_frame(data("AWAY"), &meta(1021, TransmissionFlags::LAST), now);
        let messages = delivered(&events);
        assert_eq!(messages[0].text, "DRIFT ING AWAY");
        assert_eq!(messages[0].offset_hz, 1021);

        // too far away to be the same signal
        buffer.handle_frame(data("A "), &meta(2000, TransmissionFlags::FIRST), now);
        let events = buffer.handle_frame(data("B"), &meta(2030, TransmissionFlags::LAST), now);
        assert!(events.is_empty());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_bucket_of_negative_offsets() {
        let buffer = MessageBuffer::default();
        assert_eq!(buffer.bucket_of(1509), 1500);
        assert_eq!(buffer.bucket_of(-1), -10);
    }

    #[test]
    fn test_out_of_order_compound_fragments() {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        // directed frame with two placeholders arrives before its fragments
        let events = buffer.handle_frame(
            Frame::Directed {
                from: COMPOUND_PLACEHOLDER.into(),
                to: COMPOUND_PLACEHOLDER.into(),
                command: Command::GRID_QUERY,
                num: None,
            },
            &meta(900, TransmissionFlags::LAST),
            now,
        );
        assert!(events.is_empty());

        let events = buffer.handle_frame(
            Frame::Compound {
                callsign: "VE3/KN4CRD".into(),
                grid: Some("EM73".into()),
            },
            &meta(900, TransmissionFlags::FIRST),
            now,
        );
        assert!(events.is_empty(), "one placeholder is still open");

        let events = buffer.handle_frame(
            Frame::CompoundDirected {
                callsign: "K1ABC/P".into(),
                command: Command::GRID_QUERY,
                num: None,
            },
            &meta(900, TransmissionFlags::NONE),
            now,
        );
        let messages = delivered(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from.as_deref(), Some("VE3/KN4CRD"));
        assert_eq!(messages[0].to.as_deref(), Some("K1ABC/P"));
        assert_eq!(messages[0].render(), "VE3/KN4CRD: K1ABC/P GRID? EM73");
    }

    #[test]
    fn test_assembled_directed_roundtrip_with_checksum() {
        let asm = MessageAssembler::new(AssemblerConfig {
            callsign: "K1ABC".into(),
            ..AssemblerConfig::default()
        });
        let msg = asm.assemble("KN4CRD QUERY MSGS").unwrap();
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        let mut events = Vec::new();
        for out in msg.frames() {
            let decoded = DecodedFrame {
                bits: out.bits.clone(),
                meta: meta(1750, out.flags),
            };
            events.extend(buffer.handle_decoded(&decoded, now).unwrap());
        }
        let messages = delivered(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].command, Some(Command::QUERY_MSGS));
        assert_eq!(messages[0].from.as_deref(), Some("K1ABC"));
        assert_eq!(messages[0].to.as_deref(), Some("KN4CRD"));
        assert_eq!(messages[0].text, "");
        assert_eq!(messages[0].render(), "K1ABC: KN4CRD QUERY MSGS");
    }

    #[test]
    fn test_checksum_mismatch_is_discarded() {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        let header = Frame::Directed {
            from: "K1ABC".into(),
            to: "KN4CRD".into(),
            command: Command::MSG,
            num: None,
        };
        let good = checksum("MSG HELLO", ChecksumKind::Crc16);
        let mut bad: Vec<char> = good.chars().collect();
        bad[0] = if bad[0] == 'A' { 'B' } else { 'A' };
        let bad: String = bad.into_iter().collect();

        buffer.handle_frame(header.clone(), &meta(600, TransmissionFlags::FIRST), now);
        let events = buffer.handle_frame(data(&format!("HELLO {}", bad)), &meta(600, TransmissionFlags::LAST), now);
        assert_eq!(
            events,
            vec![BufferEvent::Discarded {
                offset_hz: 600,
                reason: DiscardReason::ChecksumMismatch
            }]
        );

        buffer.handle_frame(header, &meta(600, TransmissionFlags::FIRST), now);
        let events = buffer.handle_frame(data(&format!("HELLO {}", good)), &meta(600, TransmissionFlags::LAST), now);
        let messages = delivered(&events);
        assert_eq!(messages[0].text, "HELLO");
        assert_eq!(messages[0].render(), "K1ABC: KN4CRD MSG HELLO");
    }

    #[test]
    fn test_gc_force_closes_when_last_seen() {
        let mut buffer = MessageBuffer::default();
        let now = Instant::now();
        buffer.handle_frame(
            Frame::Directed {
                from: COMPOUND_PLACEHOLDER.into(),
                to: "KN4CRD".into(),
                command: Command::SNR,
                num: Some(-3),
            },
            &meta(300, TransmissionFlags::FIRST | TransmissionFlags::LAST),
            now,
        );
        assert_eq!(buffer.len(), 1);
        assert!(buffer.collect_garbage(now + Duration::from_secs(30)).is_empty());

        let events = buffer.collect_garbage(now + Duration::from_secs(91));
        let messages = delivered(&events);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].from.as_deref(), Some(COMPOUND_PLACEHOLDER));
        assert_eq!(messages[0].num, Some(-3));
    }
}
