//! Receive side: decoded frame reports to messages

use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use openham_core::bits::frame_from_string;
use openham_core::submode::{Submode, ROLLING_BUFFER_SAMPLES};
use openham_frame::message_buffer::{
    AssembledMessage, BufferEvent, DecodedFrame, MessageBuffer, MessageBufferConfig, RxMeta,
};
use openham_modem::scheduler::{DecodeRequest, DecodeScheduler, SchedulerConfig};

use crate::common::parse_flags;

/// Parse `offset submode flags frame [snr]`
///
/// Blank lines and lines starting with `#` yield `None`.
pub fn parse_rx_line(line: &str) -> Result<Option<DecodedFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(4..=5).contains(&fields.len()) {
        bail!("Expected `offset submode flags frame [snr]`, got {:?}", line);
    }

    let offset_hz = fields[0]
        .parse::<i32>()
        .with_context(|| format!("Invalid offset: {}", fields[0]))?;
    let submode = fields[1].parse::<Submode>()?;
    let flags = parse_flags(fields[2])?;
    let bits = frame_from_string(fields[3])
        .with_context(|| format!("Invalid frame string: {}", fields[3]))?;
    let snr = match fields.get(4) {
        Some(snr) => snr.parse::<i32>().with_context(|| format!("Invalid SNR: {}", snr))?,
        None => 0,
    };

    Ok(Some(DecodedFrame {
        bits,
        meta: RxMeta {
            offset_hz,
            submode,
            flags,
            snr,
            time_offset: 0.0,
        },
    }))
}

/// Receive line for a delivered message
pub fn format_message(message: &AssembledMessage, at: DateTime<Utc>) -> String {
    format!(
        "{} {:>5} Hz {:>3} dB {:<6} {}",
        at.format("%H:%M:%S"),
        message.offset_hz,
        message.snr,
        message.submode.name(),
        message.render()
    )
}

/// Message buffer fed from textual frame reports
pub struct Receiver {
    buffer: MessageBuffer,
    clock: Instant,
}

impl Receiver {
    pub fn new(config: MessageBufferConfig) -> Self {
        Self {
            buffer: MessageBuffer::new(config),
            clock: Instant::now(),
        }
    }

    /// Feed one report line; undecodable frames are skipped with a warning
    pub fn feed_line(&mut self, line: &str) -> Result<Vec<AssembledMessage>> {
        let Some(decoded) = parse_rx_line(line)? else {
            return Ok(Vec::new());
        };
        match self.buffer.handle_decoded(&decoded, self.clock) {
            Ok(events) => Ok(delivered(events)),
            Err(err) => {
                warn!("skipping frame at {} Hz: {}", decoded.meta.offset_hz, err);
                Ok(Vec::new())
            }
        }
    }

    /// Flush everything still open, delivering entries that saw their last frame
    pub fn finish(&mut self) -> Vec<AssembledMessage> {
        let horizon = Duration::from_secs(self.buffer.config().max_age_secs + 1);
        let events = self.buffer.collect_garbage(self.clock + horizon);
        delivered(events)
    }
}

fn delivered(events: Vec<BufferEvent>) -> Vec<AssembledMessage> {
    events
        .into_iter()
        .filter_map(|event| match event {
            BufferEvent::Delivered(message) => Some(message),
            BufferEvent::Discarded { offset_hz, reason } => {
                debug!("discarded entry at {} Hz: {:?}", offset_hz, reason);
                None
            }
        })
        .collect()
}

/// Replay `seconds` of sample reports in steps of `chunk` samples
///
/// Every request completes immediately, so the output shows which windows
/// the scheduler merges together.
pub fn simulate_schedule(config: SchedulerConfig, seconds: u32, chunk: u32) -> Result<Vec<DecodeRequest>> {
    if chunk == 0 || chunk > config.max_jump {
        bail!("Chunk must be between 1 and {} samples", config.max_jump);
    }
    let mut scheduler = DecodeScheduler::new(config);
    let now = Instant::now();
    let total = u64::from(seconds) * u64::from(openham_core::submode::SAMPLE_RATE);

    let mut requests = Vec::new();
    let mut written: u64 = 0;
    while written <= total {
        let k = (written % u64::from(ROLLING_BUFFER_SAMPLES)) as u32;
        if let Some(request) = scheduler.poll(k, now) {
            scheduler.decode_finished(request.id);
            requests.push(request);
        }
        written += u64::from(chunk);
    }
    Ok(requests)
}
