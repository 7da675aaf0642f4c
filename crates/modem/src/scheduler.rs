//! Decode scheduling against the rolling receive buffer
//!
//! The demodulator writes into a 60 s ring of samples and reports its write
//! position `k`. Each submode gets one decode per transmit cycle, issued as
//! soon as the frame starting at the cycle boundary is fully buffered.
//! Ready windows from several submodes are merged into a single request and
//! only one request is ever in flight.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use openham_core::submode::{Submode, SAMPLE_RATE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{ModemError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Submodes that get decode windows
    pub submodes: Vec<Submode>,
    /// Ready windows kept while a decode is running
    pub queue_capacity: usize,
    /// Largest forward jump of `k`, in samples, treated as continuous audio
    pub max_jump: u32,
    /// Seconds before an in-flight decode is declared stuck
    pub stuck_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            submodes: Submode::ALL.to_vec(),
            queue_capacity: 16,
            max_jump: 2 * SAMPLE_RATE,
            stuck_timeout_secs: 45,
        }
    }
}

/// Cycle-aligned window of one submode
///
/// Boundaries are kept in `u64` so the window after the last cycle below
/// `u32::MAX` is still representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeWindow {
    pub current_start: u64,
    pub next_start: u64,
    pub cycle_len: u32,
    pub frames_needed: u32,
}

impl DecodeWindow {
    /// Window of the cycle containing `k`
    pub fn aligned(submode: Submode, k: u32) -> Self {
        let cycle_len = submode.cycle_samples();
        let k = u64::from(k);
        let current_start = k - k % u64::from(cycle_len);
        Self {
            current_start,
            next_start: current_start + u64::from(cycle_len),
            cycle_len,
            frames_needed: submode.frames_needed(),
        }
    }

    pub fn is_ready(&self, k: u32) -> bool {
        self.current_start + u64::from(self.frames_needed) <= u64::from(k)
    }

    fn step(&mut self) {
        self.current_start = self.next_start;
        self.next_start += u64::from(self.cycle_len);
    }
}

/// Sample range of one submode to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSpan {
    pub submode: Submode,
    pub start: u32,
    pub size: u32,
}

/// Merged request handed to the demodulator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeRequest {
    pub id: u64,
    /// Bits of the submodes present in `spans`
    pub mask: u8,
    /// At most one span per submode, in submode order
    pub spans: Vec<DecodeSpan>,
}

impl DecodeRequest {
    pub fn span(&self, submode: Submode) -> Option<&DecodeSpan> {
        self.spans.iter().find(|s| s.submode == submode)
    }

    pub fn submodes(&self) -> Vec<Submode> {
        Submode::from_mask(self.mask)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Position jumped or wrapped; every window realigned to the cycle containing `k`
    Reset { k: u32 },
    Queued(DecodeSpan),
    /// Queue was full; the oldest span was dropped
    Dropped(DecodeSpan),
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    id: u64,
    since: Instant,
}

/// Per-submode decode windows plus the single in-flight slot
#[derive(Debug)]
pub struct DecodeScheduler {
    config: SchedulerConfig,
    windows: [DecodeWindow; 5],
    last_k: Option<u32>,
    queue: VecDeque<DecodeSpan>,
    in_flight: Option<InFlight>,
    next_id: u64,
}

impl Default for DecodeScheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl DecodeScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            windows: [DecodeWindow::default(); 5],
            last_k: None,
            queue: VecDeque::new(),
            in_flight: None,
            next_id: 1,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn window(&self, submode: Submode) -> &DecodeWindow {
        &self.windows[submode.index()]
    }

    /// Spans waiting for the decoder
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Id of the running decode
    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight.map(|f| f.id)
    }

    fn reset(&mut self, k: u32) {
        for submode in Submode::ALL {
            self.windows[submode.index()] = DecodeWindow::aligned(submode, k);
        }
    }

    fn enqueue(&mut self, span: DecodeSpan, events: &mut Vec<SchedulerEvent>) {
        if self.queue.len() >= self.config.queue_capacity.max(1) {
            if let Some(dropped) = self.queue.pop_front() {
                warn!(
                    "decode queue full, dropping {} window at {}",
                    dropped.submode, dropped.start
                );
                events.push(SchedulerEvent::Dropped(dropped));
            }
        }
        debug!("{} window ready at {}", span.submode, span.start);
        self.queue.push_back(span);
        events.push(SchedulerEvent::Queued(span));
    }

    /// Record the buffer write position `k` and queue every window it completes
    pub fn advance(&mut self, k: u32) -> Vec<SchedulerEvent> {
        let mut events = Vec::new();
        let discontinuous = match self.last_k {
            None => true,
            Some(last) => k < last || k - last > self.config.max_jump,
        };
        self.last_k = Some(k);
        if discontinuous {
            debug!("realigning decode windows at {}", k);
            self.reset(k);
            events.push(SchedulerEvent::Reset { k });
        }

        let enabled = self.config.submodes.clone();
        for submode in enabled {
            while self.windows[submode.index()].is_ready(k) {
                let window = self.windows[submode.index()];
                self.windows[submode.index()].step();
                // a ready window starts at or before k
                let Ok(start) = u32::try_from(window.current_start) else {
                    break;
                };
                let span = DecodeSpan {
                    submode,
                    start,
                    size: window.frames_needed,
                };
                self.enqueue(span, &mut events);
            }
        }
        events
    }

    /// Merge queued spans into a request if the decoder is idle
    ///
    /// Each submode appears at most once; later spans of the same submode
    /// stay queued for the next request.
    pub fn submit(&mut self, now: Instant) -> Option<DecodeRequest> {
        if let Some(running) = self.in_flight {
            if !self.queue.is_empty() {
                debug!("decoder busy with {}, {} spans queued", running.id, self.queue.len());
            }
            return None;
        }
        if self.queue.is_empty() {
            return None;
        }

        let mut mask = 0u8;
        let mut spans = Vec::new();
        let mut rest = VecDeque::new();
        for span in self.queue.drain(..) {
            if mask & span.submode.bit() != 0 {
                rest.push_back(span);
            } else {
                mask |= span.submode.bit();
                spans.push(span);
            }
        }
        self.queue = rest;
        spans.sort_by_key(|s| s.submode.index());

        let id = self.next_id;
        self.next_id += 1;
        self.in_flight = Some(InFlight { id, since: now });
        info!("decode request {} for mask {:05b}", id, mask);
        Some(DecodeRequest { id, mask, spans })
    }

    /// Advance to `k` and submit when idle
    pub fn poll(&mut self, k: u32, now: Instant) -> Option<DecodeRequest> {
        self.advance(k);
        self.submit(now)
    }

    /// Clear the in-flight slot; false when `id` is not the running decode
    pub fn decode_finished(&mut self, id: u64) -> bool {
        match self.in_flight {
            Some(running) if running.id == id => {
                self.in_flight = None;
                true
            }
            _ => {
                debug!("ignoring completion of decode {}", id);
                false
            }
        }
    }

    /// Fail and clear a decode that has been running too long
    pub fn check_stuck(&mut self, now: Instant) -> Result<()> {
        let Some(running) = self.in_flight else {
            return Ok(());
        };
        let elapsed = now.saturating_duration_since(running.since);
        if elapsed <= Duration::from_secs(self.config.stuck_timeout_secs) {
            return Ok(());
        }
        warn!("decode {} stuck for {} s", running.id, elapsed.as_secs());
        self.in_flight = None;
        Err(ModemError::DecoderTimeout {
            id: running.id,
            elapsed_secs: elapsed.as_secs(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openham_core::submode::ROLLING_BUFFER_SAMPLES;
    use quickcheck_macros::quickcheck;

    fn only(submode: Submode) -> DecodeScheduler {
        DecodeScheduler::new(SchedulerConfig {
            submodes: vec![submode],
            ..SchedulerConfig::default()
        })
    }

    fn queued(events: &[SchedulerEvent]) -> Vec<DecodeSpan> {
        events
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::Queued(span) => Some(*span),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_position_realigns() {
        let mut sched = DecodeScheduler::default();
        let events = sched.advance(200_000);
        assert_eq!(events[0], SchedulerEvent::Reset { k: 200_000 });
        let normal = sched.window(Submode::Normal);
        assert_eq!(normal.current_start, 180_000);
        assert_eq!(normal.next_start, 360_000);
        assert_eq!(sched.window(Submode::Ultra).current_start, 192_000);
    }

    #[test]
    fn test_window_ready_once_per_cycle() {
        let mut sched = only(Submode::Normal);
        sched.advance(0);
        let needed = Submode::Normal.frames_needed();
        let mut spans = Vec::new();
        let mut k = 0;
        while k < 3 * Submode::Normal.cycle_samples() {
            k += 6000;
            spans.extend(queued(&sched.advance(k)));
        }
        let starts: Vec<u32> = spans.iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![0, 180_000, 360_000]);
        assert!(spans.iter().all(|s| s.size == needed));
    }

    #[test]
    fn test_wraparound_resets() {
        let mut sched = only(Submode::Turbo);
        sched.advance(ROLLING_BUFFER_SAMPLES - 12_000);
        let events = sched.advance(1_200);
        assert_eq!(events, vec![SchedulerEvent::Reset { k: 1_200 }]);
        assert_eq!(sched.window(Submode::Turbo).current_start, 0);
    }

    #[test]
    fn test_positions_near_u32_max() {
        let mut sched = only(Submode::Normal);
        let events = sched.advance(u32::MAX - 10);
        assert_eq!(events[0], SchedulerEvent::Reset { k: u32::MAX - 10 });
        let starts: Vec<u32> = queued(&events).iter().map(|s| s.start).collect();
        assert_eq!(starts, vec![4_294_800_000]);
        assert_eq!(sched.window(Submode::Normal).current_start, 4_294_980_000);

        let events = sched.advance(u32::MAX);
        assert!(events.is_empty());
        assert!(!sched.window(Submode::Normal).is_ready(u32::MAX));
    }

    #[test]
    fn test_large_jump_resets() {
        let mut sched = only(Submode::Normal);
        sched.advance(10_000);
        let events = sched.advance(10_000 + 2 * SAMPLE_RATE + 1);
        assert!(matches!(events[0], SchedulerEvent::Reset { .. }));
        let events = sched.advance(10_000 + 4 * SAMPLE_RATE);
        assert!(events.is_empty());
    }

    #[test]
    fn test_merged_request_and_in_flight() {
        let mut sched = DecodeScheduler::default();
        let now = Instant::now();
        sched.advance(0);
        let mut k = 0;
        let mut request = None;
        while request.is_none() {
            k += 1_200;
            request = sched.poll(k, now);
        }
        let request = request.unwrap();
        // ultra and turbo finish their first frame before anything else
        assert_eq!(request.submodes(), vec![Submode::Ultra]);
        assert_eq!(request.span(Submode::Ultra).map(|s| s.start), Some(0));
        assert_eq!(sched.in_flight(), Some(request.id));

        // busy: everything queues
        for _ in 0..10 {
            k += 12_000;
            assert!(sched.poll(k, now).is_none());
        }
        assert!(sched.queued() > 1);
        assert!(!sched.decode_finished(request.id + 1));
        assert!(sched.decode_finished(request.id));

        let next = sched.submit(now).unwrap();
        assert!(next.id > request.id);
        let mut seen: Vec<Submode> = next.spans.iter().map(|s| s.submode).collect();
        seen.dedup();
        assert_eq!(seen.len(), next.spans.len(), "one span per submode");
        assert_eq!(next.submodes(), next.spans.iter().map(|s| s.submode).collect::<Vec<_>>());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let mut sched = DecodeScheduler::new(SchedulerConfig {
            submodes: vec![Submode::Ultra],
            queue_capacity: 2,
            ..SchedulerConfig::default()
        });
        let now = Instant::now();
        sched.advance(0);
        let mut k = 0;
        while sched.poll(k, now).is_none() {
            k += 1_200;
        }
        let mut dropped = Vec::new();
        for _ in 0..200 {
            k += 1_200;
            dropped.extend(sched.advance(k).into_iter().filter(|e| matches!(e, SchedulerEvent::Dropped(_))));
        }
        assert_eq!(sched.queued(), 2);
        assert!(!dropped.is_empty());
    }

    #[test]
    fn test_stuck_decode_times_out() {
        let mut sched = only(Submode::Ultra);
        let start = Instant::now();
        let request = sched.poll(40_000, start);
        let request = match request {
            Some(r) => r,
            None => panic!("a full ultra frame is buffered"),
        };
        assert!(sched.check_stuck(start + Duration::from_secs(45)).is_ok());
        assert_eq!(
            sched.check_stuck(start + Duration::from_secs(46)),
            Err(ModemError::DecoderTimeout {
                id: request.id,
                elapsed_secs: 46
            })
        );
        assert_eq!(sched.in_flight(), None);
        assert!(sched.check_stuck(start + Duration::from_secs(100)).is_ok());
    }

    #[quickcheck]
    fn prop_at_most_one_window_per_cycle(steps: Vec<u16>) -> bool {
        let mut sched = only(Submode::Fast);
        let cycle = Submode::Fast.cycle_samples();
        sched.advance(0);
        let mut k: u32 = 0;
        let mut starts = Vec::new();
        for step in steps {
            k += u32::from(step) % (2 * SAMPLE_RATE);
            if k >= ROLLING_BUFFER_SAMPLES {
                break;
            }
            starts.extend(queued(&sched.advance(k)).iter().map(|s| s.start));
        }
        starts.iter().all(|s| s % cycle == 0) && starts.windows(2).all(|w| w[1] == w[0] + cycle)
    }
}
