//! Background decode worker
//!
//! The demodulator is blocking and slow, so it runs on tokio's blocking pool
//! behind a channel. The coordinator is the only place that talks to both
//! the scheduler and the worker: the sample path calls [`DecodeCoordinator::ingest`],
//! the processing loop calls [`DecodeCoordinator::tick`] and feeds worker
//! events back through [`DecodeCoordinator::handle_event`].

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use openham_frame::message_buffer::DecodedFrame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::common::FrameDecoder;
use crate::scheduler::{DecodeRequest, DecodeScheduler, SchedulerConfig, SchedulerEvent};
use crate::{ModemError, Result};

/// Pending requests the worker accepts before `submit` fails
const REQUEST_CHANNEL_CAPACITY: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub enum DecodeEvent {
    Finished { id: u64, frames: Vec<DecodedFrame> },
    /// The decoder panicked or was cancelled
    Failed { id: u64, msg: String },
}

impl DecodeEvent {
    pub fn id(&self) -> u64 {
        match self {
            DecodeEvent::Finished { id, .. } | DecodeEvent::Failed { id, .. } => *id,
        }
    }
}

/// Detached task running decode requests one at a time
pub struct DecodeWorker {
    decoder: Arc<dyn FrameDecoder>,
    events: mpsc::Sender<DecodeEvent>,
    requests: mpsc::Sender<DecodeRequest>,
    handle: JoinHandle<()>,
}

impl DecodeWorker {
    /// Spawn on the current runtime; results are sent to `events`
    pub fn spawn(decoder: Arc<dyn FrameDecoder>, events: mpsc::Sender<DecodeEvent>) -> Self {
        let (requests, handle) = Self::start(Arc::clone(&decoder), events.clone());
        Self {
            decoder,
            events,
            requests,
            handle,
        }
    }

    fn start(
        decoder: Arc<dyn FrameDecoder>,
        events: mpsc::Sender<DecodeEvent>,
    ) -> (mpsc::Sender<DecodeRequest>, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let handle = tokio::spawn(run(decoder, rx, events));
        (tx, handle)
    }

    pub fn submit(&self, request: DecodeRequest) -> Result<()> {
        self.requests
            .try_send(request)
            .map_err(|_| ModemError::WorkerStopped)
    }

    /// Abort the task and start a fresh one
    ///
    /// A decode already on the blocking pool cannot be interrupted; its
    /// result is discarded with the old task.
    pub fn restart(&mut self) {
        warn!("restarting decode worker");
        self.handle.abort();
        let (requests, handle) = Self::start(Arc::clone(&self.decoder), self.events.clone());
        self.requests = requests;
        self.handle = handle;
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    decoder: Arc<dyn FrameDecoder>,
    mut requests: mpsc::Receiver<DecodeRequest>,
    events: mpsc::Sender<DecodeEvent>,
) {
    while let Some(request) = requests.recv().await {
        let id = request.id;
        let decoder = Arc::clone(&decoder);
        let result = tokio::task::spawn_blocking(move || decoder.decode(&request)).await;
        let event = match result {
            Ok(frames) => {
                debug!("decode {} produced {} frames", id, frames.len());
                DecodeEvent::Finished { id, frames }
            }
            Err(err) => DecodeEvent::Failed {
                id,
                msg: err.to_string(),
            },
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
}

/// Shared scheduler plus the worker it feeds
pub struct DecodeCoordinator {
    scheduler: Arc<Mutex<DecodeScheduler>>,
    worker: DecodeWorker,
}

impl DecodeCoordinator {
    /// Spawn the worker; decode results arrive on the returned receiver
    pub fn new(
        config: SchedulerConfig,
        decoder: Arc<dyn FrameDecoder>,
    ) -> (Self, mpsc::Receiver<DecodeEvent>) {
        let (events_tx, events_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let coordinator = Self {
            scheduler: Arc::new(Mutex::new(DecodeScheduler::new(config))),
            worker: DecodeWorker::spawn(decoder, events_tx),
        };
        (coordinator, events_rx)
    }

    /// Handle for sharing the scheduler with the sample path
    pub fn scheduler(&self) -> Arc<Mutex<DecodeScheduler>> {
        Arc::clone(&self.scheduler)
    }

    fn lock(&self) -> MutexGuard<'_, DecodeScheduler> {
        // state stays consistent between calls, so a poisoned lock is usable
        self.scheduler.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Report the buffer write position
    pub fn ingest(&self, k: u32) -> Vec<SchedulerEvent> {
        self.lock().advance(k)
    }

    /// Restart a stuck worker, then submit queued windows if idle
    ///
    /// Returns the id of the submitted request. A stuck decode is reported
    /// as [`ModemError::DecoderTimeout`] after the worker was restarted;
    /// the next tick submits normally.
    pub fn tick(&mut self, now: Instant) -> Result<Option<u64>> {
        let stuck = self.lock().check_stuck(now);
        if let Err(err) = stuck {
            self.worker.restart();
            return Err(err);
        }

        let Some(request) = self.lock().submit(now) else {
            return Ok(None);
        };
        let id = request.id;
        if let Err(err) = self.worker.submit(request) {
            self.lock().decode_finished(id);
            return Err(err);
        }
        Ok(Some(id))
    }

    /// Clear the in-flight slot for a worker event; false for stale events
    pub fn handle_event(&self, event: &DecodeEvent) -> bool {
        if let DecodeEvent::Failed { id, msg } = event {
            warn!("decode {} failed: {}", id, msg);
        }
        let current = self.lock().decode_finished(event.id());
        if current {
            info!("decode {} finished", event.id());
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openham_core::bits::{Codeword, FRAME_BITS};
    use openham_core::submode::Submode;
    use openham_frame::frame::TransmissionFlags;
    use openham_frame::message_buffer::RxMeta;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedDecoder {
        calls: AtomicUsize,
    }

    impl FrameDecoder for FixedDecoder {
        fn decode(&self, request: &DecodeRequest) -> Vec<DecodedFrame> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            request
                .spans
                .iter()
                .map(|span| DecodedFrame {
                    bits: Codeword::repeat(false, FRAME_BITS),
                    meta: RxMeta {
                        offset_hz: 1500,
                        submode: span.submode,
                        flags: TransmissionFlags::FIRST | TransmissionFlags::LAST,
                        snr: -5,
                        time_offset: 0.0,
                    },
                })
                .collect()
        }
    }

    struct SlowDecoder;

    impl FrameDecoder for SlowDecoder {
        fn decode(&self, _request: &DecodeRequest) -> Vec<DecodedFrame> {
            std::thread::sleep(Duration::from_millis(200));
            Vec::new()
        }
    }

    fn ultra_only() -> SchedulerConfig {
        SchedulerConfig {
            submodes: vec![Submode::Ultra],
            ..SchedulerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_request_roundtrip() {
        let decoder = Arc::new(FixedDecoder {
            calls: AtomicUsize::new(0),
        });
        let (mut coord, mut events) = DecodeCoordinator::new(ultra_only(), decoder.clone());
        let now = Instant::now();

        coord.ingest(0);
        assert_eq!(coord.tick(now).unwrap(), None);
        coord.ingest(20_000);
        coord.ingest(40_000);
        let id = coord.tick(now).unwrap().expect("ultra window is ready");

        // busy until the event is handled
        coord.ingest(60_000);
        coord.ingest(80_000);
        coord.ingest(90_000);
        assert_eq!(coord.tick(now).unwrap(), None);

        let event = events.recv().await.expect("worker reports back");
        assert_eq!(event.id(), id);
        match &event {
            DecodeEvent::Finished { frames, .. } => {
                assert_eq!(frames.len(), 1);
                assert_eq!(frames[0].meta.submode, Submode::Ultra);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(coord.handle_event(&event));
        assert!(!coord.handle_event(&event));

        let next = coord.tick(now).unwrap().expect("second window queued");
        assert!(next > id);
        assert!(events.recv().await.is_some());
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stuck_decode_restarts_worker() {
        let (mut coord, mut events) = DecodeCoordinator::new(ultra_only(), Arc::new(SlowDecoder));
        let start = Instant::now();
        coord.ingest(40_000);
        let id = coord.tick(start).unwrap().expect("ultra window is ready");

        let err = coord.tick(start + Duration::from_secs(60)).unwrap_err();
        assert!(matches!(err, ModemError::DecoderTimeout { id: stuck, .. } if stuck == id));
        assert!(coord.scheduler().lock().unwrap().in_flight().is_none());

        // the fresh worker takes new requests
        coord.ingest(60_000);
        coord.ingest(80_000);
        let next = coord
            .tick(start + Duration::from_secs(61))
            .unwrap()
            .expect("next window submitted");
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("worker answers")
            .expect("channel open");
        // the aborted task's blocking decode may still report first
        if event.id() == id {
            assert!(!coord.handle_event(&event));
        } else {
            assert_eq!(event.id(), next);
        }
        assert!(coord.worker.is_running());
    }
}
