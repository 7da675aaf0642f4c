//! OpenHam Modem - Decode scheduling and physical layer interfaces
//!
//! This crate decides when each submode has a full frame's worth of audio
//! in the rolling receive buffer, hands merged decode requests to an
//! external demodulator on a background worker, and defines the seams the
//! tone generator and demodulator plug into.

pub mod common;
pub mod error;
pub mod scheduler;
pub mod worker;

pub use error::{ModemError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        common::{transmit_next, FrameDecoder, Modulator},
        error::{ModemError, Result},
        scheduler::{DecodeRequest, DecodeScheduler, DecodeSpan, DecodeWindow, SchedulerConfig, SchedulerEvent},
        worker::{DecodeCoordinator, DecodeEvent, DecodeWorker},
    };
}
