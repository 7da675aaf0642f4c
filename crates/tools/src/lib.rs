//! OpenHam Tools library

pub mod common;
pub mod config;
pub mod rx;
pub mod tx;

pub use common::{log_level, parse_flags};
pub use config::Config;
pub use rx::{simulate_schedule, Receiver};
pub use tx::{plan_transmission, TxLine};
