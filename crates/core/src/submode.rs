//! Submode timing table
//!
//! Every submode carries the same 72-bit frame; only the symbol duration and
//! therefore the transmit period differ.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::PackError;

/// Audio sample rate of the rolling receive buffer
pub const SAMPLE_RATE: u32 = 12_000;

/// Channel symbols per frame
pub const NUM_SYMBOLS: u32 = 79;

/// Length of the rolling receive buffer in seconds
pub const ROLLING_BUFFER_SECONDS: u32 = 60;

/// Length of the rolling receive buffer in samples
pub const ROLLING_BUFFER_SAMPLES: u32 = ROLLING_BUFFER_SECONDS * SAMPLE_RATE;

/// Transmission speed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Submode {
    Normal,
    Fast,
    Turbo,
    Slow,
    Ultra,
}

struct Timing {
    bit: u8,
    samples_per_symbol: u32,
    period_secs: u32,
    start_delay_ms: u32,
    tone_spacing_hz: f32,
    drift_tolerance_hz: i32,
}

const fn timing(submode: Submode) -> Timing {
    match submode {
        Submode::Normal => Timing {
            bit: 1,
            samples_per_symbol: 1920,
            period_secs: 15,
            start_delay_ms: 500,
            tone_spacing_hz: 6.25,
            drift_tolerance_hz: 10,
        },
        Submode::Fast => Timing {
            bit: 2,
            samples_per_symbol: 1200,
            period_secs: 10,
            start_delay_ms: 200,
            tone_spacing_hz: 10.0,
            drift_tolerance_hz: 20,
        },
        Submode::Turbo => Timing {
            bit: 4,
            samples_per_symbol: 600,
            period_secs: 6,
            start_delay_ms: 100,
            tone_spacing_hz: 20.0,
            drift_tolerance_hz: 30,
        },
        Submode::Slow => Timing {
            bit: 8,
            samples_per_symbol: 3840,
            period_secs: 30,
            start_delay_ms: 500,
            tone_spacing_hz: 3.125,
            drift_tolerance_hz: 10,
        },
        Submode::Ultra => Timing {
            bit: 16,
            samples_per_symbol: 384,
            period_secs: 4,
            start_delay_ms: 100,
            tone_spacing_hz: 31.25,
            drift_tolerance_hz: 50,
        },
    }
}

impl Submode {
    pub const ALL: [Submode; 5] = [
        Submode::Normal,
        Submode::Fast,
        Submode::Turbo,
        Submode::Slow,
        Submode::Ultra,
    ];

    /// Position in [`Submode::ALL`], used to index per-submode arrays
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit of this submode in a decode mask
    pub const fn bit(self) -> u8 {
        timing(self).bit
    }

    pub const fn samples_per_symbol(self) -> u32 {
        timing(self).samples_per_symbol
    }

    pub const fn period_secs(self) -> u32 {
        timing(self).period_secs
    }

    pub const fn start_delay_ms(self) -> u32 {
        timing(self).start_delay_ms
    }

    pub const fn tone_spacing_hz(self) -> f32 {
        timing(self).tone_spacing_hz
    }

    /// How far a transmission may drift between frames and still be tracked
    pub const fn drift_tolerance_hz(self) -> i32 {
        timing(self).drift_tolerance_hz
    }

    /// Samples in one transmit period
    pub const fn cycle_samples(self) -> u32 {
        self.period_secs() * SAMPLE_RATE
    }

    /// Samples needed before a frame starting at the cycle boundary can be decoded
    pub const fn frames_needed(self) -> u32 {
        NUM_SYMBOLS * self.samples_per_symbol() + self.start_delay_ms() * SAMPLE_RATE / 1000
    }

    /// Duration of the tones of one frame in seconds
    pub fn frame_duration_secs(self) -> f32 {
        (NUM_SYMBOLS * self.samples_per_symbol()) as f32 / SAMPLE_RATE as f32
    }

    pub const fn name(self) -> &'static str {
        match self {
            Submode::Normal => "normal",
            Submode::Fast => "fast",
            Submode::Turbo => "turbo",
            Submode::Slow => "slow",
            Submode::Ultra => "ultra",
        }
    }

    /// Submodes whose bits are set in `mask`
    pub fn from_mask(mask: u8) -> Vec<Submode> {
        Self::ALL
            .iter()
            .copied()
            .filter(|s| mask & s.bit() != 0)
            .collect()
    }
}

impl Default for Submode {
    fn default() -> Self {
        Submode::Normal
    }
}

impl fmt::Display for Submode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Submode {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == lower)
            .ok_or(PackError::UnknownSubmode {
                name: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_table() {
        assert_eq!(Submode::Normal.cycle_samples(), 180_000);
        assert_eq!(Submode::Normal.frames_needed(), 79 * 1920 + 6000);
        assert_eq!(Submode::Ultra.frames_needed(), 79 * 384 + 1200);
        for mode in Submode::ALL {
            // a frame plus its start delay always fits in its own period
            assert!(mode.frames_needed() <= mode.cycle_samples(), "{}", mode);
            assert_eq!(ROLLING_BUFFER_SAMPLES % mode.cycle_samples(), 0, "{}", mode);
        }
    }

    #[test]
    fn test_masks_and_indices() {
        let mask: u8 = Submode::ALL.iter().map(|s| s.bit()).sum();
        assert_eq!(mask, 31);
        assert_eq!(Submode::from_mask(Submode::Fast.bit() | Submode::Ultra.bit()), vec![Submode::Fast, Submode::Ultra]);
        for (i, mode) in Submode::ALL.iter().enumerate() {
            assert_eq!(mode.index(), i);
        }
    }

    #[test]
    fn test_parse() {
        assert_eq!("Turbo".parse::<Submode>().unwrap(), Submode::Turbo);
        assert!("warp".parse::<Submode>().is_err());
        assert_eq!(Submode::Slow.to_string(), "slow");
    }
}
