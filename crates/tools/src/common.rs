//! Common helpers shared by the subcommands

use anyhow::{bail, Result};
use tracing::Level;

use openham_frame::frame::TransmissionFlags;

/// Log level for the `--verbose` / `--debug` switches
pub fn log_level(verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// Parse transmission flags as printed by `tx` (`FL`, `F-`, `-L`, `--`) or as a number
pub fn parse_flags(text: &str) -> Result<TransmissionFlags> {
    if let Ok(bits) = text.parse::<u8>() {
        if bits > 0b111 {
            bail!("Flags out of range: {}", bits);
        }
        return Ok(TransmissionFlags::from_bits(bits));
    }

    let mut chars = text.chars();
    let (Some(first), Some(last), None) = (chars.next(), chars.next(), chars.next()) else {
        bail!("Invalid flags: {:?}", text);
    };
    let mut flags = TransmissionFlags::NONE;
    match first {
        'F' | 'f' => flags.insert(TransmissionFlags::FIRST),
        '-' => {}
        _ => bail!("Invalid flags: {:?}", text),
    }
    match last {
        'L' | 'l' => flags.insert(TransmissionFlags::LAST),
        '-' => {}
        _ => bail!("Invalid flags: {:?}", text),
    }
    Ok(flags)
}
