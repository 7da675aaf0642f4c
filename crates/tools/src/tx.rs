//! Transmit side: text to printable frames

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use openham_core::bits::{frame_to_string, Bits};
use openham_core::submode::Submode;
use openham_frame::assembler::{AssemblerConfig, MessageAssembler};
use openham_frame::frame::{FrameCodec, TransmissionFlags};
use openham_modem::common::{transmit_next, Modulator};

/// One transmitted frame as printed by `openham tx`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxLine {
    pub flags: TransmissionFlags,
    /// 12-character transport form of the 72 bits
    pub frame: String,
    /// Frame content as the receiver will decode it
    pub text: String,
}

/// Stand-in modulator that keeps the frames instead of generating tones
struct FrameSink<'a> {
    codec: &'a FrameCodec,
    lines: Vec<TxLine>,
}

impl Modulator for FrameSink<'_> {
    fn modulate(&mut self, bits: &Bits, flags: TransmissionFlags) -> openham_modem::Result<()> {
        let frame = frame_to_string(bits)?;
        let text = self.codec.decode(bits)?.to_string();
        self.lines.push(TxLine { flags, frame, text });
        Ok(())
    }

    fn submode(&self) -> Submode {
        Submode::Normal
    }

    fn reset(&mut self) {
        self.lines.clear();
    }
}

/// Assemble `text` and run every frame through the transmit path
pub fn plan_transmission(config: &AssemblerConfig, text: &str) -> Result<Vec<TxLine>> {
    let assembler = MessageAssembler::new(config.clone());
    let mut message = assembler
        .assemble(text)
        .with_context(|| format!("Failed to assemble {:?}", text))?;

    let mut sink = FrameSink {
        codec: assembler.codec(),
        lines: Vec::new(),
    };
    while transmit_next(&mut message, &mut sink)?.is_some() {}

    info!("{} frames ready for transmission", sink.lines.len());
    Ok(sink.lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use openham_frame::assembler::join_payload;

    fn station() -> AssemblerConfig {
        AssemblerConfig {
            callsign: "K1ABC".into(),
            grid: "FN31".into(),
            ..AssemblerConfig::default()
        }
    }

    #[test]
    fn test_heartbeat_single_line() {
        let lines = plan_transmission(&station(), "HB AUTO").unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].flags, TransmissionFlags::FIRST | TransmissionFlags::LAST);
        assert_eq!(lines[0].frame.len(), 12);
        assert_eq!(lines[0].text, "K1ABC: HB AUTO FN31");
    }

    #[test]
    fn test_free_text_lines_join_back() {
        let text = "HELLO WORLD THIS IS A TEST OF THE TEXT MODE";
        let lines = plan_transmission(&station(), text).unwrap();
        assert!(lines.len() > 1);
        let mut joined = String::new();
        for line in &lines {
            join_payload(&mut joined, &line.text);
        }
        assert_eq!(joined, format!("K1ABC: {}", text));
        assert!(lines[0].flags.is_first());
        assert!(lines[lines.len() - 1].flags.is_last());
    }

    #[test]
    fn test_empty_text_fails() {
        assert!(plan_transmission(&station(), "  ").is_err());
    }
}
