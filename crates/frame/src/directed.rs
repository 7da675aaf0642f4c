//! Directed commands
//!
//! A directed message has the shape `[FROM:] TO CMD [ARGS]`. The command is
//! one of 32 five-bit codes; endpoints are standard callsigns, group calls
//! or compound callsigns carried in a separate fragment frame.

use std::collections::BTreeMap;
use std::fmt;

use openham_core::callsign::{
    is_compact, looks_like_callsign, normalize_callsign, pack_compound, COMPOUND_PLACEHOLDER,
};
use openham_core::packing::{NUM_MAX, NUM_MIN};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::checksum::{checksum, command_text, ChecksumKind};
use crate::frame::Frame;

/// Width of the command field
pub const COMMAND_BITS: usize = 5;

struct CommandSpec {
    text: &'static str,
    numeric: bool,
    checksum: ChecksumKind,
}

const fn spec(text: &'static str) -> CommandSpec {
    CommandSpec {
        text,
        numeric: false,
        checksum: ChecksumKind::None,
    }
}

const fn numeric(text: &'static str) -> CommandSpec {
    CommandSpec {
        text,
        numeric: true,
        checksum: ChecksumKind::None,
    }
}

const fn checked(text: &'static str) -> CommandSpec {
    CommandSpec {
        text,
        numeric: false,
        checksum: ChecksumKind::Crc16,
    }
}

// indexed by code
const COMMANDS: [CommandSpec; 32] = [
    spec("SNR?"),
    spec("DIT DIT"),
    spec("NACK"),
    spec("HEARING?"),
    spec("GRID?"),
    checked(">"),
    spec("STATUS?"),
    spec("STATUS"),
    spec("HEARING"),
    checked("MSG"),
    checked("MSG TO:"),
    checked("QUERY"),
    checked("QUERY MSGS"),
    checked("QUERY CALL"),
    spec(""),
    spec("GRID"),
    spec("INFO?"),
    spec("INFO"),
    spec("FB"),
    spec("HW CPY?"),
    spec("SK"),
    spec("RR"),
    spec("QSL?"),
    spec("QSL"),
    checked("CMD"),
    numeric("SNR"),
    spec("NO"),
    spec("YES"),
    spec("73"),
    numeric("ACK"),
    spec("AGN?"),
    spec(""),
];

/// Five-bit directed command code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Command(u8);

impl Command {
    pub const SNR_QUERY: Command = Command(0);
    pub const GRID_QUERY: Command = Command(4);
    pub const RELAY: Command = Command(5);
    pub const MSG: Command = Command(9);
    pub const QUERY_MSGS: Command = Command(12);
    pub const GRID: Command = Command(15);
    pub const SNR: Command = Command(25);
    pub const ACK: Command = Command(29);

    pub fn from_code(code: u8) -> Option<Self> {
        (code < 32).then_some(Command(code))
    }

    pub const fn code(self) -> u8 {
        self.0
    }

    /// Command text, empty for the two unassigned codes (14 and 31)
    pub const fn text(self) -> &'static str {
        COMMANDS[self.0 as usize].text
    }

    /// True when the command carries the numeric report field
    pub const fn is_numeric(self) -> bool {
        COMMANDS[self.0 as usize].numeric
    }

    /// Checksum width used when no override is configured
    pub const fn default_checksum(self) -> ChecksumKind {
        COMMANDS[self.0 as usize].checksum
    }

    pub fn from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        COMMANDS
            .iter()
            .position(|c| c.text == text)
            .map(|code| Command(code as u8))
    }
}

impl TryFrom<u8> for Command {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Command::from_code(code).ok_or_else(|| format!("command code {} out of range", code))
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> u8 {
        command.0
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Match the longest command at the start of `text`
///
/// The command must end at a word boundary. Returns the command and the rest
/// of the text with leading spaces removed.
pub fn parse_command(text: &str) -> Option<(Command, &str)> {
    let text = text.trim_start();
    let mut best: Option<(Command, usize)> = None;
    for (code, spec) in COMMANDS.iter().enumerate() {
        let len = spec.text.len();
        if len == 0 || !text.starts_with(spec.text) {
            continue;
        }
        if !(text.len() == len || text[len..].starts_with(' ')) {
            continue;
        }
        if best.map_or(true, |(_, best_len)| len > best_len) {
            best = Some((Command(code as u8), len));
        }
    }
    best.map(|(command, len)| (command, text[len..].trim_start()))
}

/// Per-command checksum overrides
///
/// Keys are command texts so the policy reads naturally in a config file:
///
/// ```toml
/// [checksums.overrides]
/// "MSG" = "crc32"
/// "QUERY" = "none"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChecksumPolicy {
    pub overrides: BTreeMap<String, ChecksumKind>,
}

impl ChecksumPolicy {
    pub fn kind_for(&self, command: Command) -> ChecksumKind {
        self.overrides
            .get(command.text())
            .copied()
            .unwrap_or_else(|| command.default_checksum())
    }

    pub fn with_override(mut self, command: Command, kind: ChecksumKind) -> Self {
        self.overrides.insert(command.text().to_string(), kind);
        self
    }
}

/// Parsed `[FROM:] TO CMD [ARGS]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedText {
    pub from: String,
    pub to: String,
    pub command: Command,
    pub num: Option<i32>,
    pub args: String,
}

/// Parse directed grammar; `None` means the text is not a directed command
pub fn parse_directed(text: &str, mycall: &str) -> Option<DirectedText> {
    let text = text.trim();
    let (first, rest) = split_token(text);

    let (from, to, rest) = match first.strip_suffix(':') {
        Some(from) => {
            let (to, rest) = split_token(rest);
            (from, to, rest)
        }
        None => (mycall, first, rest),
    };
    if !looks_like_callsign(from) || !looks_like_callsign(to) {
        return None;
    }

    let (command, args) = parse_command(rest)?;
    let mut args = args.trim().to_string();
    let mut num = None;
    if command.is_numeric() {
        if let Ok(value) = args.parse::<i32>() {
            num = Some(value);
            args.clear();
        }
    }

    Some(DirectedText {
        from: normalize_callsign(from),
        to: normalize_callsign(to),
        command,
        num,
        args,
    })
}

fn split_token(text: &str) -> (&str, &str) {
    match text.split_once(' ') {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (text, ""),
    }
}

/// Frames and payload text of a directed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectedPlan {
    /// Compound fragments followed by the directed frame
    pub frames: Vec<Frame>,
    /// Arguments plus the checksum, carried in data frames
    pub payload: String,
    pub parsed: DirectedText,
}

/// Build the frames of a directed message
///
/// Returns `None` when the text does not follow the directed grammar or an
/// endpoint cannot be encoded; callers then send the text as data.
pub fn pack_directed(text: &str, mycall: &str, policy: &ChecksumPolicy) -> Option<DirectedPlan> {
    let parsed = parse_directed(text, mycall)?;
    let num = parsed.num.map(|n| n.clamp(NUM_MIN, NUM_MAX));

    let mut frames = Vec::new();
    let from = endpoint(&parsed.from)?;
    let to = endpoint(&parsed.to)?;

    if from.is_none() {
        frames.push(Frame::Compound {
            callsign: parsed.from.clone(),
            grid: None,
        });
    }
    if to.is_none() {
        frames.push(Frame::CompoundDirected {
            callsign: parsed.to.clone(),
            command: parsed.command,
            num,
        });
    }
    frames.push(Frame::Directed {
        from: from.unwrap_or_else(|| COMPOUND_PLACEHOLDER.to_string()),
        to: to.unwrap_or_else(|| COMPOUND_PLACEHOLDER.to_string()),
        command: parsed.command,
        num,
    });

    let kind = policy.kind_for(parsed.command);
    let mut payload = parsed.args.clone();
    if !kind.is_none() {
        let check = checksum(&command_text(parsed.command.text(), &parsed.args), kind);
        payload = format!("{} {}", payload, check).trim().to_string();
    }

    debug!(
        "directed {} -> {} {} ({} fragment frames, checksum {:?})",
        parsed.from,
        parsed.to,
        parsed.command,
        frames.len() - 1,
        kind
    );
    Some(DirectedPlan {
        frames,
        payload,
        parsed,
    })
}

/// `Some(Some(call))` for a compact endpoint, `Some(None)` when a fragment is needed
fn endpoint(callsign: &str) -> Option<Option<String>> {
    if is_compact(callsign) {
        Some(Some(normalize_callsign(callsign)))
    } else if pack_compound(callsign).is_ok() {
        Some(None)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_table() {
        assert_eq!(Command::SNR.text(), "SNR");
        assert!(Command::SNR.is_numeric());
        assert!(Command::ACK.is_numeric());
        assert!(!Command::SNR_QUERY.is_numeric());
        assert_eq!(Command::from_text("QUERY MSGS"), Some(Command::QUERY_MSGS));
        assert_eq!(Command::from_text(""), None);
        assert_eq!(Command::from_code(32), None);
        let checked: Vec<u8> = (0..32)
            .filter_map(Command::from_code)
            .filter(|c| !c.default_checksum().is_none())
            .map(Command::code)
            .collect();
        assert_eq!(checked, vec![5, 9, 10, 11, 12, 13, 24]);
    }

    #[test]
    fn test_unassigned_codes_are_never_parsed() {
        let unassigned: Vec<u8> = (0..32)
            .filter_map(Command::from_code)
            .filter(|c| c.text().is_empty())
            .map(Command::code)
            .collect();
        assert_eq!(unassigned, vec![14, 31]);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("   HELLO"), None);
    }

    #[test]
    fn test_parse_command_longest_match() {
        assert_eq!(parse_command("QUERY MSGS"), Some((Command::QUERY_MSGS, "")));
        assert_eq!(parse_command("QUERY CALL K1ABC").map(|c| c.0.text()), Some("QUERY CALL"));
        assert_eq!(parse_command("SNR? "), Some((Command::SNR_QUERY, "")));
        assert_eq!(parse_command("MSG TO: K1ABC HI").map(|c| c.1), Some("K1ABC HI"));
        assert_eq!(parse_command("MSG HELLO"), Some((Command::MSG, "HELLO")));
        // word boundary required
        assert_eq!(parse_command("MSGS"), None);
        assert_eq!(parse_command("GRIDS"), None);
        assert_eq!(parse_command("HELLO"), None);
    }

    #[test]
    fn test_parse_directed() {
        let d = parse_directed("KN4CRD SNR -12", "K1ABC").unwrap();
        assert_eq!((d.from.as_str(), d.to.as_str()), ("K1ABC", "KN4CRD"));
        assert_eq!(d.command, Command::SNR);
        assert_eq!(d.num, Some(-12));
        assert!(d.args.is_empty());

        let d = parse_directed("W1AW: @ALLCALL MSG HELLO ALL", "K1ABC").unwrap();
        assert_eq!(d.from, "W1AW");
        assert_eq!(d.to, "@ALLCALL");
        assert_eq!(d.args, "HELLO ALL");

        assert!(parse_directed("HELLO WORLD", "K1ABC").is_none());
        assert!(parse_directed("KN4CRD HELLO", "K1ABC").is_none());
        assert!(parse_directed("KN4CRD", "K1ABC").is_none());
    }

    #[test]
    fn test_checksum_policy() {
        let policy = ChecksumPolicy::default();
        assert_eq!(policy.kind_for(Command::MSG), ChecksumKind::Crc16);
        assert_eq!(policy.kind_for(Command::SNR), ChecksumKind::None);
        let policy = policy
            .with_override(Command::MSG, ChecksumKind::Crc32)
            .with_override(Command::QUERY_MSGS, ChecksumKind::None);
        assert_eq!(policy.kind_for(Command::MSG), ChecksumKind::Crc32);
        assert_eq!(policy.kind_for(Command::QUERY_MSGS), ChecksumKind::None);
    }

    #[test]
    fn test_pack_directed_with_checksum() {
        let plan = pack_directed("KN4CRD QUERY MSGS", "K1ABC", &ChecksumPolicy::default()).unwrap();
        assert_eq!(plan.frames.len(), 1);
        assert_eq!(plan.payload, checksum("QUERY MSGS", ChecksumKind::Crc16));
        assert!(matches!(
            &plan.frames[0],
            Frame::Directed { from, to, command, .. }
                if from == "K1ABC" && to == "KN4CRD" && *command == Command::QUERY_MSGS
        ));

        let plan = pack_directed("KN4CRD MSG HELLO", "K1ABC", &ChecksumPolicy::default()).unwrap();
        let check = checksum("MSG HELLO", ChecksumKind::Crc16);
        assert_eq!(plan.payload, format!("HELLO {}", check));
    }

    #[test]
    fn test_pack_directed_compound_endpoints() {
        let plan = pack_directed("VE3/KN4CRD: K1ABC/P GRID?", "K1ABC", &ChecksumPolicy::default()).unwrap();
        assert_eq!(plan.frames.len(), 3);
        assert!(matches!(&plan.frames[0], Frame::Compound { callsign, .. } if callsign == "VE3/KN4CRD"));
        assert!(matches!(&plan.frames[1], Frame::CompoundDirected { callsign, .. } if callsign == "K1ABC/P"));
        assert!(matches!(
            &plan.frames[2],
            Frame::Directed { from, to, .. } if from == COMPOUND_PLACEHOLDER && to == COMPOUND_PLACEHOLDER
        ));
        assert!(plan.payload.is_empty());
    }

    #[test]
    fn test_pack_directed_clamps_reports() {
        let plan = pack_directed("KN4CRD SNR -40", "K1ABC", &ChecksumPolicy::default()).unwrap();
        assert!(matches!(plan.frames[0], Frame::Directed { num: Some(-31), .. }));
    }

    #[test]
    fn test_unencodable_endpoint_falls_back() {
        assert!(pack_directed("VERYLONG/KN4CRD/QRP SNR?", "K1ABC", &ChecksumPolicy::default()).is_none());
    }
}
