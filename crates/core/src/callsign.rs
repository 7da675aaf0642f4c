//! Callsign packing
//!
//! Two compact encodings are supported:
//!
//! - a 28-bit standard form (`[A1][A2][digit][A4][A4][A4]`) that also reserves
//!   a range for the compound placeholder and a fixed list of group calls;
//! - a 50-bit alphanumeric form for compound callsigns (prefix/suffix forms
//!   such as `VE3/KN4CRD/P`) that do not fit the standard layout.

use crate::{PackError, Result};

/// Width of a standard packed callsign
pub const CALLSIGN_BITS: usize = 28;

/// Width of a packed compound callsign
pub const COMPOUND_BITS: usize = 50;

/// Marker substituted for an endpoint carried in a separate compound frame
pub const COMPOUND_PLACEHOLDER: &str = "<....>";

const A1: &[u8] = b" 0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const A2: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const A3: &[u8] = b"0123456789";
const A4: &[u8] = b" ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Number of standard callsign values: 37 * 36 * 10 * 27 * 27 * 27
pub const NBASE: u32 = 37 * 36 * 10 * 27 * 27 * 27;

/// Alphabet of the 50-bit compound form
pub const CALLSIGN_ALPHABET: &[u8; 39] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ /@";

/// Group calls addressable in the 28-bit space, in code order after the placeholder
pub const GROUPS: &[&str] = &[
    "@ALLCALL",
    "@CQ",
    "@HB",
    "@QSO",
    "@DX/NA",
    "@DX/SA",
    "@DX/EU",
    "@DX/AS",
    "@DX/AF",
    "@DX/OC",
    "@DX/AN",
    "@REGION/1",
    "@REGION/2",
    "@REGION/3",
    "@NET",
    "@NTS",
    "@EMCOMM",
    "@ARES",
    "@SKYWARN",
    "@QRP",
    "@SOTA",
    "@POTA",
    "@IOTA",
    "@CONTEST",
    "@FIELDDAY",
];

fn invalid(value: &str) -> PackError {
    PackError::InvalidCallsign {
        value: value.to_string(),
    }
}

fn index_of(alphabet: &[u8], ch: u8) -> Option<u32> {
    alphabet.iter().position(|&a| a == ch).map(|p| p as u32)
}

/// Uppercase and trim a callsign the way the 28-bit packer sees it
pub fn normalize_callsign(callsign: &str) -> String {
    callsign.trim().to_ascii_uppercase()
}

/// True for the known group calls (`@ALLCALL`, `@HB`, ...)
pub fn is_group(callsign: &str) -> bool {
    let call = normalize_callsign(callsign);
    GROUPS.contains(&call.as_str())
}

/// Loose shape check used by the directed grammar: letters plus at least one digit
pub fn looks_like_callsign(callsign: &str) -> bool {
    let call = normalize_callsign(callsign);
    if is_group(&call) {
        return true;
    }
    let base_ok = call
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'/');
    base_ok
        && call.len() >= 3
        && call.bytes().any(|b| b.is_ascii_digit())
        && call.bytes().any(|b| b.is_ascii_alphabetic())
}

/// Pack a standard callsign, group call or the placeholder into 28 bits
pub fn pack_callsign(callsign: &str) -> Result<u32> {
    let call = normalize_callsign(callsign);
    if call == COMPOUND_PLACEHOLDER {
        return Ok(NBASE + 1);
    }
    if let Some(pos) = GROUPS.iter().position(|g| *g == call) {
        return Ok(NBASE + 2 + pos as u32);
    }

    let bytes = call.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
        return Err(invalid(callsign));
    }

    // align the call area digit to position 2
    let mut padded = if bytes.len() >= 3 && bytes[2].is_ascii_digit() {
        call.clone()
    } else if bytes.len() >= 2 && bytes[1].is_ascii_digit() {
        format!(" {}", call)
    } else {
        return Err(invalid(callsign));
    };
    if padded.len() > 6 {
        return Err(invalid(callsign));
    }
    while padded.len() < 6 {
        padded.push(' ');
    }

    let p = padded.as_bytes();
    let digits = [
        (A1, p[0]),
        (A2, p[1]),
        (A3, p[2]),
        (A4, p[3]),
        (A4, p[4]),
        (A4, p[5]),
    ];
    let mut value: u32 = 0;
    for (alphabet, ch) in digits {
        let idx = index_of(alphabet, ch).ok_or_else(|| invalid(callsign))?;
        value = value * alphabet.len() as u32 + idx;
    }
    Ok(value)
}

/// Unpack a 28-bit callsign value
pub fn unpack_callsign(value: u32) -> Result<String> {
    if value < NBASE {
        let mut rest = value;
        let mut out = [b' '; 6];
        let alphabets = [A1, A2, A3, A4, A4, A4];
        for (slot, alphabet) in out.iter_mut().zip(alphabets.iter()).rev() {
            let radix = alphabet.len() as u32;
            *slot = alphabet[(rest % radix) as usize];
            rest /= radix;
        }
        return Ok(String::from_utf8_lossy(&out).trim().to_string());
    }
    match value - NBASE {
        1 => Ok(COMPOUND_PLACEHOLDER.to_string()),
        n if n >= 2 && ((n - 2) as usize) < GROUPS.len() => Ok(GROUPS[(n - 2) as usize].to_string()),
        _ => Err(PackError::InvalidCallsign {
            value: format!("code {}", value),
        }),
    }
}

/// True when the callsign fits the 28-bit standard encoding
pub fn is_compact(callsign: &str) -> bool {
    pack_callsign(callsign).is_ok()
}

/// Normalize a callsign the way the 50-bit packer sees it
pub fn normalize_compound(callsign: &str) -> String {
    callsign
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '/' || *c == '@')
        .collect()
}

fn compound_layout(callsign: &str) -> Result<Vec<u8>> {
    let mut word: Vec<u8> = normalize_compound(callsign).into_bytes();
    if word.is_empty() {
        return Err(invalid(callsign));
    }
    for sep in [3usize, 7] {
        if word.len() > sep && word[sep] != b'/' {
            word.insert(sep, b' ');
        }
    }
    if word.len() > 11 {
        return Err(invalid(callsign));
    }
    word.resize(11, b' ');
    Ok(word)
}

/// Pack an alphanumeric (compound) callsign into 50 bits
pub fn pack_compound(callsign: &str) -> Result<u64> {
    let word = compound_layout(callsign)?;
    let mut value: u64 = 0;
    for (i, &ch) in word.iter().enumerate() {
        if i == 3 || i == 7 {
            value = value * 2 + (ch == b'/') as u64;
        } else {
            let idx = index_of(CALLSIGN_ALPHABET, ch).ok_or_else(|| invalid(callsign))?;
            value = value * CALLSIGN_ALPHABET.len() as u64 + idx as u64;
        }
    }
    Ok(value)
}

/// Unpack a 50-bit compound callsign value
pub fn unpack_compound(value: u64) -> Result<String> {
    if value >> COMPOUND_BITS != 0 {
        return Err(PackError::ValueTooWide {
            value,
            bits: COMPOUND_BITS,
        });
    }
    let mut rest = value;
    let mut word = [b' '; 11];
    for i in (0..11).rev() {
        if i == 3 || i == 7 {
            word[i] = if rest % 2 == 1 { b'/' } else { b' ' };
            rest /= 2;
        } else {
            let radix = CALLSIGN_ALPHABET.len() as u64;
            word[i] = CALLSIGN_ALPHABET[(rest % radix) as usize];
            rest /= radix;
        }
    }
    if rest != 0 {
        return Err(PackError::InvalidCallsign {
            value: format!("code {}", value),
        });
    }
    Ok(word.iter().filter(|&&b| b != b' ').map(|&b| b as char).collect())
}
