//! Bit vectors, integer packing and the compact character alphabets
//!
//! All bit sequences are MSB first and stored as `BitVec<u8, Msb0>`, so a
//! frame's bit order matches its byte order. Fixed-width values can be
//! rendered as short strings over restricted alphabets so that frames and
//! checksums can be carried through text-only interfaces.

use bitvec::prelude::*;

use crate::{PackError, Result};

/// Borrowed bit sequence
pub type Bits = BitSlice<u8, Msb0>;

/// Owned bit sequence produced and consumed by the packers and codecs
pub type Codeword = BitVec<u8, Msb0>;

/// Number of payload bits in every frame on the link
pub const FRAME_BITS: usize = 72;

/// Number of characters used to render one frame
pub const FRAME_CHARS: usize = FRAME_BITS / 6;

/// 6-bit transport alphabet
pub const ALPHABET_64: &[u8; 64] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz-+";

/// 5-bit restricted alphabet
pub const ALPHABET_32: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";

/// Alphabet used to render checksums (base 41)
pub const CHECKSUM_ALPHABET: &[u8; 41] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ+-./?";

/// Convert the low `width` bits of `value` into a codeword
pub fn int_to_bits(value: u64, width: usize) -> Codeword {
    debug_assert!(width <= 64);
    let mut bits = bitvec![u8, Msb0; 0; width];
    if width > 0 {
        bits.store_be(value);
    }
    bits
}

/// Accumulate a bit slice (at most 64 bits) into an integer
pub fn bits_to_int(bits: &Bits) -> u64 {
    debug_assert!(bits.len() <= 64);
    if bits.is_empty() {
        return 0;
    }
    bits.load_be::<u64>()
}

/// Append `value` as a `width`-bit field, failing if it does not fit
pub fn push_field(bits: &mut Codeword, value: u64, width: usize) -> Result<()> {
    if width > 64 || (width < 64 && value >> width != 0) {
        return Err(PackError::ValueTooWide { value, bits: width });
    }
    if width == 0 {
        return Ok(());
    }
    let start = bits.len();
    bits.resize(start + width, false);
    bits[start..].store_be(value);
    Ok(())
}

/// Sequential reader over a bit slice
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bits: &'a Bits,
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bits: &'a Bits) -> Self {
        Self { bits, pos: 0 }
    }

    /// Read the next `width` bits (at most 64) as an integer
    pub fn read(&mut self, width: usize) -> Result<u64> {
        let end = self.pos + width;
        if end > self.bits.len() {
            return Err(PackError::BitLengthMismatch {
                expected: end,
                actual: self.bits.len(),
            });
        }
        if width > 64 {
            return Err(PackError::ValueTooWide { value: 0, bits: width });
        }
        let value = bits_to_int(&self.bits[self.pos..end]);
        self.pos = end;
        Ok(value)
    }

    pub fn remaining(&self) -> &'a Bits {
        &self.bits[self.pos..]
    }
}

/// Render `value` as exactly `width` digits of `alphabet`, most significant first
pub fn pack_radix(value: u64, width: usize, alphabet: &[u8]) -> Result<String> {
    let radix = alphabet.len() as u128;
    let mut rest = value as u128;
    let mut out = vec![alphabet[0]; width];
    for slot in out.iter_mut().rev() {
        *slot = alphabet[(rest % radix) as usize];
        rest /= radix;
    }
    if rest != 0 {
        return Err(PackError::ValueTooWide {
            value,
            bits: width,
        });
    }
    Ok(out.into_iter().map(char::from).collect())
}

/// Parse exactly `width` digits of `alphabet` back into an integer
pub fn unpack_radix(text: &str, width: usize, alphabet: &[u8]) -> Result<u64> {
    if text.len() != width {
        return Err(PackError::InvalidEncoding {
            msg: format!("expected {} characters, got {:?}", width, text),
        });
    }
    let radix = alphabet.len() as u128;
    let mut value: u128 = 0;
    for b in text.bytes() {
        let digit = alphabet.iter().position(|&a| a == b).ok_or_else(|| {
            PackError::InvalidEncoding {
                msg: format!("character {:?} not in alphabet", b as char),
            }
        })?;
        value = value * radix + digit as u128;
    }
    u64::try_from(value).map_err(|_| PackError::InvalidEncoding {
        msg: format!("{:?} overflows 64 bits", text),
    })
}

fn narrow(value: u64, bits: usize) -> Result<u64> {
    if bits < 64 && value >> bits != 0 {
        return Err(PackError::ValueTooWide { value, bits });
    }
    Ok(value)
}

pub fn pack_16bits(value: u16) -> String {
    // 3 x 6 bits always holds 16
    pack_radix(value as u64, 3, ALPHABET_64).unwrap_or_default()
}

pub fn unpack_16bits(text: &str) -> Result<u16> {
    Ok(narrow(unpack_radix(text, 3, ALPHABET_64)?, 16)? as u16)
}

pub fn pack_32bits(value: u32) -> String {
    pack_radix(value as u64, 6, ALPHABET_64).unwrap_or_default()
}

pub fn unpack_32bits(text: &str) -> Result<u32> {
    Ok(narrow(unpack_radix(text, 6, ALPHABET_64)?, 32)? as u32)
}

pub fn pack_64bits(value: u64) -> String {
    pack_radix(value, 11, ALPHABET_64).unwrap_or_default()
}

pub fn unpack_64bits(text: &str) -> Result<u64> {
    unpack_radix(text, 11, ALPHABET_64)
}

/// Render a 72-bit value given as its high 64 and low 8 bits
pub fn pack_72bits(high: u64, low: u8) -> String {
    let mut bits = int_to_bits(high, 64);
    bits.extend_from_bitslice(&int_to_bits(low as u64, 8));
    bits_to_alphabet(&bits, 6, ALPHABET_64)
}

pub fn unpack_72bits(text: &str) -> Result<(u64, u8)> {
    let bits = alphabet_to_bits(text, 6, ALPHABET_64)?;
    if bits.len() != 72 {
        return Err(PackError::BitLengthMismatch {
            expected: 72,
            actual: bits.len(),
        });
    }
    Ok((bits[..64].load_be::<u64>(), bits[64..].load_be::<u8>()))
}

/// Map a 5-bit value to its character
pub fn pack_5bits(value: u8) -> Result<char> {
    ALPHABET_32
        .get(value as usize)
        .map(|&b| b as char)
        .ok_or(PackError::ValueTooWide {
            value: value as u64,
            bits: 5,
        })
}

pub fn unpack_5bits(ch: char) -> Result<u8> {
    position(ALPHABET_32, ch).map(|p| p as u8)
}

/// Map a 6-bit value to its character
pub fn pack_6bits(value: u8) -> Result<char> {
    ALPHABET_64
        .get(value as usize)
        .map(|&b| b as char)
        .ok_or(PackError::ValueTooWide {
            value: value as u64,
            bits: 6,
        })
}

pub fn unpack_6bits(ch: char) -> Result<u8> {
    position(ALPHABET_64, ch).map(|p| p as u8)
}

fn position(alphabet: &[u8], ch: char) -> Result<usize> {
    alphabet
        .iter()
        .position(|&a| a as char == ch)
        .ok_or_else(|| PackError::InvalidEncoding {
            msg: format!("character {:?} not in alphabet", ch),
        })
}

/// Render bits in groups of `width`, zero-filling the final group on the right
pub fn bits_to_alphabet(bits: &Bits, width: usize, alphabet: &[u8]) -> String {
    bits.chunks(width)
        .map(|chunk| {
            let mut value = bits_to_int(chunk) as usize;
            value <<= width - chunk.len();
            alphabet[value] as char
        })
        .collect()
}

pub fn alphabet_to_bits(text: &str, width: usize, alphabet: &[u8]) -> Result<Codeword> {
    let mut bits = Codeword::with_capacity(text.len() * width);
    for ch in text.chars() {
        push_field(&mut bits, position(alphabet, ch)? as u64, width)?;
    }
    Ok(bits)
}

/// Render a frame as its 12-character transport string
pub fn frame_to_string(bits: &Bits) -> Result<String> {
    if bits.len() != FRAME_BITS {
        return Err(PackError::BitLengthMismatch {
            expected: FRAME_BITS,
            actual: bits.len(),
        });
    }
    Ok(bits_to_alphabet(bits, 6, ALPHABET_64))
}

/// Parse a 12-character transport string back into frame bits
pub fn frame_from_string(text: &str) -> Result<Codeword> {
    if text.chars().count() != FRAME_CHARS {
        return Err(PackError::InvalidEncoding {
            msg: format!("frame string must be {} characters: {:?}", FRAME_CHARS, text),
        });
    }
    alphabet_to_bits(text, 6, ALPHABET_64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_int_bits_roundtrip() {
        let bits = int_to_bits(0b1011, 6);
        assert_eq!(bits, bitvec![u8, Msb0; 0, 0, 1, 0, 1, 1]);
        assert_eq!(bits_to_int(&bits), 0b1011);
        assert_eq!(bits_to_int(&Codeword::new()), 0);
    }

    #[test]
    fn test_bit_order_matches_bytes() {
        assert_eq!(int_to_bits(0xA5, 8).as_raw_slice(), &[0xA5]);

        // fields straddling byte boundaries keep MSB-first order
        let mut bits = Codeword::new();
        push_field(&mut bits, 0b101, 3).unwrap();
        push_field(&mut bits, 0x3FF, 10).unwrap();
        push_field(&mut bits, 0, 3).unwrap();
        assert_eq!(bits.len(), 16);
        assert_eq!(bits.as_raw_slice(), &[0b1011_1111, 0b1111_1000]);
    }

    #[test]
    fn test_push_field_rejects_wide_values() {
        let mut bits = Codeword::new();
        assert!(push_field(&mut bits, 8, 3).is_err());
        push_field(&mut bits, 7, 3).unwrap();
        assert_eq!(bits.len(), 3);
    }

    #[test]
    fn test_bit_reader() {
        let bits = int_to_bits(0xABC, 12);
        let mut reader = BitReader::new(&bits);
        assert_eq!(reader.read(4).unwrap(), 0xA);
        assert_eq!(reader.read(8).unwrap(), 0xBC);
        assert!(reader.read(1).is_err());
        assert!(reader.remaining().is_empty());
    }

    #[test]
    fn test_fixed_width_strings() {
        assert_eq!(pack_16bits(0).len(), 3);
        assert_eq!(unpack_16bits(&pack_16bits(0xFFFF)).unwrap(), 0xFFFF);
        assert_eq!(unpack_32bits(&pack_32bits(0xDEAD_BEEF)).unwrap(), 0xDEAD_BEEF);
        assert_eq!(unpack_64bits(&pack_64bits(u64::MAX)).unwrap(), u64::MAX);
        // 3 chars can hold 18 bits, anything above 16 is rejected
        assert!(unpack_16bits("+++").is_err());
        assert!(unpack_16bits("AB").is_err());
    }

    #[test]
    fn test_72bits() {
        let s = pack_72bits(0x0123_4567_89AB_CDEF, 0x5A);
        assert_eq!(s.len(), 12);
        assert_eq!(unpack_72bits(&s).unwrap(), (0x0123_4567_89AB_CDEF, 0x5A));
    }

    #[test]
    fn test_restricted_alphabets() {
        assert_eq!(pack_5bits(0).unwrap(), 'A');
        assert_eq!(pack_5bits(31).unwrap(), '7');
        assert!(pack_5bits(32).is_err());
        assert_eq!(unpack_5bits('2').unwrap(), 26);
        assert!(unpack_5bits('1').is_err());
        assert_eq!(pack_6bits(63).unwrap(), '+');
        assert!(pack_6bits(64).is_err());
        assert_eq!(unpack_6bits('a').unwrap(), 36);
    }

    #[test]
    fn test_frame_string_requires_exact_length() {
        assert!(frame_to_string(&bitvec![u8, Msb0; 1; 71]).is_err());
        assert!(frame_from_string("ABC").is_err());
        assert!(frame_from_string("ABCDEFGHIJK!").is_err());
    }

    #[quickcheck]
    fn prop_frame_string_roundtrip(seed: Vec<bool>) -> bool {
        let mut bits: Codeword = seed.into_iter().collect();
        bits.resize(FRAME_BITS, false);
        let text = frame_to_string(&bits).unwrap();
        frame_from_string(&text).unwrap() == bits
    }

    #[quickcheck]
    fn prop_radix_roundtrip(value: u32) -> bool {
        let text = pack_radix(value as u64, 6, CHECKSUM_ALPHABET).unwrap();
        unpack_radix(&text, 6, CHECKSUM_ALPHABET).unwrap() == value as u64
    }
}
