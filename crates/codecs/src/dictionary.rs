//! Greedy dictionary word compressor
//!
//! Text is split on single spaces and every word is consumed greedily by
//! prefix matches against the ranked table in [`crate::wordlist`]. Each match
//! becomes a variable-length codeword:
//!
//! ```text
//! [high digit]* [low digit][sep]
//!  4 bits >= 7   4 bits < 7  1 bit
//! ```
//!
//! High digits are radix `9` (stored as `digit + 7`), the low digit is radix
//! `7`. The separator bit stands for a following space so word breaks cost a
//! single bit.

use std::collections::HashMap;
use std::sync::Mutex;

use openham_core::bits::{int_to_bits, BitReader, Bits, Codeword};
use tracing::debug;

use crate::cache::{LookupCache, DEFAULT_CAPACITY};
use crate::text::{PackedText, TextCodec};
use crate::wordlist::WORDS;
use crate::{CodecError, Result};

/// Width of one codeword digit
pub const DIGIT_BITS: usize = 4;

/// Number of digit values reserved for the low (terminating) digit
pub const SHORT_CODES: u32 = 7;

/// Radix of the high digits
pub const HIGH_RADIX: u32 = (1 << DIGIT_BITS) - SHORT_CODES;

/// Longest run of high digits accepted while decoding
const MAX_HIGH_DIGITS: usize = 6;

/// One word of the static table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub word: &'static str,
    pub len: usize,
    pub rank: u32,
}

/// Dictionary codec over a static ranked word table
pub struct DictionaryCodec {
    words: &'static [&'static str],
    index: HashMap<char, Vec<DictionaryEntry>>,
    /// First rank of the codewords with `k` high digits
    base: [u64; MAX_HIGH_DIGITS + 1],
    cache: Mutex<LookupCache<String, Option<DictionaryEntry>>>,
}

impl DictionaryCodec {
    /// Codec over the built-in word table
    pub fn new() -> Self {
        Self::with_words(WORDS, DEFAULT_CAPACITY)
    }

    /// Codec over a custom ranked table with the given lookup cache size
    pub fn with_words(words: &'static [&'static str], cache_capacity: usize) -> Self {
        let mut index: HashMap<char, Vec<DictionaryEntry>> = HashMap::new();
        for (rank, &word) in words.iter().enumerate() {
            let Some(first) = word.chars().next() else {
                continue;
            };
            index.entry(first).or_default().push(DictionaryEntry {
                word,
                len: word.len(),
                rank: rank as u32,
            });
        }
        // descending order puts extensions ahead of their prefixes
        for bucket in index.values_mut() {
            bucket.sort_by(|a, b| b.word.cmp(a.word));
        }

        let mut base = [0u64; MAX_HIGH_DIGITS + 1];
        let mut span = SHORT_CODES as u64;
        for k in 1..base.len() {
            base[k] = base[k - 1] + span;
            span *= HIGH_RADIX as u64;
        }

        Self {
            words,
            index,
            base,
            cache: Mutex::new(LookupCache::new(cache_capacity)),
        }
    }

    /// Number of words in the table
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn entry(&self, rank: u32) -> Option<DictionaryEntry> {
        self.words.get(rank as usize).map(|&word| DictionaryEntry {
            word,
            len: word.len(),
            rank,
        })
    }

    /// First table entry (in descending lexical order) that prefixes `text`
    pub fn lookup(&self, text: &str) -> Option<DictionaryEntry> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(text) {
                return hit;
            }
        }

        let found = text.chars().next().and_then(|first| {
            self.index
                .get(&first)?
                .iter()
                .find(|entry| text.starts_with(entry.word))
                .copied()
        });

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(text.to_string(), found);
        }
        found
    }

    /// `(hits, misses)` of the lookup cache
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.lock().map(|c| c.stats()).unwrap_or((0, 0))
    }

    /// Build the codeword for `rank`, optionally flagging a following space
    pub fn encode_rank(rank: u32, separate: bool) -> Codeword {
        let mut high = Vec::new();
        let mut x = rank / SHORT_CODES;
        while x > 0 {
            x -= 1;
            high.push(x % HIGH_RADIX + SHORT_CODES);
            x /= HIGH_RADIX;
        }

        let mut bits = Codeword::with_capacity((high.len() + 1) * DIGIT_BITS + 1);
        for &digit in high.iter().rev() {
            bits.extend_from_bitslice(&int_to_bits(digit as u64, DIGIT_BITS));
        }
        let low = ((rank % SHORT_CODES) << 1) | separate as u32;
        bits.extend_from_bitslice(&int_to_bits(low as u64, DIGIT_BITS + 1));
        bits
    }

    /// Lazily compress `text` into `(codeword, consumed)` pairs
    ///
    /// The iterator ends after yielding a [`CodecError::LookupMiss`] for the
    /// first part of the text the table cannot represent.
    pub fn compress_iter<'a>(&'a self, text: &'a str) -> CompressIter<'a> {
        let mut parts = Vec::new();
        let mut start = 0;
        for part in text.split(' ') {
            parts.push((start, part));
            start += part.len() + 1;
        }
        CompressIter {
            codec: self,
            parts,
            part: 0,
            offset: 0,
            done: false,
        }
    }

    pub fn compress(&self, text: &str) -> Result<Vec<(Codeword, usize)>> {
        self.compress_iter(text).collect()
    }

    /// Decode a run of codewords
    ///
    /// Decoding stops quietly at a partial codeword or a rank outside the table.
    pub fn decompress(&self, bits: &Bits) -> String {
        let mut out = String::new();
        let mut reader = BitReader::new(bits);
        while let Some((rank, separate)) = self.read_codeword(&mut reader) {
            let Some(word) = self.words.get(rank as usize) else {
                debug!("dictionary rank {} outside table, stopping", rank);
                break;
            };
            out.push_str(word);
            if separate {
                out.push(' ');
            }
        }
        out
    }

    fn read_codeword(&self, reader: &mut BitReader<'_>) -> Option<(u64, bool)> {
        let mut high: u64 = 0;
        let mut count = 0;
        loop {
            let digit = reader.read(DIGIT_BITS).ok()? as u32;
            if digit < SHORT_CODES {
                let separate = reader.read(1).ok()? == 1;
                let rank = self.base[count] + high * SHORT_CODES as u64 + digit as u64;
                return Some((rank, separate));
            }
            count += 1;
            if count > MAX_HIGH_DIGITS {
                return None;
            }
            high = high * HIGH_RADIX as u64 + (digit - SHORT_CODES) as u64;
        }
    }
}

impl Default for DictionaryCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DictionaryCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DictionaryCodec")
            .field("words", &self.words.len())
            .field("buckets", &self.index.len())
            .finish()
    }
}

/// Iterator returned by [`DictionaryCodec::compress_iter`]
pub struct CompressIter<'a> {
    codec: &'a DictionaryCodec,
    /// `(byte position, word)` for every space-separated part
    parts: Vec<(usize, &'a str)>,
    part: usize,
    offset: usize,
    done: bool,
}

impl Iterator for CompressIter<'_> {
    type Item = Result<(Codeword, usize)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(&(start, word)) = self.parts.get(self.part) else {
            self.done = true;
            return None;
        };
        let is_final = self.part + 1 == self.parts.len();

        if word.is_empty() {
            self.part += 1;
            if is_final {
                self.done = true;
                return None;
            }
            return Some(match self.codec.lookup(" ") {
                Some(entry) => Ok((DictionaryCodec::encode_rank(entry.rank, false), 1)),
                None => {
                    self.done = true;
                    Err(CodecError::LookupMiss {
                        position: start,
                        word: " ".to_string(),
                    })
                }
            });
        }

        let rest = &word[self.offset..];
        match self.codec.lookup(rest) {
            Some(entry) => {
                self.offset += entry.len;
                let word_done = self.offset >= word.len();
                let separate = word_done && !is_final;
                if word_done {
                    self.part += 1;
                    self.offset = 0;
                }
                let bits = DictionaryCodec::encode_rank(entry.rank, separate);
                Some(Ok((bits, entry.len + separate as usize)))
            }
            None => {
                self.done = true;
                Some(Err(CodecError::LookupMiss {
                    position: start + self.offset,
                    word: rest.to_string(),
                }))
            }
        }
    }
}

impl TextCodec for DictionaryCodec {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn pack(&self, text: &str, budget: usize) -> PackedText {
        let mut packed = PackedText::default();
        for item in self.compress_iter(text) {
            let Ok((bits, consumed)) = item else {
                break;
            };
            if packed.bits.len() + bits.len() > budget {
                break;
            }
            packed.bits.extend_from_bitslice(&bits);
            packed.consumed += consumed;
        }
        packed
    }

    fn unpack(&self, bits: &Bits) -> Result<String> {
        Ok(self.decompress(bits))
    }
}

/// Encode a whole text, for callers that want a single codeword
pub fn compress_to_bits(codec: &DictionaryCodec, text: &str) -> Result<Codeword> {
    let mut bits = Codeword::new();
    for item in codec.compress_iter(text) {
        let (codeword, _) = item?;
        bits.extend_from_bitslice(&codeword);
    }
    Ok(bits)
}
