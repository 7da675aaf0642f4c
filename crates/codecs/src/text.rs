//! Text codec interface and the canonical Huffman fallback

use crate::{CodecError, Result};
use openham_core::bits::{Bits, Codeword};
use std::collections::HashMap;

/// Characters that may appear in a data payload
pub const DATA_CHARSET: &str = " ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789.,?/-+:!'\"()@&=#<>;*$%";

/// Normalize user text to the data charset
///
/// Letters are uppercased, line breaks and tabs become spaces, anything else
/// outside [`DATA_CHARSET`] is dropped and the result is trimmed.
pub fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            c => c.to_ascii_uppercase(),
        })
        .filter(|c| DATA_CHARSET.contains(*c))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Result of packing as much text as fits into a bit budget
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackedText {
    pub bits: Codeword,
    /// Number of bytes of the input represented by `bits`
    pub consumed: usize,
}

impl PackedText {
    pub fn is_empty(&self) -> bool {
        self.consumed == 0
    }
}

/// Generic payload text codec
pub trait TextCodec: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Pack a prefix of `text` into at most `budget` bits
    ///
    /// Packing stops at the first unit the codec cannot represent or when the
    /// next unit would exceed the budget.
    fn pack(&self, text: &str, budget: usize) -> PackedText;

    /// Decode bits produced by [`pack`](Self::pack)
    fn unpack(&self, bits: &Bits) -> Result<String>;
}

/// Huffman coding implementation for payload text
///
/// Codes are canonical and built once from a fixed English frequency table
/// covering exactly [`DATA_CHARSET`].
#[derive(Debug, Clone)]
pub struct HuffmanCodec {
    encode_table: HashMap<char, Codeword>,
    decode_tree: DecodeNode,
}

#[derive(Debug, Clone, Default)]
struct DecodeNode {
    character: Option<char>,
    left: Option<Box<DecodeNode>>,
    right: Option<Box<DecodeNode>>,
}

impl HuffmanCodec {
    /// Create a new Huffman codec with the English frequency table
    pub fn new() -> Self {
        let mut codec = Self {
            encode_table: HashMap::new(),
            decode_tree: DecodeNode::default(),
        };
        codec.build_codes_from_frequencies(english_frequencies());
        codec
    }

    /// Code assigned to `ch`, if it is in the charset
    pub fn code(&self, ch: char) -> Option<&Codeword> {
        self.encode_table.get(&ch)
    }

    /// Build canonical Huffman codes from a (char, weight) list
    fn build_codes_from_frequencies(&mut self, freqs: Vec<(char, u32)>) {
        use std::cmp::Ordering;
        use std::collections::BinaryHeap;

        struct Node {
            symbol: Option<char>,
            left: Option<Box<Node>>,
            right: Option<Box<Node>>,
        }

        // (weight, tie-breaker, node)
        struct HeapItem(u32, usize, Box<Node>);

        impl PartialEq for HeapItem {
            fn eq(&self, other: &Self) -> bool {
                self.0 == other.0 && self.1 == other.1
            }
        }
        impl Eq for HeapItem {}
        impl Ord for HeapItem {
            fn cmp(&self, other: &Self) -> Ordering {
                // min-heap on weight
                other.0.cmp(&self.0).then_with(|| other.1.cmp(&self.1))
            }
        }
        impl PartialOrd for HeapItem {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
                Some(self.cmp(other))
            }
        }

        let mut heap: BinaryHeap<HeapItem> = BinaryHeap::new();
        let mut counter: usize = 0;
        for (ch, w) in freqs.into_iter().filter(|&(_, w)| w > 0) {
            counter += 1;
            let leaf = Box::new(Node {
                symbol: Some(ch),
                left: None,
                right: None,
            });
            heap.push(HeapItem(w, counter, leaf));
        }

        while heap.len() > 1 {
            let (Some(HeapItem(w1, _, n1)), Some(HeapItem(w2, _, n2))) = (heap.pop(), heap.pop())
            else {
                break;
            };
            counter += 1;
            let merged = Box::new(Node {
                symbol: None,
                left: Some(n1),
                right: Some(n2),
            });
            heap.push(HeapItem(w1 + w2, counter, merged));
        }
        let Some(HeapItem(_, _, root)) = heap.pop() else {
            return;
        };

        fn depths(node: &Node, depth: usize, out: &mut Vec<(char, usize)>) {
            if let Some(ch) = node.symbol {
                out.push((ch, depth.max(1)));
                return;
            }
            for child in [&node.left, &node.right].into_iter().flatten() {
                depths(child, depth + 1, out);
            }
        }
        let mut lengths = Vec::new();
        depths(&root, 0, &mut lengths);

        // canonical order: (length, symbol)
        lengths.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        self.encode_table.clear();
        let mut code_val: u32 = 0;
        let mut prev_len = lengths.first().map(|x| x.1).unwrap_or(1);
        for (ch, len) in lengths {
            if len > prev_len {
                code_val <<= (len - prev_len) as u32;
            }
            let bits: Codeword = (0..len).rev().map(|i| (code_val >> i) & 1 == 1).collect();
            self.encode_table.insert(ch, bits);
            code_val += 1;
            prev_len = len;
        }

        self.build_decode_tree();
    }

    fn build_decode_tree(&mut self) {
        self.decode_tree = DecodeNode::default();
        for (ch, bits) in &self.encode_table {
            let mut current = &mut self.decode_tree;
            for bit in bits.iter().by_vals() {
                let next = if bit { &mut current.right } else { &mut current.left };
                current = next.get_or_insert_with(Box::default).as_mut();
            }
            current.character = Some(*ch);
        }
    }
}

impl Default for HuffmanCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl TextCodec for HuffmanCodec {
    fn name(&self) -> &'static str {
        "huffman"
    }

    fn pack(&self, text: &str, budget: usize) -> PackedText {
        let mut packed = PackedText::default();
        for ch in text.chars() {
            let Some(code) = self.encode_table.get(&ch) else {
                break;
            };
            if packed.bits.len() + code.len() > budget {
                break;
            }
            packed.bits.extend_from_bitslice(code);
            packed.consumed += ch.len_utf8();
        }
        packed
    }

    fn unpack(&self, bits: &Bits) -> Result<String> {
        let mut result = String::new();
        let mut current = &self.decode_tree;

        for bit in bits.iter().by_vals() {
            let next = if bit { &current.right } else { &current.left };
            current = next.as_deref().ok_or_else(|| CodecError::DecodingFailed {
                msg: "Invalid bit sequence".to_string(),
            })?;
            if let Some(ch) = current.character {
                result.push(ch);
                current = &self.decode_tree;
            }
        }

        if !std::ptr::eq(current, &self.decode_tree) {
            return Err(CodecError::DecodingFailed {
                msg: "Truncated code at end of payload".to_string(),
            });
        }
        Ok(result)
    }
}

/// Approximate English frequencies scaled to integers, higher means shorter code
fn english_frequencies() -> Vec<(char, u32)> {
    let mut freqs: Vec<(char, u32)> = vec![(' ', 700)];

    let letter_freqs: [(char, u32); 26] = [
        ('E', 120), ('T', 90), ('A', 81), ('O', 75), ('I', 70), ('N', 67),
        ('S', 63), ('H', 61), ('R', 60), ('D', 43), ('L', 40), ('C', 28),
        ('U', 28), ('M', 24), ('W', 24), ('F', 22), ('G', 20), ('Y', 20),
        ('P', 19), ('B', 15), ('V', 10), ('K', 8), ('J', 2), ('X', 2),
        ('Q', 1), ('Z', 1),
    ];
    freqs.extend(letter_freqs);

    // callsigns and reports make digits more common than in prose
    freqs.extend(('0'..='9').map(|d| (d, 12)));

    freqs.extend([
        ('.', 12), (',', 10), ('?', 8), ('/', 6), ('-', 7), ('+', 3),
        (':', 5), ('!', 4), ('\'', 4), ('"', 2), ('(', 2), (')', 2),
        ('@', 3), ('&', 1), ('=', 2), ('#', 1), ('<', 1), ('>', 2),
        (';', 1), ('*', 1), ('$', 1), ('%', 1),
    ]);
    freqs
}
