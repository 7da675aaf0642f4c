//! OpenHam Codecs - payload text compression
//!
//! Two codecs share the [`TextCodec`](text::TextCodec) interface: a greedy
//! dictionary compressor over a static ranked word table, and a canonical
//! Huffman coder used when the dictionary cannot represent the text.

pub mod cache;
pub mod dictionary;
pub mod error;
pub mod text;
pub mod wordlist;

pub use error::{CodecError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{
        dictionary::{DictionaryCodec, DictionaryEntry},
        error::{CodecError, Result},
        text::{sanitize, HuffmanCodec, PackedText, TextCodec, DATA_CHARSET},
    };
}
