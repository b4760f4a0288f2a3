//! Core tokenization engine.
//!
//! The pipeline is assembled from small read-only pieces, listed here in
//! dependency order:
//!
//! - [`trie`]: the serialized vocabulary index, a flat-array byte trie
//! - [`pairs`]: the dense two-byte token table that seeds merging
//! - [`splitter`]: the hand-rolled pre-tokenizers (GPT-2 and CL100K rules)
//! - [`bpe`]: the ranked pair-merge engine
//! - [`vocab`]: tiktoken vocabulary parsing and table compilation
//! - [`tokenizer`]: the façade tying it all together, with special-token
//!   policy, an LRU chunk cache, and Rayon batch helpers

pub mod bpe;
pub mod pairs;
pub mod splitter;
pub mod tokenizer;
pub mod trie;
pub mod vocab;

pub use bpe::byte_pair_encode;
pub use pairs::PairTable;
pub use splitter::Splitter;
pub use tokenizer::{BpeParams, BpeTokenizer, Tokenizer, TokenizerError};
pub use trie::{SerializedTrie, TrieBuilder};
pub use vocab::{load_tiktoken, parse_tiktoken, VocabError, VocabTables};
