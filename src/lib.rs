//! bytetok: an offline, in-process BPE tokenizer compatible with the OpenAI
//! `r50k_base`, `p50k_base`, `p50k_edit` and `cl100k_base` encodings.
//!
//! Text is converted to token ids (and back) entirely in memory: no network,
//! no files, no threads beyond what the caller brings. Typical uses are
//! counting tokens for request sizing and pre-tokenizing prompts before
//! submission to a model service.
//!
//! # Usage
//!
//! Register the encodings you need once, near process start, passing each
//! its tiktoken-format vocabulary data (e.g. embedded with
//! `include_bytes!`), then resolve tokenizers by name:
//!
//! ```no_run
//! use bytetok::{encodings, get_tokenizer, Tokenizer, TokenizerOptions};
//!
//! # fn main() -> Result<(), bytetok::TokenizerError> {
//! # let r50k_vocab: &[u8] = &[];
//! encodings::r50k::register(r50k_vocab)?;
//!
//! let tok = get_tokenizer("r50k_base", &TokenizerOptions::new())?;
//! let ids = tok.encode("a a")?;
//! assert_eq!(tok.decode(&ids)?, "a a");
//! assert_eq!(tok.count("a a"), ids.len());
//! # Ok(())
//! # }
//! ```
//!
//! By default any special-token literal (like `<|endoftext|>`) in the input
//! makes `encode` fail; see [`TokenizerOptions`] for the allow-as-text and
//! allow-list policies.
//!
//! Tokenizer instances are immutable after construction and safe to share
//! across threads. [`BpeTokenizer`] additionally offers Rayon-parallel
//! `encode_batch`/`decode_batch` helpers.

pub mod core;
pub mod encodings;
mod registry;

pub use crate::core::tokenizer::{BpeParams, BpeTokenizer, Tokenizer, TokenizerError};
pub use crate::core::vocab::VocabError;
pub use crate::core::Splitter;
pub use registry::{
    get_tokenizer, list_tokenizers, register_tokenizer, TokenizerFactory, TokenizerOptions,
};
