//! The `r50k_base` encoding (GPT-2, GPT-3 and the older completion models).

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::splitter::Splitter;
use crate::core::tokenizer::{BpeParams, BpeTokenizer, TokenizerError};
use crate::core::vocab::VocabError;
use crate::registry::register_tokenizer;

pub const END_OF_TEXT: &str = "<|endoftext|>";

fn special_tokens() -> FxHashMap<String, u32> {
    let mut special = FxHashMap::default();
    special.insert(END_OF_TEXT.to_string(), 50256);
    special
}

/// Compiles `r50k_base` parameters from its tiktoken vocabulary data.
pub fn params(vocab: &[u8]) -> Result<Arc<BpeParams>, VocabError> {
    BpeParams::from_tiktoken("r50k_base", Splitter::Gpt2, vocab, special_tokens()).map(Arc::new)
}

/// Registers `r50k_base` with the process-wide registry.
pub fn register(vocab: &[u8]) -> Result<(), TokenizerError> {
    let params = params(vocab)?;
    register_tokenizer("r50k_base", move |options| {
        Ok(Box::new(BpeTokenizer::new(
            params.clone(),
            options.allow_special_as_text(),
            options.allowed_special_tokens(),
        )?))
    });
    Ok(())
}
