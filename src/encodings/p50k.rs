//! The `p50k_base` and `p50k_edit` encodings (Codex and the edit models).
//!
//! Both share one vocabulary; `p50k_edit` additionally exposes the
//! fill-in-the-middle special tokens.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::splitter::Splitter;
use crate::core::tokenizer::{BpeParams, BpeTokenizer, TokenizerError};
use crate::core::vocab::VocabError;
use crate::registry::register_tokenizer;

pub const END_OF_TEXT: &str = "<|endoftext|>";
pub const FIM_PREFIX: &str = "<|fim_prefix|>";
pub const FIM_MIDDLE: &str = "<|fim_middle|>";
pub const FIM_SUFFIX: &str = "<|fim_suffix|>";

fn base_special_tokens() -> FxHashMap<String, u32> {
    let mut special = FxHashMap::default();
    special.insert(END_OF_TEXT.to_string(), 50256);
    special
}

fn edit_special_tokens() -> FxHashMap<String, u32> {
    let mut special = base_special_tokens();
    special.insert(FIM_PREFIX.to_string(), 50281);
    special.insert(FIM_MIDDLE.to_string(), 50282);
    special.insert(FIM_SUFFIX.to_string(), 50283);
    special
}

/// Compiles `p50k_base` parameters from its tiktoken vocabulary data.
pub fn params_base(vocab: &[u8]) -> Result<Arc<BpeParams>, VocabError> {
    BpeParams::from_tiktoken("p50k_base", Splitter::Gpt2, vocab, base_special_tokens())
        .map(Arc::new)
}

/// Compiles `p50k_edit` parameters from the shared vocabulary data.
pub fn params_edit(vocab: &[u8]) -> Result<Arc<BpeParams>, VocabError> {
    BpeParams::from_tiktoken("p50k_edit", Splitter::Gpt2, vocab, edit_special_tokens())
        .map(Arc::new)
}

/// Registers `p50k_base` and `p50k_edit` with the process-wide registry.
pub fn register(vocab: &[u8]) -> Result<(), TokenizerError> {
    let base = params_base(vocab)?;
    register_tokenizer("p50k_base", move |options| {
        Ok(Box::new(BpeTokenizer::new(
            base.clone(),
            options.allow_special_as_text(),
            options.allowed_special_tokens(),
        )?))
    });

    let edit = params_edit(vocab)?;
    register_tokenizer("p50k_edit", move |options| {
        Ok(Box::new(BpeTokenizer::new(
            edit.clone(),
            options.allow_special_as_text(),
            options.allowed_special_tokens(),
        )?))
    });
    Ok(())
}
