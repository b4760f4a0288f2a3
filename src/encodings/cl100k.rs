//! The `cl100k_base` encoding (GPT-3.5-turbo and GPT-4).

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
// im_start/im_end are documented in the tiktoken README but absent from the
// Python source.
pub const IM_START: &str = "<|im_start|>";
pub const IM_END: &str = "<|im_end|>";
pub const END_OF_PROMPT: &str = "<|endofprompt|>";

fn special_tokens() -> FxHashMap<String, u32> {
    let mut special = FxHashMap::default();
    special.insert(END_OF_TEXT.to_string(), 100257);
    special.insert(FIM_PREFIX.to_string(), 100258);
    special.insert(FIM_MIDDLE.to_string(), 100259);
    special.insert(FIM_SUFFIX.to_string(), 100260);
    special.insert(IM_START.to_string(), 100264);
    special.insert(IM_END.to_string(), 100265);
    special.insert(END_OF_PROMPT.to_string(), 100276);
    special
}

/// Compiles `cl100k_base` parameters from its tiktoken vocabulary data.
pub fn params(vocab: &[u8]) -> Result<Arc<BpeParams>, VocabError> {
    BpeParams::from_tiktoken("cl100k_base", Splitter::Cl100k, vocab, special_tokens())
        .map(Arc::new)
}

/// Registers `cl100k_base` with the process-wide registry.
pub fn register(vocab: &[u8]) -> Result<(), TokenizerError> {
    let params = params(vocab)?;
    register_tokenizer("cl100k_base", move |options| {
        Ok(Box::new(BpeTokenizer::new(
            params.clone(),
            options.allow_special_as_text(),
            options.allowed_special_tokens(),
        )?))
    });
    Ok(())
}
