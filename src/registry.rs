//! Process-wide registry of tokenizer encodings.
//!
//! Encodings register a factory under their name (typically once, near
//! process start, via the `encodings` modules' `register` functions) and
//! callers obtain configured tokenizers through [`get_tokenizer`]. The
//! registry is a reader-writer-locked map: registration happens during
//! startup, reads dominate afterwards.

use std::sync::{Arc, LazyLock, RwLock};

use rustc_hash::FxHashMap;

use crate::core::tokenizer::{Tokenizer, TokenizerError};

/// A factory producing a configured tokenizer for one encoding.
pub type TokenizerFactory =
    Arc<dyn Fn(&TokenizerOptions) -> Result<Box<dyn Tokenizer>, TokenizerError> + Send + Sync>;

static REGISTRY: LazyLock<RwLock<FxHashMap<String, TokenizerFactory>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

/// Special-token policy options for [`get_tokenizer`].
///
/// The default forbids special-token literals in input entirely: any
/// occurrence makes `encode` fail. Use [`with_special_tokens_as_text`] to
/// encode them as ordinary text, or [`with_special_tokens`] to emit listed
/// literals as their special ids (only for trusted input).
///
/// [`with_special_tokens_as_text`]: TokenizerOptions::with_special_tokens_as_text
/// [`with_special_tokens`]: TokenizerOptions::with_special_tokens
#[derive(Debug, Clone, Default)]
pub struct TokenizerOptions {
    allow_special_as_text: bool,
    allowed_special_tokens: Vec<String>,
}

impl TokenizerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat special-token literals as plain text instead of failing.
    pub fn with_special_tokens_as_text(mut self) -> Self {
        self.allow_special_as_text = true;
        self
    }

    /// Encode the listed literals to their special token ids.
    pub fn with_special_tokens<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_special_tokens
            .extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn allow_special_as_text(&self) -> bool {
        self.allow_special_as_text
    }

    pub fn allowed_special_tokens(&self) -> &[String] {
        &self.allowed_special_tokens
    }
}

/// Returns a tokenizer for the named encoding, configured per `options`.
///
/// Fails with [`TokenizerError::UnknownEncoding`] if nothing is registered
/// under `name`, or with whatever error the encoding's factory raises (e.g.
/// an invalid special-token allow list).
pub fn get_tokenizer(
    name: &str,
    options: &TokenizerOptions,
) -> Result<Box<dyn Tokenizer>, TokenizerError> {
    let factory = {
        let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
        registry.get(name).cloned()
    };
    match factory {
        Some(factory) => factory(options),
        None => Err(TokenizerError::UnknownEncoding(name.to_string())),
    }
}

/// Registers a tokenizer factory under `name`, replacing any previous one.
pub fn register_tokenizer<F>(name: &str, factory: F)
where
    F: Fn(&TokenizerOptions) -> Result<Box<dyn Tokenizer>, TokenizerError> + Send + Sync + 'static,
{
    let mut registry = REGISTRY.write().unwrap_or_else(|e| e.into_inner());
    registry.insert(name.to_string(), Arc::new(factory));
}

/// All registered encoding names, sorted. These are the valid inputs to
/// [`get_tokenizer`].
pub fn list_tokenizers() -> Vec<String> {
    let registry = REGISTRY.read().unwrap_or_else(|e| e.into_inner());
    let mut names: Vec<String> = registry.keys().cloned().collect();
    names.sort_unstable();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A mock tokenizer that maps each code point to its scalar value,
    /// ignoring all policy.
    #[derive(Debug)]
    struct CharTokenizer;

    impl Tokenizer for CharTokenizer {
        fn encode_bytes(&self, input: &[u8]) -> Result<Vec<u32>, TokenizerError> {
            Ok(String::from_utf8_lossy(input)
                .chars()
                .map(|c| c as u32)
                .collect())
        }

        fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError> {
            let mut out = Vec::new();
            for &id in tokens {
                let c = char::from_u32(id).ok_or(TokenizerError::InvalidToken(id))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Ok(out)
        }
    }

    fn register_chars() {
        register_tokenizer("chars", |_options| Ok(Box::new(CharTokenizer)));
    }

    #[test]
    fn registered_names_resolve() {
        register_chars();
        let tok = get_tokenizer("chars", &TokenizerOptions::new()).unwrap();
        assert_eq!(tok.encode("héllo").unwrap(), vec![104, 233, 108, 108, 111]);
        assert_eq!(tok.count("héllo"), 5);
        assert_eq!(tok.decode(&[104, 105]).unwrap(), "hi");
    }

    #[test]
    fn unknown_names_fail() {
        let err = get_tokenizer("does_not_exist", &TokenizerOptions::new()).unwrap_err();
        assert!(matches!(err, TokenizerError::UnknownEncoding(name) if name == "does_not_exist"));
    }

    #[test]
    fn listing_includes_registrations() {
        register_chars();
        assert!(list_tokenizers().contains(&"chars".to_string()));
    }

    #[test]
    fn options_accumulate() {
        let options = TokenizerOptions::new()
            .with_special_tokens_as_text()
            .with_special_tokens(["<|foo|>"])
            .with_special_tokens(["<|bar|>".to_string()]);
        assert!(options.allow_special_as_text());
        assert_eq!(
            options.allowed_special_tokens(),
            ["<|foo|>".to_string(), "<|bar|>".to_string()]
        );
    }
}
