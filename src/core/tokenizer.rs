//! The BPE tokenizer: special-token scanning, pre-tokenization, merging, and
//! decoding behind one façade.
//!
//! A [`BpeTokenizer`] is built from an immutable [`BpeParams`] record (shared
//! via `Arc` across instances) plus per-instance special-token policy. All
//! state is read-only after construction, so one instance can serve any
//! number of threads; the only synchronized piece is the LRU chunk cache.
//!
//! # Pipeline
//!
//! ```text
//! input -> special-token scan -> {text chunk | special token}*
//!            text chunk: splitter -> pre-tokens -> merge engine -> ids
//!            special token: fixed id
//!          -> concatenated ids
//! ```

use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use aho_corasick::{AhoCorasick, MatchKind};
use lru::LruCache;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use thiserror::Error;

use super::bpe::byte_pair_encode;
use super::pairs::PairTable;
use super::splitter::Splitter;
use super::trie::SerializedTrie;
use super::vocab::{self, VocabError};

/// Default capacity of the per-tokenizer chunk cache.
const DEFAULT_CACHE_SIZE: usize = 4096;

/// Errors surfaced by tokenizer construction, encoding and decoding.
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("unknown tokenizer encoding: {0}")]
    UnknownEncoding(String),
    #[error("invalid special token in allow list: {0}")]
    InvalidSpecialToken(String),
    #[error("unexpected special token found: {0}")]
    SpecialTokenEncountered(String),
    #[error("invalid token: {0}")]
    InvalidToken(u32),
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8,
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("special token matcher build error: {0}")]
    AhoCorasick(#[from] aho_corasick::BuildError),
}

/// The capability bundle every tokenizer exposes.
///
/// `encode`/`count`/`allowed` take `&str` for the common case;
/// `encode_bytes`/`decode_bytes` are the byte-exact entry points that let
/// arbitrary byte strings (including invalid UTF-8) round-trip.
pub trait Tokenizer: Send + Sync + std::fmt::Debug {
    /// Tokenizes `input`, applying the configured special-token policy.
    fn encode_bytes(&self, input: &[u8]) -> Result<Vec<u32>, TokenizerError>;

    /// Maps each token id back to its bytes and concatenates them.
    fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError>;

    /// String-input convenience over [`Tokenizer::encode_bytes`].
    fn encode(&self, input: &str) -> Result<Vec<u32>, TokenizerError> {
        self.encode_bytes(input.as_bytes())
    }

    /// Decodes to a string, failing if the bytes are not valid UTF-8.
    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        String::from_utf8(self.decode_bytes(tokens)?).map_err(|_| TokenizerError::InvalidUtf8)
    }

    /// Decodes to a string, substituting U+FFFD for invalid UTF-8.
    fn decode_lossy(&self, tokens: &[u32]) -> Result<String, TokenizerError> {
        Ok(String::from_utf8_lossy(&self.decode_bytes(tokens)?).into_owned())
    }

    /// Number of tokens `input` encodes to, or 0 if encoding fails. Callers
    /// that need to tell an error from genuinely empty input should use
    /// [`Tokenizer::encode`] or [`Tokenizer::allowed`] instead.
    fn count(&self, input: &str) -> usize {
        self.encode(input).map(|ids| ids.len()).unwrap_or(0)
    }

    /// Succeeds iff [`Tokenizer::encode`] would not fail with
    /// [`TokenizerError::SpecialTokenEncountered`] on this input.
    fn allowed(&self, input: &str) -> Result<(), TokenizerError> {
        self.encode(input).map(|_| ())
    }
}

/// Immutable per-encoding parameters: everything a [`BpeTokenizer`] needs
/// beyond its policy options. Created once per process and shared.
#[derive(Debug)]
pub struct BpeParams {
    name: String,
    splitter: Splitter,
    byte_to_token: [u32; 256],
    token_list: Vec<Vec<u8>>,
    trie: SerializedTrie,
    pairs: PairTable,
    special_tokens: FxHashMap<String, u32>,
}

impl BpeParams {
    /// Assembles parameters from pre-generated tables, e.g. data compiled in
    /// by an offline generator. `byte_pair_lookup` is the packed
    /// `(b1 << 28) | (b2 << 20) | id` word list; it is inflated into the
    /// dense 65,536-entry table here.
    pub fn from_tables(
        name: impl Into<String>,
        splitter: Splitter,
        byte_to_token: [u32; 256],
        token_list: Vec<Vec<u8>>,
        token_trie: Vec<u32>,
        byte_pair_lookup: &[u64],
        special_tokens: FxHashMap<String, u32>,
    ) -> Self {
        Self {
            name: name.into(),
            splitter,
            byte_to_token,
            token_list,
            trie: SerializedTrie::from_words(token_trie),
            pairs: PairTable::from_packed(byte_pair_lookup),
            special_tokens,
        }
    }

    /// Compiles parameters from tiktoken-format vocabulary data.
    pub fn from_tiktoken(
        name: impl Into<String>,
        splitter: Splitter,
        data: &[u8],
        special_tokens: FxHashMap<String, u32>,
    ) -> Result<Self, VocabError> {
        let tables = vocab::load_tiktoken(data)?;
        Ok(Self::from_tables(
            name,
            splitter,
            tables.byte_to_token,
            tables.token_list,
            tables.token_trie,
            &tables.byte_pair_lookup,
            special_tokens,
        ))
    }

    /// The encoding name, e.g. `"r50k_base"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of ids in the BPE vocabulary (special tokens not included).
    pub fn vocab_size(&self) -> usize {
        self.token_list.len()
    }

    /// The special-token table of this encoding.
    pub fn special_tokens(&self) -> &FxHashMap<String, u32> {
        &self.special_tokens
    }
}

/// A ready-to-use tokenizer: shared [`BpeParams`] plus special-token policy.
#[derive(Debug)]
pub struct BpeTokenizer {
    params: Arc<BpeParams>,
    allow_special_as_text: bool,
    allowed_special: FxHashSet<String>,
    decode_special_tokens: FxHashMap<u32, String>,
    special_matcher: Option<AhoCorasick>,
    special_token_strings: Vec<String>,
    chunk_cache: Mutex<LruCache<u64, Vec<u32>>>,
}

impl BpeTokenizer {
    /// Builds a tokenizer with the given special-token policy.
    ///
    /// With neither option set, any special-token literal in the input makes
    /// `encode` fail. Literals in `allowed_special` are emitted as their
    /// special ids; with `allow_special_as_text`, remaining literals take the
    /// ordinary text path instead of failing.
    ///
    /// Fails with [`TokenizerError::InvalidSpecialToken`] if the allow list
    /// names a literal the encoding does not define.
    pub fn new(
        params: Arc<BpeParams>,
        allow_special_as_text: bool,
        allowed_special: &[String],
    ) -> Result<Self, TokenizerError> {
        for literal in allowed_special {
            if !params.special_tokens.contains_key(literal) {
                return Err(TokenizerError::InvalidSpecialToken(literal.clone()));
            }
        }

        let decode_special_tokens: FxHashMap<u32, String> = params
            .special_tokens
            .iter()
            .map(|(literal, &id)| (id, literal.clone()))
            .collect();

        // Longest-leftmost, so overlapping literals resolve to the longest
        // one, matching the reference scanner.
        let special_token_strings: Vec<String> = params.special_tokens.keys().cloned().collect();
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(&special_token_strings)?,
            )
        };

        let cache_size = NonZeroUsize::new(DEFAULT_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            params,
            allow_special_as_text,
            allowed_special: allowed_special.iter().cloned().collect(),
            decode_special_tokens,
            special_matcher,
            special_token_strings,
            chunk_cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    /// The shared per-encoding parameters.
    pub fn params(&self) -> &BpeParams {
        &self.params
    }

    /// Encodes many inputs in parallel.
    pub fn encode_batch(&self, inputs: &[String]) -> Result<Vec<Vec<u32>>, TokenizerError> {
        inputs.par_iter().map(|input| self.encode(input)).collect()
    }

    /// Decodes many token lists in parallel.
    pub fn decode_batch(&self, token_lists: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        token_lists
            .par_iter()
            .map(|tokens| self.decode(tokens))
            .collect()
    }

    /// Drops all cached chunk encodings.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.chunk_cache.lock() {
            cache.clear();
        }
    }

    /// Number of chunk encodings currently cached.
    pub fn cache_len(&self) -> usize {
        self.chunk_cache
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }

    #[inline]
    fn hash_piece(piece: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        piece.hash(&mut hasher);
        hasher.finish()
    }

    /// Splits one text chunk and merges each pre-token.
    fn encode_text(&self, chunk: &[u8], output: &mut Vec<u32>) {
        for piece in self.params.splitter.split(chunk) {
            output.extend(self.encode_piece(piece));
        }
    }

    /// Merges one pre-token, consulting the chunk cache for anything the
    /// pair table cannot answer in O(1).
    fn encode_piece(&self, piece: &[u8]) -> Vec<u32> {
        let params = &*self.params;
        if piece.len() <= 2 {
            return byte_pair_encode(piece, &params.byte_to_token, &params.pairs, &params.trie);
        }

        let hash = Self::hash_piece(piece);
        if let Ok(mut cache) = self.chunk_cache.lock() {
            if let Some(hit) = cache.get(&hash) {
                return hit.clone();
            }
        }

        let ids = byte_pair_encode(piece, &params.byte_to_token, &params.pairs, &params.trie);
        if let Ok(mut cache) = self.chunk_cache.lock() {
            cache.put(hash, ids.clone());
        }
        ids
    }
}

impl Tokenizer for BpeTokenizer {
    fn encode_bytes(&self, input: &[u8]) -> Result<Vec<u32>, TokenizerError> {
        let mut output = Vec::new();
        let mut last_end = 0usize;
        if let Some(matcher) = &self.special_matcher {
            for m in matcher.find_iter(input) {
                let literal = &self.special_token_strings[m.pattern().as_usize()];
                if self.allowed_special.contains(literal.as_str()) {
                    if m.start() > last_end {
                        self.encode_text(&input[last_end..m.start()], &mut output);
                    }
                    output.push(self.params.special_tokens[literal]);
                    last_end = m.end();
                } else if self.allow_special_as_text {
                    // Not split out: the literal stays in the running text
                    // chunk and goes through the splitter like any other
                    // bytes.
                } else {
                    return Err(TokenizerError::SpecialTokenEncountered(literal.clone()));
                }
            }
        }
        if last_end < input.len() {
            self.encode_text(&input[last_end..], &mut output);
        }
        Ok(output)
    }

    fn decode_bytes(&self, tokens: &[u32]) -> Result<Vec<u8>, TokenizerError> {
        let mut output = Vec::with_capacity(tokens.len() * 4);
        for &id in tokens {
            match self.params.token_list.get(id as usize) {
                Some(bytes) if !bytes.is_empty() => output.extend_from_slice(bytes),
                _ => match self.decode_special_tokens.get(&id) {
                    Some(literal) => output.extend_from_slice(literal.as_bytes()),
                    None => return Err(TokenizerError::InvalidToken(id)),
                },
            }
        }
        Ok(output)
    }

    fn allowed(&self, input: &str) -> Result<(), TokenizerError> {
        if let Some(matcher) = &self.special_matcher {
            for m in matcher.find_iter(input.as_bytes()) {
                let literal = &self.special_token_strings[m.pattern().as_usize()];
                if !self.allowed_special.contains(literal.as_str()) && !self.allow_special_as_text
                {
                    return Err(TokenizerError::SpecialTokenEncountered(literal.clone()));
                }
            }
        }
        Ok(())
    }
}
