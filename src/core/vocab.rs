//! Vocabulary loading for the tiktoken BPE format.
//!
//! Each line of a `.tiktoken` file is a base64-encoded token followed by a
//! space and its integer rank:
//!
//! ```text
//! SGVsbG8= 0
//! V29ybGQ= 1
//! IQ== 2
//! ```
//!
//! Lower ranks merge first. This module parses that format and compiles it
//! into the read-only tables the tokenizer runs on: the dense id -> bytes
//! list, the byte -> token bootstrap map, the serialized trie, and the packed
//! two-byte pair list. An offline generator producing the same tables as
//! static data can bypass this module entirely via
//! [`BpeParams::from_tables`](super::tokenizer::BpeParams::from_tables).

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use super::pairs::PairTable;
use super::trie::TrieBuilder;

/// Errors raised while parsing or compiling vocabulary data.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("vocabulary line {line}: {source}")]
    Base64 {
        line: usize,
        #[source]
        source: base64::DecodeError,
    },
    #[error("vocabulary line {0}: expected `<base64-token> <decimal-rank>`")]
    MalformedLine(usize),
    #[error("byte 0x{0:02x} has no single-byte token")]
    MissingByteToken(u8),
    #[error("single-byte token for 0x{byte:02x} has rank {rank}, expected < 256")]
    ByteTokenRank { byte: u8, rank: u32 },
    #[error("rank {0} is assigned to more than one token")]
    DuplicateRank(u32),
}

/// Compiled per-encoding lookup tables, in the interchange layout.
#[derive(Debug, Clone)]
pub struct VocabTables {
    /// Bootstrap map: byte value -> its single-byte token id.
    pub byte_to_token: [u32; 256],
    /// Dense decoder list: token id -> bytes. Unassigned ranks are empty.
    pub token_list: Vec<Vec<u8>>,
    /// Serialized trie words (see [`super::trie`] for the layout).
    pub token_trie: Vec<u32>,
    /// Sorted packed `(b1 << 28) | (b2 << 20) | id` words, one per 2-byte
    /// token.
    pub byte_pair_lookup: Vec<u64>,
}

/// Parses tiktoken-format vocabulary data into `(bytes, rank)` entries.
///
/// Blank lines are skipped and a trailing `\r` per line is tolerated; errors
/// carry the offending 1-based line number.
pub fn parse_tiktoken(data: &[u8]) -> Result<Vec<(Vec<u8>, u32)>, VocabError> {
    let mut entries = Vec::new();
    for (index, raw) in data.split(|&b| b == b'\n').enumerate() {
        let line = raw.strip_suffix(b"\r").unwrap_or(raw);
        if !line.is_empty() {
            entries.push(parse_line(line, index + 1)?);
        }
    }
    Ok(entries)
}

/// Parses one `<base64-token> <decimal-rank>` line.
fn parse_line(line: &[u8], number: usize) -> Result<(Vec<u8>, u32), VocabError> {
    let space = line
        .iter()
        .position(|&b| b == b' ')
        .ok_or(VocabError::MalformedLine(number))?;
    let token = STANDARD
        .decode(&line[..space])
        .map_err(|source| VocabError::Base64 {
            line: number,
            source,
        })?;

    let digits = &line[space + 1..];
    if digits.is_empty() {
        return Err(VocabError::MalformedLine(number));
    }
    let mut rank = 0u32;
    for &digit in digits {
        if !digit.is_ascii_digit() {
            return Err(VocabError::MalformedLine(number));
        }
        rank = rank
            .checked_mul(10)
            .and_then(|rank| rank.checked_add(u32::from(digit - b'0')))
            .ok_or(VocabError::MalformedLine(number))?;
    }
    Ok((token, rank))
}

/// Compiles parsed vocabulary entries into the runtime tables.
///
/// Every byte value must be covered by a single-byte token with rank below
/// 256; that guarantee is what lets the merge engine bootstrap any input.
pub fn build_tables(entries: &[(Vec<u8>, u32)]) -> Result<VocabTables, VocabError> {
    let size = entries.iter().map(|(_, rank)| rank + 1).max().unwrap_or(0);
    let mut token_list = vec![Vec::new(); size as usize];
    for (token, rank) in entries {
        let slot = &mut token_list[*rank as usize];
        if !slot.is_empty() {
            return Err(VocabError::DuplicateRank(*rank));
        }
        if let [byte] = token.as_slice() {
            if *rank >= 256 {
                return Err(VocabError::ByteTokenRank {
                    byte: *byte,
                    rank: *rank,
                });
            }
        }
        *slot = token.clone();
    }

    let mut byte_to_token = [u32::MAX; 256];
    for (id, token) in token_list.iter().enumerate() {
        if let [byte] = token.as_slice() {
            byte_to_token[usize::from(*byte)] = id as u32;
        }
    }
    if let Some(byte) = byte_to_token.iter().position(|&id| id == u32::MAX) {
        return Err(VocabError::MissingByteToken(byte as u8));
    }

    let mut builder = TrieBuilder::new();
    for (id, token) in token_list.iter().enumerate() {
        if !token.is_empty() {
            builder.insert(token, id as u32);
        }
    }

    let mut byte_pair_lookup = Vec::new();
    for (id, token) in token_list.iter().enumerate() {
        if let [b1, b2] = token.as_slice() {
            byte_pair_lookup.push(PairTable::pack(*b1, *b2, id as u32));
        }
    }
    byte_pair_lookup.sort_unstable();

    Ok(VocabTables {
        byte_to_token,
        token_list,
        token_trie: builder.serialize(),
        byte_pair_lookup,
    })
}

/// Parses and compiles in one step.
pub fn load_tiktoken(data: &[u8]) -> Result<VocabTables, VocabError> {
    build_tables(&parse_tiktoken(data)?)
}
