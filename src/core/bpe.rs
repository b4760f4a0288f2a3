//! The byte-pair merge engine.
//!
//! Given one pre-token (a short byte sequence), produces the token ids whose
//! decoded bytes concatenate back to it. The merge order is fixed by the
//! vocabulary: among all adjacent element pairs whose concatenated bytes form
//! a vocabulary entry, the pair with the lowest token id merges first,
//! leftmost on ties. Lower ids were learned earlier during training, so this
//! reproduces the reference merge sequence exactly.

use super::pairs::PairTable;
use super::trie::SerializedTrie;

/// Rank sentinel for "this adjacency is not a vocabulary entry".
const NO_RANK: u32 = u32::MAX;

/// One element of the working list: the byte span `start..(next element's
/// start)` of the pre-token, the token id it currently decodes to, and the
/// cached rank of the pair formed with the element to its right.
#[derive(Debug, Clone, Copy)]
struct Part {
    start: usize,
    token: u32,
    rank: u32,
}

/// Encodes one pre-token into token ids.
///
/// `bootstrap` maps each byte to its guaranteed single-byte token, `pairs`
/// answers 2-byte lookups in `O(1)`, and `trie` resolves longer candidate
/// spans. Never fails: every byte has a token.
pub fn byte_pair_encode(
    piece: &[u8],
    bootstrap: &[u32; 256],
    pairs: &PairTable,
    trie: &SerializedTrie,
) -> Vec<u32> {
    match piece.len() {
        0 => Vec::new(),
        1 => vec![bootstrap[usize::from(piece[0])]],
        2 => match pairs.rank(piece[0], piece[1]) {
            Some(id) => vec![id],
            None => vec![
                bootstrap[usize::from(piece[0])],
                bootstrap[usize::from(piece[1])],
            ],
        },
        _ => merge_ranked_pairs(piece, bootstrap, pairs, trie),
    }
}

fn merge_ranked_pairs(
    piece: &[u8],
    bootstrap: &[u32; 256],
    pairs: &PairTable,
    trie: &SerializedTrie,
) -> Vec<u32> {
    let n = piece.len();

    // One part per byte plus an end sentinel. The initial adjacencies are all
    // byte pairs, answered by the dense pair table without touching the trie.
    let mut parts: Vec<Part> = (0..=n)
        .map(|i| Part {
            start: i,
            token: if i < n {
                bootstrap[usize::from(piece[i])]
            } else {
                0
            },
            rank: NO_RANK,
        })
        .collect();
    for i in 0..n - 1 {
        parts[i].rank = pairs.rank(piece[i], piece[i + 1]).unwrap_or(NO_RANK);
    }

    loop {
        let mut best = NO_RANK;
        let mut best_at = 0usize;
        for (i, part) in parts.iter().enumerate() {
            // Leftmost lowest rank wins; the sentinel and last element always
            // carry NO_RANK.
            if part.rank < best {
                best = part.rank;
                best_at = i;
            }
        }
        if best == NO_RANK {
            break;
        }

        parts.remove(best_at + 1);
        parts[best_at].token = best;
        // Only the two adjacencies touching the merged element changed.
        parts[best_at].rank = adjacency_rank(piece, &parts, best_at, pairs, trie);
        if best_at > 0 {
            parts[best_at - 1].rank = adjacency_rank(piece, &parts, best_at - 1, pairs, trie);
        }
    }

    parts[..parts.len() - 1].iter().map(|p| p.token).collect()
}

/// Rank of the pair formed by elements `i` and `i + 1`, or `NO_RANK` if their
/// concatenated bytes are not a vocabulary entry (or `i + 1` is the sentinel).
fn adjacency_rank(
    piece: &[u8],
    parts: &[Part],
    i: usize,
    pairs: &PairTable,
    trie: &SerializedTrie,
) -> u32 {
    if i + 2 >= parts.len() {
        return NO_RANK;
    }
    let span = &piece[parts[i].start..parts[i + 2].start];
    let rank = if span.len() == 2 {
        pairs.rank(span[0], span[1])
    } else {
        trie.lookup(span)
    };
    rank.unwrap_or(NO_RANK)
}
