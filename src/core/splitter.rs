//! Pre-tokenization: segmenting input bytes into BPE-sized substrings.
//!
//! Two rule sets exist, each equivalent to the reference regex of the
//! encodings that use it:
//!
//! - [`Splitter::Gpt2`] (`r50k_base`, `p50k_base`, `p50k_edit`):
//!   `'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+`
//! - [`Splitter::Cl100k`] (`cl100k_base`):
//!   `(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+`
//!
//! Both are implemented as hand-rolled state machines that produce one match
//! per call; the outer loop advances by the match length until the buffer is
//! consumed. Every call on non-empty input matches at least one byte, and the
//! concatenation of all matches equals the input exactly.
//!
//! Invalid UTF-8 is classified as U+FFFD but advances one byte, not one code
//! point, so arbitrary byte strings survive a split/merge/decode round trip.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Placeholder for broken UTF-8 code points.
const REPLACEMENT: char = '\u{fffd}';

/// Choice of pre-tokenization rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Splitter {
    /// GPT-2 style rules, used by `r50k_base`, `p50k_base` and `p50k_edit`.
    Gpt2,
    /// Rules used by `cl100k_base`.
    Cl100k,
}

impl Splitter {
    /// Splits `input` into non-overlapping substrings covering all of it.
    pub fn split<'a>(&self, input: &'a [u8]) -> Vec<&'a [u8]> {
        let mut pos = 0;
        let mut matches = Vec::with_capacity(input.len() / 4);
        while pos < input.len() {
            let len = self.match_len(&input[pos..]);
            matches.push(&input[pos..pos + len]);
            pos += len;
        }
        matches
    }

    /// Length in bytes of the next match at the start of `input`. Returns at
    /// least 1 for non-empty input.
    pub(crate) fn match_len(&self, input: &[u8]) -> usize {
        match self {
            Splitter::Gpt2 => gpt2_match_len(input),
            Splitter::Cl100k => cl100k_match_len(input),
        }
    }
}

/// `\p{L}`: the five Letter general categories. `char::is_alphabetic` is the
/// wider Alphabetic property (it also covers combining vowel signs and the
/// like), which would merge marks into letter runs and diverge from the
/// reference splits.
fn is_letter(c: char) -> bool {
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
    )
}

/// `\p{N}`: `char::is_numeric` covers exactly Nd, Nl and No.
fn is_number(c: char) -> bool {
    c.is_numeric()
}

/// `\s`: the White_Space property.
fn is_space(c: char) -> bool {
    c.is_whitespace()
}

/// Decodes the first code point of `input`.
///
/// Returns `(REPLACEMENT, 1)` for any invalid sequence (stray continuation,
/// overlong form, surrogate, out-of-range, or truncation) and
/// `(REPLACEMENT, 0)` at end of input, mirroring the reference decoder the
/// splitters were written against.
fn decode_char(input: &[u8]) -> (char, usize) {
    let b0 = match input.first() {
        Some(&b) => b,
        None => return (REPLACEMENT, 0),
    };
    if b0 < 0x80 {
        return (char::from(b0), 1);
    }
    // Accepted ranges for the second byte; the E0/ED/F0/F4 rows exclude
    // overlong forms, surrogates, and code points past U+10FFFF.
    let (len, lo, hi) = match b0 {
        0xc2..=0xdf => (2, 0x80, 0xbf),
        0xe0 => (3, 0xa0, 0xbf),
        0xe1..=0xec | 0xee..=0xef => (3, 0x80, 0xbf),
        0xed => (3, 0x80, 0x9f),
        0xf0 => (4, 0x90, 0xbf),
        0xf1..=0xf3 => (4, 0x80, 0xbf),
        0xf4 => (4, 0x80, 0x8f),
        _ => return (REPLACEMENT, 1),
    };
    if input.len() < len {
        return (REPLACEMENT, 1);
    }
    let b1 = input[1];
    if !(lo..=hi).contains(&b1) {
        return (REPLACEMENT, 1);
    }
    let mut cp = match len {
        2 => u32::from(b0 & 0x1f),
        3 => u32::from(b0 & 0x0f),
        _ => u32::from(b0 & 0x07),
    };
    cp = (cp << 6) | u32::from(b1 & 0x3f);
    for &b in &input[2..len] {
        if b & 0xc0 != 0x80 {
            return (REPLACEMENT, 1);
        }
        cp = (cp << 6) | u32::from(b & 0x3f);
    }
    (char::from_u32(cp).unwrap_or(REPLACEMENT), len)
}

/// Code-point cursor over a byte buffer.
///
/// `c` is the current code point, `pos` its byte offset, `next` the offset of
/// the one after it. The first `advance` is pure setup since `pos == next`.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
    next: usize,
    c: char,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            next: 0,
            c: REPLACEMENT,
        }
    }

    fn advance(&mut self) {
        self.pos = self.next;
        let (c, size) = decode_char(&self.input[self.pos..]);
        self.c = c;
        self.next = self.pos + size;
    }
}

/// One GPT-2 rule-set match. Must be called with non-empty input.
fn gpt2_match_len(input: &[u8]) -> usize {
    let cc = input.len();
    let mut cur = Cursor::new(input);
    cur.advance();

    // 's|'t|'re|'ve|'m|'ll|'d -- case-sensitive in this rule set
    if cur.c == '\'' && cc >= 2 {
        match input[1] {
            b's' | b't' | b'm' | b'd' => return 2,
            b'r' | b'v' if cc > 2 && input[2] == b'e' => return 3,
            b'l' if cc > 2 && input[2] == b'l' => return 3,
            _ => {}
        }
    }

    // Match one space if present; covers the " ?" prefixes below.
    if cur.c == ' ' && cc >= 2 {
        cur.advance();
    }

    if is_letter(cur.c) {
        // " ?\p{L}+"
        while cur.pos < cc {
            cur.advance();
            if !is_letter(cur.c) {
                break;
            }
        }
        return cur.pos;
    } else if is_number(cur.c) {
        // " ?\p{N}+"
        while cur.pos < cc {
            cur.advance();
            if !is_number(cur.c) {
                break;
            }
        }
        return cur.pos;
    } else if !is_space(cur.c) {
        // " ?[^\s\p{L}\p{N}]+"
        while cur.pos < cc {
            cur.advance();
            if is_space(cur.c) || is_letter(cur.c) || is_number(cur.c) {
                break;
            }
        }
        return cur.pos;
    }

    // "\s+(?!\S)|\s+"
    while cur.pos < cc && is_space(cur.c) {
        cur.advance();
    }
    if cur.pos >= 2 && cur.pos < cc && !is_space(cur.c) {
        // In a multi-space run with a following non-space, give back the
        // last space so it can attach to the next match.
        return cur.pos - 1;
    }
    cur.pos
}

/// One CL100K rule-set match. Must be called with non-empty input.
fn cl100k_match_len(input: &[u8]) -> usize {
    let cc = input.len();
    let mut cur = Cursor::new(input);
    cur.advance();

    // (?i:'s|'t|'re|'ve|'m|'ll|'d)
    if cur.c == '\'' && cc >= 2 {
        match input[1] {
            b's' | b'S' | b't' | b'T' | b'm' | b'M' | b'd' | b'D' => return 2,
            b'r' | b'R' | b'v' | b'V' if cc >= 3 && matches!(input[2], b'e' | b'E') => return 3,
            b'l' | b'L' if cc >= 3 && matches!(input[2], b'l' | b'L') => return 3,
            _ => {}
        }
    }

    // [^\r\n\p{L}\p{N}]?\p{L}+ with a one-code-point lookahead for the
    // optional prefix.
    let first_letter = is_letter(cur.c);
    let first_number = is_number(cur.c);
    let peek = if cur.next < cc {
        decode_char(&input[cur.next..]).0
    } else {
        REPLACEMENT
    };
    if first_letter
        || (cc >= 2 && !first_number && cur.c != '\r' && cur.c != '\n' && is_letter(peek))
    {
        while cur.pos < cc {
            cur.advance();
            if !is_letter(cur.c) {
                break;
            }
        }
        return cur.pos;
    }

    // \p{N}{1,3}
    if first_number {
        let mut count = 0;
        while cur.pos < cc && count < 3 {
            cur.advance();
            count += 1;
            if !is_number(cur.c) {
                break;
            }
        }
        return cur.pos;
    }

    // Match one space if present.
    if cur.c == ' ' && cc >= 2 {
        cur.advance();
    }

    if !is_space(cur.c) && !is_letter(cur.c) && !is_number(cur.c) {
        // " ?[^\s\p{L}\p{N}]+[\r\n]*" -- the space was already matched above
        while cur.pos < cc {
            cur.advance();
            if is_space(cur.c) || is_letter(cur.c) || is_number(cur.c) {
                break;
            }
        }
        while cur.pos < cc && (cur.c == '\r' || cur.c == '\n') {
            cur.advance();
        }
        return cur.pos;
    }

    // "\s+(?!\S)|\s+"
    while cur.pos < cc && is_space(cur.c) {
        cur.advance();
    }
    if cur.pos >= 2 && cur.pos < cc && !is_space(cur.c) {
        return cur.pos - 1;
    }
    cur.pos
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_strs(splitter: Splitter, input: &str) -> Vec<String> {
        splitter
            .split(input.as_bytes())
            .iter()
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect()
    }

    fn check(splitter: Splitter, cases: &[(&str, &[&str])]) {
        for (input, want) in cases {
            let got = split_strs(splitter, input);
            assert_eq!(got, *want, "split({input:?})");
        }
    }

    #[test]
    fn gpt2_rules() {
        check(
            Splitter::Gpt2,
            &[
                ("", &[]),
                ("a a", &["a", " a"]),
                (
                    "This is a regular sentence without high-maintenance contractions.",
                    &[
                        "This",
                        " is",
                        " a",
                        " regular",
                        " sentence",
                        " without",
                        " high",
                        "-",
                        "maintenance",
                        " contractions",
                        ".",
                    ],
                ),
                (
                    "I'm a test case, aren't I? I'd like to know if YOU'LL be able to tokenize me correctly.",
                    &[
                        "I", "'m", " a", " test", " case", ",", " aren", "'t", " I", "?", " I",
                        "'d", " like", " to", " know", " if", " YOU", "'", "LL", " be", " able",
                        " to", " tokenize", " me", " correctly", ".",
                    ],
                ),
                (
                    "I have 6 apples and 8 oranges,\r\n    ...or 14 pieces of fruit.\n",
                    &[
                        "I", " have", " 6", " apples", " and", " 8", " oranges", ",", "\r\n   ",
                        " ...", "or", " 14", " pieces", " of", " fruit", ".", "\n",
                    ],
                ),
                (
                    "Hello! @username, did you check the #hashtag?",
                    &[
                        "Hello",
                        "!",
                        " @",
                        "username",
                        ",",
                        " did",
                        " you",
                        " check",
                        " the",
                        " #",
                        "hashtag",
                        "?",
                    ],
                ),
                (
                    "These spaces \"                         \" are one token in p50k.",
                    &[
                        "These",
                        " spaces",
                        " \"",
                        "                        ",
                        " \"",
                        " are",
                        " one",
                        " token",
                        " in",
                        " p",
                        "50",
                        "k",
                        ".",
                    ],
                ),
                (
                    "こんにちは、世界！",
                    &["こんにちは", "、", "世界", "！"],
                ),
                (
                    "I'm learning \u{627}\u{644}\u{639}\u{64e}\u{631}\u{64e}\u{628}\u{650}\u{64a}\u{64e}\u{651}\u{629} and \u{939}\u{93f}\u{928}\u{94d}\u{926}\u{940} languages.",
                    &[
                        "I",
                        "'m",
                        " learning",
                        " \u{627}\u{644}\u{639}",
                        "\u{64e}",
                        "\u{631}",
                        "\u{64e}",
                        "\u{628}",
                        "\u{650}",
                        "\u{64a}",
                        "\u{64e}\u{651}",
                        "\u{629}",
                        " and",
                        " \u{939}",
                        "\u{93f}",
                        "\u{928}",
                        "\u{94d}",
                        "\u{926}",
                        "\u{940}",
                        " languages",
                        ".",
                    ],
                ),
                (
                    "I'm happy 😃 and you're excited 🎉 she'll play!",
                    &[
                        "I", "'m", " happy", " 😃", " and", " you", "'re", " excited", " 🎉",
                        " she", "'ll", " play", "!",
                    ],
                ),
                (
                    "Hello, World! How are you today? 🌍",
                    &[
                        "Hello", ",", " World", "!", " How", " are", " you", " today", "?", " 🌍",
                    ],
                ),
            ],
        );
    }

    #[test]
    fn cl100k_rules() {
        check(
            Splitter::Cl100k,
            &[
                ("", &[]),
                (
                    "This is a regular sentence without contractions.",
                    &[
                        "This",
                        " is",
                        " a",
                        " regular",
                        " sentence",
                        " without",
                        " contractions",
                        ".",
                    ],
                ),
                (
                    "a a 1234567890 z",
                    &["a", " a", " ", "123", "456", "789", "0", " z"],
                ),
                (
                    "The quick brown fox jumps over 13 lazy dogs.",
                    &[
                        "The", " quick", " brown", " fox", " jumps", " over", " ", "13", " lazy",
                        " dogs", ".",
                    ],
                ),
                (
                    "I'm a test case, aren't I? I'd like to know if you'll be able to tokenize me correctly.",
                    &[
                        "I", "'m", " a", " test", " case", ",", " aren", "'t", " I", "?", " I",
                        "'d", " like", " to", " know", " if", " you", "'ll", " be", " able", " to",
                        " tokenize", " me", " correctly", ".",
                    ],
                ),
                (
                    "I have 3 apples and 4 oranges.\n",
                    &[
                        "I", " have", " ", "3", " apples", " and", " ", "4", " oranges", ".\n",
                    ],
                ),
                (
                    "These spaces \"                         \" are one token in p50k.",
                    &[
                        "These",
                        " spaces",
                        " \"",
                        "                        ",
                        " \"",
                        " are",
                        " one",
                        " token",
                        " in",
                        " p",
                        "50",
                        "k",
                        ".",
                    ],
                ),
                (
                    "Hello! @username, did you check the #hashtag?",
                    &[
                        "Hello",
                        "!",
                        " @",
                        "username",
                        ",",
                        " did",
                        " you",
                        " check",
                        " the",
                        " #",
                        "hashtag",
                        "?",
                    ],
                ),
                (
                    "Test cases for https://github.com/peterheb/gotoken /***** ¯\\_(ツ)_/¯ ******/",
                    &[
                        "Test",
                        " cases",
                        " for",
                        " https",
                        "://",
                        "github",
                        ".com",
                        "/peterheb",
                        "/gotoken",
                        " /*****",
                        " ¯\\_(",
                        "ツ",
                        ")_/¯",
                        " ******/",
                    ],
                ),
                (
                    "こんにちは、世界！",
                    &["こんにちは", "、世界", "！"],
                ),
                (
                    "I'm learning \u{627}\u{644}\u{639}\u{64e}\u{631}\u{64e}\u{628}\u{650}\u{64a}\u{64e}\u{651}\u{629} and \u{939}\u{93f}\u{928}\u{94d}\u{926}\u{940} languages.",
                    &[
                        "I",
                        "'m",
                        " learning",
                        " \u{627}\u{644}\u{639}",
                        "\u{64e}\u{631}",
                        "\u{64e}\u{628}",
                        "\u{650}\u{64a}",
                        "\u{64e}\u{651}",
                        "\u{629}",
                        " and",
                        " \u{939}",
                        "\u{93f}\u{928}",
                        "\u{94d}\u{926}",
                        "\u{940}",
                        " languages",
                        ".",
                    ],
                ),
                (
                    "I'm happy 😃 and excited 🎉!",
                    &["I", "'m", " happy", " 😃", " and", " excited", " 🎉!"],
                ),
                (
                    "Hello, World! How are you today? 🌍",
                    &[
                        "Hello", ",", " World", "!", " How", " are", " you", " today", "?", " 🌍",
                    ],
                ),
            ],
        );
    }

    #[test]
    fn cl100k_absorbs_trailing_newlines_into_other_runs() {
        check(
            Splitter::Cl100k,
            &[("Hello world.\r\n\r\n", &["Hello", " world", ".\r\n\r\n"])],
        );
    }

    #[test]
    fn invalid_utf8_advances_one_byte() {
        // Truncated and stray sequences classify as U+FFFD ("other") but
        // consume a single byte each, so nothing is lost or duplicated.
        let parts = Splitter::Gpt2.split(b"\xe2\x80");
        assert_eq!(parts, vec![&b"\xe2\x80"[..]]);

        let parts = Splitter::Gpt2.split(b"a\xffb");
        assert_eq!(parts, vec![&b"a"[..], &b"\xff"[..], &b"b"[..]]);

        // 0xC3 starts a two-byte sequence but '(' is not a continuation.
        let parts = Splitter::Cl100k.split(b"\xc3(z");
        assert_eq!(parts, vec![&b"\xc3("[..], &b"z"[..]]);

        // A literal U+FFFD in the input is a valid three-byte code point.
        let parts = Splitter::Gpt2.split("\u{fffd}".as_bytes());
        assert_eq!(parts, vec!["\u{fffd}".as_bytes()]);
    }

    #[test]
    fn no_give_back_at_end_of_input() {
        check(Splitter::Gpt2, &[("a   ", &["a", "   "])]);
        check(Splitter::Cl100k, &[("a   ", &["a", "   "])]);
        // ...but with a trailing word the last space attaches to it.
        check(Splitter::Gpt2, &[("a   b", &["a", "  ", " b"])]);
    }

    #[test]
    fn coverage_and_progress_on_arbitrary_bytes() {
        // Deterministic fuzz: splits must cover the input exactly and always
        // advance, including across invalid UTF-8.
        let mut state = 0x9e3779b97f4a7c15u64;
        for round in 0..200 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let len = (state % 64) as usize;
            let mut input = Vec::with_capacity(len);
            let mut s = state;
            for _ in 0..len {
                s ^= s << 13;
                s ^= s >> 7;
                s ^= s << 17;
                input.push((s >> 32) as u8);
            }
            for splitter in [Splitter::Gpt2, Splitter::Cl100k] {
                let parts = splitter.split(&input);
                let rejoined: Vec<u8> = parts.concat();
                assert_eq!(rejoined, input, "round {round}");
                assert!(parts.iter().all(|p| !p.is_empty()), "round {round}");
            }
        }
    }
}
