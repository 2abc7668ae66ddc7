//! Text cleanup applied to everything the extractor returns.
//!
//! Pages served with the wrong charset, or copied through a system that
//! decoded UTF-8 as Windows-1252, arrive with sequences like `Ã¡` where
//! `á` was meant. [`fix_mojibake`] undoes the common cases; [`normalize`]
//! runs the full pipeline: mojibake repair, NFC composition, control
//! character removal and whitespace collapsing.

use std::collections::HashMap;
use std::sync::OnceLock;

use encoding_rs::WINDOWS_1252;
use unicode_normalization::UnicodeNormalization;

/// Punctuation outside Latin-1 that commonly shows up double-encoded.
const PUNCTUATION: &[char] = &[
    '€', '‘', '’', '“', '”', '–', '—', '…', '•', '™',
];

/// Longest table key, in characters.
const MAX_KEY_CHARS: usize = 3;

/// Replacement table from mis-decoded sequence to the intended character.
///
/// Every key is what the UTF-8 encoding of the target looks like when read
/// as Windows-1252 or as ISO-8859-1. Keys start with `Â`, `Ã` or `â` and
/// none of their later characters can start another key, so the entries
/// never overlap.
fn mojibake_table() -> &'static HashMap<String, char> {
    static TABLE: OnceLock<HashMap<String, char>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        let latin1_supplement = (0xA0u32..=0xFF).filter_map(char::from_u32);

        for target in latin1_supplement.chain(PUNCTUATION.iter().copied()) {
            let mut buf = [0u8; 4];
            let bytes = target.encode_utf8(&mut buf).as_bytes();

            let (as_cp1252, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            table.insert(as_cp1252.into_owned(), target);

            let as_latin1: String = bytes.iter().map(|&b| char::from(b)).collect();
            table.insert(as_latin1, target);
        }

        table
    })
}

fn may_start_key(c: char) -> bool {
    matches!(c, 'Â' | 'Ã' | 'â')
}

/// Replace known mis-decoded sequences with the characters they stand for.
///
/// Text that contains no table key is returned unchanged.
pub fn fix_mojibake(text: &str) -> String {
    if !text.chars().any(may_start_key) {
        return text.to_string();
    }

    let table = mojibake_table();
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    'scan: while i < chars.len() {
        if may_start_key(chars[i]) {
            for len in (2..=MAX_KEY_CHARS).rev() {
                if i + len > chars.len() {
                    continue;
                }
                let candidate: String = chars[i..i + len].iter().collect();
                if let Some(&fixed) = table.get(&candidate) {
                    out.push(fixed);
                    i += len;
                    continue 'scan;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Drop control characters and U+FFFD; ASCII whitespace controls become spaces.
fn strip_controls(text: &str) -> String {
    text.chars()
        .filter_map(|c| match c {
            '\t' | '\n' | '\r' | '\u{0B}' | '\u{0C}' => Some(' '),
            '\u{FFFD}' => None,
            c if c.is_control() => None,
            c => Some(c),
        })
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn normalize_once(text: &str) -> String {
    let fixed = fix_mojibake(text);
    let composed: String = fixed.nfc().collect();
    collapse_whitespace(&strip_controls(&composed))
}

/// Clean a decoded string for indexing.
///
/// The pass is repeated until the text stops changing: repairing one
/// sequence or composing a combining mark can expose another table key.
/// After the first pass each further pass either leaves the text alone or
/// shortens it, so the loop terminates.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut current = normalize_once(text);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
