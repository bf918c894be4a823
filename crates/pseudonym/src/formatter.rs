//! Deterministic index function and substitution formatters.

use crate::corpus::Corpus;
use hostanon_common::hash::fingerprint;
use std::num::NonZeroUsize;

/// Separator between the corpus prefix and the fingerprint suffix.
pub const SUBSTITUTE_SEPARATOR: char = '-';

/// Separator of space-separated token lists.
pub const TOKEN_SEPARATOR: char = ' ';

/// Map `value` to a reproducible position in `[0, modulus)`.
///
/// Folds the hex fingerprint of `value` left to right: the character at
/// position `i` with ordinal `c` adds `i * 256 + c` to the accumulator,
/// which is kept reduced modulo `modulus`.
pub fn index(value: &str, modulus: NonZeroUsize) -> usize {
    fold_index(&fingerprint(value), modulus)
}

fn fold_index(hex: &str, modulus: NonZeroUsize) -> usize {
    let modulus = modulus.get();
    hex.bytes()
        .enumerate()
        .fold(0, |acc, (i, c)| (acc + (i * 256 + c as usize) % modulus) % modulus)
}

/// Corpus entry picked by [`index`], followed by the full fingerprint.
///
/// The fingerprint suffix keeps distinct values distinct even when their
/// indexes collide on a small corpus.
pub fn substitute(value: &str, corpus: &Corpus) -> String {
    let hex = fingerprint(value);
    let prefix = corpus.entry(fold_index(&hex, corpus.size()));
    format!("{}{}{}", prefix, SUBSTITUTE_SEPARATOR, hex)
}

/// Fingerprint only, for values that need scrubbing but no realism.
pub fn hash_only(value: &str) -> String {
    fingerprint(value)
}

/// Substitute every token of a space-separated list.
///
/// Empty tokens, produced by leading, trailing or repeated spaces, stay
/// empty so the spacing of the original is kept exactly.
pub fn substitute_tokens(value: &str, corpus: &Corpus) -> String {
    value
        .split(TOKEN_SEPARATOR)
        .map(|token| {
            if token.is_empty() {
                String::new()
            } else {
                substitute(token, corpus)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
