//! Text cleaning for OCR output.
//!
//! This module provides functionality for:
//! - Normalising OCR text to upper-case printable ASCII
//! - Dropping repeated tokens produced when one word is read twice

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Matches every character outside printable ASCII.
static NON_PRINTABLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\x20-\x7E]").unwrap());

/// Characters that do not take part in a token's identity.
static TOKEN_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Z0-9+]").unwrap());

/// Alphanumeric runs, used to score how complete a course code reading is.
static ALNUM_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z0-9]+").unwrap());

/// Cleans an OCR string.
///
/// Pound signs are read back as `E`, long dashes become `-`, anything outside
/// printable ASCII is removed and the result is upper-cased.
///
/// # Arguments
///
/// * `text` - The raw OCR text.
///
/// # Returns
///
/// The cleaned, upper-case string.
pub fn clean_text(text: &str) -> String {
    let text = text.replace('£', "E").replace('—', "-").replace('–', "-");
    let text = NON_PRINTABLE.replace_all(text.trim(), "");
    return text.to_uppercase();
}

/// Removes whitespace-separated tokens whose key (upper-case letters, digits and `+`)
/// was already seen. Tokens with an empty key are dropped too.
pub fn dedup_tokens(text: &str) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();
    for token in text.split_whitespace() {
        let key = TOKEN_KEY.replace_all(token, "").to_string();
        if !key.is_empty() && seen.insert(key) {
            kept.push(token);
        }
    }
    return kept.join(" ");
}

/// Number of alphanumeric runs in the text.
pub fn count_alnum_tokens(text: &str) -> usize {
    ALNUM_TOKEN.find_iter(text).count()
}
