//! Fuzzy string scores on a 0..100 scale.
//!
//! All scores are built on the Indel similarity `2 * LCS / (|a| + |b|)`, where LCS is the
//! longest common subsequence of characters. Empty inputs score 0.

use rapidfuzz::fuzz;

/// Similarity of two whole strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    return fuzz::ratio(a.chars(), b.chars()) * 100.0;
}

/// Best similarity of the shorter string against every equally long window of the longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let (short, long) = if a.chars().count() <= b.chars().count() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }
    let long_chars: Vec<char> = long.chars().collect();
    let width = short.chars().count();
    if width == long_chars.len() {
        return ratio(short, long);
    }

    let mut best = 0.0f64;
    for start in 0..=(long_chars.len() - width) {
        let window: String = long_chars[start..start + width].iter().collect();
        let score = ratio(short, &window);
        if score > best {
            best = score;
            if best >= 100.0 {
                break;
            }
        }
    }
    return best;
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Similarity after sorting both strings' whitespace tokens, so word order does not matter.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    return ratio(&sorted_tokens(a), &sorted_tokens(b));
}

/// Returns the best scoring choice and its score. Ties keep the earliest choice.
pub fn extract_one<'a, F>(query: &str, choices: &'a [String], scorer: F) -> Option<(&'a str, f64)>
where
    F: Fn(&str, &str) -> f64,
{
    let mut best: Option<(&'a str, f64)> = None;
    for choice in choices {
        let score = scorer(query, choice);
        match best {
            Some((_, best_score)) if best_score >= score => {}
            _ => best = Some((choice.as_str(), score)),
        }
    }
    best
}
