//! Username variation generator.

use std::collections::BTreeSet;

/// Upper bound on variations per base name.
pub const MAX_VARIATIONS: usize = 100;

const SUFFIXES: [&str; 19] = [
    "123", "321", "111", "777", "007", "1", "2", "3", "7", "2005", "2006", "2007", "2008", "1998",
    "1999", "2000", "88", "99", "83",
];

const SEPARATORS: [&str; 2] = ["_", "."];

/// Likely variations of `base`, including `base` itself.
///
/// Sorted, deduplicated and capped at [`MAX_VARIATIONS`]. A blank base yields
/// nothing.
#[must_use]
pub fn generate(base: &str) -> Vec<String> {
    generate_with_limit(base, MAX_VARIATIONS)
}

/// Same as [`generate`] with a caller-chosen cap.
#[must_use]
pub fn generate_with_limit(base: &str, limit: usize) -> Vec<String> {
    let base = base.trim();
    if base.is_empty() {
        return Vec::new();
    }

    let mut variations = BTreeSet::new();
    variations.insert(base.to_string());

    for suffix in SUFFIXES {
        variations.insert(format!("{base}{suffix}"));
    }
    for separator in SEPARATORS {
        variations.insert(format!("{base}{separator}"));
        for suffix in SUFFIXES {
            variations.insert(format!("{base}{separator}{suffix}"));
        }
    }

    // user_name from username
    let chars: Vec<char> = base.chars().collect();
    if chars.len() > 4 {
        let (head, tail) = chars.split_at(chars.len() / 2);
        let head: String = head.iter().collect();
        let tail: String = tail.iter().collect();
        for separator in SEPARATORS {
            variations.insert(format!("{head}{separator}{tail}"));
        }
    }

    variations.into_iter().take(limit).collect()
}

/// Expand every base name, keeping first-seen order and dropping repeats.
#[must_use]
pub fn expand_all<S: AsRef<str>>(bases: &[S], limit: usize) -> Vec<String> {
    let mut seen = BTreeSet::new();
    bases
        .iter()
        .flat_map(|base| generate_with_limit(base.as_ref(), limit))
        .filter(|variation| seen.insert(variation.clone()))
        .collect()
}
