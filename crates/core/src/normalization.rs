use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folds a region name into its matching form: lowercase, no diacritics,
/// hyphens as spaces, single spaces, trimmed.
///
/// Total and idempotent, so `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(name: &str) -> String {
    let lowered = name.to_lowercase();
    let mut result = String::with_capacity(lowered.len());
    let mut prev_space = true;
    for ch in lowered.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        let ch = fold_char(ch);
        if ch.is_whitespace() {
            if !prev_space {
                result.push(' ');
                prev_space = true;
            }
        } else if !ch.is_control() {
            result.push(ch);
            prev_space = false;
        }
    }
    if result.ends_with(' ') {
        result.pop();
    }
    result
}

/// Normalized form with every separator removed, used for loose containment.
pub fn compact(name: &str) -> String {
    normalize(name).chars().filter(|c| *c != ' ').collect()
}

/// Loose containment between two names: either compact form contains the other.
pub fn loosely_contains(left: &str, right: &str) -> bool {
    let left = compact(left);
    let right = compact(right);
    if left.is_empty() || right.is_empty() {
        return false;
    }
    left.contains(&right) || right.contains(&left)
}

fn fold_char(ch: char) -> char {
    match ch {
        '-' | '\u{2010}' | '\u{2011}' | '\u{2013}' | '\u{2014}' => ' ',
        '\u{2018}' | '\u{2019}' | '\u{02bc}' => '\'',
        other => other,
    }
}
