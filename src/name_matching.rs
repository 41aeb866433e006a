use regex::Regex;
use std::sync::LazyLock;

use crate::models::ParsedName;

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static PARENTHESES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(([^)]+)\)").unwrap());

/// Single-word tussenvoegsels recognised after the comma in "Achternaam, Initialen van".
const NAME_PREFIXES: [&str; 6] = ["van", "de", "den", "der", "ten", "ter"];
/// Words that combine with a preceding "van" into one prefix ("van der").
const VAN_COMBINATIONS: [&str; 3] = ["der", "de", "den"];

/// Canonical form used for name comparison: lowercase, no punctuation,
/// single spaces. Missing input yields an empty string.
pub fn normalize_name(name: Option<&str>) -> String {
    let Some(name) = name else {
        return String::new();
    };
    let lowered = name.trim().to_lowercase();
    let stripped = NON_WORD_RE.replace_all(&lowered, "");
    WHITESPACE_RE.replace_all(&stripped, " ").trim().to_string()
}

/// Ratcliff/Obershelp similarity in [0, 1], case-insensitive.
///
/// The matching-block ratio is not symmetric for every input pair, so the
/// score is taken in both directions and the higher one is returned.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    block_ratio(&a, &b).max(block_ratio(&b, &a))
}

fn block_ratio(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_characters(a, b) as f64 / total as f64
}

/// Sum of the sizes of all matching blocks: take the longest common run,
/// then recurse into the unmatched parts on its left and its right.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

// Longest common run in a[a_lo..a_hi] / b[b_lo..b_hi]; earliest position wins ties.
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let width = b_hi - b_lo + 1;
    let mut best = (a_lo, b_lo, 0);
    let mut previous = vec![0usize; width];
    let mut current = vec![0usize; width];

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let slot = j - b_lo + 1;
            if a[i] == b[j] {
                let run = previous[slot - 1] + 1;
                current[slot] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            } else {
                current[slot] = 0;
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    best
}

/// Splits "Rietschoten, T.A.J. van (Tijn)" into first name, prefix and last name.
/// Returns `None` when the name has no parenthesised first name.
pub fn parse_name(raw: &str) -> Option<ParsedName> {
    let name = raw.trim();
    let captures = PARENTHESES_RE.captures(name)?;
    let whole = captures.get(0)?;
    let first_name = captures.get(1)?.as_str().trim().to_string();
    let before = name[..whole.start()].trim();

    let mut parsed = ParsedName {
        first_name,
        ..ParsedName::default()
    };

    if let Some((last, rest)) = before.split_once(',') {
        parsed.last_name = last.trim().to_string();
        parsed.prefix = extract_prefix(rest.trim());
    } else if let Some(first_word) = before.split_whitespace().next() {
        parsed.last_name = first_word.to_string();
    }

    Some(parsed)
}

// The last prefix found wins; a "van der"-style combination ends the scan.
fn extract_prefix(initials: &str) -> String {
    let words: Vec<&str> = initials.split_whitespace().collect();
    let mut found: Option<String> = None;

    for (i, word) in words.iter().enumerate() {
        let clean = clean_word(word);
        if !NAME_PREFIXES.contains(&clean.as_str()) {
            continue;
        }
        if clean == "van" {
            if let Some(next) = words.get(i + 1) {
                if VAN_COMBINATIONS.contains(&clean_word(next).as_str()) {
                    found = Some(format!("{} {}", word, next));
                    break;
                }
            }
        }
        found = Some(word.to_string());
    }

    found.map(|p| p.trim().to_string()).unwrap_or_default()
}

fn clean_word(word: &str) -> String {
    word.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}

/// Display form "Voornaam tussenvoegsel Achternaam".
///
/// Names without a parenthesised first name come back trimmed but otherwise
/// unchanged. Missing or blank input returns `None`.
pub fn format_name(raw: Option<&str>) -> Option<String> {
    let name = raw?.trim();
    if name.is_empty() {
        return None;
    }

    let Some(parsed) = parse_name(name) else {
        return Some(name.to_string());
    };

    let formatted = [parsed.first_name, parsed.prefix, parsed.last_name]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if formatted.is_empty() {
        None
    } else {
        Some(formatted)
    }
}
