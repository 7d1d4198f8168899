//! Approximate name matching for region and company names.
//!
//! Two scorers coexist and are used at different call sites:
//!
//! - [`similarity_score`] strips whitespace and hyphens; containment scores 1.0.
//!   Used for voice lookup, accepted at [`VOICE_MATCH_THRESHOLD`].
//! - [`strict_similarity`] strips everything non-alphanumeric and folds `ё`
//!   to `е`; containment scores 0.95. Used to reconcile region labels between
//!   datasets, accepted at [`REGION_NAME_THRESHOLD`].
//!
//! Past containment both fall back to a positional overlap: characters equal
//! at the same index, divided by the longer length.

/// Minimum loose score for a voice transcript word to select a region.
pub const VOICE_MATCH_THRESHOLD: f64 = 0.4;

/// Minimum strict score for two region labels to be treated as the same region.
pub const REGION_NAME_THRESHOLD: f64 = 0.6;

const STRICT_CONTAINMENT_SCORE: f64 = 0.95;

/// Lowercase and drop whitespace and hyphens.
pub fn normalize_loose(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect()
}

/// Lowercase, fold `ё` to `е`, keep only letters and digits.
pub fn normalize_strict(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c == 'ё' { 'е' } else { c })
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn positional_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let matches = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
    matches as f64 / longest as f64
}

/// Loose similarity in `[0, 1]`.
///
/// An empty side is contained in anything and scores 1.0; callers skip
/// empty tokens before scoring.
pub fn similarity_score(a: &str, b: &str) -> f64 {
    let a = normalize_loose(a);
    let b = normalize_loose(b);
    if a.contains(&b) || b.contains(&a) {
        return 1.0;
    }
    positional_ratio(&a, &b)
}

/// Strict similarity in `[0, 0.95]`. Empty input on either side scores 0.
pub fn strict_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_strict(a);
    let b = normalize_strict(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return STRICT_CONTAINMENT_SCORE;
    }
    positional_ratio(&a, &b)
}

/// Highest-scoring candidate at or above `threshold`. Ties keep the first seen.
pub fn best_match<'a, T, K, S>(
    query: &str,
    candidates: &'a [T],
    key: K,
    scorer: S,
    threshold: f64,
) -> Option<(&'a T, f64)>
where
    K: Fn(&'a T) -> &'a str,
    S: Fn(&str, &str) -> f64,
{
    let mut best: Option<(&'a T, f64)> = None;
    for candidate in candidates {
        let score = scorer(query, key(candidate));
        if score < threshold {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((candidate, score));
        }
    }
    best
}

/// Strip punctuation from a spoken transcript and split it into words.
///
/// Letters (any script), digits, whitespace and hyphens survive; hyphens are
/// then removed inside each word.
pub fn transcript_words(transcript: &str) -> Vec<String> {
    let cleaned: String = transcript
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
        .collect();
    cleaned
        .split_whitespace()
        .map(|w| w.replace('-', ""))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Pick the candidate a voice transcript most likely names.
///
/// Candidates are walked in order. Any transcript word contained in a
/// candidate name (or containing it) wins immediately with score 1.0.
/// Otherwise the best positional score strictly above the running best and
/// at least [`VOICE_MATCH_THRESHOLD`] is kept.
pub fn match_by_voice<'a, T, K>(transcript: &str, candidates: &'a [T], name: K) -> Option<(&'a T, f64)>
where
    K: Fn(&'a T) -> &'a str,
{
    let words = transcript_words(transcript);
    if words.is_empty() {
        return None;
    }

    let mut best: Option<(&'a T, f64)> = None;
    let mut best_score = 0.0;

    for candidate in candidates {
        let candidate_name = normalize_loose(name(candidate));
        if candidate_name.is_empty() {
            continue;
        }
        for word in &words {
            if candidate_name.contains(word.as_str()) || word.contains(candidate_name.as_str()) {
                return Some((candidate, 1.0));
            }
            let score = similarity_score(word, &candidate_name);
            tracing::trace!(word = %word, candidate = %candidate_name, score, "voice comparison");
            if score > best_score && score >= VOICE_MATCH_THRESHOLD {
                best_score = score;
                best = Some((candidate, score));
            }
        }
    }

    best
}
