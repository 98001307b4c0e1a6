//! Additive lexical scoring.
//!
//! Scores a block's `content + " " + tags` against lowercase query terms:
//! +3 per exact token match, +1 per substring match, +2 when every term
//! appears, and up to +1 of recency bonus decaying linearly over 30 days.
//! `normalize` maps into `[0, 1]` by the query's maximum achievable score
//! so the semantic blend stays balanced.

use std::collections::HashSet;

pub const RECENCY_WINDOW_DAYS: f64 = 30.0;

/// Lowercase terms of length ≥ 2, split on any non-alphanumeric char.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

/// Raw additive score for one haystack.
///
/// `age_days` is the block's age at query time; negative ages (clock skew)
/// count as zero.
pub fn lexical_score(terms: &[String], haystack: &str, age_days: f64) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let hay_lower = haystack.to_lowercase();
    let hay_tokens: HashSet<String> = tokenize(haystack).into_iter().collect();

    let mut score = 0.0;
    let mut all_present = true;
    for term in terms {
        let substring = hay_lower.contains(term.as_str());
        if hay_tokens.contains(term) {
            score += 3.0;
        }
        if substring {
            score += 1.0;
        } else {
            all_present = false;
        }
    }
    if all_present {
        score += 2.0;
    }
    score += recency_bonus(age_days);
    score
}

/// Linear recency bonus: 1.0 for a block written now, 0.0 at 30 days.
pub fn recency_bonus(age_days: f64) -> f64 {
    let age = age_days.max(0.0);
    if age >= RECENCY_WINDOW_DAYS {
        0.0
    } else {
        1.0 - age / RECENCY_WINDOW_DAYS
    }
}

/// Maximum achievable raw score for a query of `terms_len` terms.
pub fn max_score(terms_len: usize) -> f64 {
    4.0 * terms_len as f64 + 3.0
}

/// Map a raw score into `[0, 1]`.
pub fn normalize(score: f64, terms_len: usize) -> f64 {
    if terms_len == 0 {
        return 0.0;
    }
    (score / max_score(terms_len)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_drops_short() {
        assert_eq!(
            tokenize("Semantic Recall, a design!"),
            vec!["semantic", "recall", "design"]
        );
    }

    #[test]
    fn test_tokenize_drops_punctuation() {
        assert_eq!(tokenize("foo-bar_baz"), vec!["foo", "bar", "baz"]);
    }

    #[test]
    fn test_exact_match_beats_substring() {
        let terms = tokenize("recall");
        let exact = lexical_score(&terms, "semantic recall design", 60.0);
        let substring = lexical_score(&terms, "recalling things", 60.0);
        assert!(exact > substring);
        // Exact also counts the substring point and the all-terms bonus.
        assert_eq!(exact, 3.0 + 1.0 + 2.0);
        assert_eq!(substring, 1.0 + 2.0);
    }

    #[test]
    fn test_all_terms_bonus_requires_every_term() {
        let terms = tokenize("semantic recall");
        let partial = lexical_score(&terms, "semantic design", 60.0);
        let full = lexical_score(&terms, "semantic recall", 60.0);
        assert_eq!(partial, 4.0); // one exact + one substring, no bonus
        assert_eq!(full, 10.0); // two exact + two substring + all-terms
    }

    #[test]
    fn test_recency_bonus_decays_linearly() {
        assert_eq!(recency_bonus(0.0), 1.0);
        assert!((recency_bonus(15.0) - 0.5).abs() < 1e-9);
        assert_eq!(recency_bonus(30.0), 0.0);
        assert_eq!(recency_bonus(300.0), 0.0);
        assert_eq!(recency_bonus(-5.0), 1.0);
    }

    #[test]
    fn test_normalize_bounds() {
        let terms = tokenize("semantic recall");
        let raw = lexical_score(&terms, "semantic recall", 0.0);
        let norm = normalize(raw, terms.len());
        assert!(norm <= 1.0);
        assert!(norm > 0.9); // perfect match, fresh block
        assert_eq!(normalize(0.0, 0), 0.0);
    }

    #[test]
    fn test_no_match_scores_only_recency() {
        let terms = tokenize("quantum");
        assert_eq!(lexical_score(&terms, "groceries list", 60.0), 0.0);
        assert_eq!(lexical_score(&terms, "groceries list", 0.0), 1.0);
    }
}
