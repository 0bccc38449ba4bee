use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::evaluator::{value_text, EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Edit-distance similarity between candidate and expected, on a 0–100 scale.
pub struct FuzzyMatchEvaluator {
    name: String,
    pub threshold: f64,
}

impl FuzzyMatchEvaluator {
    /// `threshold` is on the 0–100 similarity scale.
    pub fn new(threshold: f64) -> Self {
        Self {
            name: "fuzzy_match".to_string(),
            threshold,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for FuzzyMatchEvaluator {
    fn default() -> Self {
        Self::new(80.0)
    }
}

#[async_trait]
impl Evaluator for FuzzyMatchEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EvalKind {
        EvalKind::FuzzyMatch
    }

    async fn evaluate(&self, candidate: &str, expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
        let expected = value_text(expected);
        let scores = if candidate.len() + expected.len() > BLOCKING_INPUT_BYTES {
            let candidate = candidate.to_string();
            tokio::task::spawn_blocking(move || Scores::compute(&candidate, &expected)).await?
        } else {
            Scores::compute(candidate, &expected)
        };
        let passed = f64::from(scores.similarity) >= self.threshold;

        Ok(EvalResult::new(f64::from(scores.similarity) / 100.0, passed)
            .with_reasoning(format!(
                "Similarity: {}% (threshold: {}%)",
                scores.similarity, self.threshold
            ))
            .with_metadata(serde_json::json!({
                "similarity_score": scores.similarity,
                "threshold": self.threshold,
                "partial_ratio": scores.partial,
                "token_sort_ratio": scores.token_sort,
            })))
    }
}

/// Inputs above this size are scored on the blocking pool.
const BLOCKING_INPUT_BYTES: usize = 4096;

struct Scores {
    similarity: u32,
    partial: u32,
    token_sort: u32,
}

impl Scores {
    fn compute(candidate: &str, expected: &str) -> Self {
        Self {
            similarity: ratio(candidate.trim(), expected.trim()),
            partial: partial_ratio(candidate, expected),
            token_sort: token_sort_ratio(candidate, expected),
        }
    }
}

/// Indel similarity of the full strings, `2·LCS / (len_a + len_b)`, rounded
/// to 0–100. Either string empty gives 0.
pub fn ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let pattern = LcsPattern::new(short);
    let lcs = pattern.lcs(&pattern.encode(long));
    percent(2.0 * lcs as f64 / (a.len() + b.len()) as f64)
}

/// Best [`ratio`] of the shorter string against each same-length window of
/// the longer one.
///
/// Windows whose shared-character count cannot beat the current best are
/// skipped; the rest cost one bit-parallel LCS pass each.
pub fn partial_ratio(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let width = short.len();
    let pattern = LcsPattern::new(short);
    let text = pattern.encode(long);

    let mut need = vec![0usize; pattern.masks.len()];
    for sym in pattern.encode(short).into_iter().flatten() {
        need[sym] += 1;
    }
    let mut window = CharOverlap::new(need);
    for sym in &text[..width] {
        window.push(*sym);
    }

    let mut best = 0;
    for start in 0..=(text.len() - width) {
        if start > 0 {
            window.pop(text[start - 1]);
            window.push(text[start + width - 1]);
        }
        if window.shared <= best {
            continue;
        }
        best = best.max(pattern.lcs(&text[start..start + width]));
        if best == width {
            break;
        }
    }
    percent(best as f64 / width as f64)
}

fn percent(similarity: f64) -> u32 {
    (similarity * 100.0).round() as u32
}

/// Longest-common-subsequence length against a fixed pattern, 64 pattern
/// characters per machine word (Hyyrö's bit-vector recurrence).
struct LcsPattern {
    len: usize,
    words: usize,
    alphabet: HashMap<char, usize>,
    masks: Vec<Vec<u64>>,
}

impl LcsPattern {
    fn new(pattern: &[char]) -> Self {
        let words = pattern.len().div_ceil(64);
        let mut alphabet = HashMap::new();
        let mut masks: Vec<Vec<u64>> = Vec::new();
        for (i, c) in pattern.iter().enumerate() {
            let sym = *alphabet.entry(*c).or_insert_with(|| {
                masks.push(vec![0; words]);
                masks.len() - 1
            });
            masks[sym][i / 64] |= 1 << (i % 64);
        }
        Self { len: pattern.len(), words, alphabet, masks }
    }

    /// Maps text characters to pattern symbols; `None` never matches.
    fn encode(&self, text: &[char]) -> Vec<Option<usize>> {
        text.iter().map(|c| self.alphabet.get(c).copied()).collect()
    }

    fn lcs(&self, text: &[Option<usize>]) -> usize {
        let mut v = vec![u64::MAX; self.words];
        for sym in text.iter().flatten() {
            let m = &self.masks[*sym];
            let mut carry = false;
            for (w, word) in v.iter_mut().enumerate() {
                let u = *word & m[w];
                let (sum, c1) = word.overflowing_add(u);
                let (sum, c2) = sum.overflowing_add(u64::from(carry));
                carry = c1 || c2;
                *word = sum | (*word & !m[w]);
            }
        }

        // LCS = zero bits among the low `len` bits.
        let mut lcs = 0;
        for (w, word) in v.iter().enumerate() {
            let bits = (self.len - w * 64).min(64);
            let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
            lcs += (!word & mask).count_ones() as usize;
        }
        lcs
    }
}

/// Multiset intersection size between a sliding window and the pattern.
/// Upper bound on the window's LCS.
struct CharOverlap {
    need: Vec<usize>,
    have: Vec<usize>,
    shared: usize,
}

impl CharOverlap {
    fn new(need: Vec<usize>) -> Self {
        let have = vec![0; need.len()];
        Self { need, have, shared: 0 }
    }

    fn push(&mut self, sym: Option<usize>) {
        if let Some(s) = sym {
            if self.have[s] < self.need[s] {
                self.shared += 1;
            }
            self.have[s] += 1;
        }
    }

    fn pop(&mut self, sym: Option<usize>) {
        if let Some(s) = sym {
            self.have[s] -= 1;
            if self.have[s] < self.need[s] {
                self.shared -= 1;
            }
        }
    }
}

/// [`ratio`] after lowercasing, dropping punctuation and sorting tokens.
pub fn token_sort_ratio(a: &str, b: &str) -> u32 {
    ratio(&sorted_tokens(a), &sorted_tokens(b))
}

fn sorted_tokens(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ratio_identity_and_empty() {
        assert_eq!(ratio("kitten", "kitten"), 100);
        assert_eq!(ratio("", "kitten"), 0);
        assert_eq!(ratio("", ""), 0);
    }

    #[test]
    fn test_ratio_known_distance() {
        // LCS "ittn": 2 * 4 / 13
        assert_eq!(ratio("kitten", "sitting"), 62);
        assert_eq!(ratio("Yes.", "Yes"), 86);
        assert_eq!(ratio("abc", "xyz"), 0);
    }

    #[test]
    fn test_ratio_spans_multiple_words() {
        let a = "ab".repeat(100);
        let b = format!("{}{}", a, "z".repeat(10));
        // LCS 200 over 410 chars
        assert_eq!(ratio(&a, &b), 98);
        assert_eq!(ratio(&a, &a), 100);
    }

    #[test]
    fn test_partial_ratio_finds_substring() {
        assert_eq!(partial_ratio("Paris", "The capital is Paris, France"), 100);
        assert!(partial_ratio("Lyon", "The capital is Paris") < 100);
    }

    #[test]
    fn test_partial_ratio_best_window() {
        // "abcd" against "xabxd": best window "abxd" shares "abd"
        assert_eq!(partial_ratio("abcd", "xabxd"), 75);
        assert_eq!(partial_ratio("abcd", "abcd"), 100);
        assert_eq!(partial_ratio("q", "xyz"), 0);
    }

    #[test]
    fn test_token_sort_ignores_order_and_punctuation() {
        assert_eq!(token_sort_ratio("new york mets", "Mets, New York!"), 100);
        assert!(ratio("new york mets", "mets new york") < 100);
    }

    #[tokio::test]
    async fn test_fuzzy_self_similarity() {
        let evaluator = FuzzyMatchEvaluator::default();
        for s in ["x", "The quick brown fox", "naïve café"] {
            let r = evaluator.evaluate(s, &json!(s), &EvalOptions::default()).await.unwrap();
            assert!(r.passed());
            assert_eq!(r.normalized_score(), 1.0);
            assert_eq!(r.meta("similarity_score"), Some(&json!(100)));
        }
    }

    #[tokio::test]
    async fn test_fuzzy_threshold_controls_pass() {
        let strict = FuzzyMatchEvaluator::new(90.0);
        let lenient = FuzzyMatchEvaluator::new(50.0);
        let opts = EvalOptions::default();

        let r = strict.evaluate("kitten", &json!("sitting"), &opts).await.unwrap();
        assert!(!r.passed());
        assert!((r.normalized_score() - 0.62).abs() < 1e-9);

        let r = lenient.evaluate("kitten", &json!("sitting"), &opts).await.unwrap();
        assert!(r.passed());
        assert!(r.meta("partial_ratio").is_some());
        assert!(r.meta("token_sort_ratio").is_some());
    }

    #[tokio::test]
    async fn test_trailing_punctuation_passes_default_threshold() {
        let r = FuzzyMatchEvaluator::default()
            .evaluate("Yes.", &json!("Yes"), &EvalOptions::default())
            .await
            .unwrap();
        assert_eq!(r.meta("similarity_score"), Some(&json!(86)));
        assert!(r.passed());
    }

    #[tokio::test]
    async fn test_long_inputs_finish_quickly() {
        let words = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "theta", "kappa"];
        let long: String = (0..700).map(|i| words[(i * 7 + i / 3) % words.len()]).collect::<Vec<_>>().join(" ");
        let short: String = long.chars().skip(900).take(1800).collect();
        assert!(long.chars().count() > 3500);

        let started = std::time::Instant::now();
        let r = FuzzyMatchEvaluator::default()
            .evaluate(&long, &json!(short), &EvalOptions::default())
            .await
            .unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
        assert_eq!(r.meta("partial_ratio"), Some(&json!(100)));
    }
}
