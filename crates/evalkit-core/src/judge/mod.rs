//! Evaluators that delegate grading to an external judge model.
//!
//! Every variant renders a prompt, asks the judge for a single JSON object,
//! and decodes it into a typed verdict. Transport failures and malformed
//! verdicts become failed results; they are never returned as errors.
//!
//! Verdict fields that carry the grade (`overall_score`, and the two side
//! scores of a head-to-head comparison) are required. Descriptive fields
//! fall back to empty values when the judge leaves them out.

pub mod chain_of_thought;
pub mod client;
pub mod criteria;
pub mod factual;
pub mod head_to_head;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::types::EvalResult;
use client::JudgeClient;

/// Normalized rubric score at or above which a judged result passes.
pub const PASS_THRESHOLD: f64 = 0.6;

/// Maps a 1–5 rubric score onto [0, 1].
pub fn normalize_rubric(score: f64) -> f64 {
    score / 5.0
}

/// Asks the judge and decodes its reply into `T`.
pub(crate) async fn request_verdict<T: DeserializeOwned>(
    judge: &dyn JudgeClient,
    prompt: &str,
) -> Result<T> {
    let reply = judge.complete(prompt).await?;
    let object = extract_object(&reply)?;
    serde_json::from_value(object).context("judge verdict does not match the requested schema")
}

/// Turns a judging failure into the standard failed result.
pub(crate) fn judge_failure(variant: &str, evaluator: &str, err: anyhow::Error) -> EvalResult {
    let detail = format!("{:#}", err);
    tracing::warn!(evaluator, error = %detail, "judge evaluation failed");
    EvalResult::failure(format!("{} evaluation failed: {}", variant, detail), detail)
}

/// Parses a reply that should be exactly one JSON object. Surrounding
/// whitespace and a single Markdown code fence are accepted.
pub(crate) fn extract_object(reply: &str) -> Result<Value> {
    let text = strip_fence(reply.trim());
    let value: Value = serde_json::from_str(text).context("judge reply is not valid JSON")?;
    if !value.is_object() {
        return Err(anyhow!("judge reply is JSON but not an object"));
    }
    Ok(value)
}

fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let body = rest.strip_prefix("json").unwrap_or(rest);
    body.strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_plain_object() {
        let v = extract_object("  {\"overall_score\": 4}\n").unwrap();
        assert_eq!(v, json!({"overall_score": 4}));
    }

    #[test]
    fn test_extract_fenced_object() {
        let v = extract_object("```json\n{\"winner\": \"A\"}\n```").unwrap();
        assert_eq!(v["winner"], json!("A"));
        let v = extract_object("```\n{\"a\": 1}\n```").unwrap();
        assert_eq!(v["a"], json!(1));
    }

    #[test]
    fn test_extract_rejects_prose_and_arrays() {
        assert!(extract_object("The answer is good.").is_err());
        assert!(extract_object("[1, 2, 3]").is_err());
        assert!(extract_object("Sure! {\"overall_score\": 4}").is_err());
    }

    #[test]
    fn test_normalize_rubric() {
        assert_eq!(normalize_rubric(5.0), 1.0);
        assert_eq!(normalize_rubric(3.0), 0.6);
        assert!(normalize_rubric(3.0) >= PASS_THRESHOLD);
        assert!(normalize_rubric(2.5) < PASS_THRESHOLD);
    }
}
