use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::evaluator::{EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Checks that the candidate contains every required substring.
///
/// `expected` is a string or a list of strings; the score is the fraction
/// found and the result passes only when all are present.
pub struct IncludesEvaluator {
    name: String,
    case_sensitive: bool,
}

impl IncludesEvaluator {
    /// Case-insensitive substring checks.
    pub fn new() -> Self {
        Self {
            name: "includes".to_string(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive() -> Self {
        Self {
            case_sensitive: true,
            ..Self::new()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for IncludesEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn required_items(expected: &Value) -> Result<Vec<String>> {
    match expected {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => bail!("includes: list items must be strings, got {}", other),
            })
            .collect(),
        other => bail!("includes: expected a string or list of strings, got {}", other),
    }
}

#[async_trait]
impl Evaluator for IncludesEvaluator {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EvalKind {
        EvalKind::Includes
    }

    async fn evaluate(&self, candidate: &str, expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
        let required = required_items(expected)?;

        let haystack = if self.case_sensitive {
            candidate.to_string()
        } else {
            candidate.to_lowercase()
        };

        let (found, missing): (Vec<&String>, Vec<&String>) = required.iter().partition(|item| {
            if self.case_sensitive {
                haystack.contains(item.as_str())
            } else {
                haystack.contains(&item.to_lowercase())
            }
        });

        // An empty requirement list is vacuously satisfied.
        let score = if required.is_empty() {
            1.0
        } else {
            found.len() as f64 / required.len() as f64
        };
        let passed = missing.is_empty();

        Ok(EvalResult::new(score, passed)
            .with_reasoning(format!(
                "Found {}/{} required items: {:?}",
                found.len(),
                required.len(),
                found
            ))
            .with_metadata(serde_json::json!({
                "expected_items": required,
                "found_items": found,
                "missing_items": missing,
                "case_sensitive": self.case_sensitive,
            })))
    }
}
