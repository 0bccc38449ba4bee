use anyhow::Result;
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};

use crate::error::EvalError;
use crate::evaluator::{EvalOptions, Evaluator};
use crate::types::{EvalKind, EvalResult};

/// Passes when the pattern matches anywhere in the candidate.
/// The expected value is ignored.
pub struct RegexEvaluator {
	name: String,
	pattern: Regex,
	pattern_str: String,
}

/// Matching flags applied when compiling a [`RegexEvaluator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexFlags {
	pub case_insensitive: bool,
	pub multi_line: bool,
	pub dot_matches_new_line: bool,
}

impl RegexEvaluator {
	/// Compiles `pattern`; an invalid pattern is a construction error.
	pub fn new(pattern: &str) -> Result<Self, EvalError> {
		Self::with_flags(pattern, RegexFlags::default())
	}

	pub fn with_flags(pattern: &str, flags: RegexFlags) -> Result<Self, EvalError> {
		let regex = RegexBuilder::new(pattern)
			.case_insensitive(flags.case_insensitive)
			.multi_line(flags.multi_line)
			.dot_matches_new_line(flags.dot_matches_new_line)
			.build()
			.map_err(|e| EvalError::construction(format!("invalid pattern {:?}: {}", pattern, e)))?;
		Ok(Self {
			name: "regex".to_string(),
			pattern: regex,
			pattern_str: pattern.to_string(),
		})
	}

	pub fn named(mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}
}

#[async_trait]
impl Evaluator for RegexEvaluator {
	fn name(&self) -> &str {
		&self.name
	}

	fn kind(&self) -> EvalKind {
		EvalKind::Custom
	}

	async fn evaluate(&self, candidate: &str, _expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
		let captures = self.pattern.captures(candidate);
		let passed = captures.is_some();

		let mut metadata = json!({ "pattern": self.pattern_str });
		if let Some((caps, whole)) = captures.as_ref().and_then(|c| c.get(0).map(|m| (c, m))) {
			// regex reports byte offsets; expose character positions
			let char_pos = |byte: usize| candidate[..byte].chars().count();
			let groups: Vec<Option<&str>> = caps.iter().skip(1).map(|m| m.map(|m| m.as_str())).collect();

			metadata["match_start"] = json!(char_pos(whole.start()));
			metadata["match_end"] = json!(char_pos(whole.end()));
			metadata["matched_text"] = json!(whole.as_str());
			metadata["groups"] = json!(groups);
		}

		Ok(EvalResult::new(if passed { 1.0 } else { 0.0 }, passed)
			.with_reasoning(format!(
				"Pattern '{}' {}",
				self.pattern_str,
				if passed { "found" } else { "not found" }
			))
			.with_metadata(metadata))
	}
}
