use std::fmt;

use serde::{Deserialize, Serialize};

/// Family an evaluator belongs to.
///
/// Dataset tooling also writes the short forms `fuzzy` and `json`; they read
/// as `FuzzyMatch` and `JsonMatch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvalKind {
	Match,
	Includes,
	#[serde(alias = "fuzzy")]
	FuzzyMatch,
	#[serde(rename = "json_match", alias = "json")]
	JsonMatch,
	ModelGraded,
	Custom,
}

impl EvalKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			EvalKind::Match => "match",
			EvalKind::Includes => "includes",
			EvalKind::FuzzyMatch => "fuzzy_match",
			EvalKind::JsonMatch => "json_match",
			EvalKind::ModelGraded => "model_graded",
			EvalKind::Custom => "custom",
		}
	}

	/// Whether results of this kind depend on an external judge model.
	pub fn is_judged(&self) -> bool {
		matches!(self, EvalKind::ModelGraded)
	}
}

impl Default for EvalKind {
	fn default() -> Self {
		EvalKind::Custom
	}
}

impl fmt::Display for EvalKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
