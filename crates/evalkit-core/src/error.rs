use thiserror::Error;

/// Errors that escape the evaluator boundary.
///
/// Gradeable failures (bad JSON, judge outages, malformed verdicts) never show
/// up here; evaluators turn them into failed results instead.
#[derive(Debug, Error)]
pub enum EvalError {
	/// Invalid configuration detected while building an evaluator or suite.
	#[error("invalid evaluator configuration: {0}")]
	Construction(String),

	/// Caller passed sequences that cannot be paired.
	#[error("input contract violated: {candidates} candidates but {expected} expected values")]
	InputContract { candidates: usize, expected: usize },
}

impl EvalError {
	pub fn construction(msg: impl Into<String>) -> Self {
		EvalError::Construction(msg.into())
	}
}
