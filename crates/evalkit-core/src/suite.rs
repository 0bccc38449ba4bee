use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::json;

use crate::evaluator::{EvalOptions, Evaluator};
use crate::types::{EvalResult, SuiteResults, TestCase};

/// Share of passing evaluators needed for the aggregate to pass. Ties pass.
const MAJORITY: f64 = 0.5;

/// Ordered set of named evaluators run together against one case.
///
/// Each evaluator reads the case field named after it; evaluators whose field
/// is missing are skipped. A failing or panicking evaluator yields a failed
/// result in its own slot and never stops the others.
pub struct EvaluationSuite {
	name: String,
	description: String,
	evaluators: Vec<Arc<dyn Evaluator>>,
}

impl EvaluationSuite {
	pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			description: description.into(),
			evaluators: Vec::new(),
		}
	}

	pub fn add_evaluator(&mut self, evaluator: Arc<dyn Evaluator>) {
		self.evaluators.push(evaluator);
	}

	pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator>) -> Self {
		self.add_evaluator(evaluator);
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn description(&self) -> &str {
		&self.description
	}

	pub fn evaluators(&self) -> &[Arc<dyn Evaluator>] {
		&self.evaluators
	}

	pub async fn run(&self, candidate: &str, case: &TestCase) -> SuiteResults {
		self.run_with_options(candidate, case, &EvalOptions::default()).await
	}

	pub async fn run_with_options(&self, candidate: &str, case: &TestCase, options: &EvalOptions) -> SuiteResults {
		let mut results = SuiteResults::new();

		for evaluator in &self.evaluators {
			let name = evaluator.name();
			let Some(expected) = case.field(name) else {
				tracing::trace!(evaluator = name, case = %case.display_id(), "no field for evaluator, skipping");
				continue;
			};

			let outcome = AssertUnwindSafe(evaluator.evaluate(candidate, &expected, options))
				.catch_unwind()
				.await;

			let result = match outcome {
				Ok(Ok(result)) => {
					tracing::debug!(
						evaluator = name,
						kind = %evaluator.kind(),
						passed = result.passed(),
						score = result.normalized_score(),
						"evaluated"
					);
					result
				}
				Ok(Err(err)) => isolated_failure(name, format!("{:#}", err)),
				Err(panic) => isolated_failure(name, format!("evaluator panicked: {}", panic_message(&*panic))),
			};
			results.insert(name, result);
		}

		results
	}

	/// Runs the suite and folds the results into one verdict.
	pub async fn evaluate(&self, candidate: &str, case: &TestCase) -> (SuiteResults, EvalResult) {
		let results = self.run(candidate, case).await;
		let aggregate = Self::aggregate(&results);
		(results, aggregate)
	}

	/// Mean normalized score; passes when at least half the results passed.
	pub fn aggregate(results: &SuiteResults) -> EvalResult {
		if results.is_empty() {
			return EvalResult::new(0.0, false).with_reasoning("No results to aggregate");
		}

		let total = results.len() as f64;
		let avg_score = results.values().map(EvalResult::normalized_score).sum::<f64>() / total;
		let pass_rate = results.values().filter(|r| r.passed()).count() as f64 / total;

		EvalResult::new(avg_score, pass_rate >= MAJORITY)
			.with_reasoning(format!(
				"Average score: {:.3}, Pass rate: {:.1}%",
				avg_score,
				pass_rate * 100.0
			))
			.with_metadata(json!({
				"individual_results": results,
				"pass_rate": pass_rate,
				"total_evaluators": results.len(),
			}))
	}
}

fn isolated_failure(name: &str, error: String) -> EvalResult {
	tracing::warn!(evaluator = name, error = %error, "evaluator failed inside suite");
	EvalResult::failure(format!("Evaluation failed: {}", error), error)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::evaluators::{exact::ExactMatchEvaluator, includes::IncludesEvaluator, json::JsonMatchEvaluator};
	use crate::judge::head_to_head::HeadToHeadEvaluator;
	use crate::testing::CannedJudge;
	use crate::types::EvalKind;
	use anyhow::Result;
	use async_trait::async_trait;
	use serde_json::Value;

	struct Exploding;

	#[async_trait]
	impl Evaluator for Exploding {
		fn name(&self) -> &str {
			"explode"
		}

		fn kind(&self) -> EvalKind {
			EvalKind::Custom
		}

		async fn evaluate(&self, _candidate: &str, _expected: &Value, _options: &EvalOptions) -> Result<EvalResult> {
			panic!("kaboom");
		}
	}

	fn results_of(flags: &[(&str, f64, bool)]) -> SuiteResults {
		flags
			.iter()
			.map(|(n, s, p)| (n.to_string(), EvalResult::new(*s, *p)))
			.collect()
	}

	#[test]
	fn test_aggregate_empty() {
		let r = EvaluationSuite::aggregate(&SuiteResults::new());
		assert_eq!(r.normalized_score(), 0.0);
		assert!(!r.passed());
		assert_eq!(r.reasoning(), Some("No results to aggregate"));
	}

	#[test]
	fn test_aggregate_majority_passes() {
		let r = EvaluationSuite::aggregate(&results_of(&[("a", 1.0, true), ("b", 1.0, true), ("c", 0.0, false)]));
		assert!(r.passed());
		assert!((r.meta("pass_rate").unwrap().as_f64().unwrap() - 2.0 / 3.0).abs() < 1e-9);
		assert_eq!(r.meta("total_evaluators"), Some(&json!(3)));
		assert!(r.meta("individual_results").unwrap().get("c").is_some());
	}

	#[test]
	fn test_aggregate_tie_passes_minority_fails() {
		let tie = EvaluationSuite::aggregate(&results_of(&[("a", 0.0, true), ("b", 1.0, false)]));
		assert!(tie.passed());
		let minority = EvaluationSuite::aggregate(&results_of(&[("a", 1.0, true), ("b", 1.0, false), ("c", 1.0, false)]));
		assert!(!minority.passed());
		assert_eq!(minority.normalized_score(), 1.0);
	}

	#[test]
	fn test_aggregate_uses_normalized_scores() {
		let mut results = SuiteResults::new();
		results.insert("bool", EvalResult::new(true, true));
		results.insert("over", EvalResult::new(3.0, true));
		results.insert("half", EvalResult::new(0.5, false));
		let r = EvaluationSuite::aggregate(&results);
		assert!((r.normalized_score() - 2.5 / 3.0).abs() < 1e-9);
		assert_eq!(r.reasoning(), Some("Average score: 0.833, Pass rate: 66.7%"));
	}

	#[tokio::test]
	async fn test_run_skips_evaluators_without_fields() {
		let suite = EvaluationSuite::new("qa", "capital questions")
			.with_evaluator(Arc::new(ExactMatchEvaluator::new()))
			.with_evaluator(Arc::new(IncludesEvaluator::new()))
			.with_evaluator(Arc::new(JsonMatchEvaluator::new()));

		let case = TestCase::new("capital of France?", Value::Null)
			.with_field("match", "Paris")
			.with_field("includes", json!(["Paris"]));

		let results = suite.run("Paris", &case).await;
		let names: Vec<&str> = results.names().collect();
		assert_eq!(names, vec!["match", "includes"]);
		assert!(results.values().all(EvalResult::passed));
	}

	#[tokio::test]
	async fn test_run_isolates_errors_and_panics() {
		let suite = EvaluationSuite::new("qa", "")
			.with_evaluator(Arc::new(Exploding))
			.with_evaluator(Arc::new(IncludesEvaluator::new()))
			.with_evaluator(Arc::new(ExactMatchEvaluator::new()));

		let case = TestCase::new("q", Value::Null)
			.with_field("explode", true)
			.with_field("includes", 42)
			.with_field("match", "Paris");

		let (results, aggregate) = suite.evaluate("Paris", &case).await;
		assert_eq!(results.len(), 3);

		let exploded = results.get("explode").unwrap();
		assert!(!exploded.passed());
		assert!(exploded.meta("error").and_then(Value::as_str).unwrap().contains("kaboom"));

		let bad_shape = results.get("includes").unwrap();
		assert!(!bad_shape.passed());
		assert!(bad_shape.reasoning().unwrap().starts_with("Evaluation failed"));

		assert!(results.get("match").unwrap().passed());
		assert!(!aggregate.passed());
	}

	#[tokio::test]
	async fn test_duplicate_names_overwrite() {
		let suite = EvaluationSuite::new("dup", "")
			.with_evaluator(Arc::new(ExactMatchEvaluator::new()))
			.with_evaluator(Arc::new(ExactMatchEvaluator::case_sensitive()));

		let case = TestCase::new("q", Value::Null).with_field("match", "paris");
		let results = suite.run("Paris", &case).await;
		assert_eq!(results.len(), 1);
		assert!(!results.get("match").unwrap().passed());
	}

	#[tokio::test]
	async fn test_run_passes_options_to_judges() {
		let judge = CannedJudge::new(r#"{"winner":"A","response_a_score":5,"response_b_score":2}"#);
		let suite = EvaluationSuite::new("pairwise", "")
			.with_evaluator(Arc::new(HeadToHeadEvaluator::new(judge.clone())));
		let case = TestCase::new("q", Value::Null).with_field("head_to_head", "the other answer");

		let opts = EvalOptions::with_comparison_criteria("accuracy");
		let results = suite.run_with_options("my answer", &case, &opts).await;
		assert!(results.get("head_to_head").unwrap().passed());
		assert!(judge.last_prompt().unwrap().contains("Compare them on: accuracy"));
	}
}
