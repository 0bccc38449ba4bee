use std::sync::Arc;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::datasource::DataSource;
use crate::evaluator::{ensure_paired, EvalOptions, Evaluator};
use crate::suite::EvaluationSuite;
use crate::types::{CaseReport, EvalResult, RunReport, TestCase};

pub struct SuiteRunnerBuilder {
	suite: Option<Arc<EvaluationSuite>>,
	options: EvalOptions,
	concurrency: usize,
}

impl SuiteRunnerBuilder {
	pub fn new() -> Self {
		Self {
			suite: None,
			options: EvalOptions::default(),
			concurrency: 8,
		}
	}

	pub fn suite(mut self, suite: Arc<EvaluationSuite>) -> Self {
		self.suite = Some(suite);
		self
	}

	pub fn options(mut self, options: EvalOptions) -> Self {
		self.options = options;
		self
	}

	/// Cases in flight at once. Judge-backed suites should keep this within
	/// the provider's rate limits.
	pub fn concurrency(mut self, n: usize) -> Self {
		self.concurrency = n.max(1);
		self
	}

	pub fn build(self) -> Result<SuiteRunner> {
		Ok(SuiteRunner {
			suite: self.suite.ok_or_else(|| anyhow::anyhow!("suite must be set"))?,
			options: self.options,
			concurrency: self.concurrency,
		})
	}
}

impl Default for SuiteRunnerBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Runs a suite over many candidate/case pairs with bounded concurrency.
/// Reports come back in input order.
pub struct SuiteRunner {
	suite: Arc<EvaluationSuite>,
	options: EvalOptions,
	concurrency: usize,
}

impl SuiteRunner {
	pub fn builder() -> SuiteRunnerBuilder {
		SuiteRunnerBuilder::new()
	}

	/// Pairs `candidates[i]` with `cases[i]`.
	pub async fn run(&self, candidates: Vec<String>, cases: Vec<TestCase>) -> Result<RunReport> {
		ensure_paired(candidates.len(), cases.len())?;
		tracing::info!(suite = self.suite.name(), cases = cases.len(), concurrency = self.concurrency, "starting run");

		let suite = self.suite.as_ref();
		let options = &self.options;
		let reports: Vec<CaseReport> = stream::iter(candidates.into_iter().zip(cases))
			.map(|(candidate, case)| async move {
				let results = suite.run_with_options(&candidate, &case, options).await;
				let aggregate = EvaluationSuite::aggregate(&results);
				CaseReport {
					case,
					candidate,
					results,
					aggregate,
				}
			})
			.buffered(self.concurrency)
			.collect()
			.await;

		let summary = RunReport::summarize(&reports);
		tracing::info!(
			suite = self.suite.name(),
			passed = summary.passed,
			total = summary.total,
			avg_score = summary.avg_score,
			"run finished"
		);

		Ok(RunReport {
			suite: self.suite.name().to_string(),
			cases: reports,
			summary,
		})
	}

	/// Loads cases from `source` and pairs them with `candidates`.
	pub async fn run_source(&self, candidates: Vec<String>, source: &dyn DataSource) -> Result<RunReport> {
		let cases = source.load().await?;
		self.run(candidates, cases).await
	}
}

/// Bounded-parallel form of [`Evaluator::batch_evaluate`]. Output order
/// matches input order regardless of completion order.
pub async fn batch_evaluate_concurrent(
	evaluator: &dyn Evaluator,
	candidates: &[String],
	expected: &[Value],
	options: &EvalOptions,
	concurrency: usize,
) -> Result<Vec<EvalResult>> {
	ensure_paired(candidates.len(), expected.len())?;

	let results: Vec<Result<EvalResult>> = stream::iter(candidates.iter().zip(expected))
		.map(|(candidate, exp)| evaluator.evaluate(candidate, exp, options))
		.buffered(concurrency.max(1))
		.collect()
		.await;

	results.into_iter().collect()
}
