use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;

use crate::judge::client::{JudgeClient, JudgeError};
use crate::types::RunReport;

/// Helper to assert a run's pass rate meets a threshold.
///
/// Use this in your `#[tokio::test]` functions.
///
/// # Example
/// ```ignore
/// #[tokio::test]
/// async fn test_my_agent() -> Result<()> {
///     let runner = SuiteRunner::builder().suite(suite).concurrency(4).build()?;
///     let report = runner.run(candidates, cases).await?;
///
///     // Assert 80% pass rate
///     assert_pass_rate(&report, 0.8)?;
///
///     Ok(())
/// }
/// ```
pub fn assert_pass_rate(report: &RunReport, min_pass_rate: f64) -> Result<()> {
	if report.summary.pass_rate < min_pass_rate {
		anyhow::bail!(
			"Evaluation failed: pass rate {:.1}% is below threshold {:.1}%\n{}",
			report.summary.pass_rate * 100.0,
			min_pass_rate * 100.0,
			report.summary_table()
		);
	}
	Ok(())
}

/// Helper to assert the average aggregate score meets a threshold.
pub fn assert_avg_score(report: &RunReport, min_avg_score: f64) -> Result<()> {
	if report.summary.avg_score < min_avg_score {
		anyhow::bail!(
			"Evaluation failed: avg score {:.3} is below threshold {:.3}\n{}",
			report.summary.avg_score,
			min_avg_score,
			report.summary_table()
		);
	}
	Ok(())
}

/// Helper to assert every case passed.
pub fn assert_all_passed(report: &RunReport) -> Result<()> {
	if report.summary.passed != report.summary.total {
		anyhow::bail!(
			"Evaluation failed: {}/{} cases passed\n{}",
			report.summary.passed,
			report.summary.total,
			report.summary_table()
		);
	}
	Ok(())
}

/// Judge double that replies with a fixed text (or a fixed error) and records
/// the prompts it was sent.
pub struct CannedJudge {
	reply: std::result::Result<String, String>,
	prompts: Mutex<Vec<String>>,
}

impl CannedJudge {
	pub fn new(reply: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			reply: Ok(reply.into()),
			prompts: Mutex::new(Vec::new()),
		})
	}

	/// Every call fails with [`JudgeError::Http`].
	pub fn failing(message: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			reply: Err(message.into()),
			prompts: Mutex::new(Vec::new()),
		})
	}

	pub fn calls(&self) -> usize {
		self.prompts.lock().map(|p| p.len()).unwrap_or_default()
	}

	pub fn last_prompt(&self) -> Option<String> {
		self.prompts.lock().ok().and_then(|p| p.last().cloned())
	}
}

#[async_trait]
impl JudgeClient for CannedJudge {
	fn model_id(&self) -> String {
		"canned:judge".to_string()
	}

	async fn complete(&self, prompt: &str) -> std::result::Result<String, JudgeError> {
		if let Ok(mut prompts) = self.prompts.lock() {
			prompts.push(prompt.to_string());
		}
		self.reply.clone().map_err(JudgeError::Http)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{CaseReport, EvalResult, SuiteResults, TestCase};

	fn report(verdicts: &[bool]) -> RunReport {
		let cases: Vec<CaseReport> = verdicts
			.iter()
			.enumerate()
			.map(|(i, passed)| CaseReport {
				case: TestCase::with_id(i as u64, "q", "a"),
				candidate: "a".to_string(),
				results: SuiteResults::new(),
				aggregate: EvalResult::new(if *passed { 1.0 } else { 0.0 }, *passed),
			})
			.collect();
		let summary = RunReport::summarize(&cases);
		RunReport { suite: "t".to_string(), cases, summary }
	}

	#[test]
	fn test_assert_helpers() {
		let r = report(&[true, true, true, false]);
		assert!(assert_pass_rate(&r, 0.75).is_ok());
		assert!(assert_pass_rate(&r, 0.8).is_err());
		assert!(assert_avg_score(&r, 0.7).is_ok());
		assert!(assert_all_passed(&r).is_err());
		assert!(assert_all_passed(&report(&[true])).is_ok());
	}

	#[tokio::test]
	async fn test_canned_judge_records_prompts() {
		let judge = CannedJudge::new("{}");
		assert_eq!(judge.complete("first").await.unwrap(), "{}");
		judge.complete("second").await.unwrap();
		assert_eq!(judge.calls(), 2);
		assert_eq!(judge.last_prompt().as_deref(), Some("second"));

		let down = CannedJudge::failing("connection refused");
		assert!(matches!(down.complete("x").await, Err(JudgeError::Http(_))));
	}
}
