use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabled::{Table, Tabled};

use crate::case::TestCase;
use crate::result::{EvalResult, SuiteResults};

/// Outcome of running a suite against one candidate/case pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
	pub case: TestCase,
	pub candidate: String,
	pub results: SuiteResults,
	pub aggregate: EvalResult,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
	pub total: usize,
	pub passed: usize,
	pub pass_rate: f64,
	pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
	pub suite: String,
	pub cases: Vec<CaseReport>,
	pub summary: RunSummary,
}

#[derive(Debug, Clone, Tabled)]
struct SummaryRow {
	id: String,
	passed: String,
	score: String,
	evaluators: String,
	input: String,
	candidate: String,
}

impl RunReport {
	pub fn summarize(cases: &[CaseReport]) -> RunSummary {
		let total = cases.len();
		let passed = cases.iter().filter(|c| c.aggregate.passed()).count();
		let score_sum: f64 = cases.iter().map(|c| c.aggregate.normalized_score()).sum();

		let pass_rate = if total == 0 { 0.0 } else { passed as f64 / total as f64 };
		let avg_score = if total == 0 { 0.0 } else { score_sum / total as f64 };

		RunSummary { total, passed, pass_rate, avg_score }
	}

	pub fn summary_table(&self) -> String {
		let rows: Vec<SummaryRow> = self
			.cases
			.iter()
			.map(|cr| {
				let evaluators = cr
					.results
					.iter()
					.map(|(name, r)| format!("{}{}", if r.passed() { "✓" } else { "✗" }, name))
					.collect::<Vec<_>>()
					.join(" ");

				SummaryRow {
					id: cr.case.display_id(),
					passed: if cr.aggregate.passed() { "✓" } else { " " }.to_string(),
					score: format!("{:.3}", cr.aggregate.normalized_score()),
					evaluators,
					input: truncate(value_preview(&cr.case.input), 48),
					candidate: truncate(cr.candidate.clone(), 48),
				}
			})
			.collect();

		let table = Table::new(rows);

		let summary_text = format!(
			"Suite: {}  Total: {}  Passed: {}  Pass rate: {:.1}%  Avg score: {:.3}",
			self.suite,
			self.summary.total,
			self.summary.passed,
			self.summary.pass_rate * 100.0,
			self.summary.avg_score
		);

		format!("{}\n\n{}\n", table, summary_text)
	}
}

fn value_preview(v: &Value) -> String {
	match v {
		Value::String(s) => s.clone(),
		_ => v.to_string(),
	}
}

fn truncate(s: String, max_len: usize) -> String {
	if s.chars().count() <= max_len {
		return s;
	}
	let mut truncated = s.chars().take(max_len.saturating_sub(1)).collect::<String>();
	truncated.push('…');
	truncated
}

#[cfg(test)]
mod tests {
	use super::*;

	fn report(passed: bool, score: f64) -> CaseReport {
		let mut results = SuiteResults::new();
		results.insert("match", EvalResult::new(score, passed));
		CaseReport {
			case: TestCase::with_id(1, "q", "a"),
			candidate: "a".to_string(),
			results,
			aggregate: EvalResult::new(score, passed),
		}
	}

	#[test]
	fn test_summarize_empty() {
		let s = RunReport::summarize(&[]);
		assert_eq!(s.total, 0);
		assert_eq!(s.pass_rate, 0.0);
		assert_eq!(s.avg_score, 0.0);
	}

	#[test]
	fn test_summarize_counts_aggregate_verdicts() {
		let cases = vec![report(true, 1.0), report(false, 0.0), report(true, 0.5)];
		let s = RunReport::summarize(&cases);
		assert_eq!(s.total, 3);
		assert_eq!(s.passed, 2);
		assert!((s.avg_score - 0.5).abs() < 1e-9);
	}

	#[test]
	fn test_summary_table_mentions_totals() {
		let cases = vec![report(true, 1.0)];
		let summary = RunReport::summarize(&cases);
		let r = RunReport { suite: "demo".to_string(), cases, summary };
		let table = r.summary_table();
		assert!(table.contains("Total: 1"));
		assert!(table.contains("✓match"));
	}

	#[test]
	fn test_truncate_is_char_safe() {
		let s = "é".repeat(10);
		let t = truncate(s, 4);
		assert_eq!(t.chars().count(), 4);
		assert!(t.ends_with('…'));
	}
}
