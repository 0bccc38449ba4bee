//! evalkit-core: grade generated text against references or rubrics.
//! Deterministic matchers and LLM judges share one `Evaluator` contract;
//! suites combine them per case and the runner fans out over many cases.
//! See `examples/simple.rs` for a quickstart.

pub mod config;
pub mod datasource;
pub mod error;
pub mod evaluator;
pub mod judge;
pub mod runner;
pub mod suite;
pub mod testing;
pub mod types;

pub mod evaluators {
	pub mod exact;
	pub mod fuzzy;
	pub mod includes;
	pub mod json;
	pub mod regex;
}

pub use config::{EvaluatorConfig, JudgeSettings, Rubric, SuiteConfig};
pub use datasource::{DataSource, DatasetFileSource, VecDataSource};
pub use error::EvalError;
pub use evaluator::{EvalOptions, Evaluator};
pub use evaluators::{
	exact::ExactMatchEvaluator,
	fuzzy::FuzzyMatchEvaluator,
	includes::IncludesEvaluator,
	json::JsonMatchEvaluator,
	regex::{RegexEvaluator, RegexFlags},
};
pub use judge::{
	chain_of_thought::ChainOfThoughtEvaluator,
	client::{HttpJudgeClient, JudgeClient, JudgeConfig, JudgeError, Provider},
	criteria::CriteriaEvaluator,
	factual::FactualConsistencyEvaluator,
	head_to_head::HeadToHeadEvaluator,
};
pub use runner::{batch_evaluate_concurrent, SuiteRunner, SuiteRunnerBuilder};
pub use suite::EvaluationSuite;
pub use types::{CaseReport, Dataset, EvalKind, EvalResult, RunReport, RunSummary, ScoreValue, SuiteResults, TestCase};
