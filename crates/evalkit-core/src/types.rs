pub use evalkit_types::{
	CaseReport, Dataset, DatasetMetadata, EvalKind, EvalResult, RunReport, RunSummary, ScoreValue, SuiteResults,
	TestCase,
};
