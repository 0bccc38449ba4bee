//! evalkit-types: record shapes shared between the evalkit crates.
//! Results, evaluator kinds, test cases, datasets and run reports.

mod case;
mod kind;
mod report;
mod result;

pub use case::{Dataset, DatasetMetadata, TestCase};
pub use kind::EvalKind;
pub use report::{CaseReport, RunReport, RunSummary};
pub use result::{EvalResult, ScoreValue, SuiteResults};
