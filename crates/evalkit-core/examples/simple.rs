use std::sync::Arc;

use evalkit_core::{
    DatasetFileSource, EvaluationSuite, ExactMatchEvaluator, FuzzyMatchEvaluator, IncludesEvaluator,
    JsonMatchEvaluator, SuiteRunner, TestCase,
};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Example 1: Inline cases, each evaluator reads the field named after it
    let cases = vec![
        TestCase::with_id(1, "What is the capital of France?", "Paris")
            .with_field("match", "Paris")
            .with_field("includes", json!(["Paris"])),
        TestCase::with_id(2, "Spell 'necessary'", "necessary").with_field("fuzzy_match", "necessary"),
        TestCase::with_id(3, "Classify the policy", json!({"compliant": false}))
            .with_field("json_match", json!({"compliant": false, "severity": "critical"})),
    ];
    let candidates = vec![
        "paris".to_string(),
        "neccessary".to_string(),
        r#"{"compliant": false, "severity": "high"}"#.to_string(),
    ];

    let suite = EvaluationSuite::new("quickstart", "deterministic checks")
        .with_evaluator(Arc::new(ExactMatchEvaluator::new()))
        .with_evaluator(Arc::new(IncludesEvaluator::new()))
        .with_evaluator(Arc::new(FuzzyMatchEvaluator::default()))
        .with_evaluator(Arc::new(JsonMatchEvaluator::new().with_required_keys(["compliant"])));

    let runner = SuiteRunner::builder().suite(Arc::new(suite)).concurrency(4).build()?;
    let report = runner.run(candidates, cases).await?;
    println!("{}", report.summary_table());

    // Example 2: Load a dataset file and grade every case against its own expected value
    if let Some(path) = std::env::args().nth(1) {
        let source = DatasetFileSource::new(path);
        let suite = EvaluationSuite::new("echo", "expected vs expected")
            .with_evaluator(Arc::new(ExactMatchEvaluator::new().named("expected")));
        let runner = SuiteRunner::builder().suite(Arc::new(suite)).build()?;

        let cases = evalkit_core::DataSource::load(&source).await?;
        let candidates = cases.iter().map(|c| evalkit_core::evaluator::value_text(&c.expected)).collect();
        let report = runner.run(candidates, cases).await?;
        println!("{}", report.summary_table());
    }

    Ok(())
}
