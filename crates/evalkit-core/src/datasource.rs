use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::types::{Dataset, TestCase};

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn load(&self) -> Result<Vec<TestCase>>;
}

pub struct VecDataSource {
    cases: Vec<TestCase>,
}

impl VecDataSource {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self { cases }
    }
}

#[async_trait]
impl DataSource for VecDataSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        Ok(self.cases.clone())
    }
}

/// Reads test cases from disk. Accepts either:
/// - a dataset document `{"name": ..., "test_cases": [...], ...}`
/// - JSONL, one case per line (blank lines skipped)
pub struct DatasetFileSource {
    path: PathBuf,
}

impl DatasetFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the full dataset document, including its metadata.
    pub async fn load_dataset(&self) -> Result<Dataset> {
        let content = read_to_string(&self.path).await?;
        serde_json::from_str(&content)
            .with_context(|| format!("{:?} is not a dataset document", self.path))
    }
}

#[async_trait]
impl DataSource for DatasetFileSource {
    async fn load(&self) -> Result<Vec<TestCase>> {
        let content = read_to_string(&self.path).await?;
        let cases = parse_cases(&content)?;
        tracing::debug!(path = %self.path.display(), cases = cases.len(), "loaded test cases");
        Ok(cases)
    }
}

/// Parses a dataset document, falling back to JSONL when the whole input is
/// not a single object with `test_cases`.
pub fn parse_cases(content: &str) -> Result<Vec<TestCase>> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(content) {
        if obj.contains_key("test_cases") {
            let dataset: Dataset = serde_json::from_value(Value::Object(obj))
                .context("Invalid dataset document")?;
            return Ok(dataset.test_cases);
        }
    }

    let mut cases = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(line)
            .with_context(|| format!("Invalid JSON on line {}", idx + 1))?;
        if !value.is_object() {
            return Err(anyhow!("Line {}: expected object", idx + 1));
        }
        let case: TestCase = serde_json::from_value(value)
            .with_context(|| format!("Line {}: not a test case", idx + 1))?;
        cases.push(case);
    }
    Ok(cases)
}

async fn read_to_string(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_jsonl() {
        let content = "{\"id\": 1, \"input\": \"q1\", \"expected\": \"a1\"}\n\n{\"input\": \"q2\", \"expected\": [\"x\"], \"includes\": [\"x\"]}\n";
        let cases = parse_cases(content).unwrap();
        assert_eq!(cases.len(), 2);
        assert_eq!(cases[1].field("includes"), Some(serde_json::json!(["x"])));
    }

    #[test]
    fn test_parse_jsonl_reports_line() {
        let err = parse_cases("{\"input\": 1}\n[1, 2]\n").unwrap_err();
        assert!(err.to_string().contains("Line 2"));
        let err = parse_cases("{\"input\": 1}\n{oops\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_single_line_case_is_not_a_dataset() {
        let cases = parse_cases("{\"input\": \"q\", \"expected\": \"a\"}").unwrap();
        assert_eq!(cases.len(), 1);
    }

    #[tokio::test]
    async fn test_file_source_reads_dataset_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"name": "geo", "description": "capitals", "version": "1.0", "eval_type": "match",
                "test_cases": [{{"id": 1, "input": "France?", "expected": "Paris", "category": "geo", "difficulty": "easy", "metadata": {{}}}}],
                "metadata": {{"total_cases": 1, "categories": ["geo"], "difficulty_levels": ["easy"]}}}}"#
        )
        .unwrap();

        let source = DatasetFileSource::new(file.path());
        let cases = source.load().await.unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].category, "geo");

        let dataset = source.load_dataset().await.unwrap();
        assert_eq!(dataset.name, "geo");
        assert_eq!(dataset.metadata.total_cases, 1);
    }

    #[test]
    fn test_parse_dataset_with_short_eval_type() {
        for eval_type in ["fuzzy", "json", "model_graded"] {
            let content = format!(
                r#"{{"name": "d", "eval_type": "{}", "test_cases": [{{"input": "q", "expected": "a"}}]}}"#,
                eval_type
            );
            let cases = parse_cases(&content).unwrap();
            assert_eq!(cases.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = DatasetFileSource::new("/definitely/not/here.jsonl");
        assert!(source.load().await.is_err());
    }
}
