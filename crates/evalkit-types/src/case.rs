use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::kind::EvalKind;

/// One graded example.
///
/// Fields beyond the standard set (for example a per-evaluator `"includes"`
/// list) are kept in `fields` so suites can look them up by evaluator name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<Value>,
	#[serde(default)]
	pub input: Value,
	#[serde(default)]
	pub expected: Value,
	#[serde(default = "default_category")]
	pub category: String,
	#[serde(default = "default_difficulty")]
	pub difficulty: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(flatten)]
	pub fields: Map<String, Value>,
}

fn default_category() -> String {
	"general".to_string()
}

fn default_difficulty() -> String {
	"medium".to_string()
}

impl TestCase {
	pub fn new(input: impl Into<Value>, expected: impl Into<Value>) -> Self {
		Self {
			id: None,
			input: input.into(),
			expected: expected.into(),
			category: default_category(),
			difficulty: default_difficulty(),
			metadata: Map::new(),
			fields: Map::new(),
		}
	}

	pub fn with_id(id: impl Into<Value>, input: impl Into<Value>, expected: impl Into<Value>) -> Self {
		Self {
			id: Some(id.into()),
			..Self::new(input, expected)
		}
	}

	/// Adds or replaces an extra field, typically keyed by an evaluator name.
	pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(name.into(), value.into());
		self
	}

	pub fn with_category(mut self, category: impl Into<String>) -> Self {
		self.category = category.into();
		self
	}

	pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
		self.difficulty = difficulty.into();
		self
	}

	/// Looks up a field by name. `null` counts as absent.
	pub fn field(&self, name: &str) -> Option<Value> {
		let value = match name {
			"id" => self.id.clone()?,
			"input" => self.input.clone(),
			"expected" => self.expected.clone(),
			"category" => Value::String(self.category.clone()),
			"difficulty" => Value::String(self.difficulty.clone()),
			"metadata" => Value::Object(self.metadata.clone()),
			other => self.fields.get(other)?.clone(),
		};
		if value.is_null() {
			None
		} else {
			Some(value)
		}
	}

	pub fn display_id(&self) -> String {
		match &self.id {
			Some(Value::String(s)) => s.clone(),
			Some(v) => v.to_string(),
			None => "-".to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
	#[serde(default)]
	pub total_cases: usize,
	#[serde(default)]
	pub categories: Vec<String>,
	#[serde(default)]
	pub difficulty_levels: Vec<String>,
}

/// Dataset document as produced by dataset tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
	pub name: String,
	#[serde(default)]
	pub description: String,
	#[serde(default = "default_version")]
	pub version: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created_by: Option<String>,
	#[serde(default)]
	pub eval_type: EvalKind,
	#[serde(default)]
	pub test_cases: Vec<TestCase>,
	#[serde(default)]
	pub metadata: DatasetMetadata,
}

fn default_version() -> String {
	"1.0".to_string()
}
