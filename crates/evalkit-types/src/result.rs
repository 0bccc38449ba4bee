use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Primary score of a result: a number or a boolean verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreValue {
	Bool(bool),
	Number(f64),
}

impl ScoreValue {
	/// Score mapped into [0, 1]. NaN maps to 0.
	pub fn normalized(&self) -> f64 {
		match *self {
			ScoreValue::Bool(b) => {
				if b {
					1.0
				} else {
					0.0
				}
			}
			ScoreValue::Number(n) if n.is_nan() => 0.0,
			ScoreValue::Number(n) => n.clamp(0.0, 1.0),
		}
	}

	/// Raw numeric view; booleans read as 0/1.
	pub fn as_f64(&self) -> f64 {
		match *self {
			ScoreValue::Bool(b) => f64::from(u8::from(b)),
			ScoreValue::Number(n) => n,
		}
	}
}

impl From<f64> for ScoreValue {
	fn from(v: f64) -> Self {
		ScoreValue::Number(v)
	}
}

impl From<bool> for ScoreValue {
	fn from(v: bool) -> Self {
		ScoreValue::Bool(v)
	}
}

/// Outcome of a single evaluation.
///
/// `passed` is set by the producing evaluator according to its own policy and
/// is not derived from `score`. Values are immutable once built; the `with_*`
/// methods consume and return the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
	score: ScoreValue,
	#[serde(default)]
	reasoning: Option<String>,
	#[serde(default)]
	metadata: Map<String, Value>,
	passed: bool,
}

impl EvalResult {
	pub fn new(score: impl Into<ScoreValue>, passed: bool) -> Self {
		Self {
			score: score.into(),
			reasoning: None,
			metadata: Map::new(),
			passed,
		}
	}

	/// Zero-score failed result carrying an error message.
	pub fn failure(reasoning: impl Into<String>, error: impl Into<String>) -> Self {
		let mut metadata = Map::new();
		metadata.insert("error".to_string(), Value::String(error.into()));
		Self {
			score: ScoreValue::Number(0.0),
			reasoning: Some(reasoning.into()),
			metadata,
			passed: false,
		}
	}

	pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
		self.reasoning = Some(reasoning.into());
		self
	}

	/// Replaces the metadata. Non-object values are wrapped under `"value"`.
	pub fn with_metadata(mut self, metadata: Value) -> Self {
		self.metadata = match metadata {
			Value::Object(map) => map,
			Value::Null => Map::new(),
			other => {
				let mut map = Map::new();
				map.insert("value".to_string(), other);
				map
			}
		};
		self
	}

	pub fn score(&self) -> ScoreValue {
		self.score
	}

	pub fn normalized_score(&self) -> f64 {
		self.score.normalized()
	}

	pub fn passed(&self) -> bool {
		self.passed
	}

	pub fn reasoning(&self) -> Option<&str> {
		self.reasoning.as_deref()
	}

	pub fn metadata(&self) -> &Map<String, Value> {
		&self.metadata
	}

	pub fn meta(&self, key: &str) -> Option<&Value> {
		self.metadata.get(key)
	}
}

/// Per-evaluator results of one suite run, in insertion order.
///
/// Inserting an existing name replaces that entry in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuiteResults {
	entries: Vec<(String, EvalResult)>,
}

impl SuiteResults {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&mut self, name: impl Into<String>, result: EvalResult) {
		let name = name.into();
		match self.entries.iter_mut().find(|(n, _)| *n == name) {
			Some(slot) => slot.1 = result,
			None => self.entries.push((name, result)),
		}
	}

	pub fn get(&self, name: &str) -> Option<&EvalResult> {
		self.entries.iter().find(|(n, _)| n == name).map(|(_, r)| r)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &EvalResult)> {
		self.entries.iter().map(|(n, r)| (n.as_str(), r))
	}

	pub fn names(&self) -> impl Iterator<Item = &str> {
		self.entries.iter().map(|(n, _)| n.as_str())
	}

	pub fn values(&self) -> impl Iterator<Item = &EvalResult> {
		self.entries.iter().map(|(_, r)| r)
	}
}

impl FromIterator<(String, EvalResult)> for SuiteResults {
	fn from_iter<I: IntoIterator<Item = (String, EvalResult)>>(iter: I) -> Self {
		let mut results = SuiteResults::new();
		for (name, result) in iter {
			results.insert(name, result);
		}
		results
	}
}

impl Serialize for SuiteResults {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.entries.len()))?;
		for (name, result) in &self.entries {
			map.serialize_entry(name, result)?;
		}
		map.end()
	}
}

impl<'de> Deserialize<'de> for SuiteResults {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		struct ResultsVisitor;

		impl<'de> Visitor<'de> for ResultsVisitor {
			type Value = SuiteResults;

			fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				f.write_str("a map of evaluator name to result")
			}

			fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
				let mut results = SuiteResults::new();
				while let Some((name, result)) = access.next_entry::<String, EvalResult>()? {
					results.insert(name, result);
				}
				Ok(results)
			}
		}

		deserializer.deserialize_map(ResultsVisitor)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_normalized_score_bool() {
		assert_eq!(EvalResult::new(true, true).normalized_score(), 1.0);
		assert_eq!(EvalResult::new(false, false).normalized_score(), 0.0);
	}

	#[test]
	fn test_normalized_score_clamps() {
		assert_eq!(EvalResult::new(1.7, true).normalized_score(), 1.0);
		assert_eq!(EvalResult::new(-0.3, false).normalized_score(), 0.0);
		assert_eq!(EvalResult::new(0.25, false).normalized_score(), 0.25);
		assert_eq!(EvalResult::new(f64::NAN, false).normalized_score(), 0.0);
	}

	#[test]
	fn test_passed_independent_of_score() {
		let r = EvalResult::new(0.1, true);
		assert!(r.passed());
		assert_eq!(r.normalized_score(), 0.1);
	}

	#[test]
	fn test_failure_shape() {
		let r = EvalResult::failure("Evaluation failed: boom", "boom");
		assert!(!r.passed());
		assert_eq!(r.score(), ScoreValue::Number(0.0));
		assert_eq!(r.meta("error"), Some(&json!("boom")));
	}

	#[test]
	fn test_wire_shape() {
		let r = EvalResult::new(0.5, false)
			.with_reasoning("half")
			.with_metadata(json!({"k": 1}));
		let v = serde_json::to_value(&r).unwrap();
		assert_eq!(
			v,
			json!({"score": 0.5, "reasoning": "half", "metadata": {"k": 1}, "passed": false})
		);
	}

	#[test]
	fn test_deserialize_rejects_bad_score_and_metadata() {
		let bad_score = json!({"score": "high", "passed": true});
		assert!(serde_json::from_value::<EvalResult>(bad_score).is_err());

		let bad_meta = json!({"score": 1.0, "passed": true, "metadata": [1, 2]});
		assert!(serde_json::from_value::<EvalResult>(bad_meta).is_err());

		let ok = json!({"score": true, "passed": true});
		let r: EvalResult = serde_json::from_value(ok).unwrap();
		assert_eq!(r.normalized_score(), 1.0);
		assert!(r.metadata().is_empty());
	}

	#[test]
	fn test_suite_results_overwrite_keeps_position() {
		let mut results = SuiteResults::new();
		results.insert("a", EvalResult::new(1.0, true));
		results.insert("b", EvalResult::new(0.0, false));
		results.insert("a", EvalResult::new(0.5, false));

		let names: Vec<&str> = results.names().collect();
		assert_eq!(names, vec!["a", "b"]);
		assert_eq!(results.get("a").unwrap().normalized_score(), 0.5);
	}

	#[test]
	fn test_suite_results_serialize_as_map() {
		let mut results = SuiteResults::new();
		results.insert("match", EvalResult::new(1.0, true));
		let v = serde_json::to_value(&results).unwrap();
		assert_eq!(v["match"]["passed"], json!(true));

		let back: SuiteResults = serde_json::from_value(v).unwrap();
		assert_eq!(back, results);
	}
}
