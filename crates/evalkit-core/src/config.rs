use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EvalError;
use crate::evaluator::Evaluator;
use crate::evaluators::{
    exact::ExactMatchEvaluator,
    fuzzy::FuzzyMatchEvaluator,
    includes::IncludesEvaluator,
    json::JsonMatchEvaluator,
    regex::{RegexEvaluator, RegexFlags},
};
use crate::judge::{
    chain_of_thought::ChainOfThoughtEvaluator,
    client::{JudgeClient, JudgeConfig, Provider},
    criteria::CriteriaEvaluator,
    factual::FactualConsistencyEvaluator,
    head_to_head::HeadToHeadEvaluator,
};
use crate::suite::EvaluationSuite;

/// Declarative suite definition, usually read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeSettings>,
    #[serde(default)]
    pub evaluators: Vec<EvaluatorConfig>,
}

fn default_concurrency() -> usize {
    8
}

/// Judge settings as written in a config file. The API key itself is not
/// stored; `api_key_env` names the variable the application reads it from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeSettings {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_tokens() -> u32 {
    1000
}

impl JudgeSettings {
    pub fn provider(&self) -> Result<Provider, EvalError> {
        self.provider.parse()
    }

    /// Conventional variable for the provider when `api_key_env` is unset.
    pub fn key_variable(&self) -> Result<String, EvalError> {
        if let Some(var) = &self.api_key_env {
            return Ok(var.clone());
        }
        Ok(match self.provider()? {
            Provider::OpenAi => "OPENAI_API_KEY".to_string(),
            Provider::Anthropic => "ANTHROPIC_API_KEY".to_string(),
        })
    }

    pub fn into_judge_config(&self, api_key: impl Into<String>) -> Result<JudgeConfig, EvalError> {
        let mut config = JudgeConfig::new(self.provider()?, api_key, self.model.clone()).timeout(self.timeout_secs);
        config.max_tokens = self.max_tokens;
        if let Some(url) = &self.base_url {
            config = config.base_url(url.clone());
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum EvaluatorConfig {
    Match {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    Includes {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        case_sensitive: bool,
    },
    FuzzyMatch {
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_fuzzy_threshold")]
        threshold: f64,
    },
    JsonMatch {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        exact_match: bool,
        #[serde(default)]
        required_keys: Vec<String>,
    },
    Regex {
        #[serde(default)]
        name: Option<String>,
        pattern: String,
        #[serde(default)]
        case_insensitive: bool,
        #[serde(default)]
        multi_line: bool,
        #[serde(default)]
        dot_matches_new_line: bool,
    },
    Criteria {
        #[serde(default)]
        name: Option<String>,
        criteria: Rubric,
    },
    FactualConsistency {
        #[serde(default)]
        name: Option<String>,
    },
    ChainOfThought {
        #[serde(default)]
        name: Option<String>,
    },
    HeadToHead {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        criteria: Option<String>,
    },
}

/// Criterion name to description, in the order written in the config file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rubric(pub Vec<(String, String)>);

impl Serialize for Rubric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, description) in &self.0 {
            map.serialize_entry(name, description)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Rubric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RubricVisitor;

        impl<'de> Visitor<'de> for RubricVisitor {
            type Value = Rubric;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of criterion name to description")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, String)> = Vec::new();
                while let Some((name, description)) = access.next_entry::<String, String>()? {
                    match entries.iter_mut().find(|(n, _)| *n == name) {
                        Some(slot) => slot.1 = description,
                        None => entries.push((name, description)),
                    }
                }
                Ok(Rubric(entries))
            }
        }

        deserializer.deserialize_map(RubricVisitor)
    }
}

fn default_fuzzy_threshold() -> f64 {
    80.0
}

impl EvaluatorConfig {
    pub fn is_judged(&self) -> bool {
        matches!(
            self,
            EvaluatorConfig::Criteria { .. }
                | EvaluatorConfig::FactualConsistency { .. }
                | EvaluatorConfig::ChainOfThought { .. }
                | EvaluatorConfig::HeadToHead { .. }
        )
    }

    /// Builds the evaluator. Judge-backed variants need `judge`.
    pub fn build(&self, judge: Option<&Arc<dyn JudgeClient>>) -> Result<Arc<dyn Evaluator>, EvalError> {
        let need_judge = || {
            judge.cloned().ok_or_else(|| {
                EvalError::construction(format!("{} evaluator needs a judge client", self.type_name()))
            })
        };

        let evaluator: Arc<dyn Evaluator> = match self {
            EvaluatorConfig::Match { name, case_sensitive } => {
                let e = if *case_sensitive {
                    ExactMatchEvaluator::case_sensitive()
                } else {
                    ExactMatchEvaluator::new()
                };
                Arc::new(rename(e, name, |e, n| e.named(n)))
            }
            EvaluatorConfig::Includes { name, case_sensitive } => {
                let e = if *case_sensitive {
                    IncludesEvaluator::case_sensitive()
                } else {
                    IncludesEvaluator::new()
                };
                Arc::new(rename(e, name, |e, n| e.named(n)))
            }
            EvaluatorConfig::FuzzyMatch { name, threshold } => {
                Arc::new(rename(FuzzyMatchEvaluator::new(*threshold), name, |e, n| e.named(n)))
            }
            EvaluatorConfig::JsonMatch { name, exact_match, required_keys } => {
                let e = if *exact_match {
                    JsonMatchEvaluator::exact()
                } else {
                    JsonMatchEvaluator::new()
                };
                Arc::new(rename(e.with_required_keys(required_keys.clone()), name, |e, n| e.named(n)))
            }
            EvaluatorConfig::Regex { name, pattern, case_insensitive, multi_line, dot_matches_new_line } => {
                let flags = RegexFlags {
                    case_insensitive: *case_insensitive,
                    multi_line: *multi_line,
                    dot_matches_new_line: *dot_matches_new_line,
                };
                Arc::new(rename(RegexEvaluator::with_flags(pattern, flags)?, name, |e, n| e.named(n)))
            }
            EvaluatorConfig::Criteria { name, criteria } => Arc::new(rename(
                CriteriaEvaluator::new(criteria.0.clone(), need_judge()?)?,
                name,
                |e, n| e.named(n),
            )),
            EvaluatorConfig::FactualConsistency { name } => Arc::new(rename(
                FactualConsistencyEvaluator::new(need_judge()?),
                name,
                |e, n| e.named(n),
            )),
            EvaluatorConfig::ChainOfThought { name } => Arc::new(rename(
                ChainOfThoughtEvaluator::new(need_judge()?),
                name,
                |e, n| e.named(n),
            )),
            EvaluatorConfig::HeadToHead { name, criteria } => {
                let mut e = HeadToHeadEvaluator::new(need_judge()?);
                if let Some(c) = criteria {
                    e = e.with_criteria(c.clone());
                }
                Arc::new(rename(e, name, |e, n| e.named(n)))
            }
        };
        Ok(evaluator)
    }

    fn type_name(&self) -> &'static str {
        match self {
            EvaluatorConfig::Match { .. } => "match",
            EvaluatorConfig::Includes { .. } => "includes",
            EvaluatorConfig::FuzzyMatch { .. } => "fuzzy_match",
            EvaluatorConfig::JsonMatch { .. } => "json_match",
            EvaluatorConfig::Regex { .. } => "regex",
            EvaluatorConfig::Criteria { .. } => "criteria",
            EvaluatorConfig::FactualConsistency { .. } => "factual_consistency",
            EvaluatorConfig::ChainOfThought { .. } => "chain_of_thought",
            EvaluatorConfig::HeadToHead { .. } => "head_to_head",
        }
    }
}

fn rename<E>(evaluator: E, name: &Option<String>, named: fn(E, String) -> E) -> E {
    match name {
        Some(n) => named(evaluator, n.clone()),
        None => evaluator,
    }
}

impl SuiteConfig {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).context("Invalid suite config (YAML)")
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("Invalid suite config (JSON)")
    }

    /// Reads a `.json` file as JSON and anything else as YAML.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {:?}", path))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_yaml_str(&content),
        }
    }

    pub fn needs_judge(&self) -> bool {
        self.evaluators.iter().any(EvaluatorConfig::is_judged)
    }

    pub fn build(&self, judge: Option<Arc<dyn JudgeClient>>) -> Result<EvaluationSuite, EvalError> {
        let mut suite = EvaluationSuite::new(self.name.clone(), self.description.clone());
        for cfg in &self.evaluators {
            suite.add_evaluator(cfg.build(judge.as_ref())?);
        }
        Ok(suite)
    }
}
