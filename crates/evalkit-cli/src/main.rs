use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use evalkit_core::{DataSource, DatasetFileSource, HttpJudgeClient, JudgeClient, SuiteConfig, SuiteRunner};
use serde::Deserialize;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "evalkit", about = "Grade model outputs against a dataset")]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
	Run(RunArgs),
}

#[derive(Debug, Clone, Parser)]
struct RunArgs {
	/// Suite config (YAML, or JSON when the extension is .json)
	#[arg(long)]
	suite: PathBuf,

	/// Dataset document or JSONL file of test cases
	#[arg(long)]
	dataset: PathBuf,

	/// JSONL file of candidate outputs, one per test case, in the same order.
	/// Each line is a JSON string or an object with an "output" field.
	#[arg(long)]
	candidates: PathBuf,

	/// Cases in flight; overrides the suite config
	#[arg(long)]
	concurrency: Option<usize>,

	/// Write the full run report as JSON to this file
	#[arg(long)]
	json_out: Option<PathBuf>,

	/// Exit with an error when the pass rate falls below this value (0.0..=1.0)
	#[arg(long)]
	min_pass_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CandidateLine {
	Text(String),
	Record { output: Value },
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	match cli.command {
		Commands::Run(args) => run(args).await?,
	}
	Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
	let config = SuiteConfig::from_path(&args.suite).await?;

	let judge = if config.needs_judge() {
		let settings = config
			.judge
			.as_ref()
			.ok_or_else(|| anyhow!("suite {:?} uses judge evaluators but has no `judge` section", config.name))?;
		let var = settings.key_variable()?;
		let api_key = std::env::var(&var).with_context(|| format!("{} is not set", var))?;
		let client: Arc<dyn JudgeClient> = Arc::new(HttpJudgeClient::new(settings.into_judge_config(api_key)?)?);
		tracing::info!(model = %client.model_id(), "judge configured");
		Some(client)
	} else {
		None
	};

	let suite = config.build(judge)?;
	let cases = DatasetFileSource::new(&args.dataset).load().await?;
	let candidates = read_candidates(&args.candidates).await?;

	let runner = SuiteRunner::builder()
		.suite(Arc::new(suite))
		.concurrency(args.concurrency.unwrap_or(config.concurrency))
		.build()?;

	let report = runner.run(candidates, cases).await?;
	println!("{}", report.summary_table());

	if let Some(path) = args.json_out {
		let json = serde_json::to_string_pretty(&report)?;
		tokio::fs::write(&path, json)
			.await
			.with_context(|| format!("Failed to write {:?}", path))?;
	}

	if let Some(min) = args.min_pass_rate {
		if report.summary.pass_rate < min {
			bail!(
				"pass rate {:.1}% is below the required {:.1}%",
				report.summary.pass_rate * 100.0,
				min * 100.0
			);
		}
	}

	Ok(())
}

async fn read_candidates(path: &Path) -> Result<Vec<String>> {
	let content = tokio::fs::read_to_string(path)
		.await
		.with_context(|| format!("Failed to read {:?}", path))?;
	parse_candidates(&content)
}

fn parse_candidates(content: &str) -> Result<Vec<String>> {
	let mut out = Vec::new();
	for (idx, line) in content.lines().enumerate() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}
		let parsed: CandidateLine = serde_json::from_str(line)
			.with_context(|| format!("Line {}: expected a JSON string or {{\"output\": ...}}", idx + 1))?;
		out.push(match parsed {
			CandidateLine::Text(s) => s,
			CandidateLine::Record { output: Value::String(s) } => s,
			CandidateLine::Record { output } => output.to_string(),
		});
	}
	Ok(out)
}
