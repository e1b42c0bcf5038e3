//! Execute Command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use tracing::info;

use retrace_common::{ExecutionResult, ResultStore, ScriptFormat, StepResult, TestScript};
use retrace_engine::{FailurePolicy, PlaywrightDriver, RetraceConfig, TestExecutor};

use crate::output::{print_list, print_value, print_warning, truncate, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ExecuteArgs {
    /// Script name
    pub script: String,

    /// Script file format (json, yaml); any stored format when omitted
    #[arg(long)]
    pub script_format: Option<ScriptFormat>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Skip the remaining steps after the first failure
    #[arg(long)]
    pub halt_on_failure: bool,
}

/// Step result display wrapper for serialization
#[derive(Serialize)]
pub struct StepDisplay {
    pub step: usize,
    pub description: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot: Option<String>,
}

impl StepDisplay {
    pub fn new(result: &StepResult, script: Option<&TestScript>) -> Self {
        Self {
            step: result.step_index,
            description: script
                .and_then(|s| s.steps.get(result.step_index))
                .map(|s| s.description.clone())
                .unwrap_or_default(),
            success: result.success,
            duration_ms: result.duration_ms,
            error: result.error.clone(),
            screenshot: result
                .screenshot_path
                .as_ref()
                .map(|p| p.display().to_string()),
        }
    }
}

impl TableDisplay for StepDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Step", "Description", "Status", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let status = if self.success {
            "PASS".green().to_string()
        } else {
            "FAIL".red().to_string()
        };
        vec![
            self.step.to_string(),
            truncate(&self.description, 40),
            status,
            format!("{}ms", self.duration_ms),
            truncate(self.error.as_deref().unwrap_or(""), 60),
        ]
    }
}

pub async fn execute(args: ExecuteArgs, config: &RetraceConfig, format: OutputFormat) -> Result<bool> {
    let store = super::script_store(config)?;
    let script = match args.script_format {
        Some(script_format) => store.load(&args.script, script_format),
        None => store.load_any(&args.script),
    }
    .with_context(|| format!("Failed to load script '{}'", args.script))?;

    let mut playwright = config.playwright();
    if args.headed {
        playwright.headless = false;
    }
    let mut executor_config = config.executor();
    if args.halt_on_failure {
        executor_config.failure_policy = FailurePolicy::Halt;
    }

    let results = ResultStore::new(&config.results_dir).with_context(|| {
        format!(
            "Failed to open result store at {}",
            config.results_dir.display()
        )
    })?;

    info!(
        "Executing '{}' ({} steps) in {}",
        script.name,
        script.steps.len(),
        playwright.browser.as_str()
    );
    let executor = TestExecutor::with_config(PlaywrightDriver::new(playwright), executor_config);
    let result = executor
        .execute(&script)
        .await
        .with_context(|| format!("Failed to execute script '{}'", script.name))?;

    report(&result, &script, format);
    persist(&results, &result);
    Ok(result.success)
}

/// Store a run's result, warning on the terminal when it cannot be written
pub fn persist(store: &ResultStore, result: &ExecutionResult) -> Option<PathBuf> {
    match store.save(result) {
        Ok(path) => Some(path),
        Err(e) => {
            print_warning(&format!(
                "Result for '{}' was not saved to {}: {}",
                result.script_name,
                store.root().display(),
                e
            ));
            None
        }
    }
}

/// Print a run's step table and summary
pub fn report(result: &ExecutionResult, script: &TestScript, format: OutputFormat) {
    if format.is_structured() {
        print_value(result, format);
        return;
    }

    let steps: Vec<StepDisplay> = result
        .step_results
        .iter()
        .map(|r| StepDisplay::new(r, Some(script)))
        .collect();
    print_list(&steps, format);

    let total = result.step_results.len();
    let summary = format!(
        "{}/{} steps passed in {}ms",
        result.passed_count(),
        total,
        result.total_duration_ms
    );
    if result.success {
        println!("{} {}", "PASSED".green().bold(), summary);
    } else {
        println!("{} {}", "FAILED".red().bold(), summary);
    }
}
