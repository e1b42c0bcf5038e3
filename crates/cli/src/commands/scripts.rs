//! Stored script and result commands

use anyhow::{bail, Context, Result};
use colored::Colorize;
use serde::Serialize;

use retrace_common::{ExecutionResult, ResultStore, TestScript};
use retrace_engine::RetraceConfig;

use crate::output::{
    print_info, print_list, print_success, print_value, truncate, OutputFormat, TableDisplay,
};

use super::execute::StepDisplay;

/// Script summary for listings
#[derive(Serialize)]
pub struct ScriptDisplay {
    pub name: String,
    pub description: String,
    pub mode: String,
    pub steps: usize,
    pub created_at: String,
}

impl From<&TestScript> for ScriptDisplay {
    fn from(script: &TestScript) -> Self {
        Self {
            name: script.name.clone(),
            description: script.description.clone(),
            mode: script.mode.to_string(),
            steps: script.steps.len(),
            created_at: script.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl TableDisplay for ScriptDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Name", "Description", "Mode", "Steps", "Created"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            truncate(&self.description, 50),
            self.mode.clone(),
            self.steps.to_string(),
            self.created_at.clone(),
        ]
    }
}

/// One past run of a script
#[derive(Serialize)]
pub struct RunDisplay {
    pub executed_at: String,
    pub success: bool,
    pub passed: usize,
    pub total: usize,
    pub duration_ms: u64,
}

impl From<&ExecutionResult> for RunDisplay {
    fn from(result: &ExecutionResult) -> Self {
        Self {
            executed_at: result.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            success: result.success,
            passed: result.passed_count(),
            total: result.step_results.len(),
            duration_ms: result.total_duration_ms,
        }
    }
}

impl TableDisplay for RunDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Executed", "Status", "Passed", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let status = if self.success {
            "PASS".green().to_string()
        } else {
            "FAIL".red().to_string()
        };
        vec![
            self.executed_at.clone(),
            status,
            format!("{}/{}", self.passed, self.total),
            format!("{}ms", self.duration_ms),
        ]
    }
}

pub fn list(config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let store = super::script_store(config)?;
    let scripts = store.load_all().context("Failed to load scripts")?;
    let displays: Vec<ScriptDisplay> = scripts.iter().map(ScriptDisplay::from).collect();
    print_list(&displays, format);
    Ok(())
}

pub fn show(name: &str, config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let store = super::script_store(config)?;
    let script = store
        .load_any(name)
        .with_context(|| format!("Failed to load script '{}'", name))?;

    match format {
        OutputFormat::Json | OutputFormat::Yaml => print_value(&script, format),
        OutputFormat::Table | OutputFormat::Plain => {
            println!("{} ({})", script.name.bold(), script.mode);
            if !script.description.is_empty() {
                println!("{}", script.description);
            }
            println!();
            for (i, step) in script.steps.iter().enumerate() {
                let action = &step.action;
                let target = action
                    .selector
                    .as_deref()
                    .or(action.value.as_deref())
                    .unwrap_or("");
                println!(
                    "{:>3}. {:<15} {:<40} {}",
                    i,
                    action.kind.to_string().cyan(),
                    truncate(target, 40),
                    step.description.dimmed()
                );
            }
        }
    }

    Ok(())
}

pub fn delete(name: &str, config: &RetraceConfig) -> Result<()> {
    let store = super::script_store(config)?;
    if !store
        .delete(name)
        .with_context(|| format!("Failed to delete script '{}'", name))?
    {
        bail!("Script not found: {}", name);
    }
    print_success(&format!("Script '{}' deleted", name));
    Ok(())
}

pub fn results(name: &str, limit: usize, config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let store = ResultStore::new(&config.results_dir).with_context(|| {
        format!(
            "Failed to open result store at {}",
            config.results_dir.display()
        )
    })?;
    let mut runs = store
        .list(Some(name))
        .with_context(|| format!("Failed to load results for '{}'", name))?;
    runs.truncate(limit);

    if format.is_structured() {
        print_value(&runs, format);
        return Ok(());
    }

    let displays: Vec<RunDisplay> = runs.iter().map(RunDisplay::from).collect();
    print_list(&displays, format);

    if let Some(latest) = runs.first() {
        let failures: Vec<StepDisplay> = latest
            .failed_steps()
            .map(|r| StepDisplay::new(r, None))
            .collect();
        if !failures.is_empty() {
            print_info("Failed steps in the latest run:");
            print_list(&failures, format);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_common::{Action, ScriptFormat, ScriptMode, ScriptStore, TestStep};
    use tempfile::TempDir;

    fn config(tmp: &TempDir) -> RetraceConfig {
        RetraceConfig {
            scripts_dir: tmp.path().join("scripts"),
            results_dir: tmp.path().join("results"),
            ..RetraceConfig::default()
        }
    }

    #[test]
    fn test_delete_missing_script_fails() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let store = ScriptStore::new(&config.scripts_dir).unwrap();
        let script = TestScript::new("checkout", "", ScriptMode::Dumb)
            .with_step(TestStep::new("open", Action::navigate("https://shop.test")));
        store.save(&script, ScriptFormat::Yaml).unwrap();

        delete("checkout", &config).unwrap();
        assert!(!store.exists("checkout"));

        let err = delete("checkout", &config).unwrap_err();
        assert!(err.to_string().contains("Script not found"));
    }

    #[test]
    fn test_results_without_runs() {
        let tmp = TempDir::new().unwrap();
        results("never_run", 5, &config(&tmp), OutputFormat::Json).unwrap();
    }

    #[test]
    fn test_script_row() {
        let script = TestScript::new("login", "Sign in as admin", ScriptMode::Smart)
            .with_step(TestStep::new("open", Action::navigate("https://app.test")));
        let row = ScriptDisplay::from(&script).row();
        assert_eq!(row[0], "login");
        assert_eq!(row[2], "smart");
        assert_eq!(row[3], "1");
    }
}
