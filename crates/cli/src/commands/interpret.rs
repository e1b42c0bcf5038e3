//! Interpret Command

use anyhow::Result;
use serde::Serialize;

use retrace_common::Action;
use retrace_engine::{lint, Interpreter, RetraceConfig};

use crate::output::{print_list, print_warning, truncate, OutputFormat, TableDisplay};

use super::InterpreterArgs;

/// Action display wrapper for serialization
#[derive(Serialize)]
pub struct ActionDisplay {
    #[serde(rename = "type")]
    pub kind: String,
    pub selector: Option<String>,
    pub value: Option<String>,
    pub text: Option<String>,
    pub timeout_ms: u64,
    pub confidence: Option<String>,
    pub interpreter: Option<String>,
}

impl From<&Action> for ActionDisplay {
    fn from(action: &Action) -> Self {
        Self {
            kind: action.kind.to_string(),
            selector: action.selector.clone(),
            value: action.value.clone(),
            text: action.text.clone(),
            timeout_ms: action.timeout_ms,
            confidence: action
                .metadata
                .get("confidence")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            interpreter: action
                .metadata
                .get("interpreter")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

impl TableDisplay for ActionDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Type", "Selector", "Value", "Text", "Timeout"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.kind.clone(),
            truncate(self.selector.as_deref().unwrap_or("-"), 48),
            truncate(self.value.as_deref().unwrap_or("-"), 48),
            self.text.clone().unwrap_or_else(|| "-".to_string()),
            format!("{}ms", self.timeout_ms),
        ]
    }
}

pub async fn execute(
    instruction: &str,
    llm: &InterpreterArgs,
    config: &RetraceConfig,
    format: OutputFormat,
) -> Result<()> {
    let interpreter = super::interpreter(config, llm)?;
    let actions = interpreter.interpret(instruction, None).await;

    let displays: Vec<ActionDisplay> = actions.iter().map(ActionDisplay::from).collect();
    print_list(&displays, format);

    if !format.is_structured() {
        for issue in lint(&actions) {
            print_warning(&issue);
        }
        if displays.iter().any(|d| d.confidence.as_deref() == Some("low")) {
            print_warning("Instruction not understood; recorded as a low-confidence click");
        }
    }

    Ok(())
}
