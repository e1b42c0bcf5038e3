//! Record Command

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use retrace_common::{Metadata, ScriptFormat, ScriptMode, TestStep};
use retrace_engine::{lint, Interpreter, RetraceConfig, TestRecorder};

use crate::output::{print_info, print_success, print_value, print_warning, OutputFormat};

use super::InterpreterArgs;

const FINISH_WORDS: &[&str] = &["done", "quit", "exit"];

#[derive(Args)]
pub struct RecordArgs {
    /// Script name
    #[arg(short, long)]
    pub name: String,

    /// Script description
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// Script mode (dumb, smart)
    #[arg(short, long, default_value = "dumb")]
    pub mode: ScriptMode,

    /// Script file format (json, yaml)
    #[arg(long, default_value = "json")]
    pub script_format: ScriptFormat,

    /// Instruction to record; prompts interactively when none are given
    #[arg(short, long = "step")]
    pub steps: Vec<String>,

    #[command(flatten)]
    pub interpreter: InterpreterArgs,
}

pub async fn execute(args: RecordArgs, config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let store = super::script_store(config)?;
    let interpreter = super::interpreter(config, &args.interpreter)?;

    let mut recorder = TestRecorder::new();
    recorder.start_recording(&args.name, &args.description, args.mode)?;

    if args.steps.is_empty() {
        print_info(&format!(
            "Recording '{}'. Enter one instruction per line, '{}' to finish.",
            args.name,
            FINISH_WORDS[0]
        ));
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await.context("Failed to read instruction")? {
            let instruction = line.trim();
            if instruction.is_empty() {
                continue;
            }
            if FINISH_WORDS.contains(&instruction.to_lowercase().as_str()) {
                break;
            }
            record_instruction(&mut recorder, interpreter.as_ref(), instruction, format).await?;
        }
    } else {
        for instruction in &args.steps {
            record_instruction(&mut recorder, interpreter.as_ref(), instruction.trim(), format)
                .await?;
        }
    }

    let script = recorder.stop_recording()?;
    let path = store
        .save(&script, args.script_format)
        .with_context(|| format!("Failed to save script '{}'", script.name))?;

    if format.is_structured() {
        print_value(&script, format);
    } else {
        print_success(&format!(
            "Recorded '{}' with {} steps to {}",
            script.name,
            script.steps.len().to_string().bold(),
            path.display()
        ));
    }

    Ok(())
}

async fn record_instruction(
    recorder: &mut TestRecorder,
    interpreter: &dyn Interpreter,
    instruction: &str,
    format: OutputFormat,
) -> Result<()> {
    let actions = interpreter.interpret(instruction, None).await;

    if !format.is_structured() {
        for issue in lint(&actions) {
            print_warning(&format!("{}: {}", instruction, issue));
        }
    }

    for action in actions {
        let kind = action.kind;
        let mut extra = Metadata::new();
        extra.insert("instruction".to_string(), instruction.into());
        let index = recorder.record(TestStep::new(instruction, action), extra)?;
        debug!("Recorded step {} ({}) from '{}'", index, kind, instruction);
        if !format.is_structured() {
            println!("  {} {} {}", format!("[{}]", index).dimmed(), kind.to_string().cyan(), instruction);
        }
    }

    Ok(())
}
