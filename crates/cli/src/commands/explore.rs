//! Explore Command

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};

use retrace_common::{Command, DEFAULT_TIMEOUT_MS};
use retrace_engine::{
    ActionOutcome, ExploreCommand, Explorer, PlaywrightDriver, RetraceConfig, EXPLORE_HELP,
};

use crate::output::{print_error, print_info, print_success, print_value, print_warning, OutputFormat};

#[derive(Args)]
pub struct ExploreArgs {
    /// Page to open
    pub url: String,

    /// Run without a visible browser window
    #[arg(long)]
    pub headless: bool,
}

pub async fn execute(args: ExploreArgs, config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let mut playwright = config.playwright();
    playwright.headless = args.headless;
    let driver = PlaywrightDriver::new(playwright);

    let mut explorer = Explorer::open(
        &driver,
        &args.url,
        Duration::from_millis(DEFAULT_TIMEOUT_MS),
        &config.executor(),
    )
    .await
    .with_context(|| format!("Failed to open {}", args.url))?;

    print_info(&format!("Exploring {}. Commands: {}", args.url, EXPLORE_HELP));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read command")? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ExploreCommand>() {
            Ok(ExploreCommand::Done) => break,
            Ok(ExploreCommand::Run(command)) => command,
            Err(message) => {
                print_warning(&message);
                continue;
            }
        };

        match explorer.run(&command).await {
            Ok(outcome) if format.is_structured() => print_value(&outcome.metadata, format),
            Ok(outcome) => print_success(&describe(&command, &outcome)),
            Err(e) if e.is_fatal() => bail!("Browser session lost: {}", e),
            Err(e) => print_error(&format!("{}: {}", command.label(), e)),
        }
    }

    let commands = explorer.commands_run();
    explorer.close().await.context("Failed to close browser")?;
    if !format.is_structured() {
        println!("{} after {} commands", "Done".bold(), commands);
    }
    Ok(())
}

/// One-line summary of a successful command
fn describe(command: &Command, outcome: &ActionOutcome) -> String {
    match outcome.metadata.get("screenshot_path").and_then(|v| v.as_str()) {
        Some(path) => format!("Screenshot saved to {}", path),
        None => command.label(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_screenshot_and_action() {
        let shot = ActionOutcome::new().with("screenshot_path", "shots/cart.png");
        assert_eq!(
            describe(&Command::Screenshot { name: None }, &shot),
            "Screenshot saved to shots/cart.png"
        );

        let click = Command::Click {
            selector: "#buy".to_string(),
        };
        assert_eq!(describe(&click, &ActionOutcome::new()), "click:#buy");
    }
}
