//! Retrace CLI - Main Entry Point
//!
//! Records browser scripts from plain-language instructions and replays
//! them deterministically.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use retrace_engine::RetraceConfig;

mod commands;
mod output;

use commands::{analyze, execute, explore, interpret, learn, record, scripts, InterpreterArgs};

/// Retrace - deterministic browser test capture and replay
#[derive(Parser)]
#[command(name = "retrace")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = retrace_engine::config::CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a script from natural-language instructions
    Record(record::RecordArgs),

    /// Replay a stored script
    Execute(execute::ExecuteArgs),

    /// List stored scripts
    List,

    /// Show a stored script
    Show {
        /// Script name
        script: String,
    },

    /// Delete a stored script
    Delete {
        /// Script name
        script: String,
    },

    /// Show past execution results for a script
    Results {
        /// Script name
        script: String,

        /// Number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the actions an instruction maps to
    Interpret {
        /// Instruction text
        instruction: String,

        #[command(flatten)]
        llm: InterpreterArgs,
    },

    /// Open a page and drive it with typed commands
    Explore(explore::ExploreArgs),

    /// Analyze application source and seed the knowledge base
    Analyze(analyze::AnalyzeArgs),

    /// Mine recorded scripts for repeated action sequences
    Patterns {
        /// Minimum number of occurrences
        #[arg(long, default_value = "2")]
        min_count: usize,

        /// Also rank stored scripts by similarity to this description
        #[arg(long)]
        similar: Option<String>,
    },

    /// Show the knowledge base catalog
    Knowledge,

    /// Show version information
    Version,
}

async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config = RetraceConfig::load(&cli.config)?;
    let format = cli.format;

    match cli.command {
        Commands::Record(args) => record::execute(args, &config, format).await?,
        Commands::Execute(args) => return execute::execute(args, &config, format).await,
        Commands::List => scripts::list(&config, format)?,
        Commands::Show { script } => scripts::show(&script, &config, format)?,
        Commands::Delete { script } => scripts::delete(&script, &config)?,
        Commands::Results { script, limit } => scripts::results(&script, limit, &config, format)?,
        Commands::Interpret { instruction, llm } => {
            interpret::execute(&instruction, &llm, &config, format).await?
        }
        Commands::Explore(args) => explore::execute(args, &config, format).await?,
        Commands::Analyze(args) => analyze::execute(args, &config, format)?,
        Commands::Patterns { min_count, similar } => {
            learn::patterns(min_count, similar.as_deref(), &config, format)?
        }
        Commands::Knowledge => learn::knowledge(&config, format)?,
        Commands::Version => {
            println!("Retrace CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Deterministic browser test capture and replay");
            println!();
            println!("Build info:");
            println!("  Library: retrace-common v{}", retrace_common::VERSION);
            println!("  Driver: Playwright via Node.js");
        }
    }

    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_execute_flags() {
        let cli = Cli::parse_from([
            "retrace",
            "--format",
            "json",
            "execute",
            "login_flow",
            "--script-format",
            "yaml",
            "--halt-on-failure",
        ]);
        assert_eq!(cli.format, output::OutputFormat::Json);
        match cli.command {
            Commands::Execute(args) => {
                assert_eq!(args.script, "login_flow");
                assert!(args.halt_on_failure);
                assert!(!args.headed);
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn test_parse_interpret_with_model() {
        let cli = Cli::parse_from([
            "retrace",
            "interpret",
            "click the login button",
            "--use-llm",
            "--provider",
            "anthropic",
        ]);
        match cli.command {
            Commands::Interpret { instruction, llm } => {
                assert_eq!(instruction, "click the login button");
                assert!(llm.use_llm);
                assert_eq!(llm.provider, Some(retrace_engine::LlmProvider::Anthropic));
            }
            _ => panic!("expected interpret"),
        }

        assert!(Cli::try_parse_from(["retrace", "interpret", "x", "--provider", "openai"]).is_err());
    }

    #[test]
    fn test_parse_explore_defaults_to_headed() {
        let cli = Cli::parse_from(["retrace", "explore", "https://shop.test"]);
        match cli.command {
            Commands::Explore(args) => {
                assert_eq!(args.url, "https://shop.test");
                assert!(!args.headless);
            }
            _ => panic!("expected explore"),
        }
    }
}
