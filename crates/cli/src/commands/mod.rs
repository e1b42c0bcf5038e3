//! CLI Commands

pub mod analyze;
pub mod execute;
pub mod explore;
pub mod interpret;
pub mod learn;
pub mod record;
pub mod scripts;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use retrace_common::{KnowledgeBase, ScriptStore, KNOWLEDGE_FILE};
use retrace_engine::{
    HttpCompletionClient, Interpreter, LlmInterpreter, LlmProvider, RetraceConfig,
    RuleInterpreter,
};

/// How instructions are turned into actions
#[derive(Args, Debug, Clone, Default)]
pub struct InterpreterArgs {
    /// Ask a hosted model first; keyword rules answer when it cannot
    #[arg(long)]
    pub use_llm: bool,

    /// Model provider (openai, anthropic); overrides the config file
    #[arg(long, requires = "use_llm")]
    pub provider: Option<LlmProvider>,
}

pub(crate) fn script_store(config: &RetraceConfig) -> Result<ScriptStore> {
    ScriptStore::new(&config.scripts_dir).with_context(|| {
        format!(
            "Failed to open script store at {}",
            config.scripts_dir.display()
        )
    })
}

/// Rule interpreter backed by the knowledge base once one has been built
pub(crate) fn rule_interpreter(config: &RetraceConfig) -> Result<RuleInterpreter> {
    if !config.knowledge_dir.join(KNOWLEDGE_FILE).exists() {
        return Ok(RuleInterpreter::new());
    }
    let knowledge = KnowledgeBase::open(&config.knowledge_dir)
        .context("Failed to load knowledge base")?;
    Ok(RuleInterpreter::with_knowledge(&knowledge))
}

/// The interpreter selected on the command line
pub(crate) fn interpreter(
    config: &RetraceConfig,
    args: &InterpreterArgs,
) -> Result<Box<dyn Interpreter>> {
    let rules = rule_interpreter(config)?;
    if !args.use_llm {
        return Ok(Box::new(rules));
    }

    let mut settings = config.llm.clone();
    if let Some(provider) = args.provider {
        settings.provider = provider;
    }
    let client =
        HttpCompletionClient::from_env(&settings).context("Failed to create model client")?;
    match &client {
        Some(client) => info!("Interpreting with {} ({})", client.provider(), client.model()),
        None => warn!(
            "{} is not set; using keyword rules",
            settings.provider.api_key_var()
        ),
    }
    Ok(Box::new(LlmInterpreter::new(client, rules)))
}
