//! Analyze Command

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use retrace_common::{KnowledgeBase, SourceAnalyzer};
use retrace_engine::RetraceConfig;

use crate::output::{print_success, print_value, OutputFormat};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Application source directory
    pub dir: PathBuf,

    /// Also write the analysis as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn execute(args: AnalyzeArgs, config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let analyzer = SourceAnalyzer::new(&args.dir)?;
    let analysis = analyzer.analyze();

    let mut knowledge = KnowledgeBase::open(&config.knowledge_dir)
        .context("Failed to open knowledge base")?;
    knowledge
        .ingest(&analysis)
        .context("Failed to update knowledge base")?;

    if let Some(output) = &args.output {
        let json = serde_json::to_string_pretty(&analysis)?;
        std::fs::write(output, json)
            .with_context(|| format!("Failed to write {}", output.display()))?;
    }

    if format.is_structured() {
        print_value(&analysis, format);
        return Ok(());
    }

    println!("{}", "Source analysis".bold());
    println!("  Test IDs:      {}", analysis.test_ids.len());
    println!("  Routes:        {}", analysis.routes.len());
    println!("  Components:    {}", analysis.components.len());
    println!("  API endpoints: {}", analysis.api_endpoints.len());
    for route in &analysis.routes {
        println!("    {}", route.cyan());
    }

    print_success(&format!(
        "Knowledge base updated in {}",
        config.knowledge_dir.display()
    ));
    if let Some(output) = &args.output {
        print_success(&format!("Analysis written to {}", output.display()));
    }

    Ok(())
}
