//! Pattern learning and knowledge base commands

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use retrace_common::patterns::{common_patterns, similar_workflows, Pattern, Workflow};
use retrace_common::KnowledgeBase;
use retrace_engine::RetraceConfig;

use crate::output::{print_info, print_list, print_value, truncate, OutputFormat, TableDisplay};

const SIMILAR_LIMIT: usize = 5;

impl TableDisplay for Pattern {
    fn headers() -> Vec<&'static str> {
        vec!["Sequence", "Count", "Examples"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            truncate(&self.pattern, 70),
            self.count.to_string(),
            self.examples.join(", "),
        ]
    }
}

impl TableDisplay for Workflow {
    fn headers() -> Vec<&'static str> {
        vec!["Script", "Similarity", "Steps", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{:.2}", self.similarity),
            self.steps.len().to_string(),
            truncate(&self.description, 50),
        ]
    }
}

#[derive(Serialize)]
struct PatternReport {
    patterns: Vec<Pattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    similar: Option<Vec<Workflow>>,
}

pub fn patterns(
    min_count: usize,
    similar: Option<&str>,
    config: &RetraceConfig,
    format: OutputFormat,
) -> Result<()> {
    let store = super::script_store(config)?;
    let scripts = store.load_all().context("Failed to load scripts")?;

    let report = PatternReport {
        patterns: common_patterns(&scripts, min_count),
        similar: similar.map(|description| similar_workflows(&scripts, description, SIMILAR_LIMIT)),
    };

    if format.is_structured() {
        print_value(&report, format);
        return Ok(());
    }

    print_info(&format!(
        "Analyzed {} scripts, minimum count {}",
        scripts.len(),
        min_count
    ));
    print_list(&report.patterns, format);

    if let (Some(description), Some(workflows)) = (similar, &report.similar) {
        println!();
        println!("{} {}", "Similar to".bold(), description);
        print_list(workflows, format);
    }

    Ok(())
}

/// Element mapping row
#[derive(Serialize)]
struct MappingDisplay {
    name: String,
    selector: String,
    selector_type: String,
    alternatives: usize,
}

impl TableDisplay for MappingDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Element", "Selector", "Type", "Alternatives"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            truncate(&self.selector, 60),
            self.selector_type.clone(),
            self.alternatives.to_string(),
        ]
    }
}

pub fn knowledge(config: &RetraceConfig, format: OutputFormat) -> Result<()> {
    let knowledge =
        KnowledgeBase::open(&config.knowledge_dir).context("Failed to open knowledge base")?;
    let catalog = knowledge.catalog();

    if format.is_structured() {
        print_value(&catalog, format);
        return Ok(());
    }

    let mappings: Vec<MappingDisplay> = catalog
        .element_mappings
        .iter()
        .map(|(name, mapping)| MappingDisplay {
            name: name.clone(),
            selector: mapping
                .selectors
                .first()
                .map(|s| s.value.clone())
                .unwrap_or_default(),
            selector_type: format!("{:?}", mapping.selector_type).to_lowercase(),
            alternatives: mapping.selectors.len().saturating_sub(1),
        })
        .collect();
    print_list(&mappings, format);

    let stats = &catalog.stats;
    println!(
        "{} mappings, {} routes, {} components, {} API endpoints",
        stats.total_mappings.to_string().bold(),
        stats.total_routes.to_string().bold(),
        stats.total_components.to_string().bold(),
        stats.total_endpoints.to_string().bold()
    );
    for route in &catalog.routes {
        println!("  {}", route.cyan());
    }

    Ok(())
}
