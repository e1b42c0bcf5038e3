//! Knowledge base of application structure
//!
//! Holds what the source analyzer and past recordings taught us about the
//! application under test: element name → selector mappings, routes,
//! components and API endpoints. Persisted as a single JSON document and
//! rewritten on every change.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{ComponentInfo, SourceAnalysis};
use crate::error::Result;

/// File name of the persisted knowledge base
pub const KNOWLEDGE_FILE: &str = "knowledge_base.json";

/// How a selector locates its element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorType {
    #[default]
    Css,
    Xpath,
    Testid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorEntry {
    pub value: String,
    #[serde(rename = "type")]
    pub selector_type: SelectorType,
}

/// Known selectors for one named element, most stable first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElementMapping {
    pub selectors: Vec<SelectorEntry>,
    pub selector_type: SelectorType,
    #[serde(default)]
    pub metadata: crate::types::Metadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct KnowledgeData {
    #[serde(default)]
    element_mappings: BTreeMap<String, ElementMapping>,
    #[serde(default)]
    routes: Vec<String>,
    #[serde(default)]
    components: BTreeMap<String, ComponentInfo>,
    #[serde(default)]
    api_endpoints: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_mappings: usize,
    pub total_routes: usize,
    pub total_components: usize,
    pub total_endpoints: usize,
}

/// Full export of the knowledge base
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub element_mappings: BTreeMap<String, ElementMapping>,
    pub routes: Vec<String>,
    pub components: BTreeMap<String, ComponentInfo>,
    pub api_endpoints: Vec<String>,
    pub stats: CatalogStats,
}

/// File-backed knowledge store
#[derive(Debug)]
pub struct KnowledgeBase {
    path: PathBuf,
    data: KnowledgeData,
}

impl KnowledgeBase {
    /// Open the knowledge base in a directory, loading existing contents
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(KNOWLEDGE_FILE);
        let data = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            KnowledgeData::default()
        };
        Ok(Self { path, data })
    }

    pub fn add_element_mapping(
        &mut self,
        name: &str,
        selector: &str,
        selector_type: SelectorType,
    ) -> Result<()> {
        let mapping = self
            .data
            .element_mappings
            .entry(name.to_string())
            .or_insert_with(|| ElementMapping {
                selector_type,
                ..Default::default()
            });

        if !mapping.selectors.iter().any(|s| s.value == selector) {
            mapping.selectors.push(SelectorEntry {
                value: selector.to_string(),
                selector_type,
            });
        }
        self.save()
    }

    /// First (most stable) selector known for an element
    pub fn selector_for(&self, name: &str) -> Option<&str> {
        self.data
            .element_mappings
            .get(name)
            .and_then(|m| m.selectors.first())
            .map(|s| s.value.as_str())
    }

    pub fn add_route(&mut self, route: &str) -> Result<()> {
        if !self.data.routes.iter().any(|r| r == route) {
            self.data.routes.push(route.to_string());
            self.save()?;
        }
        Ok(())
    }

    pub fn add_component(&mut self, name: &str, info: ComponentInfo) -> Result<()> {
        self.data.components.insert(name.to_string(), info);
        self.save()
    }

    pub fn add_api_endpoint(&mut self, endpoint: &str) -> Result<()> {
        if !self.data.api_endpoints.iter().any(|e| e == endpoint) {
            self.data.api_endpoints.push(endpoint.to_string());
            self.save()?;
        }
        Ok(())
    }

    /// Seed the knowledge base from a source scan
    pub fn ingest(&mut self, analysis: &SourceAnalysis) -> Result<()> {
        for test_id in &analysis.test_ids {
            self.add_element_mapping(&test_id.id, &test_id.selector, SelectorType::Testid)?;
        }
        for route in &analysis.routes {
            self.add_route(route)?;
        }
        for (name, info) in &analysis.components {
            self.add_component(name, info.clone())?;
        }
        for endpoint in &analysis.api_endpoints {
            self.add_api_endpoint(endpoint)?;
        }
        Ok(())
    }

    pub fn mappings(&self) -> &BTreeMap<String, ElementMapping> {
        &self.data.element_mappings
    }

    pub fn routes(&self) -> &[String] {
        &self.data.routes
    }

    pub fn catalog(&self) -> Catalog {
        Catalog {
            element_mappings: self.data.element_mappings.clone(),
            routes: self.data.routes.clone(),
            components: self.data.components.clone(),
            api_endpoints: self.data.api_endpoints.clone(),
            stats: CatalogStats {
                total_mappings: self.data.element_mappings.len(),
                total_routes: self.data.routes.len(),
                total_components: self.data.components.len(),
                total_endpoints: self.data.api_endpoints.len(),
            },
        }
    }

    fn save(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.data)?;
        std::fs::write(&self.path, json)?;
        debug!("Knowledge base saved to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TestIdRef;
    use tempfile::TempDir;

    #[test]
    fn test_mappings_persist_and_dedupe() {
        let tmp = TempDir::new().unwrap();
        {
            let mut kb = KnowledgeBase::open(tmp.path()).unwrap();
            kb.add_element_mapping("login", "#login", SelectorType::Css).unwrap();
            kb.add_element_mapping("login", ".login-btn", SelectorType::Css).unwrap();
            kb.add_element_mapping("login", "#login", SelectorType::Css).unwrap();
            kb.add_route("/home").unwrap();
            kb.add_route("/home").unwrap();
        }

        let kb = KnowledgeBase::open(tmp.path()).unwrap();
        assert_eq!(kb.selector_for("login"), Some("#login"));
        assert_eq!(kb.mappings()["login"].selectors.len(), 2);
        assert_eq!(kb.routes(), ["/home".to_string()]);
        assert_eq!(kb.selector_for("unknown"), None);
    }

    #[test]
    fn test_ingest_analysis() {
        let tmp = TempDir::new().unwrap();
        let mut kb = KnowledgeBase::open(tmp.path()).unwrap();
        let analysis = SourceAnalysis {
            test_ids: vec![TestIdRef {
                id: "submit".into(),
                file: "form.html".into(),
                selector: r#"[data-testid="submit"]"#.into(),
            }],
            routes: vec!["/checkout".into()],
            api_endpoints: vec!["/api/cart".into()],
            ..Default::default()
        };
        kb.ingest(&analysis).unwrap();

        let catalog = kb.catalog();
        assert_eq!(catalog.stats.total_mappings, 1);
        assert_eq!(catalog.stats.total_routes, 1);
        assert_eq!(catalog.stats.total_endpoints, 1);
        assert_eq!(
            catalog.element_mappings["submit"].selectors[0].selector_type,
            SelectorType::Testid
        );
    }
}
