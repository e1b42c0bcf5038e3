//! Static analysis of application sources
//!
//! Scans a source tree for test hooks and structure that help produce stable
//! scripts:
//! - `data-testid` attributes in markup and component files
//! - Route declarations (Vue/Angular, React Router, Flask, FastAPI)
//! - UI component files
//! - API endpoints referenced from JavaScript
//!
//! The scan is read-only and never touches execution.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, Result};

static TEST_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"data-testid=["']([^"']+)["']"#).expect("valid regex"));

static ROUTE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"path:\s*["']([^"']+)["']"#,
        r#"<Route\s+path=["']([^"']+)["']"#,
        r#"@app\.route\(["']([^"']+)["']"#,
        r#"@route\(["']([^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static API_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"["'](/api/[^"']+)["']"#,
        r#"fetch\(["']([^"']+)["']"#,
        r#"axios\.[a-z]+\(["']([^"']+)["']"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static PROP: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)\s*:\s*\w+[,;]").expect("valid regex"));

const MARKUP_EXTENSIONS: &[&str] = &["html", "jsx", "tsx", "vue", "svelte"];
const ROUTE_EXTENSIONS: &[&str] = &["py", "js"];
const COMPONENT_EXTENSIONS: &[&str] = &["jsx", "tsx", "vue"];
const PROP_KEYWORDS: &[&str] = &["const", "let", "var", "function", "class"];
const MAX_PROPS: usize = 10;

/// A `data-testid` hook found in the sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestIdRef {
    pub id: String,
    /// Path relative to the analyzed root
    pub file: String,
    pub selector: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub file: String,
    pub test_ids: Vec<String>,
    pub props: Vec<String>,
}

/// Everything found in one scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAnalysis {
    pub test_ids: Vec<TestIdRef>,
    pub routes: Vec<String>,
    pub components: BTreeMap<String, ComponentInfo>,
    pub api_endpoints: Vec<String>,
}

/// Scanner over one application source tree
pub struct SourceAnalyzer {
    root: PathBuf,
}

impl SourceAnalyzer {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::Analysis(format!(
                "Source directory does not exist: {}",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn analyze(&self) -> SourceAnalysis {
        let mut analysis = SourceAnalysis::default();
        let mut routes = BTreeSet::new();
        let mut endpoints = BTreeSet::new();

        for (path, ext, content) in self.source_files() {
            let relative = self.relative(&path);

            if MARKUP_EXTENSIONS.contains(&ext.as_str()) {
                for id in extract_test_ids(&content) {
                    analysis.test_ids.push(TestIdRef {
                        selector: format!(r#"[data-testid="{}"]"#, id),
                        id,
                        file: relative.clone(),
                    });
                }
            }

            if ROUTE_EXTENSIONS.contains(&ext.as_str()) {
                routes.extend(extract_routes(&content));
            }

            if ext == "js" {
                endpoints.extend(extract_api_endpoints(&content));
            }

            if is_component_file(Path::new(&relative), &ext) {
                if let Some(name) = path.file_stem().map(|s| s.to_string_lossy().to_string()) {
                    analysis.components.insert(
                        name,
                        ComponentInfo {
                            file: relative.clone(),
                            test_ids: extract_test_ids(&content),
                            props: extract_props(&content),
                        },
                    );
                }
            }
        }

        analysis.routes = routes.into_iter().collect();
        analysis.api_endpoints = endpoints.into_iter().collect();

        info!(
            "Analyzed {}: {} test ids, {} routes, {} components, {} endpoints",
            self.root.display(),
            analysis.test_ids.len(),
            analysis.routes.len(),
            analysis.components.len(),
            analysis.api_endpoints.len()
        );
        analysis
    }

    /// Readable UTF-8 files with an extension, in a stable order
    fn source_files(&self) -> impl Iterator<Item = (PathBuf, String, String)> + '_ {
        WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let path = e.into_path();
                let ext = path.extension()?.to_str()?.to_ascii_lowercase();
                match std::fs::read_to_string(&path) {
                    Ok(content) => Some((path, ext, content)),
                    Err(err) => {
                        debug!("Skipping {}: {}", path.display(), err);
                        None
                    }
                }
            })
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

fn is_component_file(path: &Path, ext: &str) -> bool {
    if !COMPONENT_EXTENSIONS.contains(&ext) {
        return false;
    }
    let named_component = ext != "vue"
        && path
            .file_stem()
            .map(|s| s.to_string_lossy().ends_with("Component"))
            .unwrap_or(false);
    let under_components = path
        .parent()
        .map(|p| p.components().any(|c| c.as_os_str() == "components"))
        .unwrap_or(false);
    named_component || under_components
}

pub fn extract_test_ids(content: &str) -> Vec<String> {
    TEST_ID
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

pub fn extract_routes(content: &str) -> Vec<String> {
    ROUTE_PATTERNS
        .iter()
        .flat_map(|p| p.captures_iter(content).map(|c| c[1].to_string()))
        .collect()
}

/// Absolute endpoint paths referenced from script code
pub fn extract_api_endpoints(content: &str) -> Vec<String> {
    API_PATTERNS
        .iter()
        .flat_map(|p| p.captures_iter(content).map(|c| c[1].to_string()))
        .filter(|e| e.starts_with('/'))
        .collect()
}

fn extract_props(content: &str) -> Vec<String> {
    PROP.captures_iter(content)
        .map(|c| c[1].to_string())
        .filter(|p| !PROP_KEYWORDS.contains(&p.as_str()))
        .take(MAX_PROPS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_missing_directory() {
        assert!(matches!(
            SourceAnalyzer::new("/definitely/not/here"),
            Err(Error::Analysis(_))
        ));
    }

    #[test]
    fn test_analyze_tree() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        write(root, "index.html", r#"<button data-testid="login-btn">Go</button>"#);
        write(
            root,
            "src/components/Header.tsx",
            r#"type P = { title: string; };
<nav data-testid='nav-bar'></nav>"#,
        );
        write(root, "src/LoginComponent.jsx", r#"<form data-testid="login-form"/>"#);
        write(
            root,
            "src/router.js",
            r#"const routes = [{ path: '/home' }, { path: "/login" }];
fetch("/api/session");
axios.get('/users/me');
const base = "/api/items/1";
fetch("https://cdn.example.com/x.js");"#,
        );
        write(root, "app.py", r#"@app.route("/login")
def login(): pass"#);

        let analysis = SourceAnalyzer::new(root).unwrap().analyze();

        let ids: Vec<&str> = analysis.test_ids.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["login-btn", "login-form", "nav-bar"]);
        assert_eq!(analysis.test_ids[0].selector, r#"[data-testid="login-btn"]"#);
        assert_eq!(analysis.test_ids[0].file, "index.html");

        assert_eq!(analysis.routes, vec!["/home", "/login"]);
        assert_eq!(
            analysis.api_endpoints,
            vec!["/api/items/1", "/api/session", "/users/me"]
        );

        assert_eq!(analysis.components.len(), 2);
        let header = &analysis.components["Header"];
        assert_eq!(header.test_ids, vec!["nav-bar"]);
        assert_eq!(header.props, vec!["title"]);
        assert!(analysis.components.contains_key("LoginComponent"));
    }
}
