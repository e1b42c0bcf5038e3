//! Persistence for execution results
//!
//! One pretty-printed JSON file per run, named after the script and the run's
//! epoch seconds. Runs landing in the same second get a numeric suffix.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::store::sanitize_name;
use crate::types::ExecutionResult;

/// Write-once sink for execution results
#[derive(Debug, Clone)]
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a result, never overwriting an earlier run
    pub fn save(&self, result: &ExecutionResult) -> Result<PathBuf> {
        let base = format!(
            "{}_{}",
            sanitize_name(&result.script_name),
            result.executed_at.timestamp()
        );

        let json = serde_json::to_string_pretty(result)?;

        let mut path = self.root.join(format!("{}.json", base));
        let mut attempt = 1;
        // create_new claims the name atomically
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    path = self.root.join(format!("{}_{}.json", base, attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };
        file.write_all(json.as_bytes())?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<ExecutionResult> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| Error::Invalid {
            kind: "execution result".to_string(),
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Stored results, newest first, optionally restricted to one script
    pub fn list(&self, script_name: Option<&str>) -> Result<Vec<ExecutionResult>> {
        let prefix = script_name.map(|n| format!("{}_", sanitize_name(n)));
        let mut results = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().map(|e| e != "json").unwrap_or(true) {
                continue;
            }
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if let Some(prefix) = &prefix {
                if !file_name.starts_with(prefix.as_str()) {
                    continue;
                }
            }
            let result = match self.load(&path) {
                Ok(result) => result,
                Err(e) => {
                    warn!("Skipping result file {}: {}", path.display(), e);
                    continue;
                }
            };
            // Sanitized prefixes can overlap ("a" vs "a_b"); match on the stored name
            if let Some(name) = script_name {
                if sanitize_name(&result.script_name) != sanitize_name(name) {
                    continue;
                }
            }
            results.push(result);
        }

        results.sort_by(|a, b| b.executed_at.cmp(&a.executed_at));
        Ok(results)
    }

    /// Most recent result for a script
    pub fn latest(&self, script_name: &str) -> Result<ExecutionResult> {
        self.list(Some(script_name))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::NotFound {
                kind: "Execution result".to_string(),
                name: script_name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StepResult;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn result(name: &str, at: chrono::DateTime<Utc>, ok: bool) -> ExecutionResult {
        let step = if ok {
            StepResult::passed(0)
        } else {
            StepResult::failed(0, "element not found: #x")
        };
        ExecutionResult::new(name, vec![step], 12, at)
    }

    #[test]
    fn test_same_second_runs_do_not_collide() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path()).unwrap();
        let at = Utc::now();

        let first = store.save(&result("Login Flow", at, true)).unwrap();
        let second = store.save(&result("Login Flow", at, false)).unwrap();

        assert_ne!(first, second);
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("login_flow_{}", at.timestamp())));
        assert!(second.to_string_lossy().ends_with("_1.json"));
    }

    #[test]
    fn test_latest_and_filtering() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path()).unwrap();
        let now = Utc::now();

        store.save(&result("a", now - Duration::seconds(60), true)).unwrap();
        store.save(&result("a", now, false)).unwrap();
        store.save(&result("a_b", now, true)).unwrap();

        let runs = store.list(Some("a")).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(!store.latest("a").unwrap().success);
        assert_eq!(store.list(None).unwrap().len(), 3);
        assert!(store.latest("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_unreadable_result_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path()).unwrap();
        let now = Utc::now();
        store.save(&result("login", now, true)).unwrap();
        std::fs::write(tmp.path().join("login_1.json"), "{ truncated").unwrap();

        assert_eq!(store.list(Some("login")).unwrap().len(), 1);
        assert_eq!(store.list(None).unwrap().len(), 1);
        assert!(store.latest("login").unwrap().success);
    }

    #[test]
    fn test_concurrent_saves_get_distinct_files() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path()).unwrap();
        let at = Utc::now();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.save(&result("race", at, true)).unwrap())
            })
            .collect();
        let mut paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        paths.sort();
        paths.dedup();

        assert_eq!(paths.len(), 8);
        assert_eq!(store.list(Some("race")).unwrap().len(), 8);
    }

    #[test]
    fn test_saved_result_round_trips() {
        let tmp = TempDir::new().unwrap();
        let store = ResultStore::new(tmp.path()).unwrap();
        let original = result("rt", Utc::now(), false);
        let path = store.save(&original).unwrap();
        assert_eq!(store.load(&path).unwrap(), original);
    }
}
