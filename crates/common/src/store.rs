//! File-backed storage for test scripts
//!
//! Scripts are stored one file per name and format under a single directory.
//! There is no locking: the last writer wins per file, and concurrent writers
//! from several processes to the same name are not supported.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::TestScript;

/// Serialization used for a stored script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFormat {
    #[default]
    Json,
    Yaml,
}

impl ScriptFormat {
    /// Resolution order when a name exists in several formats
    pub const PRECEDENCE: [ScriptFormat; 2] = [ScriptFormat::Json, ScriptFormat::Yaml];

    pub fn extension(&self) -> &'static str {
        match self {
            ScriptFormat::Json => "json",
            ScriptFormat::Yaml => "yaml",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(ScriptFormat::Json),
            "yaml" => Some(ScriptFormat::Yaml),
            _ => None,
        }
    }

    pub fn serialize(&self, script: &TestScript) -> Result<String> {
        Ok(match self {
            ScriptFormat::Json => serde_json::to_string_pretty(script)?,
            ScriptFormat::Yaml => serde_yaml::to_string(script)?,
        })
    }

    pub fn deserialize(&self, content: &str) -> std::result::Result<TestScript, String> {
        match self {
            ScriptFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            ScriptFormat::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
        }
    }
}

impl fmt::Display for ScriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ScriptFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ScriptFormat::Json),
            "yaml" | "yml" => Ok(ScriptFormat::Yaml),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Derive a file stem from a script name
///
/// Keeps alphanumerics, spaces, hyphens and underscores, then replaces spaces
/// with underscores and lowercases. Distinct names may collide; callers must
/// avoid that.
pub fn sanitize_name(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    kept.trim_end().replace(' ', "_").to_lowercase()
}

/// Durable CRUD for test scripts keyed by name
#[derive(Debug, Clone)]
pub struct ScriptStore {
    root: PathBuf,
}

impl ScriptStore {
    /// Open a store rooted at the given directory, creating it if needed
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        debug!("Opened script store at {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a script with this name is saved to in the given format
    pub fn path_for(&self, name: &str, format: ScriptFormat) -> PathBuf {
        self.root
            .join(format!("{}.{}", sanitize_name(name), format.extension()))
    }

    /// Write one serialized representation of the script
    pub fn save(&self, script: &TestScript, format: ScriptFormat) -> Result<PathBuf> {
        if sanitize_name(&script.name).is_empty() {
            return Err(Error::InvalidName(script.name.clone()));
        }
        let path = self.path_for(&script.name, format);
        let content = format.serialize(script)?;
        std::fs::write(&path, content)?;
        info!(
            "Saved script '{}' ({} steps) to {}",
            script.name,
            script.steps.len(),
            path.display()
        );
        Ok(path)
    }

    /// Parse the format name, then save
    pub fn save_as(&self, script: &TestScript, format: &str) -> Result<PathBuf> {
        self.save(script, format.parse()?)
    }

    /// Load a script by name, falling back to treating the name as a filename
    pub fn load(&self, name: &str, format: ScriptFormat) -> Result<TestScript> {
        let path = self
            .resolve(name, format)
            .ok_or_else(|| Error::script_not_found(name))?;
        self.read(&path, format)
    }

    /// Load a script in whichever format exists, JSON taking precedence
    pub fn load_any(&self, name: &str) -> Result<TestScript> {
        for format in ScriptFormat::PRECEDENCE {
            if let Some(path) = self.resolve(name, format) {
                return self.read(&path, format);
            }
        }
        Err(Error::script_not_found(name))
    }

    /// All distinct script names across formats, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = BTreeSet::new();
        for (stem, _) in self.entries()? {
            names.insert(stem);
        }
        Ok(names.into_iter().collect())
    }

    /// Every loadable script, JSON taking precedence; unreadable files are skipped
    pub fn load_all(&self) -> Result<Vec<TestScript>> {
        let mut scripts = Vec::new();
        for name in self.list()? {
            match self.load_any(&name) {
                Ok(script) => scripts.push(script),
                Err(e) => warn!("Skipping script '{}': {}", name, e),
            }
        }
        Ok(scripts)
    }

    pub fn exists(&self, name: &str) -> bool {
        !self.candidates(name).is_empty()
    }

    /// Remove the script in every format; reports whether anything was removed
    pub fn delete(&self, name: &str) -> Result<bool> {
        let mut deleted = false;
        for path in self.candidates(name) {
            std::fs::remove_file(&path)?;
            info!("Deleted {}", path.display());
            deleted = true;
        }
        Ok(deleted)
    }

    fn resolve(&self, name: &str, format: ScriptFormat) -> Option<PathBuf> {
        let sanitized = self.path_for(name, format);
        if sanitized.is_file() {
            return Some(sanitized);
        }
        // Exact filename, e.g. "login_flow.json" or a name saved by hand
        let exact = self.root.join(name);
        if exact.is_file() {
            return Some(exact);
        }
        let exact_with_ext = self.root.join(format!("{}.{}", name, format.extension()));
        exact_with_ext.is_file().then_some(exact_with_ext)
    }

    /// Existing files for a name: sanitized, raw and exact filename, in every format
    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut paths = BTreeSet::new();
        let exact = self.root.join(name);
        let exact_is_script = exact
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ScriptFormat::from_extension)
            .is_some();
        if exact_is_script && exact.is_file() {
            paths.insert(exact);
        }
        for format in ScriptFormat::PRECEDENCE {
            let sanitized = self.path_for(name, format);
            let raw = self.root.join(format!("{}.{}", name, format.extension()));
            for path in [sanitized, raw] {
                if path.is_file() {
                    paths.insert(path);
                }
            }
        }
        paths.into_iter().collect()
    }

    fn entries(&self) -> Result<Vec<(String, ScriptFormat)>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let format = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(ScriptFormat::from_extension);
            let stem = path.file_stem().map(|s| s.to_string_lossy().to_string());
            if let (Some(format), Some(stem)) = (format, stem) {
                entries.push((stem, format));
            }
        }
        Ok(entries)
    }

    fn read(&self, path: &Path, format: ScriptFormat) -> Result<TestScript> {
        let content = std::fs::read_to_string(path)?;
        format.deserialize(&content).map_err(|reason| Error::Invalid {
            kind: "script".to_string(),
            path: path.display().to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Action, ScriptMode, TestStep};
    use tempfile::TempDir;

    fn sample_script(name: &str) -> TestScript {
        let mut step = TestStep::new("open login", Action::navigate("https://x.test/login"));
        step.screenshot = true;
        step.expected_outcome = Some("login form visible".to_string());

        let mut script = TestScript::new(name, "Log in as admin", ScriptMode::Smart)
            .with_step(step)
            .with_step(TestStep::new(
                "enter user",
                Action::type_text("#user", "admin").with_metadata("source", "rules"),
            ))
            .with_step(TestStep::new("wait", Action::wait("networkidle").with_timeout(5000)));
        script
            .metadata
            .insert("recorded_by".into(), serde_json::json!({"host": "ci", "run": 7}));
        script
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Login Flow"), "login_flow");
        assert_eq!(sanitize_name("checkout: step #2!"), "checkout_step_2");
        assert_eq!(sanitize_name("keep-this_one "), "keep-this_one");
    }

    #[test]
    fn test_round_trip_both_formats() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        let script = sample_script("Login Flow");

        for format in ScriptFormat::PRECEDENCE {
            let path = store.save(&script, format).unwrap();
            assert_eq!(path.file_name().unwrap().to_string_lossy(), format!("login_flow.{}", format));
            let loaded = store.load("login_flow", format).unwrap();
            assert_eq!(loaded, script);
        }
    }

    #[test]
    fn test_load_by_original_name_and_filename() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        let script = sample_script("Login Flow");
        store.save(&script, ScriptFormat::Json).unwrap();

        assert_eq!(store.load("Login Flow", ScriptFormat::Json).unwrap().name, "Login Flow");
        assert_eq!(store.load("login_flow.json", ScriptFormat::Json).unwrap().name, "Login Flow");
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        let err = store.load("nope", ScriptFormat::Yaml).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_structurally_invalid() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        std::fs::write(tmp.path().join("broken.json"), r#"{"name": "broken", "steps": [{"action": 3}]}"#).unwrap();
        let err = store.load("broken", ScriptFormat::Json).unwrap_err();
        assert!(matches!(err, Error::Invalid { .. }));
    }

    #[test]
    fn test_unsupported_format() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        let err = store.save_as(&sample_script("x"), "xml").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(f) if f == "xml"));
        assert_eq!("yml".parse::<ScriptFormat>().unwrap(), ScriptFormat::Yaml);
    }

    #[test]
    fn test_list_dedupes_and_sorts() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        store.save(&sample_script("zeta"), ScriptFormat::Json).unwrap();
        store.save(&sample_script("alpha"), ScriptFormat::Yaml).unwrap();
        store.save(&sample_script("alpha"), ScriptFormat::Json).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        assert_eq!(store.list().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_load_any_prefers_json() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        let mut yaml_version = sample_script("dual");
        yaml_version.description = "yaml".into();
        let mut json_version = sample_script("dual");
        json_version.description = "json".into();
        store.save(&yaml_version, ScriptFormat::Yaml).unwrap();
        store.save(&json_version, ScriptFormat::Json).unwrap();

        assert_eq!(store.load_any("dual").unwrap().description, "json");
    }

    #[test]
    fn test_delete_yaml_only_script() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        store.save(&sample_script("x"), ScriptFormat::Yaml).unwrap();

        assert!(store.exists("x"));
        assert!(store.delete("x").unwrap());
        assert!(!store.exists("x"));
        assert!(!store.delete("x").unwrap());
        assert!(!store.delete("never-saved").unwrap());
    }

    #[test]
    fn test_save_rejects_name_without_usable_characters() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();

        let err = store.save(&sample_script("!!!"), ScriptFormat::Json).unwrap_err();
        assert!(matches!(err, Error::InvalidName(ref name) if name == "!!!"));
        assert!(!tmp.path().join(".json").exists());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_exact_filename_exists_and_deletes() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        store.save(&sample_script("Login Flow"), ScriptFormat::Json).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "kept").unwrap();

        assert!(store.exists("login_flow.json"));
        assert!(!store.exists("notes.txt"));
        assert!(store.delete("login_flow.json").unwrap());
        assert!(!store.exists("Login Flow"));
        assert!(!store.delete("notes.txt").unwrap());
        assert!(tmp.path().join("notes.txt").exists());
    }

    #[test]
    fn test_load_all_skips_broken_files() {
        let tmp = TempDir::new().unwrap();
        let store = ScriptStore::new(tmp.path()).unwrap();
        store.save(&sample_script("good"), ScriptFormat::Json).unwrap();
        std::fs::write(tmp.path().join("bad.yaml"), "name: [unterminated").unwrap();

        let scripts = store.load_all().unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0].name, "good");
    }
}
