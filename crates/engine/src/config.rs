//! Tool configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::executor::{ExecutorConfig, FailurePolicy};
use crate::llm::LlmProvider;
use crate::playwright::{Browser, PlaywrightConfig};

/// Default configuration file name
pub const CONFIG_FILE: &str = "retrace.toml";

/// Retrace configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetraceConfig {
    /// Recorded scripts
    pub scripts_dir: PathBuf,

    /// Execution results, one file per run
    pub results_dir: PathBuf,

    pub screenshots_dir: PathBuf,

    /// Knowledge base built by source analysis
    pub knowledge_dir: PathBuf,

    pub browser: BrowserConfig,

    pub executor: ExecutorSettings,

    pub llm: LlmSettings,
}

impl Default for RetraceConfig {
    fn default() -> Self {
        Self {
            scripts_dir: PathBuf::from("./test_scripts"),
            results_dir: PathBuf::from("./test_results"),
            screenshots_dir: PathBuf::from("./screenshots"),
            knowledge_dir: PathBuf::from("./knowledge_base"),
            browser: BrowserConfig::default(),
            executor: ExecutorSettings::default(),
            llm: LlmSettings::default(),
        }
    }
}

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub engine: Browser,

    pub headless: bool,

    pub viewport_width: u32,

    pub viewport_height: u32,

    pub user_agent: Option<String>,

    /// Path to the node binary
    pub node_binary: String,

    /// Attributes stripped before hashing page content
    pub volatile_attributes: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        let playwright = PlaywrightConfig::default();
        Self {
            engine: playwright.browser,
            headless: playwright.headless,
            viewport_width: playwright.viewport_width,
            viewport_height: playwright.viewport_height,
            user_agent: Some("Retrace/1.0 (Deterministic Testing)".to_string()),
            node_binary: playwright.node_binary,
            volatile_attributes: playwright.volatile_attributes,
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub failure_policy: FailurePolicy,

    /// Grace added to each action timeout
    pub timeout_grace_ms: u64,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Continue,
            timeout_grace_ms: 5_000,
        }
    }
}

/// Model-backed interpretation; the API key comes from the provider's environment variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: LlmProvider,

    /// Provider default when unset
    pub model: Option<String>,

    /// API root, for proxies and compatible gateways
    pub base_url: Option<String>,

    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model: None,
            base_url: None,
            timeout_secs: 60,
        }
    }
}

impl RetraceConfig {
    /// Load configuration from file, or defaults when it does not exist
    pub fn load(path: &Path) -> EngineResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Driver settings with the screenshot directory filled in
    pub fn playwright(&self) -> PlaywrightConfig {
        PlaywrightConfig {
            browser: self.browser.engine,
            headless: self.browser.headless,
            viewport_width: self.browser.viewport_width,
            viewport_height: self.browser.viewport_height,
            user_agent: self.browser.user_agent.clone(),
            screenshot_dir: self.screenshots_dir.clone(),
            node_binary: self.browser.node_binary.clone(),
            volatile_attributes: self.browser.volatile_attributes.clone(),
        }
    }

    pub fn executor(&self) -> ExecutorConfig {
        ExecutorConfig {
            failure_policy: self.executor.failure_policy,
            timeout_grace: Duration::from_millis(self.executor.timeout_grace_ms),
            ..ExecutorConfig::default()
        }
    }
}
