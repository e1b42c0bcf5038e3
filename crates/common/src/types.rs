//! Core types for Retrace scripts and execution results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::command::Command;
use crate::error::ValidationError;

/// Open key/value mapping used for provenance and execution details
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Default upper bound on any wait an action performs
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Kind of browser operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Select,
    Wait,
    Scroll,
    Screenshot,
    AssertText,
    AssertElement,
    Extract,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::Navigate,
        ActionKind::Click,
        ActionKind::Type,
        ActionKind::Select,
        ActionKind::Wait,
        ActionKind::Scroll,
        ActionKind::Screenshot,
        ActionKind::AssertText,
        ActionKind::AssertElement,
        ActionKind::Extract,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Select => "select",
            ActionKind::Wait => "wait",
            ActionKind::Scroll => "scroll",
            ActionKind::Screenshot => "screenshot",
            ActionKind::AssertText => "assert_text",
            ActionKind::AssertElement => "assert_element",
            ActionKind::Extract => "extract",
        }
    }

    /// Whether an action of this kind targets an element
    pub fn requires_selector(&self) -> bool {
        !matches!(
            self,
            ActionKind::Navigate | ActionKind::Wait | ActionKind::Screenshot
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown action type: {}", s))
    }
}

/// One atomic browser operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,

    /// Target locator (CSS selector or XPath)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// URL, text to type, option to select, wait mode or screenshot name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    /// Expected text for assertions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(rename = "timeout", default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            selector: None,
            value: None,
            text: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            metadata: Metadata::new(),
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(ActionKind::Navigate).with_value(url)
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Click).with_selector(selector)
    }

    pub fn type_text(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(ActionKind::Type)
            .with_selector(selector)
            .with_value(text)
    }

    pub fn select(selector: impl Into<String>, option: impl Into<String>) -> Self {
        Self::new(ActionKind::Select)
            .with_selector(selector)
            .with_value(option)
    }

    pub fn wait(mode: impl Into<String>) -> Self {
        Self::new(ActionKind::Wait).with_value(mode)
    }

    pub fn scroll(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Scroll).with_selector(selector)
    }

    pub fn screenshot(name: Option<String>) -> Self {
        Self {
            value: name,
            ..Self::new(ActionKind::Screenshot)
        }
    }

    pub fn assert_text(selector: impl Into<String>, expected: impl Into<String>) -> Self {
        let mut action = Self::new(ActionKind::AssertText).with_selector(selector);
        action.text = Some(expected.into());
        action
    }

    pub fn assert_element(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::AssertElement).with_selector(selector)
    }

    pub fn extract(selector: impl Into<String>) -> Self {
        Self::new(ActionKind::Extract).with_selector(selector)
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge extra metadata into this action; incoming keys win
    pub fn merge_metadata(&mut self, extra: Metadata) {
        self.metadata.extend(extra);
    }

    /// Check the per-kind presence rules and produce the executable command
    pub fn validate(&self) -> Result<Command, ValidationError> {
        Command::try_from(self)
    }
}

/// A named wrapper around one action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    pub description: String,

    pub action: Action,

    /// Advisory only, never enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<String>,

    /// Capture a screenshot after executing the action
    #[serde(default)]
    pub screenshot: bool,
}

impl TestStep {
    pub fn new(description: impl Into<String>, action: Action) -> Self {
        Self {
            description: description.into(),
            action,
            expected_outcome: None,
            screenshot: false,
        }
    }
}

/// Whether NL interpretation or source-analysis enrichment produced the script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptMode {
    #[default]
    Dumb,
    Smart,
}

impl fmt::Display for ScriptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptMode::Dumb => f.write_str("dumb"),
            ScriptMode::Smart => f.write_str("smart"),
        }
    }
}

impl FromStr for ScriptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dumb" => Ok(ScriptMode::Dumb),
            "smart" => Ok(ScriptMode::Smart),
            other => Err(format!("unknown mode: {} (expected dumb or smart)", other)),
        }
    }
}

/// An ordered, named sequence of steps; the unit of replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScript {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub mode: ScriptMode,

    /// Execution order
    #[serde(default)]
    pub steps: Vec<TestStep>,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default = "Utc::now", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl TestScript {
    pub fn new(name: impl Into<String>, description: impl Into<String>, mode: ScriptMode) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            mode,
            steps: Vec::new(),
            metadata: Metadata::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_step(mut self, step: TestStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Action kinds in execution order
    pub fn kinds(&self) -> Vec<ActionKind> {
        self.steps.iter().map(|s| s.action.kind).collect()
    }
}

/// Outcome of one step of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_index: usize,

    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,

    /// Content hash of the page after the action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dom_snapshot: Option<String>,

    pub duration_ms: u64,

    #[serde(default)]
    pub metadata: Metadata,
}

impl StepResult {
    pub fn passed(step_index: usize) -> Self {
        Self {
            step_index,
            success: true,
            error: None,
            screenshot_path: None,
            dom_snapshot: None,
            duration_ms: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn failed(step_index: usize, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::passed(step_index)
        }
    }
}

/// Outcome of one run of a script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub script_name: String,

    /// True iff every step succeeded
    pub success: bool,

    pub step_results: Vec<StepResult>,

    pub total_duration_ms: u64,

    #[serde(with = "timestamp")]
    pub executed_at: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn new(
        script_name: impl Into<String>,
        step_results: Vec<StepResult>,
        total_duration_ms: u64,
        executed_at: DateTime<Utc>,
    ) -> Self {
        let success = step_results.iter().all(|r| r.success);
        Self {
            script_name: script_name.into(),
            success,
            step_results,
            total_duration_ms,
            executed_at,
        }
    }

    pub fn passed_count(&self) -> usize {
        self.step_results.iter().filter(|r| r.success).count()
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results.iter().filter(|r| !r.success)
    }
}

/// RFC 3339 timestamps; naive timestamps written by older tooling are read as UTC
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
