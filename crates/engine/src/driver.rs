//! Browser driver capability
//!
//! The executor only ever talks to a browser through these two traits. A
//! [`BrowserDriver`] hands out live sessions; a [`BrowserSession`] performs
//! one operation per action kind and reports a structured [`DriverError`]
//! instead of panicking or aborting the run.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use retrace_common::{Metadata, WaitMode};
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a driver operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("browser session lost: {0}")]
    SessionLost(String),
}

impl DriverError {
    /// Whether the session is unusable after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::SessionLost(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Details echoed back by a successful operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionOutcome {
    pub metadata: Metadata,
}

impl ActionOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Source of browser sessions
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Acquire one live, exclusively owned session
    async fn launch(&self) -> DriverResult<Box<dyn BrowserSession>>;
}

/// One live browser page
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<ActionOutcome>;

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<ActionOutcome>;

    async fn type_text(
        &mut self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome>;

    async fn select_option(
        &mut self,
        selector: &str,
        option: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome>;

    async fn wait(&mut self, mode: WaitMode, timeout: Duration) -> DriverResult<ActionOutcome>;

    async fn scroll_into_view(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome>;

    /// Substring match of `expected` in the element's inner text
    async fn assert_text(
        &mut self,
        selector: &str,
        expected: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome>;

    async fn assert_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome>;

    async fn extract_text(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome>;

    /// Capture the page to an image file, returning its path
    async fn take_screenshot(&mut self, name: Option<&str>) -> DriverResult<PathBuf>;

    /// Stable fingerprint of the rendered content
    async fn content_hash(&mut self) -> DriverResult<String>;

    /// Screenshot performed as an action
    async fn screenshot(&mut self, name: Option<&str>) -> DriverResult<ActionOutcome> {
        let path = self.take_screenshot(name).await?;
        Ok(ActionOutcome::new().with("screenshot_path", path.display().to_string()))
    }

    /// Release the browser gracefully
    async fn close(&mut self) -> DriverResult<()>;

    /// Best-effort synchronous teardown for sessions dropped without `close`
    fn abort(&mut self);
}
