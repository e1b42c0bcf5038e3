//! Deterministic script replay
//!
//! A run acquires one browser session, executes the steps strictly in order
//! and turns every driver failure into a failed [`StepResult`]. The run
//! itself only fails when no session can be launched.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use retrace_common::{
    sanitize_name, Command, ExecutionResult, ResultStore, StepResult, TestScript, TestStep,
};

use crate::driver::{ActionOutcome, BrowserDriver, BrowserSession, DriverError, DriverResult};
use crate::error::{EngineError, EngineResult};

/// What happens to the remaining steps once one fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep executing; every step gets evaluated
    #[default]
    Continue,
    /// Skip everything after the first failed step
    Halt,
}

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub failure_policy: FailurePolicy,

    /// Added to each action's own timeout as an outer bound
    pub timeout_grace: Duration,

    /// Prepended to per-step screenshot names
    pub screenshot_prefix: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Continue,
            timeout_grace: Duration::from_secs(5),
            screenshot_prefix: String::new(),
        }
    }
}

/// Owns the session for one run; aborts it if the run ends without `close`
pub(crate) struct SessionGuard {
    session: Box<dyn BrowserSession>,
    closed: bool,
}

impl SessionGuard {
    pub(crate) fn new(session: Box<dyn BrowserSession>) -> Self {
        Self {
            session,
            closed: false,
        }
    }

    pub(crate) fn session(&mut self) -> &mut dyn BrowserSession {
        self.session.as_mut()
    }

    pub(crate) async fn close(mut self) -> DriverResult<()> {
        let result = self.session.close().await;
        // A failed close still gets the forced teardown on drop
        self.closed = result.is_ok();
        result
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.closed {
            self.session.abort();
        }
    }
}

/// Replays scripts against sessions from one driver
pub struct TestExecutor<D> {
    driver: D,
    config: ExecutorConfig,
    results: Option<ResultStore>,
}

impl<D: BrowserDriver> TestExecutor<D> {
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, ExecutorConfig::default())
    }

    pub fn with_config(driver: D, config: ExecutorConfig) -> Self {
        Self {
            driver,
            config,
            results: None,
        }
    }

    /// Persist every execution result to this store
    pub fn with_results(mut self, store: ResultStore) -> Self {
        self.results = Some(store);
        self
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute every step of the script against a fresh session
    pub async fn execute(&self, script: &TestScript) -> EngineResult<ExecutionResult> {
        let executed_at = Utc::now();
        let start = Instant::now();

        info!(
            "Executing script '{}' ({} steps)",
            script.name,
            script.steps.len()
        );

        let session = self.driver.launch().await.map_err(EngineError::Launch)?;
        let mut guard = SessionGuard::new(session);

        let screenshot_base = format!(
            "{}{}",
            self.config.screenshot_prefix,
            sanitize_name(&script.name)
        );
        let mut step_results = Vec::with_capacity(script.steps.len());
        let mut stopped: Option<String> = None;

        for (index, step) in script.steps.iter().enumerate() {
            if let Some(reason) = &stopped {
                step_results.push(StepResult::failed(index, reason.clone()));
                continue;
            }

            let (result, fatal) = self
                .run_step(guard.session(), &screenshot_base, index, step)
                .await;

            if result.success {
                info!("✓ step {} {} ({} ms)", index, step.description, result.duration_ms);
            } else {
                error!(
                    "✗ step {} {} - {}",
                    index,
                    step.description,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }

            if let Some(err) = fatal {
                warn!("Browser session lost at step {}: {}", index, err);
                stopped = Some(format!(
                    "not executed: browser session lost at step {}",
                    index
                ));
            } else if !result.success && self.config.failure_policy == FailurePolicy::Halt {
                stopped = Some(format!("skipped: halted after step {} failed", index));
            }

            step_results.push(result);
        }

        if let Err(e) = guard.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        let result = ExecutionResult::new(
            &script.name,
            step_results,
            start.elapsed().as_millis() as u64,
            executed_at,
        );

        info!(
            "Script '{}' {}: {}/{} steps passed ({} ms)",
            result.script_name,
            if result.success { "passed" } else { "failed" },
            result.passed_count(),
            result.step_results.len(),
            result.total_duration_ms
        );

        if let Some(store) = &self.results {
            if let Err(e) = store.save(&result) {
                warn!("Failed to persist execution result: {}", e);
            }
        }

        Ok(result)
    }

    /// Run one step; the second value is set when the session died
    async fn run_step(
        &self,
        session: &mut dyn BrowserSession,
        screenshot_base: &str,
        index: usize,
        step: &TestStep,
    ) -> (StepResult, Option<DriverError>) {
        let start = Instant::now();

        let command = match step.action.validate() {
            Ok(command) => command,
            Err(e) => {
                debug!("Step {} rejected before dispatch: {}", index, e);
                let mut result = StepResult::failed(index, e.to_string());
                result.duration_ms = start.elapsed().as_millis() as u64;
                return (result, None);
            }
        };

        let timeout = Duration::from_millis(step.action.timeout_ms);
        let bound = timeout + self.config.timeout_grace;
        debug!("Step {}: {}", index, command.label());

        let outcome = match tokio::time::timeout(bound, dispatch(session, &command, timeout)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(DriverError::Timeout(format!(
                "{} did not complete within {} ms",
                command.label(),
                bound.as_millis()
            ))),
        };

        let (mut result, fatal) = match outcome {
            Ok(outcome) => {
                let mut result = StepResult::passed(index);
                result.metadata = outcome.metadata;
                (result, None)
            }
            Err(e) => {
                let result = StepResult::failed(index, e.to_string());
                (result, e.is_fatal().then_some(e))
            }
        };

        // A dead session cannot capture anything
        let fatal = match fatal {
            Some(e) => Some(e),
            None => {
                self.capture(session, screenshot_base, index, step, bound, &mut result)
                    .await
            }
        };

        result.duration_ms = start.elapsed().as_millis() as u64;
        (result, fatal)
    }

    /// Screenshot and content hash after the action; neither affects success
    async fn capture(
        &self,
        session: &mut dyn BrowserSession,
        screenshot_base: &str,
        index: usize,
        step: &TestStep,
        bound: Duration,
        result: &mut StepResult,
    ) -> Option<DriverError> {
        if step.screenshot {
            let name = format!("{}_step_{}", screenshot_base, index);
            match bounded(bound, "screenshot", session.take_screenshot(Some(name.as_str()))).await {
                Ok(path) => result.screenshot_path = Some(path),
                Err(e) => {
                    warn!("Screenshot for step {} failed: {}", index, e);
                    result
                        .metadata
                        .insert("screenshot_error".to_string(), e.to_string().into());
                    if e.is_fatal() {
                        return Some(e);
                    }
                }
            }
        }

        match bounded(bound, "content hash", session.content_hash()).await {
            Ok(hash) => result.dom_snapshot = Some(hash),
            Err(e) => {
                warn!("DOM snapshot for step {} unavailable: {}", index, e);
                if e.is_fatal() {
                    return Some(e);
                }
            }
        }

        None
    }
}

/// Bound a capture call by the step's outer timeout
pub(crate) async fn bounded<T>(
    bound: Duration,
    what: &str,
    call: impl std::future::Future<Output = DriverResult<T>>,
) -> DriverResult<T> {
    tokio::time::timeout(bound, call).await.unwrap_or_else(|_| {
        Err(DriverError::Timeout(format!(
            "{} did not complete within {} ms",
            what,
            bound.as_millis()
        )))
    })
}

/// The single dispatch point from commands to driver operations
pub(crate) async fn dispatch(
    session: &mut dyn BrowserSession,
    command: &Command,
    timeout: Duration,
) -> DriverResult<ActionOutcome> {
    match command {
        Command::Navigate { url } => session.navigate(url, timeout).await,
        Command::Click { selector } => session.click(selector, timeout).await,
        Command::Type { selector, text } => session.type_text(selector, text, timeout).await,
        Command::Select { selector, option } => {
            session.select_option(selector, option, timeout).await
        }
        Command::Wait { mode } => session.wait(*mode, timeout).await,
        Command::Scroll { selector } => session.scroll_into_view(selector, timeout).await,
        Command::Screenshot { name } => session.screenshot(name.as_deref()).await,
        Command::AssertText { selector, expected } => {
            session.assert_text(selector, expected, timeout).await
        }
        Command::AssertElement { selector } => session.assert_element(selector, timeout).await,
        Command::Extract { selector } => session.extract_text(selector, timeout).await,
    }
}
