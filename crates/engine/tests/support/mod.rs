//! In-memory browser driver for executor tests

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use retrace_common::{content_hash, WaitMode, DEFAULT_VOLATILE_ATTRIBUTES};
use retrace_engine::{ActionOutcome, BrowserDriver, BrowserSession, DriverError, DriverResult};

#[derive(Debug, Default)]
pub struct FakeState {
    /// Selectors or urls that fail with the given error
    pub failures: HashMap<String, DriverError>,
    /// Selectors whose operations never complete
    pub hanging: HashSet<String>,
    pub fail_launch: bool,
    pub fail_screenshot: bool,
    pub fail_content_hash: bool,

    pub launches: usize,
    pub closes: usize,
    pub aborts: usize,
    /// Every session operation in call order, as `op:target`
    pub ops: Vec<String>,
}

/// Scripted driver recording every call it receives
#[derive(Debug, Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, target: &str, error: DriverError) -> Self {
        self.state().failures.insert(target.to_string(), error);
        self
    }

    pub fn hanging(self, target: &str) -> Self {
        self.state().hanging.insert(target.to_string());
        self
    }

    pub fn configure(self, f: impl FnOnce(&mut FakeState)) -> Self {
        f(&mut self.state());
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn ops(&self) -> Vec<String> {
        self.state().ops.clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserSession>> {
        let mut state = self.state();
        if state.fail_launch {
            return Err(DriverError::SessionLost("no browser installed".to_string()));
        }
        state.launches += 1;
        Ok(Box::new(FakeSession {
            state: self.state.clone(),
            page: "about:blank".to_string(),
        }))
    }
}

pub struct FakeSession {
    state: Arc<Mutex<FakeState>>,
    page: String,
}

impl FakeSession {
    async fn op(&mut self, op: &str, target: &str) -> DriverResult<()> {
        let hang = {
            let mut state = self.state.lock().unwrap();
            state.ops.push(format!("{}:{}", op, target));
            if let Some(err) = state.failures.get(target) {
                return Err(err.clone());
            }
            state.hanging.contains(target)
        };
        if hang {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }

    fn outcome(selector: &str) -> ActionOutcome {
        ActionOutcome::new().with("selector", selector)
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> DriverResult<ActionOutcome> {
        self.op("navigate", url).await?;
        self.page = url.to_string();
        Ok(ActionOutcome::new().with("url", url))
    }

    async fn click(&mut self, selector: &str, _timeout: Duration) -> DriverResult<ActionOutcome> {
        self.op("click", selector).await?;
        Ok(Self::outcome(selector))
    }

    async fn type_text(
        &mut self,
        selector: &str,
        _text: &str,
        _timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.op("type", selector).await?;
        Ok(Self::outcome(selector))
    }

    async fn select_option(
        &mut self,
        selector: &str,
        _option: &str,
        _timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.op("select", selector).await?;
        Ok(Self::outcome(selector))
    }

    async fn wait(&mut self, mode: WaitMode, _timeout: Duration) -> DriverResult<ActionOutcome> {
        self.op("wait", &mode.to_string()).await?;
        Ok(ActionOutcome::new().with("wait_type", mode.to_string()))
    }

    async fn scroll_into_view(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.op("scroll", selector).await?;
        Ok(Self::outcome(selector))
    }

    async fn assert_text(
        &mut self,
        selector: &str,
        expected: &str,
        _timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.op("assert_text", selector).await?;
        Ok(ActionOutcome::new().with("text", expected))
    }

    async fn assert_element(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.op("assert_element", selector).await?;
        Ok(Self::outcome(selector))
    }

    async fn extract_text(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.op("extract", selector).await?;
        Ok(Self::outcome(selector).with("extracted_text", "Welcome"))
    }

    async fn take_screenshot(&mut self, name: Option<&str>) -> DriverResult<PathBuf> {
        let name = name.unwrap_or("auto").to_string();
        self.op("take_screenshot", &name).await?;
        if self.state.lock().unwrap().fail_screenshot {
            return Err(DriverError::Protocol("disk full".to_string()));
        }
        Ok(PathBuf::from("shots").join(format!("{}.png", name)))
    }

    async fn content_hash(&mut self) -> DriverResult<String> {
        self.op("content_hash", "page").await?;
        if self.state.lock().unwrap().fail_content_hash {
            return Err(DriverError::Protocol("page crashed".to_string()));
        }
        let html = format!(r#"<html data-timestamp="{}">{}</html>"#, self.page.len(), self.page);
        Ok(content_hash(&html, DEFAULT_VOLATILE_ATTRIBUTES))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }

    fn abort(&mut self) {
        self.state.lock().unwrap().aborts += 1;
    }
}
