//! Playwright browser automation
//!
//! Each session runs `node` with a small embedded bridge script. The bridge
//! owns one Playwright page and answers newline-delimited JSON requests on
//! stdin, one response line per request, strictly in order.

use std::path::PathBuf;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use retrace_common::{ContentHasher, WaitMode};

use crate::driver::{ActionOutcome, BrowserDriver, BrowserSession, DriverError, DriverResult};

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

let browser = null;
let page = null;

function failure(name, message) {
  const err = new Error(message);
  err.name = name;
  return err;
}

async function locate(req) {
  const el = await page.waitForSelector(req.selector, { timeout: req.timeout });
  if (!el) throw failure('NotFoundError', `no element matches ${req.selector}`);
  return el;
}

const handlers = {
  async launch(req) {
    browser = await playwright[req.browser].launch({ headless: req.headless });
    const context = await browser.newContext({
      viewport: { width: req.viewport_width, height: req.viewport_height },
      userAgent: req.user_agent || undefined,
    });
    page = await context.newPage();
    return {};
  },
  async navigate(req) {
    await page.goto(req.url, { waitUntil: 'domcontentloaded', timeout: req.timeout });
    return { url: page.url() };
  },
  async click(req) {
    await (await locate(req)).click();
    await page.waitForLoadState('domcontentloaded');
    return {};
  },
  async type(req) {
    await (await locate(req)).fill(req.text);
    return {};
  },
  async select(req) {
    await (await locate(req)).selectOption(req.option);
    return {};
  },
  async wait(req) {
    if (req.mode === 'delay') {
      await page.waitForTimeout(req.ms);
    } else {
      await page.waitForLoadState(req.mode, { timeout: req.timeout });
    }
    return {};
  },
  async scroll(req) {
    await (await locate(req)).scrollIntoViewIfNeeded();
    return {};
  },
  async assert_text(req) {
    const actual = await (await locate(req)).innerText();
    if (!actual.includes(req.expected)) {
      throw failure('AssertionError', `expected text '${req.expected}' not found, actual: '${actual}'`);
    }
    return { text: actual };
  },
  async assert_element(req) {
    await locate(req);
    return {};
  },
  async extract(req) {
    return { text: await (await locate(req)).innerText() };
  },
  async screenshot(req) {
    await page.screenshot({ path: req.path, fullPage: true });
    return { path: req.path };
  },
  async content() {
    return { html: await page.content() };
  },
  async close() {
    if (browser) await browser.close();
    browser = null;
    return {};
  },
};

function kind(err) {
  switch (err && err.name) {
    case 'TimeoutError': return 'timeout';
    case 'NotFoundError': return 'not_found';
    case 'AssertionError': return 'assertion';
    default: return 'protocol';
  }
}

const rl = readline.createInterface({ input: process.stdin });
let queue = Promise.resolve();
rl.on('line', (line) => {
  queue = queue.then(async () => {
    let req;
    try {
      req = JSON.parse(line);
      const handler = handlers[req.op];
      if (!handler) throw new Error(`unknown op ${req.op}`);
      const data = await handler(req);
      process.stdout.write(JSON.stringify({ id: req.id, ok: true, data }) + '\n');
    } catch (err) {
      const message = String((err && err.message) || err);
      process.stdout.write(JSON.stringify({
        id: req ? req.id : 0, ok: false, error: { kind: kind(err), message },
      }) + '\n');
    }
    if (req && req.op === 'close') process.exit(0);
  });
});
rl.on('close', async () => {
  if (browser) await browser.close();
  process.exit(0);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser engine: {}", other)),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub user_agent: Option<String>,
    pub screenshot_dir: PathBuf,
    pub node_binary: String,
    /// Attributes ignored by the content hash
    pub volatile_attributes: Vec<String>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            user_agent: None,
            screenshot_dir: PathBuf::from("screenshots"),
            node_binary: "node".to_string(),
            volatile_attributes: retrace_common::DEFAULT_VOLATILE_ATTRIBUTES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Launches one bridge process per session
#[derive(Debug, Clone)]
pub struct PlaywrightDriver {
    config: PlaywrightConfig,
    hasher: ContentHasher,
}

impl PlaywrightDriver {
    pub fn new(config: PlaywrightConfig) -> Self {
        let hasher = ContentHasher::new(config.volatile_attributes.as_slice());
        Self { config, hasher }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn launch(&self) -> DriverResult<Box<dyn BrowserSession>> {
        std::fs::create_dir_all(&self.config.screenshot_dir).map_err(|e| {
            DriverError::Protocol(format!(
                "cannot create {}: {}",
                self.config.screenshot_dir.display(),
                e
            ))
        })?;

        let mut child = Command::new(&self.config.node_binary)
            .arg("-e")
            .arg(BRIDGE_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                DriverError::SessionLost(format!(
                    "failed to start {}: {}",
                    self.config.node_binary, e
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::SessionLost("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::SessionLost("bridge stdout unavailable".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[playwright] {}", line);
                }
            });
        }

        let mut session = PlaywrightSession {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 0,
            screenshot_dir: self.config.screenshot_dir.clone(),
            hasher: self.hasher.clone(),
        };

        session
            .call(
                "launch",
                json!({
                    "browser": self.config.browser.as_str(),
                    "headless": self.config.headless,
                    "viewport_width": self.config.viewport_width,
                    "viewport_height": self.config.viewport_height,
                    "user_agent": self.config.user_agent,
                }),
            )
            .await?;

        info!(
            "Launched {} ({})",
            self.config.browser.as_str(),
            if self.config.headless { "headless" } else { "headed" }
        );
        Ok(Box::new(session))
    }
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    error: Option<BridgeFailure>,
}

#[derive(Debug, Deserialize)]
struct BridgeFailure {
    kind: String,
    message: String,
}

impl From<BridgeFailure> for DriverError {
    fn from(failure: BridgeFailure) -> Self {
        match failure.kind.as_str() {
            "timeout" => DriverError::Timeout(failure.message),
            "not_found" => DriverError::ElementNotFound(failure.message),
            "assertion" => DriverError::AssertionFailed(failure.message),
            _ => DriverError::Protocol(failure.message),
        }
    }
}

/// One bridge process driving one page
pub struct PlaywrightSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    screenshot_dir: PathBuf,
    hasher: ContentHasher,
}

impl PlaywrightSession {
    async fn call(&mut self, op: &str, params: Value) -> DriverResult<Map<String, Value>> {
        self.next_id += 1;
        let id = self.next_id;

        let mut request = Map::new();
        request.insert("id".to_string(), id.into());
        request.insert("op".to_string(), op.into());
        if let Value::Object(params) = params {
            request.extend(params);
        }

        let mut line = Value::Object(request).to_string();
        line.push('\n');
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DriverError::SessionLost(format!("bridge write failed: {}", e)))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| DriverError::SessionLost(format!("bridge write failed: {}", e)))?;

        loop {
            let reply = self
                .stdout
                .next_line()
                .await
                .map_err(|e| DriverError::SessionLost(format!("bridge read failed: {}", e)))?
                .ok_or_else(|| DriverError::SessionLost("bridge process exited".to_string()))?;

            let response: BridgeResponse = serde_json::from_str(&reply)
                .map_err(|e| DriverError::Protocol(format!("malformed bridge reply: {}", e)))?;

            // Replies to calls abandoned by an outer timeout arrive late
            if response.id < id {
                debug!("Discarding stale bridge reply {}", response.id);
                continue;
            }
            if response.id > id {
                return Err(DriverError::Protocol(format!(
                    "expected reply {} but got {}",
                    id, response.id
                )));
            }

            return if response.ok {
                Ok(response.data)
            } else {
                Err(response
                    .error
                    .map(DriverError::from)
                    .unwrap_or_else(|| DriverError::Protocol(format!("{} failed", op))))
            };
        }
    }

    async fn element_op(
        &mut self,
        op: &str,
        selector: &str,
        timeout: Duration,
        extra: Value,
    ) -> DriverResult<Map<String, Value>> {
        let mut params = json!({
            "selector": selector,
            "timeout": timeout.as_millis() as u64,
        });
        if let (Some(params), Value::Object(extra)) = (params.as_object_mut(), extra) {
            params.extend(extra);
        }
        self.call(op, params).await
    }

    fn screenshot_path(&self, name: Option<&str>) -> PathBuf {
        let mut file = match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("screenshot_{}", chrono::Utc::now().timestamp_millis()),
        };
        if !file.ends_with(".png") {
            file.push_str(".png");
        }
        self.screenshot_dir.join(file)
    }
}

fn text_of(data: &Map<String, Value>) -> String {
    data.get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> DriverResult<ActionOutcome> {
        let data = self
            .call(
                "navigate",
                json!({ "url": url, "timeout": timeout.as_millis() as u64 }),
            )
            .await?;
        let resolved = data
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or(url)
            .to_string();
        Ok(ActionOutcome::new().with("url", resolved))
    }

    async fn click(&mut self, selector: &str, timeout: Duration) -> DriverResult<ActionOutcome> {
        self.element_op("click", selector, timeout, Value::Null).await?;
        Ok(ActionOutcome::new().with("selector", selector))
    }

    async fn type_text(
        &mut self,
        selector: &str,
        text: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.element_op("type", selector, timeout, json!({ "text": text }))
            .await?;
        Ok(ActionOutcome::new().with("selector", selector))
    }

    async fn select_option(
        &mut self,
        selector: &str,
        option: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.element_op("select", selector, timeout, json!({ "option": option }))
            .await?;
        Ok(ActionOutcome::new().with("selector", selector))
    }

    async fn wait(&mut self, mode: WaitMode, timeout: Duration) -> DriverResult<ActionOutcome> {
        let timeout_ms = timeout.as_millis() as u64;
        let params = match mode {
            WaitMode::Delay(delay) => {
                json!({ "mode": "delay", "ms": delay.as_millis() as u64, "timeout": timeout_ms })
            }
            other => json!({ "mode": other.to_string(), "timeout": timeout_ms }),
        };
        self.call("wait", params).await?;
        Ok(ActionOutcome::new().with("wait_type", mode.to_string()))
    }

    async fn scroll_into_view(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.element_op("scroll", selector, timeout, Value::Null).await?;
        Ok(ActionOutcome::new().with("selector", selector))
    }

    async fn assert_text(
        &mut self,
        selector: &str,
        expected: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.element_op(
            "assert_text",
            selector,
            timeout,
            json!({ "expected": expected }),
        )
        .await?;
        Ok(ActionOutcome::new().with("text", expected))
    }

    async fn assert_element(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        self.element_op("assert_element", selector, timeout, Value::Null)
            .await?;
        Ok(ActionOutcome::new().with("selector", selector))
    }

    async fn extract_text(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> DriverResult<ActionOutcome> {
        let data = self
            .element_op("extract", selector, timeout, Value::Null)
            .await?;
        Ok(ActionOutcome::new()
            .with("selector", selector)
            .with("extracted_text", text_of(&data)))
    }

    async fn take_screenshot(&mut self, name: Option<&str>) -> DriverResult<PathBuf> {
        let path = self.screenshot_path(name);
        self.call(
            "screenshot",
            json!({ "path": path.display().to_string() }),
        )
        .await?;
        Ok(path)
    }

    async fn content_hash(&mut self) -> DriverResult<String> {
        let data = self.call("content", Value::Null).await?;
        let html = data
            .get("html")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Protocol("content reply without html".to_string()))?;
        Ok(self.hasher.hash(html))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.call("close", Value::Null).await?;
        let _ = tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await;
        Ok(())
    }

    fn abort(&mut self) {
        if let Err(e) = self.child.start_kill() {
            debug!("Bridge already gone: {}", e);
        }
    }
}
