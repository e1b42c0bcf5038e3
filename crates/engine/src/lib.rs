//! Retrace Engine
//!
//! Records and replays browser scripts:
//! - [`TestRecorder`] turns a stream of interpreted instructions into a script
//! - [`TestExecutor`] replays a script step by step against one browser session
//! - [`BrowserDriver`]/[`BrowserSession`] are the only way the engine touches a browser
//! - [`PlaywrightDriver`] implements them over a Node.js bridge
//! - [`LlmInterpreter`] asks a hosted model before falling back to the keyword rules
//! - [`Explorer`] drives a live page one typed command at a time
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Interpreter (rules or model): "click login" -> [Action] │
//! │        │                                                 │
//! │        ▼                                                 │
//! │  TestRecorder ── stop_recording() ──► TestScript ──► ScriptStore
//! │                                                          │
//! │  ScriptStore ──► TestExecutor::execute(script)           │
//! │                    ├── validate Action -> Command        │
//! │                    ├── dispatch to BrowserSession        │
//! │                    ├── screenshot + content hash         │
//! │                    └── ExecutionResult ──► ResultStore   │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod explorer;
pub mod interpreter;
pub mod llm;
pub mod playwright;
pub mod recorder;

pub use config::{LlmSettings, RetraceConfig};
pub use driver::{ActionOutcome, BrowserDriver, BrowserSession, DriverError, DriverResult};
pub use error::{EngineError, EngineResult, LlmError, RecorderError, RecorderState};
pub use executor::{ExecutorConfig, FailurePolicy, TestExecutor};
pub use explorer::{ExploreCommand, Explorer, EXPLORE_HELP};
pub use interpreter::{lint, Interpreter, RuleInterpreter};
pub use llm::{CompletionClient, HttpCompletionClient, LlmInterpreter, LlmProvider};
pub use playwright::{Browser, PlaywrightConfig, PlaywrightDriver};
pub use recorder::{RecordingSession, TestRecorder};
