//! Validated, executable form of an [`Action`]
//!
//! An [`Action`] is the loose, serializable record. Validation turns it into a
//! [`Command`], which carries exactly the parameters its kind needs, so the
//! driver dispatch can match exhaustively without re-checking optional fields.

use std::fmt;
use std::time::Duration;

use crate::error::ValidationError;
use crate::types::{Action, ActionKind};

/// Condition a wait action blocks on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    Load,
    DomContentLoaded,
    NetworkIdle,
    /// Fixed delay
    Delay(Duration),
}

impl WaitMode {
    pub fn parse(token: &str) -> Result<Self, ValidationError> {
        match token.trim() {
            "" | "load" => Ok(WaitMode::Load),
            "domcontentloaded" => Ok(WaitMode::DomContentLoaded),
            "networkidle" => Ok(WaitMode::NetworkIdle),
            other => other
                .parse::<u64>()
                .map(|ms| WaitMode::Delay(Duration::from_millis(ms)))
                .map_err(|_| ValidationError::InvalidWaitMode(other.to_string())),
        }
    }
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitMode::Load => f.write_str("load"),
            WaitMode::DomContentLoaded => f.write_str("domcontentloaded"),
            WaitMode::NetworkIdle => f.write_str("networkidle"),
            WaitMode::Delay(d) => write!(f, "{}", d.as_millis()),
        }
    }
}

/// One browser operation with its required parameters resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
    Select { selector: String, option: String },
    Wait { mode: WaitMode },
    Scroll { selector: String },
    Screenshot { name: Option<String> },
    AssertText { selector: String, expected: String },
    AssertElement { selector: String },
    Extract { selector: String },
}

impl Command {
    pub fn kind(&self) -> ActionKind {
        match self {
            Command::Navigate { .. } => ActionKind::Navigate,
            Command::Click { .. } => ActionKind::Click,
            Command::Type { .. } => ActionKind::Type,
            Command::Select { .. } => ActionKind::Select,
            Command::Wait { .. } => ActionKind::Wait,
            Command::Scroll { .. } => ActionKind::Scroll,
            Command::Screenshot { .. } => ActionKind::Screenshot,
            Command::AssertText { .. } => ActionKind::AssertText,
            Command::AssertElement { .. } => ActionKind::AssertElement,
            Command::Extract { .. } => ActionKind::Extract,
        }
    }

    /// Short label used in logs
    pub fn label(&self) -> String {
        match self {
            Command::Navigate { url } => format!("navigate:{}", url),
            Command::Click { selector } => format!("click:{}", selector),
            Command::Type { selector, .. } => format!("type:{}", selector),
            Command::Select { selector, .. } => format!("select:{}", selector),
            Command::Wait { mode } => format!("wait:{}", mode),
            Command::Scroll { selector } => format!("scroll:{}", selector),
            Command::Screenshot { name } => {
                format!("screenshot:{}", name.as_deref().unwrap_or("auto"))
            }
            Command::AssertText { selector, .. } => format!("assert_text:{}", selector),
            Command::AssertElement { selector } => format!("assert_element:{}", selector),
            Command::Extract { selector } => format!("extract:{}", selector),
        }
    }
}

impl TryFrom<&Action> for Command {
    type Error = ValidationError;

    fn try_from(action: &Action) -> Result<Self, Self::Error> {
        if action.timeout_ms == 0 {
            return Err(ValidationError::InvalidTimeout(action.timeout_ms));
        }

        let kind = action.kind;
        let selector = || {
            action
                .selector
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .ok_or_else(|| ValidationError::MissingSelector {
                    kind: kind.to_string(),
                })
        };
        let value = |what: &'static str| {
            action
                .value
                .clone()
                .ok_or_else(|| ValidationError::MissingValue {
                    kind: kind.to_string(),
                    what,
                })
        };

        let command = match kind {
            ActionKind::Navigate => {
                let url = value("url")?;
                if url.trim().is_empty() {
                    return Err(ValidationError::MissingValue {
                        kind: kind.to_string(),
                        what: "url",
                    });
                }
                Command::Navigate { url }
            }
            ActionKind::Click => Command::Click {
                selector: selector()?,
            },
            ActionKind::Type => Command::Type {
                selector: selector()?,
                text: value("text to type")?,
            },
            ActionKind::Select => Command::Select {
                selector: selector()?,
                option: value("option")?,
            },
            ActionKind::Wait => Command::Wait {
                mode: WaitMode::parse(action.value.as_deref().unwrap_or("load"))?,
            },
            ActionKind::Scroll => Command::Scroll {
                selector: selector()?,
            },
            ActionKind::Screenshot => Command::Screenshot {
                name: action.value.clone().filter(|v| !v.trim().is_empty()),
            },
            ActionKind::AssertText => {
                let selector = selector()?;
                let expected = action
                    .text
                    .clone()
                    .ok_or_else(|| ValidationError::MissingText {
                        kind: kind.to_string(),
                    })?;
                Command::AssertText { selector, expected }
            }
            ActionKind::AssertElement => Command::AssertElement {
                selector: selector()?,
            },
            ActionKind::Extract => Command::Extract {
                selector: selector()?,
            },
        };

        Ok(command)
    }
}
