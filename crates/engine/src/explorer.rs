//! Interactive exploration of a live page
//!
//! An [`Explorer`] owns one browser session opened on a URL and runs typed
//! commands against it one at a time, e.g. `click #login` or
//! `type input[name=q] running shoes`. Nothing is recorded; a failed command
//! leaves the session open for the next one.

use std::str::FromStr;
use std::time::Duration;

use tracing::{debug, info};

use retrace_common::Command;

use crate::driver::{ActionOutcome, BrowserDriver, DriverResult};
use crate::error::{EngineError, EngineResult};
use crate::executor::{bounded, dispatch, ExecutorConfig, SessionGuard};

/// Command words accepted at the exploration prompt
pub const EXPLORE_HELP: &str =
    "goto <url> | click <selector> | type <selector> <text> | screenshot [name] | done";

/// One line typed at the exploration prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExploreCommand {
    Run(Command),
    Done,
}

impl FromStr for ExploreCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.trim().splitn(3, char::is_whitespace);
        let word = parts.next().unwrap_or_default().to_lowercase();
        let first = parts.next().map(str::trim).filter(|s| !s.is_empty());
        let rest = parts.next().map(str::trim).filter(|s| !s.is_empty());

        let usage = |form: &str| format!("usage: {}", form);
        let command = match word.as_str() {
            "done" | "quit" | "exit" => return Ok(ExploreCommand::Done),
            "goto" | "open" => Command::Navigate {
                url: first.ok_or_else(|| usage("goto <url>"))?.to_string(),
            },
            "click" => {
                // Selectors may contain spaces
                let selector = match (first, rest) {
                    (Some(first), Some(rest)) => format!("{} {}", first, rest),
                    (Some(first), None) => first.to_string(),
                    _ => return Err(usage("click <selector>")),
                };
                Command::Click { selector }
            }
            "type" => match (first, rest) {
                (Some(selector), Some(text)) => Command::Type {
                    selector: selector.to_string(),
                    text: text.to_string(),
                },
                _ => return Err(usage("type <selector> <text>")),
            },
            "screenshot" => Command::Screenshot {
                name: first.map(str::to_string),
            },
            "" => return Err(format!("empty command; try {}", EXPLORE_HELP)),
            other => return Err(format!("Unknown command: {}", other)),
        };
        Ok(ExploreCommand::Run(command))
    }
}

/// A live session driven one command at a time
pub struct Explorer {
    guard: SessionGuard,
    timeout: Duration,
    grace: Duration,
    commands_run: usize,
}

impl Explorer {
    /// Launch a session and open `url` in it; `timeout` applies to every command
    pub async fn open<D: BrowserDriver + ?Sized>(
        driver: &D,
        url: &str,
        timeout: Duration,
        config: &ExecutorConfig,
    ) -> EngineResult<Self> {
        info!("Exploring {}", url);
        let session = driver.launch().await.map_err(EngineError::Launch)?;
        let mut explorer = Self {
            guard: SessionGuard::new(session),
            timeout,
            grace: config.timeout_grace,
            commands_run: 0,
        };

        explorer
            .run(&Command::Navigate {
                url: url.to_string(),
            })
            .await
            .map_err(EngineError::Driver)?;
        Ok(explorer)
    }

    /// Run one command against the open page
    pub async fn run(&mut self, command: &Command) -> DriverResult<ActionOutcome> {
        let label = command.label();
        debug!("Explore: {}", label);
        self.commands_run += 1;
        let bound = self.timeout + self.grace;
        bounded(
            bound,
            &label,
            dispatch(self.guard.session(), command, self.timeout),
        )
        .await
    }

    /// Commands run so far, including the initial navigation
    pub fn commands_run(&self) -> usize {
        self.commands_run
    }

    /// Close the session gracefully
    pub async fn close(self) -> EngineResult<()> {
        info!("Exploration finished after {} commands", self.commands_run);
        self.guard.close().await.map_err(EngineError::Driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("done" ; "done")]
    #[test_case("QUIT" ; "upper case quit")]
    #[test_case("  exit  " ; "padded exit")]
    fn test_finish_words(line: &str) {
        assert_eq!(line.parse::<ExploreCommand>().unwrap(), ExploreCommand::Done);
    }

    #[test]
    fn test_type_keeps_spaces_in_text() {
        let parsed: ExploreCommand = "type input[name=q] running shoes".parse().unwrap();
        assert_eq!(
            parsed,
            ExploreCommand::Run(Command::Type {
                selector: "input[name=q]".to_string(),
                text: "running shoes".to_string(),
            })
        );
    }

    #[test]
    fn test_click_selector_with_spaces() {
        let parsed: ExploreCommand = "click form .submit button".parse().unwrap();
        assert_eq!(
            parsed,
            ExploreCommand::Run(Command::Click {
                selector: "form .submit button".to_string(),
            })
        );
    }

    #[test]
    fn test_screenshot_name_is_optional() {
        assert_eq!(
            "screenshot".parse::<ExploreCommand>().unwrap(),
            ExploreCommand::Run(Command::Screenshot { name: None })
        );
        assert_eq!(
            "screenshot cart".parse::<ExploreCommand>().unwrap(),
            ExploreCommand::Run(Command::Screenshot {
                name: Some("cart".to_string())
            })
        );
    }

    #[test_case("click" , "usage: click" ; "click without selector")]
    #[test_case("type #q", "usage: type" ; "type without text")]
    #[test_case("goto", "usage: goto" ; "goto without url")]
    #[test_case("dance wildly", "Unknown command: dance" ; "unknown word")]
    #[test_case("   ", "empty command" ; "blank line")]
    fn test_rejected_lines(line: &str, message: &str) {
        let err = line.parse::<ExploreCommand>().unwrap_err();
        assert!(err.starts_with(message), "{}", err);
    }
}
