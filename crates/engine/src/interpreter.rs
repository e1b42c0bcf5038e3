//! Natural-language instruction interpretation
//!
//! Turns free text such as `click the "Sign in" button` into [`Action`]s for
//! the recorder. The rule-based interpreter is keyword driven, deterministic
//! and never fails: text it cannot map becomes a low-confidence click that
//! keeps the raw instruction in metadata. [`crate::llm::LlmInterpreter`]
//! asks a hosted model first and falls back to these rules.

use std::collections::BTreeMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use retrace_common::{Action, KnowledgeBase};

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s'"]+"#).expect("valid regex"));

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']([^"']+)["']"#).expect("valid regex"));

/// Stable selectors for elements most forms have
const ELEMENT_SELECTORS: &[(&str, &str)] = &[
    ("login", "button[data-testid='login']"),
    ("submit", "button[type='submit']"),
    ("username", "input[name='username']"),
    ("password", "input[name='password']"),
    ("email", "input[type='email']"),
];

const NAVIGATE_KEYWORDS: &[&str] = &["go to", "navigate to", "open", "visit"];
const CLICK_KEYWORDS: &[&str] = &["click", "press", "tap"];
const TYPE_KEYWORDS: &[&str] = &["type", "enter", "input", "fill"];
const ASSERT_KEYWORDS: &[&str] = &["verify", "assert", "check"];

/// Maps one instruction to zero or more actions
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// `context` carries caller state such as the current page; rule-based
    /// interpretation does not consult it
    async fn interpret(&self, instruction: &str, context: Option<&Value>) -> Vec<Action>;
}

/// Keyword rules, optionally backed by known element mappings
#[derive(Debug, Clone, Default)]
pub struct RuleInterpreter {
    known_elements: BTreeMap<String, String>,
}

impl RuleInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefer selectors learned in the knowledge base over the built-in ones
    pub fn with_knowledge(knowledge: &KnowledgeBase) -> Self {
        let known_elements = knowledge
            .mappings()
            .keys()
            .filter_map(|name| {
                knowledge
                    .selector_for(name)
                    .map(|selector| (name.to_lowercase(), selector.to_string()))
            })
            .collect();
        Self { known_elements }
    }

    fn selector(&self, instruction: &str, default_element: &str) -> String {
        let lower = instruction.to_lowercase();

        if let Some(selector) = self
            .known_elements
            .iter()
            .find(|(name, _)| lower.contains(name.as_str()))
            .map(|(_, selector)| selector)
        {
            return selector.clone();
        }

        if let Some((_, selector)) = ELEMENT_SELECTORS
            .iter()
            .find(|(keyword, _)| lower.contains(keyword))
        {
            return selector.to_string();
        }

        match quoted(instruction) {
            Some(text) => format!("{}:has-text('{}')", default_element, text),
            None => default_element.to_string(),
        }
    }
}

#[async_trait]
impl Interpreter for RuleInterpreter {
    async fn interpret(&self, instruction: &str, _context: Option<&Value>) -> Vec<Action> {
        self.translate(instruction)
    }
}

impl RuleInterpreter {
    /// Apply the keyword rules; always yields exactly one action
    pub fn translate(&self, instruction: &str) -> Vec<Action> {
        let lower = instruction.trim().to_lowercase();
        let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
        let value = || quoted(instruction).unwrap_or_default();

        let action = if has_any(NAVIGATE_KEYWORDS) {
            extract_url(instruction).map(Action::navigate)
        } else if has_any(CLICK_KEYWORDS) {
            Some(Action::click(self.selector(instruction, "button")))
        } else if has_any(TYPE_KEYWORDS) {
            Some(Action::type_text(self.selector(instruction, "input"), value()))
        } else if lower.contains("select") {
            Some(Action::select(self.selector(instruction, "select"), value()))
        } else if lower.contains("wait") {
            let mode = if lower.contains("network") {
                "networkidle"
            } else {
                "load"
            };
            Some(Action::wait(mode))
        } else if lower.contains("screenshot") || lower.contains("capture") {
            Some(Action::screenshot(None))
        } else if has_any(ASSERT_KEYWORDS) {
            let selector = self.selector(instruction, "*");
            if lower.contains("text") {
                Some(Action::assert_text(selector, value()))
            } else {
                Some(Action::assert_element(selector))
            }
        } else {
            None
        };

        let action = action.unwrap_or_else(|| {
            Action::click("*")
                .with_metadata("raw_instruction", instruction)
                .with_metadata("confidence", "low")
        });
        vec![action]
    }
}

fn quoted(instruction: &str) -> Option<String> {
    QUOTED
        .captures(instruction)
        .map(|c| c[1].to_string())
}

fn extract_url(instruction: &str) -> Option<String> {
    if let Some(m) = URL.find(instruction) {
        return Some(m.as_str().to_string());
    }
    quoted(instruction).filter(|q| q.starts_with("http"))
}

/// Validation problems per action index, for review before recording
pub fn lint(actions: &[Action]) -> Vec<String> {
    actions
        .iter()
        .enumerate()
        .filter_map(|(i, action)| {
            action
                .validate()
                .err()
                .map(|e| format!("Action {}: {}", i, e))
        })
        .collect()
}
