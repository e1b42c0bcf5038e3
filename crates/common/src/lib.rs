//! Retrace Common Library
//!
//! Script model, validation, content hashing and persistence shared by the
//! execution engine and the command-line tool, plus the offline enrichment
//! feeders (source analysis, knowledge base, pattern learning).

pub mod analysis;
pub mod command;
pub mod error;
pub mod hash;
pub mod knowledge;
pub mod patterns;
pub mod results;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use analysis::{SourceAnalysis, SourceAnalyzer};
pub use command::{Command, WaitMode};
pub use error::{Error, Result, ValidationError};
pub use hash::{content_hash, ContentHasher, DEFAULT_VOLATILE_ATTRIBUTES};
pub use knowledge::{KnowledgeBase, SelectorType, KNOWLEDGE_FILE};
pub use results::ResultStore;
pub use store::{sanitize_name, ScriptFormat, ScriptStore};
pub use types::*;

/// Retrace version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
