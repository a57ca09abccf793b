//! Translator configuration
//!
//! Explicit configuration passed to the orchestrator instead of process-wide
//! flags, plus the environment-backed settings for the LLM client.

use crate::error::{Result, TranslateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::env;
use std::time::Duration;

/// Table assumed when the schema does not name one
pub const DEFAULT_TABLE: &str = "td_agg_threat";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatorConfig {
    /// Whether the external translator is tried before the rule engine
    pub collaborator_enabled: bool,

    /// Upper bound on the external call, in milliseconds
    pub timeout_ms: u64,

    /// Exact (trimmed) answers treated as generic and rejected
    pub placeholder_denylist: BTreeSet<String>,

    /// Table used when none can be recovered from the schema
    pub default_table: String,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::for_table(DEFAULT_TABLE)
    }
}

impl TranslatorConfig {
    /// Defaults with the denylist derived from `table`
    pub fn for_table(table: &str) -> Self {
        Self {
            collaborator_enabled: true,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            placeholder_denylist: default_placeholders(table),
            default_table: table.to_string(),
        }
    }

    pub fn with_collaborator_enabled(mut self, enabled: bool) -> Self {
        self.collaborator_enabled = enabled;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn is_placeholder(&self, sql: &str) -> bool {
        self.placeholder_denylist.contains(sql.trim())
    }
}

fn default_placeholders(table: &str) -> BTreeSet<String> {
    [
        format!("SELECT * FROM {} LIMIT 10", table),
        format!("SELECT * FROM {}", table),
        "-- Could not generate SQL query".to_string(),
    ]
    .into_iter()
    .collect()
}

/// Connection settings for an OpenAI compatible chat completions endpoint
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl LlmConfig {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
        }
    }

    /// Read `OPENAI_API_KEY`, `OPENAI_MODEL` and `OPENAI_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TranslateError::Config("OPENAI_API_KEY is not set".to_string()))?;

        Ok(Self::new(
            api_key,
            env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        ))
    }
}
