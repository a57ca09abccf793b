//! External translators
//!
//! Capability interface for anything that can turn a question into SQL
//! outside the rule engine, and the LLM-backed implementation of it.

use crate::config::LlmConfig;
use crate::error::{Result, TranslateError};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Input handed to an external translator
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// System instructions embedding the schema and current date
    pub instructions: String,
    /// Raw user question
    pub query: String,
}

#[async_trait]
pub trait SqlTranslator: Send + Sync {
    /// Name used in logs and in `TranslationSource::External`
    fn name(&self) -> &str;

    /// Produce SQL text for the request. May be slow; callers bound the wait.
    async fn translate(&self, request: &TranslationRequest) -> Result<String>;
}

/// Translator backed by an OpenAI compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct LlmTranslator {
    config: LlmConfig,
    client: reqwest::Client,
}

impl LlmTranslator {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(LlmConfig::from_env()?))
    }
}

#[async_trait]
impl SqlTranslator for LlmTranslator {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn translate(&self, request: &TranslationRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": request.instructions},
                {"role": "user", "content": request.query}
            ],
            "temperature": 0.0,
        });

        debug!("Calling {} at {}", self.config.model, self.config.base_url);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| TranslateError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TranslateError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TranslateError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(TranslateError::Llm(format!("LLM API error: {}", error)));
        }

        let choice = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| TranslateError::Llm("No choices in LLM response".to_string()))?;

        if choice.get("finish_reason").and_then(|r| r.as_str()) == Some("length") {
            warn!("⚠️  LLM response was truncated due to length limit");
        }

        choice["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| TranslateError::Llm("No content in LLM response".to_string()))
    }
}

/// Strip markdown code fences and a trailing statement terminator
pub fn clean_sql_response(response: &str) -> String {
    let trimmed = response.trim();

    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => {
            // drop the info string (```sql)
            let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
            body.trim_end().trim_end_matches("```")
        }
        None => trimmed,
    };

    unfenced.trim().trim_end_matches(';').trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_sql_response() {
        assert_eq!(clean_sql_response("SELECT 1;"), "SELECT 1");
        assert_eq!(
            clean_sql_response("```sql\nSELECT a\nFROM t;\n```\n"),
            "SELECT a\nFROM t"
        );
        assert_eq!(clean_sql_response("```\nSELECT 2\n```"), "SELECT 2");
        assert_eq!(clean_sql_response("   "), "");
    }
}
