//! Translation orchestrator
//!
//! Caller-facing entry point. Tries the external translator once (bounded by
//! the configured timeout) and falls back to the rule engine whenever that
//! attempt is unavailable, fails, times out or returns a generic placeholder.
//! The fallback compile never calls out and never fails.

use crate::assembler::SqlClauseAssembler;
use crate::config::TranslatorConfig;
use crate::entities::{Entities, EntityExtractor};
use crate::intent::{IntentClassifier, IntentSet};
use crate::schema::{table_name_from_ddl, SchemaSource};
use crate::translator::{clean_sql_response, SqlTranslator, TranslationRequest};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which path produced the SQL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TranslationSource {
    External(String),
    Fallback,
}

/// Why the external answer was not used
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FallbackReason {
    /// External translation switched off in the config
    Disabled,
    NoCollaborator,
    /// Elapsed limit in milliseconds
    Timeout(u64),
    Failed(String),
    /// The generic answer that was rejected
    Placeholder(String),
    Empty,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::Disabled => write!(f, "external translation disabled"),
            FallbackReason::NoCollaborator => write!(f, "no external translator configured"),
            FallbackReason::Timeout(ms) => write!(f, "external translator timed out after {}ms", ms),
            FallbackReason::Failed(e) => write!(f, "external translator failed: {}", e),
            FallbackReason::Placeholder(sql) => write!(f, "external translator returned a generic answer: {}", sql),
            FallbackReason::Empty => write!(f, "external translator returned an empty answer"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Translation {
    pub sql: String,
    pub source: TranslationSource,
    pub fallback_reason: Option<FallbackReason>,
}

impl Translation {
    pub fn is_fallback(&self) -> bool {
        self.source == TranslationSource::Fallback
    }
}

/// Instructions handed to the external translator
pub fn instructions(ddl: &str, current_date: NaiveDate) -> String {
    format!(
        r#"You are a SQL expert. Given the following database schema, write a SQL query that answers the user's question.

Database Schema:
{}

Current date: {}

Respond ONLY with the SQL query, no explanations or additional text."#,
        ddl,
        current_date.format("%Y-%m-%d")
    )
}

pub struct Translator {
    config: TranslatorConfig,
    collaborator: Option<Arc<dyn SqlTranslator>>,
    classifier: IntentClassifier,
    extractor: EntityExtractor,
    assembler: SqlClauseAssembler,
}

impl Translator {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            config,
            collaborator: None,
            classifier: IntentClassifier::new(),
            extractor: EntityExtractor::new(),
            assembler: SqlClauseAssembler::new(),
        }
    }

    pub fn with_collaborator(mut self, collaborator: Arc<dyn SqlTranslator>) -> Self {
        self.collaborator = Some(collaborator);
        self
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate `query` against `schema`, never failing
    pub async fn translate(&self, query: &str, schema: &SchemaSource) -> Translation {
        let ddl = schema.to_ddl();

        match self.attempt_external(query, &ddl).await {
            Ok((name, sql)) => {
                info!("✅ SQL generated by external translator {}", name);
                Translation {
                    sql,
                    source: TranslationSource::External(name),
                    fallback_reason: None,
                }
            }
            Err(reason) => {
                match &reason {
                    FallbackReason::Disabled | FallbackReason::NoCollaborator => {
                        debug!("Using rule engine: {}", reason)
                    }
                    _ => warn!("⚠️  {}, falling back to rule engine", reason),
                }
                Translation {
                    sql: self.compile(query, &ddl),
                    source: TranslationSource::Fallback,
                    fallback_reason: Some(reason),
                }
            }
        }
    }

    async fn attempt_external(
        &self,
        query: &str,
        ddl: &str,
    ) -> std::result::Result<(String, String), FallbackReason> {
        if !self.config.collaborator_enabled {
            return Err(FallbackReason::Disabled);
        }
        let collaborator = self.collaborator.as_ref().ok_or(FallbackReason::NoCollaborator)?;

        let request = TranslationRequest {
            instructions: instructions(ddl, Local::now().date_naive()),
            query: query.to_string(),
        };

        let answer = tokio::time::timeout(self.config.timeout(), collaborator.translate(&request))
            .await
            .map_err(|_| FallbackReason::Timeout(self.config.timeout_ms))?
            .map_err(|e| FallbackReason::Failed(e.to_string()))?;

        if self.config.is_placeholder(&answer) {
            return Err(FallbackReason::Placeholder(answer.trim().to_string()));
        }

        let sql = clean_sql_response(&answer);
        if sql.is_empty() {
            return Err(FallbackReason::Empty);
        }
        if self.config.is_placeholder(&sql) {
            return Err(FallbackReason::Placeholder(sql));
        }

        Ok((collaborator.name().to_string(), sql))
    }

    /// The deterministic rule-engine pipeline
    pub fn compile(&self, query: &str, ddl: &str) -> String {
        let (intents, entities) = self.analyze(query);
        let table = self.table_name(ddl);
        debug!("Rule engine: intents={} table={}", intents, table);
        self.assembler.assemble(&intents, &entities, &table)
    }

    pub fn analyze(&self, query: &str) -> (IntentSet, Entities) {
        (self.classifier.classify(query), self.extractor.extract(query))
    }

    /// Table named by the DDL, or the configured default
    pub fn table_name(&self, ddl: &str) -> String {
        table_name_from_ddl(ddl).unwrap_or_else(|| self.config.default_table.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TranslateError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Canned {
        answer: Result<String>,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(answer.to_string()),
                delay: Duration::ZERO,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SqlTranslator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn translate(&self, request: &TranslationRequest) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.instructions.contains("Database Schema:"));
            tokio::time::sleep(self.delay).await;
            match &self.answer {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(TranslateError::Llm(e.to_string())),
            }
        }
    }

    fn schema() -> SchemaSource {
        SchemaSource::from("CREATE TABLE events (id UInt32)")
    }

    #[tokio::test]
    async fn test_accepts_external_answer() {
        let canned = Canned::ok("```sql\nSELECT id FROM events;\n```");
        let translator = Translator::new(TranslatorConfig::default()).with_collaborator(canned.clone());

        let translation = translator.translate("ids please", &schema()).await;
        assert_eq!(translation.sql, "SELECT id FROM events");
        assert_eq!(translation.source, TranslationSource::External("canned".to_string()));
        assert_eq!(canned.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_placeholder_answer_falls_back() {
        let translator = Translator::new(TranslatorConfig::default())
            .with_collaborator(Canned::ok("SELECT * FROM td_agg_threat LIMIT 10"));

        let translation = translator.translate("count threats by region", &schema()).await;
        assert!(translation.is_fallback());
        assert!(matches!(translation.fallback_reason, Some(FallbackReason::Placeholder(_))));
        assert!(translation.sql.starts_with("SELECT COUNT(*) AS threat_count"));
        assert!(translation.sql.contains("FROM events"));
    }

    #[tokio::test]
    async fn test_disabled_collaborator_is_not_called() {
        let canned = Canned::ok("SELECT 1");
        let translator = Translator::new(TranslatorConfig::default().with_collaborator_enabled(false))
            .with_collaborator(canned.clone());

        let translation = translator.translate("", &schema()).await;
        assert_eq!(translation.fallback_reason, Some(FallbackReason::Disabled));
        assert_eq!(translation.sql, "SELECT *\nFROM events\nLIMIT 10");
        assert_eq!(canned.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_timeout_falls_back() {
        let slow = Arc::new(Canned {
            answer: Ok("SELECT id FROM events".to_string()),
            delay: Duration::from_millis(500),
            calls: AtomicUsize::new(0),
        });
        let translator = Translator::new(TranslatorConfig::default().with_timeout_ms(20))
            .with_collaborator(slow);

        let translation = translator.translate("", &schema()).await;
        assert_eq!(translation.fallback_reason, Some(FallbackReason::Timeout(20)));
        assert!(translation.is_fallback());
    }

    #[tokio::test]
    async fn test_error_and_empty_answers_fall_back() {
        let failing = Arc::new(Canned {
            answer: Err(TranslateError::Llm("boom".to_string())),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        });
        let translator = Translator::new(TranslatorConfig::default()).with_collaborator(failing);
        let translation = translator.translate("", &schema()).await;
        assert!(matches!(translation.fallback_reason, Some(FallbackReason::Failed(_))));

        let translator = Translator::new(TranslatorConfig::default()).with_collaborator(Canned::ok("```\n```"));
        let translation = translator.translate("", &schema()).await;
        assert_eq!(translation.fallback_reason, Some(FallbackReason::Empty));
    }

    #[test]
    fn test_table_name_falls_back_to_config() {
        let translator = Translator::new(TranslatorConfig::for_table("default_t"));
        assert_eq!(translator.table_name("free text schema"), "default_t");
        assert_eq!(translator.table_name("CREATE TABLE x (a Int8)"), "x");
    }

    #[test]
    fn test_instructions_embed_schema_and_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let text = instructions("CREATE TABLE x (a Int8)", date);
        assert!(text.contains("Database Schema:\nCREATE TABLE x (a Int8)\n"));
        assert!(text.contains("Current date: 2024-03-09"));
    }
}
