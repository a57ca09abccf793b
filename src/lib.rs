//! Natural language to SQL translation.
//!
//! A deterministic rule engine (intent classification, entity extraction and
//! clause assembly) that doubles as the fallback compiler for an optional
//! external LLM translator.

pub mod assembler;
pub mod config;
pub mod entities;
pub mod error;
pub mod intent;
pub mod orchestrator;
pub mod schema;
pub mod translator;

pub use assembler::SqlClauseAssembler;
pub use config::{LlmConfig, TranslatorConfig};
pub use entities::{ConditionMap, Entities, EntityExtractor, TimeEntity, TimePeriod};
pub use error::{Result, TranslateError};
pub use intent::{Intent, IntentClassifier, IntentSet};
pub use orchestrator::{FallbackReason, Translation, TranslationSource, Translator};
pub use schema::{SchemaCatalog, SchemaColumn, SchemaSource, TableSchema};
pub use translator::{LlmTranslator, SqlTranslator, TranslationRequest};
