//! Schema handling
//!
//! Normalises a table schema into the `CREATE TABLE` text that is used as
//! context by both the rule engine and the LLM prompt. A schema arrives either
//! as a structured column list (`{"tablename": ..., "schema": [...]}`) or as
//! free text that is assumed to already be DDL.

use crate::error::{Result, TranslateError};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Substituted when a structured schema has no `tablename`
pub const UNKNOWN_TABLE: &str = "unknown_table";
/// Substituted when a column entry has no `columnname`
pub const UNKNOWN_COLUMN: &str = "unknown_column";
/// Substituted when a column entry has no `columntype`
pub const DEFAULT_COLUMN_TYPE: &str = "String";

lazy_static! {
    static ref CREATE_TABLE_RE: Regex =
        Regex::new(r"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(\w+(?:\.\w+)?)").unwrap();
}

fn unknown_table() -> String {
    UNKNOWN_TABLE.to_string()
}

fn unknown_column() -> String {
    UNKNOWN_COLUMN.to_string()
}

fn default_column_type() -> String {
    DEFAULT_COLUMN_TYPE.to_string()
}

/// One column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    #[serde(rename = "columnname", default = "unknown_column")]
    pub name: String,

    /// Database type, kept verbatim (e.g. `LowCardinality(String)`)
    #[serde(rename = "columntype", default = "default_column_type")]
    pub column_type: String,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, column_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: column_type.into(),
        }
    }
}

/// Structured table schema, field names follow the metadata payload format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    #[serde(rename = "tablename", default = "unknown_table")]
    pub table_name: String,

    /// Columns in declaration order
    #[serde(rename = "schema", default)]
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    /// Render as `CREATE TABLE` text, one column per line, order preserved
    pub fn to_ddl(&self) -> String {
        let column_definitions: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("    {} {}", c.name, c.column_type))
            .collect();

        format!(
            "CREATE TABLE {} (\n{}\n)",
            self.table_name,
            column_definitions.join(",\n")
        )
    }

    /// The aggregated threat table the engine ships with as its default schema
    pub fn threat_aggregates() -> Self {
        let columns = [
            ("storage_id", "UInt32"),
            ("timestamp_day", "DateTime"),
            ("type", "FixedString(1)"),
            ("policy_action", "LowCardinality(String)"),
            ("tclass", "String"),
            ("tproperty", "String"),
            ("tfamily", "String"),
            ("severity", "LowCardinality(String)"),
            ("confidence", "LowCardinality(String)"),
            ("category", "LowCardinality(String)"),
            ("threat_type", "String"),
            ("threat_technique", "String"),
            ("threat_classification", "String"),
            ("feed_name", "LowCardinality(String)"),
            ("response_region", "String"),
            ("response_country", "String"),
            ("device_region", "String"),
            ("device_country", "String"),
            ("threat_indicator", "String"),
            ("asset_cq_id", "String"),
            ("qip", "String"),
            ("device_type", "String"),
            ("actor_id", "String"),
            ("actor_name", "String"),
            ("policy_name", "String"),
            ("network", "String"),
            ("bandwidth", "Float32"),
            ("bandwidth_total", "SimpleAggregateFunction(sum, Float64)"),
            ("count", "SimpleAggregateFunction(sum, UInt64)"),
            ("min_timestamp", "SimpleAggregateFunction(min, DateTime)"),
            ("max_timestamp", "SimpleAggregateFunction(max, DateTime)"),
        ];

        Self::new(
            "td_agg_threat",
            columns
                .iter()
                .map(|(name, ty)| SchemaColumn::new(*name, *ty))
                .collect(),
        )
    }
}

/// A schema as supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    Structured(TableSchema),
    /// JSON payload or DDL text, decided at conversion time
    Text(String),
}

impl SchemaSource {
    /// Read a schema file; the content is interpreted lazily by `to_ddl`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        debug!("Loaded schema file {} ({} bytes)", path.display(), content.len());
        Ok(SchemaSource::Text(content))
    }

    /// Canonical DDL text for this schema.
    ///
    /// Text that is not JSON is returned unchanged. A JSON object is read as a
    /// structured schema, missing keys fall back to the sentinel values.
    pub fn to_ddl(&self) -> String {
        match self {
            SchemaSource::Structured(schema) => schema.to_ddl(),
            SchemaSource::Text(text) => text_to_ddl(text),
        }
    }

    /// Table name recoverable from this schema, if any
    pub fn table_name(&self) -> Option<String> {
        match self {
            SchemaSource::Structured(schema) => Some(schema.table_name.clone()),
            SchemaSource::Text(_) => table_name_from_ddl(&self.to_ddl()),
        }
    }
}

impl From<TableSchema> for SchemaSource {
    fn from(schema: TableSchema) -> Self {
        SchemaSource::Structured(schema)
    }
}

impl From<String> for SchemaSource {
    fn from(text: String) -> Self {
        SchemaSource::Text(text)
    }
}

impl From<&str> for SchemaSource {
    fn from(text: &str) -> Self {
        SchemaSource::Text(text.to_string())
    }
}

fn text_to_ddl(text: &str) -> String {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return text.to_string(),
    };

    if !value.is_object() {
        return text.to_string();
    }

    match serde_json::from_value::<TableSchema>(value) {
        Ok(schema) => schema.to_ddl(),
        Err(e) => {
            warn!("Error converting schema JSON to DDL: {}", e);
            text.to_string()
        }
    }
}

/// Extract the table name from `CREATE TABLE <name>` text
pub fn table_name_from_ddl(ddl: &str) -> Option<String> {
    CREATE_TABLE_RE
        .captures(ddl)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Table metadata file: `{"tables": [{"tablename": ..., "schema": [...]}]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn table(&self, name: &str) -> Result<&TableSchema> {
        self.tables
            .iter()
            .find(|t| t.table_name == name)
            .ok_or_else(|| {
                TranslateError::Schema(format!("Table '{}' not found in the schema catalog", name))
            })
    }
}
