//! Entity extraction
//!
//! Pulls structured facts out of query text: a time window, the vocabulary
//! columns mentioned, equality conditions and a row limit. Extraction never
//! fails; missing signals leave fields empty or at their defaults.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Row limit used when the query does not name one
pub const DEFAULT_LIMIT: u64 = 10;

/// Columns recognised in query text, in scan order
pub const COLUMN_VOCABULARY: [&str; 9] = [
    "feed_name",
    "severity",
    "threat_type",
    "country",
    "region",
    "timestamp",
    "confidence",
    "category",
    "count",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimePeriod {
    Day,
    Week,
    Month,
    Year,
}

impl TimePeriod {
    /// SQL interval unit
    pub fn as_sql(&self) -> &'static str {
        match self {
            TimePeriod::Day => "DAY",
            TimePeriod::Week => "WEEK",
            TimePeriod::Month => "MONTH",
            TimePeriod::Year => "YEAR",
        }
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimePeriod::Day => "day",
            TimePeriod::Week => "week",
            TimePeriod::Month => "month",
            TimePeriod::Year => "year",
        };
        f.write_str(s)
    }
}

/// Relative time window, e.g. "last 3 days"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeEntity {
    pub period: TimePeriod,
    /// Always positive
    pub value: u32,
}

impl TimeEntity {
    pub fn new(period: TimePeriod, value: u32) -> Self {
        Self { period, value }
    }
}

/// Column -> literal conditions with unique keys, kept in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionMap(Vec<(String, String)>);

impl ConditionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace; a replaced key keeps its original position
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConditionMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = ConditionMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/// Everything extracted from one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    pub time: Option<TimeEntity>,
    pub columns: Vec<String>,
    pub conditions: ConditionMap,
    pub limit: u64,
}

impl Default for Entities {
    fn default() -> Self {
        Self {
            time: None,
            columns: Vec::new(),
            conditions: ConditionMap::new(),
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Entities {
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

lazy_static! {
    /// Literal time phrases in priority order; the first hit wins
    static ref TIME_PHRASES: Vec<(Regex, TimeEntity)> = [
        (r"\b(?:last|past|previous)\s+week\b", TimeEntity::new(TimePeriod::Week, 1)),
        (r"\b(?:last|past)\s+month\b", TimeEntity::new(TimePeriod::Month, 1)),
        (r"\b(?:last|past)\s+year\b", TimeEntity::new(TimePeriod::Year, 1)),
        (r"\byesterday\b", TimeEntity::new(TimePeriod::Day, 1)),
    ]
    .into_iter()
    .map(|(pattern, entity)| (Regex::new(pattern).unwrap(), entity))
    .collect();

    static ref DAYS_RE: Regex = Regex::new(r"(\d+)\s*days?\b").unwrap();

    static ref COLUMN_PATTERNS: Vec<(&'static str, Regex)> = COLUMN_VOCABULARY
        .iter()
        .map(|col| (*col, Regex::new(&format!(r"\b{}\b", regex::escape(col))).unwrap()))
        .collect();

    static ref SEVERITY_RE: Regex = Regex::new(r"(?i)\b(high|medium|low)\s+severity\b").unwrap();
    static ref FEED_NAME_RE: Regex =
        Regex::new(r#"(?i)\bfeed[\s_]+name\s+(?:is|=|equals)\s+['"]?([a-zA-Z0-9_\-]+)['"]?"#).unwrap();
    static ref COUNTRY_RE: Regex =
        Regex::new(r#"(?i)\bcountry\s+(?:is|=|equals)\s+['"]?([a-zA-Z]+)['"]?"#).unwrap();

    static ref LIMIT_RE: Regex = Regex::new(r"\blimit\s+(\d+)").unwrap();
}

/// Stateless extractor over the shared pattern tables
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> Entities {
        let trimmed = text.trim();
        let lowered = trimmed.to_lowercase();

        Entities {
            time: extract_time(&lowered),
            columns: extract_columns(&lowered),
            conditions: extract_conditions(trimmed),
            limit: extract_limit(&lowered),
        }
    }
}

fn extract_time(lowered: &str) -> Option<TimeEntity> {
    if let Some((_, entity)) = TIME_PHRASES.iter().find(|(re, _)| re.is_match(lowered)) {
        return Some(*entity);
    }

    DAYS_RE
        .captures(lowered)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|days| *days > 0)
        .map(|days| TimeEntity::new(TimePeriod::Day, days))
}

/// Verb that doubles as a vocabulary column
const COMMAND_VERB: &str = "count";

/// Vocabulary order, whole words only. `count` opening the query is the
/// command verb ("count threats ..."), not a column reference.
fn extract_columns(lowered: &str) -> Vec<String> {
    COLUMN_PATTERNS
        .iter()
        .filter(|(col, re)| {
            re.find_iter(lowered)
                .any(|m| *col != COMMAND_VERB || m.start() > 0)
        })
        .map(|(col, _)| col.to_string())
        .collect()
}

fn extract_conditions(text: &str) -> ConditionMap {
    let mut conditions = ConditionMap::new();

    if let Some(caps) = SEVERITY_RE.captures(text) {
        conditions.insert("severity", caps[1].to_lowercase());
    }
    if let Some(caps) = FEED_NAME_RE.captures(text) {
        conditions.insert("feed_name", &caps[1]);
    }
    if let Some(caps) = COUNTRY_RE.captures(text) {
        conditions.insert("country", &caps[1]);
    }

    conditions
}

fn extract_limit(lowered: &str) -> u64 {
    LIMIT_RE
        .captures(lowered)
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or(DEFAULT_LIMIT)
}
