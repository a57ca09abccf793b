//! Intent classification
//!
//! Maps query text onto a set of intents by testing an ordered table of
//! (intent, pattern) pairs. Every pattern is tested independently, so a query
//! can carry several intents at once ("latest threats grouped by country").

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What a query asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SelectBasic,
    SelectCount,
    SelectDistinct,
    SelectAvg,
    SelectSum,
    SelectTop,
    SelectBottom,
    SelectRecent,
    SelectTimeRange,
    SelectGroup,
    SelectFilter,
    SelectJoin,
    Describe,
    Insert,
    Update,
    Delete,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SelectBasic => "select_basic",
            Intent::SelectCount => "select_count",
            Intent::SelectDistinct => "select_distinct",
            Intent::SelectAvg => "select_avg",
            Intent::SelectSum => "select_sum",
            Intent::SelectTop => "select_top",
            Intent::SelectBottom => "select_bottom",
            Intent::SelectRecent => "select_recent",
            Intent::SelectTimeRange => "select_time_range",
            Intent::SelectGroup => "select_group",
            Intent::SelectFilter => "select_filter",
            Intent::SelectJoin => "select_join",
            Intent::Describe => "describe",
            Intent::Insert => "insert",
            Intent::Update => "update",
            Intent::Delete => "delete",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-empty set of intents matched by one query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSet(BTreeSet<Intent>);

impl IntentSet {
    /// Build from matched intents; an empty match becomes `{select_basic}`
    pub fn from_matches(intents: impl IntoIterator<Item = Intent>) -> Self {
        let mut set: BTreeSet<Intent> = intents.into_iter().collect();
        if set.is_empty() {
            set.insert(Intent::SelectBasic);
        }
        Self(set)
    }

    pub fn contains(&self, intent: Intent) -> bool {
        self.0.contains(&intent)
    }

    pub fn iter(&self) -> impl Iterator<Item = Intent> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a set built by `from_matches`
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for IntentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.0.iter().map(|i| i.as_str()).collect();
        write!(f, "{{{}}}", tags.join(", "))
    }
}

lazy_static! {
    /// Ordered (intent, pattern) table, matched against lower-cased text
    static ref INTENT_PATTERNS: Vec<(Intent, Regex)> = [
        // write verbs match whole words only ("asset" is not "set")
        (Intent::Delete, r"\b(?:(?:delet|remov|truncat)(?:e|es|ed|ing)|drop(?:s|ped|ping)?)\b"),
        (Intent::Insert, r"\b(?:insert|add)(?:s|ed|ing)?\b|create new|put in"),
        (
            Intent::Update,
            r"\b(?:(?:updat|chang)(?:e|es|ed|ing)|modif(?:y|ies|ied|ying)|set(?:s|ting)?)\b",
        ),
        (Intent::SelectCount, r"count|how many|number of|total"),
        (Intent::SelectTop, r"top|highest|most|maximum|best"),
        (Intent::SelectBottom, r"bottom|lowest|least|minimum|worst"),
        (Intent::SelectAvg, r"average|mean|avg"),
        (Intent::SelectSum, r"sum|total of|add up"),
        (Intent::SelectRecent, r"recent|latest|newest|last|yesterday|this week|this month"),
        (Intent::SelectTimeRange, r"between|from.*to|since|last week|last month|last year|previous|ago"),
        (
            Intent::SelectGroup,
            // a bare "by" groups only when the query aggregates ("sort by" does not)
            r"group by|grouped by|categories|categorize|distribution|breakdown|\b(?:count|how many|number of|total|average|avg|sum)\b.*\bby\b|\bper\b",
        ),
        (
            Intent::SelectFilter,
            r"where|with|filter|having|specific|only|(high|medium|low)\s+severity|\bis\b|equals",
        ),
        (Intent::SelectJoin, r"join|related|relation|connected|association|link"),
        (Intent::SelectDistinct, r"distinct|unique|different"),
        (Intent::Describe, r"describe|explain|tell me about|what is|details|schema|columns"),
    ]
    .into_iter()
    .map(|(intent, pattern)| (intent, Regex::new(pattern).unwrap()))
    .collect();
}

/// Stateless classifier over the shared pattern table
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify query text. Total over all strings, including the empty one.
    pub fn classify(&self, text: &str) -> IntentSet {
        let lowered = text.trim().to_lowercase();
        IntentSet::from_matches(
            INTENT_PATTERNS
                .iter()
                .filter(|(_, pattern)| pattern.is_match(&lowered))
                .map(|(intent, _)| *intent),
        )
    }

    /// The patterns in evaluation order, for inspection
    pub fn patterns(&self) -> impl Iterator<Item = (Intent, &'static str)> {
        INTENT_PATTERNS.iter().map(|(intent, re)| (*intent, re.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &str) -> IntentSet {
        IntentClassifier::new().classify(text)
    }

    #[test]
    fn test_unmatched_text_is_select_basic() {
        for text in ["", "   ", "show threats", "xyz"] {
            let intents = classify(text);
            assert_eq!(intents.len(), 1, "{:?}", text);
            assert!(intents.contains(Intent::SelectBasic));
        }
    }

    #[test]
    fn test_multiple_intents_match() {
        let intents = classify("Latest threats grouped by country");
        assert!(intents.contains(Intent::SelectRecent));
        assert!(intents.contains(Intent::SelectGroup));
        assert!(!intents.contains(Intent::SelectBasic));
    }

    #[test]
    fn test_delete_synonyms() {
        for text in ["delete old rows", "REMOVE everything", "drop it", "truncate"] {
            assert!(classify(text).contains(Intent::Delete), "{}", text);
        }
    }

    #[test]
    fn test_top_severity_time_query() {
        let intents = classify("show me top 5 high severity threats from last week");
        assert!(intents.contains(Intent::SelectTop));
        assert!(intents.contains(Intent::SelectFilter));
        assert!(intents.contains(Intent::SelectTimeRange));
        assert!(intents.contains(Intent::SelectRecent));
    }

    #[test]
    fn test_count_by_column_is_grouped() {
        let intents = classify("count threats by feed name");
        assert!(intents.contains(Intent::SelectCount));
        assert!(intents.contains(Intent::SelectGroup));
    }

    #[test]
    fn test_sort_by_is_not_grouping() {
        let intents = classify("sort threats by region");
        assert!(!intents.contains(Intent::SelectGroup));
        assert!(classify("average count by region").contains(Intent::SelectGroup));
        assert!(classify("threats per region").contains(Intent::SelectGroup));
    }

    #[test]
    fn test_write_verbs_need_whole_words() {
        for text in ["show threats by asset", "threats by address", "list dropbox feeds", "topset"] {
            let intents = classify(text);
            assert!(!intents.contains(Intent::Update), "{}", text);
            assert!(!intents.contains(Intent::Insert), "{}", text);
            assert!(!intents.contains(Intent::Delete), "{}", text);
        }
        assert!(classify("set severity to low").contains(Intent::Update));
        assert!(classify("add a row").contains(Intent::Insert));
        assert!(classify("rows removed yesterday").contains(Intent::Delete));
        assert!(classify("dropping old feeds").contains(Intent::Delete));
        assert!(classify("removing stale rows").contains(Intent::Delete));
        assert!(classify("updating the feed").contains(Intent::Update));
        assert!(classify("modified rows").contains(Intent::Update));
    }

    #[test]
    fn test_display_uses_tags() {
        assert_eq!(classify("").to_string(), "{select_basic}");
        assert_eq!(Intent::SelectTimeRange.to_string(), "select_time_range");
        assert_eq!(
            serde_json::to_string(&Intent::SelectTimeRange).unwrap(),
            "\"select_time_range\""
        );
    }

    #[test]
    fn test_pattern_table_order() {
        let order: Vec<Intent> = IntentClassifier::new().patterns().map(|(i, _)| i).collect();
        assert_eq!(order.first(), Some(&Intent::Delete));
        assert_eq!(order.last(), Some(&Intent::Describe));
        assert_eq!(order.len(), 15);
    }
}
