//! SQL clause assembly
//!
//! Deterministic SQL generation from intents and entities. Every choice point
//! is an ordered table of (intent, handler) pairs evaluated first-match-wins,
//! so the priority order is visible in one place and testable per entry.
//! Output is always a complete statement, even for empty entities.

use crate::entities::{Entities, TimeEntity};
use crate::intent::{Intent, IntentSet};
use itertools::Itertools;
use tracing::debug;

/// Date column the time window applies to
pub const TIME_COLUMN: &str = "timestamp_day";
/// Columns grouped or projected when the query names none
pub const DEFAULT_PAIR: [&str; 2] = ["feed_name", "severity"];
/// Metric ranked by top/bottom queries
pub const DEFAULT_METRIC: &str = "count";

type StatementHandler = fn(&Entities, &str) -> String;
type ProjectionHandler = fn(&Entities) -> String;
type OrderHandler = fn(&Entities) -> String;

/// Statement kinds other than SELECT, in priority order
const STATEMENTS: [(Intent, StatementHandler); 3] = [
    (Intent::Delete, delete_statement),
    (Intent::Insert, insert_statement),
    (Intent::Update, update_statement),
];

/// SELECT projections in priority order; falls through to the column list
const PROJECTIONS: [(Intent, ProjectionHandler); 4] = [
    (Intent::SelectCount, count_projection),
    (Intent::SelectDistinct, distinct_projection),
    (Intent::SelectAvg, avg_projection),
    (Intent::SelectSum, sum_projection),
];

/// ORDER BY variants in priority order; at most one applies
const ORDERINGS: [(Intent, OrderHandler); 3] = [
    (Intent::SelectTop, top_order),
    (Intent::SelectBottom, bottom_order),
    (Intent::SelectRecent, recent_order),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct SqlClauseAssembler;

impl SqlClauseAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, intents: &IntentSet, entities: &Entities, table: &str) -> String {
        if let Some((intent, handler)) = STATEMENTS.iter().find(|(i, _)| intents.contains(*i)) {
            debug!("Assembling {} statement for {}", intent, table);
            return handler(entities, table);
        }

        select_statement(intents, entities, table)
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn condition_predicates(entities: &Entities) -> Vec<String> {
    entities
        .conditions
        .iter()
        .map(|(col, val)| format!("{} = {}", col, quote_literal(val)))
        .collect()
}

fn time_bound(time: &TimeEntity) -> String {
    format!(
        "DATE_SUB(CURRENT_DATE(), INTERVAL {} {})",
        time.value,
        time.period.as_sql()
    )
}

fn delete_statement(entities: &Entities, table: &str) -> String {
    let mut predicates = condition_predicates(entities);
    if let Some(time) = &entities.time {
        // rows older than the window
        predicates.push(format!("{} < {}", TIME_COLUMN, time_bound(time)));
    }

    if predicates.is_empty() {
        format!("DELETE FROM {}", table)
    } else {
        format!("DELETE FROM {} WHERE {}", table, predicates.join(" AND "))
    }
}

fn insert_statement(_entities: &Entities, table: &str) -> String {
    format!(
        "INSERT INTO {} (feed_name, severity, threat_type, timestamp_day)\nVALUES ('example_feed', 'high', 'malware', CURRENT_DATE())",
        table
    )
}

fn update_statement(entities: &Entities, table: &str) -> String {
    let assignments = if entities.conditions.is_empty() {
        "column_name = 'new_value'".to_string()
    } else {
        condition_predicates(entities).join(", ")
    };

    let filter = match &entities.time {
        Some(time) => format!("{} >= {}", TIME_COLUMN, time_bound(time)),
        None => "1=1".to_string(),
    };

    format!("UPDATE {}\nSET {}\nWHERE {}", table, assignments, filter)
}

fn count_projection(entities: &Entities) -> String {
    let mut projection = "COUNT(*) AS threat_count".to_string();
    for col in &entities.columns {
        projection.push_str(",\n    ");
        projection.push_str(col);
    }
    projection
}

fn distinct_projection(entities: &Entities) -> String {
    if entities.columns.is_empty() {
        format!("DISTINCT {}", DEFAULT_PAIR.join(", "))
    } else {
        format!("DISTINCT {}", entities.columns.join(", "))
    }
}

fn avg_projection(entities: &Entities) -> String {
    if !entities.has_column("count") && entities.has_column("bandwidth") {
        "AVG(bandwidth) AS average_bandwidth".to_string()
    } else {
        "AVG(count) AS average_count".to_string()
    }
}

fn sum_projection(entities: &Entities) -> String {
    if !entities.has_column("count") && entities.has_column("bandwidth") {
        "SUM(bandwidth_total) AS total_bandwidth".to_string()
    } else {
        "SUM(count) AS total_count".to_string()
    }
}

fn projection(intents: &IntentSet, entities: &Entities) -> String {
    if let Some((_, handler)) = PROJECTIONS.iter().find(|(i, _)| intents.contains(*i)) {
        return handler(entities);
    }

    if entities.columns.is_empty() {
        "*".to_string()
    } else {
        entities.columns.join(", ")
    }
}

fn where_clause(intents: &IntentSet, entities: &Entities) -> Option<String> {
    let mut predicates = condition_predicates(entities);

    let wants_window =
        intents.contains(Intent::SelectTimeRange) || intents.contains(Intent::SelectRecent);
    if let (true, Some(time)) = (wants_window, &entities.time) {
        predicates.push(format!("{} >= {}", TIME_COLUMN, time_bound(time)));
    }

    if predicates.is_empty() {
        None
    } else {
        Some(format!("WHERE {}", predicates.join(" AND ")))
    }
}

fn group_by_clause(intents: &IntentSet, entities: &Entities) -> Option<String> {
    if !intents.contains(Intent::SelectGroup) {
        return None;
    }

    let columns = if entities.columns.is_empty() {
        DEFAULT_PAIR.iter().join(", ")
    } else {
        entities.columns.iter().join(", ")
    };
    Some(format!("GROUP BY {}", columns))
}

fn top_order(_entities: &Entities) -> String {
    format!("{} DESC", DEFAULT_METRIC)
}

fn bottom_order(_entities: &Entities) -> String {
    format!("{} ASC", DEFAULT_METRIC)
}

fn recent_order(_entities: &Entities) -> String {
    format!("{} DESC", TIME_COLUMN)
}

fn order_by_clause(intents: &IntentSet, entities: &Entities) -> Option<String> {
    ORDERINGS
        .iter()
        .find(|(i, _)| intents.contains(*i))
        .map(|(_, handler)| format!("ORDER BY {}", handler(entities)))
}

fn select_statement(intents: &IntentSet, entities: &Entities, table: &str) -> String {
    let clauses = [
        Some(format!("SELECT {}", projection(intents, entities))),
        Some(format!("FROM {}", table)),
        where_clause(intents, entities),
        group_by_clause(intents, entities),
        order_by_clause(intents, entities),
        Some(format!("LIMIT {}", entities.limit)),
    ];

    clauses.into_iter().flatten().join("\n")
}
