//! In-memory archive of calculation results, grouped per user.
//!
//! Records are stamped with an id and creation time when archived. Nothing is
//! written to disk; the store lives as long as the server process. Each user
//! keeps at most `capacity` records, oldest dropped first.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::substring::SubstringResult;
use crate::tree::{Tree, TreeResult};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// How many entries `stats` reports under `mostUsedInputs`.
const MOST_USED_INPUTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalculationKind {
    Substring,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome {
    Substring(SubstringResult),
    Tree(TreeResult),
}

impl Outcome {
    pub fn kind(&self) -> CalculationKind {
        match self {
            Outcome::Substring(_) => CalculationKind::Substring,
            Outcome::Tree(_) => CalculationKind::Tree,
        }
    }
}

/// One archived calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: CalculationKind,
    /// The request payload as received: a string or a node array.
    pub input: Value,
    pub result: Outcome,
    /// Label given when a tree is saved explicitly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// Selection applied by [`HistoryStore::list`]. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    pub kind: Option<CalculationKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    /// 1-based page of `limit` records. Ignored without a limit.
    pub page: Option<usize>,
}

impl HistoryFilter {
    fn matches(&self, record: &HistoryRecord) -> bool {
        self.kind.is_none_or(|k| record.kind == k)
            && self.from.is_none_or(|from| record.created_at >= from)
            && self.to.is_none_or(|to| record.created_at <= to)
    }
}

/// One page of matching records, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub calculations: Vec<HistoryRecord>,
    /// Matching records across all pages.
    pub total: usize,
    pub page: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputCount {
    #[serde(rename = "type")]
    pub kind: CalculationKind,
    pub input: String,
    pub count: usize,
}

/// Aggregate figures over one user's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_calculations: usize,
    pub substring_calculations: usize,
    pub tree_calculations: usize,
    pub average_substring_length: f64,
    pub average_tree_nodes: f64,
    pub most_used_inputs: Vec<InputCount>,
}

/// Parse a `startDate`/`endDate` query value.
///
/// Accepts RFC 3339 instants or plain `YYYY-MM-DD` dates. A plain date is the
/// start of that day, or its last instant when `end_of_day` is set.
///
/// # Examples
/// ```
/// use calculator::history::parse_date_bound;
///
/// let start = parse_date_bound("2024-03-01", false).unwrap();
/// assert_eq!(start.to_rfc3339(), "2024-03-01T00:00:00+00:00");
/// assert!(parse_date_bound("yesterday", false).is_none());
/// ```
pub fn parse_date_bound(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        date.and_hms_nano_opt(23, 59, 59, 999_999_999)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(time.and_utc())
}

/// Display form of an archived input: the text itself, or the node array as
/// comma-separated slots (`1,2,null,3`).
fn input_key(input: &Value) -> String {
    match input {
        Value::String(text) => text.clone(),
        Value::Array(slots) => slots
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

/// Nodes left after reconstruction, so orphans under an absent slot don't count.
fn tree_node_count(input: &Value) -> usize {
    let Some(values) = input.as_array() else {
        return 0;
    };
    let slots: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.as_f64().map(|f| f as i64))
        .collect();
    Tree::from_slots(&slots).len()
}

/// Thread-safe per-user history.
#[derive(Debug)]
pub struct HistoryStore {
    records: Mutex<HashMap<String, Vec<HistoryRecord>>>,
    capacity: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store keeping at most `capacity` records per user.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut HashMap<String, Vec<HistoryRecord>>) -> T) -> T {
        // A panic while holding the lock cannot leave a record half written
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut records)
    }

    /// Archive a result and return the stored record.
    pub fn record(&self, user_id: &str, input: Value, result: Outcome) -> HistoryRecord {
        self.record_named(user_id, input, result, None)
    }

    /// Archive a result under an optional label.
    pub fn record_named(
        &self,
        user_id: &str,
        input: Value,
        result: Outcome,
        name: Option<String>,
    ) -> HistoryRecord {
        let record = HistoryRecord {
            id: Uuid::new_v4(),
            kind: result.kind(),
            input,
            result,
            name,
            user_id: user_id.to_string(),
            created_at: Utc::now(),
        };

        let capacity = self.capacity;
        let dropped = self.with_records(|records| {
            let entries = records.entry(user_id.to_string()).or_default();
            entries.push(record.clone());
            let excess = entries.len().saturating_sub(capacity);
            entries.drain(..excess);
            excess
        });
        if dropped > 0 {
            log::debug!("history for {} at capacity, dropped {} oldest", user_id, dropped);
        }
        record
    }

    /// Matching records, newest first, cut to the requested page.
    pub fn list(&self, user_id: &str, filter: &HistoryFilter) -> HistoryPage {
        let page = filter.page.unwrap_or(1).max(1);
        let matching: Vec<HistoryRecord> = self.with_records(|records| {
            records
                .get(user_id)
                .map(|entries| {
                    entries
                        .iter()
                        .rev()
                        .filter(|r| filter.matches(r))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default()
        });

        let total = matching.len();
        let calculations = match filter.limit {
            Some(limit) => matching
                .into_iter()
                .skip((page - 1).saturating_mul(limit))
                .take(limit)
                .collect(),
            None => matching,
        };

        HistoryPage {
            calculations,
            total,
            page,
            limit: filter.limit,
        }
    }

    /// Remove one record, only if it is of `kind` when one is given.
    /// Returns whether it existed.
    pub fn delete(&self, user_id: &str, id: Uuid, kind: Option<CalculationKind>) -> bool {
        self.with_records(|records| match records.get_mut(user_id) {
            Some(entries) => {
                let before = entries.len();
                entries.retain(|r| r.id != id || kind.is_some_and(|k| r.kind != k));
                entries.len() != before
            }
            None => false,
        })
    }

    /// Drop everything for a user. Returns how many records were removed.
    pub fn clear(&self, user_id: &str) -> usize {
        self.with_records(|records| records.remove(user_id).map_or(0, |entries| entries.len()))
    }

    /// Archived inputs with how often each occurs, most frequent first.
    /// Equal counts keep the order the inputs were first archived in.
    pub fn most_used_inputs(&self, user_id: &str, top: usize) -> Vec<InputCount> {
        let mut counts: Vec<InputCount> = Vec::new();
        self.with_records(|records| {
            for entry in records.get(user_id).into_iter().flatten() {
                let input = input_key(&entry.input);
                match counts
                    .iter_mut()
                    .find(|c| c.kind == entry.kind && c.input == input)
                {
                    Some(existing) => existing.count += 1,
                    None => counts.push(InputCount {
                        kind: entry.kind,
                        input,
                        count: 1,
                    }),
                }
            }
        });

        // stable, so first-archived wins ties
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts.truncate(top);
        counts
    }

    pub fn stats(&self, user_id: &str) -> HistoryStats {
        let mut stats = self.with_records(|records| {
            let Some(entries) = records.get(user_id) else {
                return HistoryStats::default();
            };

            let mut stats = HistoryStats {
                total_calculations: entries.len(),
                ..HistoryStats::default()
            };
            let mut text_chars = 0usize;
            let mut tree_nodes = 0usize;

            for entry in entries {
                match entry.kind {
                    CalculationKind::Substring => {
                        stats.substring_calculations += 1;
                        text_chars += entry.input.as_str().map_or(0, |s| s.chars().count());
                    }
                    CalculationKind::Tree => {
                        stats.tree_calculations += 1;
                        tree_nodes += tree_node_count(&entry.input);
                    }
                }
            }

            if stats.substring_calculations > 0 {
                stats.average_substring_length =
                    text_chars as f64 / stats.substring_calculations as f64;
            }
            if stats.tree_calculations > 0 {
                stats.average_tree_nodes = tree_nodes as f64 / stats.tree_calculations as f64;
            }
            stats
        });

        stats.most_used_inputs = self.most_used_inputs(user_id, MOST_USED_INPUTS);
        stats
    }
}
