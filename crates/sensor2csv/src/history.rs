//! Bounded in-memory record of recent ingestion events.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use sensor2csv_core::Endpoint;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Enqueued,
    RejectedValidation,
    RejectedQueueFull,
    Persisted,
    WriteFailed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Enqueued => "enqueued",
            Outcome::RejectedValidation => "rejected_validation",
            Outcome::RejectedQueueFull => "rejected_queue_full",
            Outcome::Persisted => "persisted",
            Outcome::WriteFailed => "write_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub endpoint: Endpoint,
    /// RFC 3339, UTC.
    pub received_at: String,
    pub payload: Value,
    pub outcome: Outcome,
}

impl HistoryEntry {
    pub fn new(endpoint: Endpoint, payload: Value, outcome: Outcome) -> Self {
        Self::received(endpoint, payload, outcome, Utc::now())
    }

    /// Entry for a reading that arrived at `received_at`.
    pub fn received(
        endpoint: Endpoint,
        payload: Value,
        outcome: Outcome,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            endpoint,
            received_at: received_at.to_rfc3339(),
            payload,
            outcome,
        }
    }
}

/// FIFO ring buffer; the oldest entry is evicted once `max` is reached.
#[derive(Debug)]
pub struct History {
    entries: Mutex<VecDeque<HistoryEntry>>,
    max: usize,
}

impl History {
    pub fn new(max: usize) -> Self {
        let max = max.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max.min(1024))),
            max,
        }
    }

    pub fn push(&self, entry: HistoryEntry) {
        let mut entries = self.entries.lock();
        Self::push_locked(&mut entries, entry, self.max);
    }

    /// Run `decide` and record its outcome under the history lock, so any
    /// entry pushed later by another task lands after this one.
    pub fn push_with<F>(
        &self,
        endpoint: Endpoint,
        payload: Value,
        received_at: DateTime<Utc>,
        decide: F,
    ) -> Outcome
    where
        F: FnOnce() -> Outcome,
    {
        let mut entries = self.entries.lock();
        let outcome = decide();
        Self::push_locked(
            &mut entries,
            HistoryEntry::received(endpoint, payload, outcome, received_at),
            self.max,
        );
        outcome
    }

    fn push_locked(entries: &mut VecDeque<HistoryEntry>, entry: HistoryEntry, max: usize) {
        entries.push_back(entry);
        while entries.len() > max {
            entries.pop_front();
        }
    }

    /// Up to `limit` most recent entries, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let entries = self.entries.lock();
        let skip = entries.len().saturating_sub(limit);
        entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// Standalone HTML page with one table row per entry.
pub fn render_html(entries: &[HistoryEntry]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Ingestion history</title>\n</head>\n<body>\n\
         <h1>Ingestion history</h1>\n",
    );
    html.push_str(&format!("<p>{} entries</p>\n", entries.len()));
    html.push_str(
        "<table border=\"1\">\n<thead><tr><th>received_at</th><th>endpoint</th>\
         <th>outcome</th><th>payload</th></tr></thead>\n<tbody>\n",
    );
    for entry in entries {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><code>{}</code></td></tr>\n",
            escape_html(&entry.received_at),
            escape_html(entry.endpoint.as_str()),
            escape_html(entry.outcome.as_str()),
            escape_html(&entry.payload.to_string()),
        ));
    }
    html.push_str("</tbody>\n</table>\n</body>\n</html>\n");
    html
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(n: i64) -> HistoryEntry {
        HistoryEntry::new(Endpoint::Data, json!({ "n": n }), Outcome::Enqueued)
    }

    #[test]
    fn evicts_oldest_first() {
        let history = History::new(3);
        for n in 0..5 {
            history.push(entry(n));
        }
        assert_eq!(history.len(), 3);
        let ns: Vec<_> = history
            .recent(10)
            .iter()
            .map(|e| e.payload["n"].as_i64().unwrap())
            .collect();
        assert_eq!(ns, vec![2, 3, 4]);
    }

    #[test]
    fn recent_returns_newest_tail() {
        let history = History::new(10);
        for n in 0..4 {
            history.push(entry(n));
        }
        let tail = history.recent(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].payload["n"], 2);
        assert_eq!(tail[1].payload["n"], 3);
        assert!(history.recent(0).is_empty());
    }

    #[test]
    fn push_with_records_decided_outcome() {
        let history = History::new(10);
        let at = Utc::now();
        let outcome = history.push_with(Endpoint::Data2, json!({}), at, || {
            Outcome::RejectedQueueFull
        });
        assert_eq!(outcome, Outcome::RejectedQueueFull);
        let entry = &history.recent(1)[0];
        assert_eq!(entry.outcome, Outcome::RejectedQueueFull);
        assert_eq!(entry.endpoint, Endpoint::Data2);
        assert_eq!(entry.received_at, at.to_rfc3339());
    }

    #[test]
    fn html_is_escaped() {
        let e = HistoryEntry::new(
            Endpoint::Data,
            json!({"pressure": "<script>alert('x')</script>"}),
            Outcome::RejectedValidation,
        );
        let html = render_html(&[e]);
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("rejected_validation"));
        assert!(html.contains("<p>1 entries</p>"));
    }

    #[test]
    fn entries_serialize_with_snake_case_outcome() {
        let value = serde_json::to_value(entry(1)).unwrap();
        assert_eq!(value["outcome"], "enqueued");
        assert_eq!(value["endpoint"], "data");
        let received_at = value["received_at"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(received_at).is_ok());
    }
}
