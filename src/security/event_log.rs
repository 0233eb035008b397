use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::VecDeque;

use super::sanitize::sanitize_text;

pub const DEFAULT_CAPACITY: usize = 100;
const REDACTED: &str = "[REDACTED]";
const SENSITIVE_KEYS: &[&str] = &["password", "token", "secret"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub severity: Severity,
    pub details: Value,
}

/// Append-only ring buffer of client-observable security events.
///
/// The oldest entry is evicted once the capacity is reached. Details are redacted
/// and sanitized before they are stored.
#[derive(Debug, Clone)]
pub struct SecurityEventLog {
    entries: VecDeque<SecurityEvent>,
    capacity: usize,
}

impl SecurityEventLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, event: &str, severity: Severity, details: Value) {
        self.record_at(event, severity, details, Utc::now());
    }

    pub fn record_at(
        &mut self,
        event: &str,
        severity: Severity,
        details: Value,
        timestamp: DateTime<Utc>,
    ) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(SecurityEvent {
            timestamp,
            event: sanitize_text(event),
            severity,
            details: scrub(details),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &SecurityEvent> {
        self.entries.iter()
    }

    /// Newest first.
    pub fn recent(&self, n: usize) -> Vec<&SecurityEvent> {
        self.entries.iter().rev().take(n).collect()
    }

    pub fn at_least(&self, severity: Severity) -> Vec<&SecurityEvent> {
        self.entries
            .iter()
            .filter(|e| e.severity >= severity)
            .collect()
    }

    /// Snapshot for persisting to whatever medium the client uses.
    pub fn export(&self) -> Vec<SecurityEvent> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for SecurityEventLog {
    fn default() -> Self {
        Self::new()
    }
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_lowercase();
    SENSITIVE_KEYS.iter().any(|s| key.contains(s))
}

fn scrub(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = if is_sensitive(&k) {
                        Value::String(REDACTED.into())
                    } else {
                        scrub(v)
                    };
                    (k, v)
                })
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(scrub).collect()),
        Value::String(s) => Value::String(sanitize_text(&s)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ring_buffer_caps_at_capacity() {
        let mut log = SecurityEventLog::new();
        for i in 0..150 {
            log.record("login_failed", Severity::Medium, json!({ "attempt": i }));
        }

        assert_eq!(log.len(), DEFAULT_CAPACITY);
        assert_eq!(log.entries().next().unwrap().details["attempt"], 50);
        assert_eq!(log.recent(1)[0].details["attempt"], 149);
    }

    #[test]
    fn test_sensitive_keys_are_redacted_at_any_depth() {
        let mut log = SecurityEventLog::new();
        log.record(
            "login_failed",
            Severity::High,
            json!({
                "email": "user@example.com",
                "Password": "hunter2",
                "request": { "accessToken": "abc", "headers": [{ "clientSecret": "s" }] }
            }),
        );

        let details = &log.entries().next().unwrap().details;
        assert_eq!(details["email"], "user@example.com");
        assert_eq!(details["Password"], REDACTED);
        assert_eq!(details["request"]["accessToken"], REDACTED);
        assert_eq!(details["request"]["headers"][0]["clientSecret"], REDACTED);
    }

    #[test]
    fn test_string_details_are_sanitized() {
        let mut log = SecurityEventLog::with_capacity(5);
        log.record(
            "<b>permission_denied</b>",
            Severity::Low,
            json!({ "path": "<script>x()</script>/api/users" }),
        );

        let event = log.entries().next().unwrap();
        assert_eq!(event.event, "permission_denied");
        assert_eq!(event.details["path"], "&#x2F;api&#x2F;users");
    }

    #[test]
    fn test_filter_by_severity() {
        let mut log = SecurityEventLog::new();
        log.record("a", Severity::Low, Value::Null);
        log.record("b", Severity::High, Value::Null);
        log.record("c", Severity::Critical, Value::Null);

        let serious: Vec<_> = log.at_least(Severity::High).iter().map(|e| e.event.clone()).collect();
        assert_eq!(serious, vec!["b", "c"]);
    }
}
