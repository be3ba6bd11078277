use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{types::Json, FromRow};
use std::fmt;
use std::str::FromStr;

/// Maximum stored length of `url`, matching the column width.
pub const MAX_URL_LENGTH: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Request,
    Event,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Request => "request",
            EntryKind::Event => "event",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Ok(EntryKind::Request),
            "event" => Ok(EntryKind::Event),
            other => Err(format!("unknown entry kind `{other}`")),
        }
    }
}

/// A persisted capture. Rows are append-only; nothing updates them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub kind: EntryKind,
    pub method: Option<String>,
    pub url: Option<String>,
    pub endpoint: Option<String>,
    pub status_code: Option<i32>,
    pub response_time_ms: Option<f64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<i64>,
    pub token_id: Option<String>,
    pub request_headers: Option<Json<Value>>,
    pub response_headers: Option<Json<Value>>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub event_name: Option<String>,
    pub event_data: Option<Json<Value>>,
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    /// Materializes a pending entry with its assigned id. `created_at`
    /// falls back to `now` only when the caller did not supply one.
    pub fn from_new(id: i64, entry: NewLogEntry, now: DateTime<Utc>) -> Self {
        Self {
            id,
            kind: entry.kind,
            method: entry.method,
            url: entry.url,
            endpoint: entry.endpoint,
            status_code: entry.status_code,
            response_time_ms: entry.response_time_ms,
            ip_address: entry.ip_address,
            user_agent: entry.user_agent,
            user_id: entry.user_id,
            token_id: entry.token_id,
            request_headers: entry.request_headers.map(Json),
            response_headers: entry.response_headers.map(Json),
            request_body: entry.request_body,
            response_body: entry.response_body,
            event_name: entry.event_name,
            event_data: entry.event_data.map(Json),
            metadata: entry.metadata.map(Json),
            created_at: entry.created_at.unwrap_or(now),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == EntryKind::Request && self.status_code.is_some_and(|code| code >= 400)
    }
}

/// Everything needed to insert one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewLogEntry {
    pub kind: EntryKind,
    pub method: Option<String>,
    pub url: Option<String>,
    pub endpoint: Option<String>,
    pub status_code: Option<i32>,
    pub response_time_ms: Option<f64>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Option<i64>,
    pub token_id: Option<String>,
    pub request_headers: Option<Value>,
    pub response_headers: Option<Value>,
    pub request_body: Option<String>,
    pub response_body: Option<String>,
    pub event_name: Option<String>,
    pub event_data: Option<Value>,
    pub metadata: Option<Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl NewLogEntry {
    pub fn request() -> Self {
        Self {
            kind: EntryKind::Request,
            ..Self::default()
        }
    }

    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Self {
            kind: EntryKind::Event,
            event_name: Some(name.into()),
            event_data: Some(data),
            ..Self::default()
        }
    }
}

/// Cuts a URL to the stored column width.
pub fn bounded_url(url: &str) -> String {
    match url.char_indices().nth(MAX_URL_LENGTH) {
        Some((cut, _)) => url[..cut].to_string(),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_kind_parses_case_insensitively() {
        assert_eq!("Request".parse::<EntryKind>(), Ok(EntryKind::Request));
        assert_eq!(" event ".parse::<EntryKind>(), Ok(EntryKind::Event));
        assert!("other".parse::<EntryKind>().is_err());
    }

    #[test]
    fn from_new_keeps_supplied_created_at() {
        let supplied = Utc::now() - chrono::Duration::days(100);
        let entry = NewLogEntry {
            created_at: Some(supplied),
            ..NewLogEntry::request()
        };

        let stored = LogEntry::from_new(7, entry, Utc::now());

        assert_eq!(stored.id, 7);
        assert_eq!(stored.created_at, supplied);
    }

    #[test]
    fn event_constructor_fills_event_fields_only() {
        let entry = NewLogEntry::event("test.event", json!({ "key": "value" }));

        assert_eq!(entry.kind, EntryKind::Event);
        assert_eq!(entry.event_name.as_deref(), Some("test.event"));
        assert_eq!(entry.event_data, Some(json!({ "key": "value" })));
        assert!(entry.method.is_none());
        assert!(entry.status_code.is_none());
    }

    #[test]
    fn bounded_url_caps_length() {
        let long = format!("https://example.com/{}", "a".repeat(2000));
        assert_eq!(bounded_url(&long).chars().count(), MAX_URL_LENGTH);
        assert_eq!(bounded_url("https://example.com"), "https://example.com");
    }
}
