use std::collections::HashSet;

use axum::http::HeaderMap;
use serde_json::{Map, Value};

/// Sentinel written in place of every masked value.
pub const MASKED: &str = "***MASKED***";

/// Suffix appended to a credential prefix when deriving a token fingerprint.
pub const TOKEN_MASK_SUFFIX: &str = "***";

const TOKEN_FINGERPRINT_CHARS: usize = 8;

/// Headers whose values are always masked, independent of `mask_fields`.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "proxy-authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "api-key",
    "x-auth-token",
];

/// Case-insensitive deny-list of field names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskFields(HashSet<String>);

impl MaskFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            fields
                .into_iter()
                .map(|field| field.as_ref().trim().to_ascii_lowercase())
                .filter(|field| !field.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(&key.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Returns a copy of `data` where every key on the deny-list carries
/// [`MASKED`] instead of its value. Keys are never dropped.
pub fn redact(data: &Map<String, Value>, fields: &MaskFields) -> Map<String, Value> {
    data.iter()
        .map(|(key, value)| {
            let out = if fields.contains(key) {
                Value::String(MASKED.to_string())
            } else {
                redact_value(value, fields)
            };
            (key.clone(), out)
        })
        .collect()
}

/// Applies [`redact`] to any mapping reachable from `value`, including
/// mappings nested inside arrays. Scalars come back untouched.
pub fn redact_value(value: &Value, fields: &MaskFields) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact(map, fields)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_value(item, fields))
                .collect(),
        ),
        _ => value.clone(),
    }
}

pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|candidate| candidate.eq_ignore_ascii_case(name))
}

/// Converts a header map into `{name: [values...]}` with sensitive headers
/// collapsed to a single [`MASKED`] entry.
pub fn mask_headers(headers: &HeaderMap) -> Value {
    let mut out = Map::new();
    for name in headers.keys() {
        let values = if is_sensitive_header(name.as_str()) {
            vec![Value::String(MASKED.to_string())]
        } else {
            headers
                .get_all(name)
                .iter()
                .map(|value| Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()))
                .collect()
        };
        out.insert(name.as_str().to_string(), Value::Array(values));
    }
    Value::Object(out)
}

/// Irreversible fingerprint of a credential: at most the first eight
/// characters followed by [`TOKEN_MASK_SUFFIX`].
pub fn token_fingerprint(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_FINGERPRINT_CHARS).collect();
    format!("{prefix}{TOKEN_MASK_SUFFIX}")
}

/// Extracts the credential from a `Bearer` authorization header value.
pub fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
}

/// Renders a secret for startup logs without revealing it.
pub fn mask_secret(secret: &str) -> String {
    if secret.is_empty() {
        return "<empty>".into();
    }
    let prefix = secret.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, secret.len())
}
