use serde_json::Value;

use crate::utils::mask::{redact_value, MaskFields};

/// Marker appended to a body that was cut at the configured ceiling.
pub const TRUNCATION_MARKER: &str = "...[TRUNCATED]";

/// Sanitizes a captured payload for storage.
///
/// Structured (JSON object or array) payloads are redacted and re-encoded.
/// Anything else, including JSON scalars and undecodable bytes, is kept as
/// opaque text. The result is then capped at `max_chars` characters plus
/// [`TRUNCATION_MARKER`]. Empty input yields `None`.
pub fn process_body(raw: Option<&[u8]>, fields: &MaskFields, max_chars: usize) -> Option<String> {
    let raw = raw.filter(|bytes| !bytes.is_empty())?;

    let text = match serde_json::from_slice::<Value>(raw) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => {
            let redacted = redact_value(&value, fields);
            serde_json::to_string(&redacted)
                .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned())
        }
        _ => String::from_utf8_lossy(raw).into_owned(),
    };

    Some(truncate(text, max_chars))
}

/// Keeps the first `max_chars` characters and appends the marker when the
/// text is longer than that.
pub fn truncate(text: String, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_MARKER.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => text,
    }
}
