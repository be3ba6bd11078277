use serde::{Deserialize, Serialize};

/// Number of endpoints reported by [`EntryStats::top_endpoints`].
pub const TOP_ENDPOINTS_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCount {
    pub endpoint: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryStats {
    pub total_requests: i64,
    pub total_events: i64,
    pub error_rate_pct: f64,
    pub avg_response_time_ms: f64,
    pub top_endpoints: Vec<EndpointCount>,
}

impl EntryStats {
    pub fn new(
        total_requests: i64,
        total_events: i64,
        error_requests: i64,
        avg_response_time_ms: Option<f64>,
        top_endpoints: Vec<EndpointCount>,
    ) -> Self {
        Self {
            total_requests,
            total_events,
            error_rate_pct: error_rate_pct(error_requests, total_requests),
            avg_response_time_ms: avg_response_time_ms.map(round2).unwrap_or(0.0),
            top_endpoints,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusGroupCount {
    pub status_group: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterOptions {
    pub methods: Vec<String>,
    pub status_codes: Vec<i32>,
}

/// Share of request entries with a status of 400 or above, in percent,
/// rounded to two decimals. Zero when there are no request entries.
pub fn error_rate_pct(error_requests: i64, total_requests: i64) -> f64 {
    if total_requests <= 0 {
        return 0.0;
    }
    let errors = error_requests.clamp(0, total_requests);
    round2(errors as f64 / total_requests as f64 * 100.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bucket label used by the status distribution.
pub fn status_group(status_code: Option<i32>) -> &'static str {
    match status_code {
        Some(code) if (200..300).contains(&code) => "2xx",
        Some(code) if (300..400).contains(&code) => "3xx",
        Some(code) if (400..500).contains(&code) => "4xx",
        Some(code) if code >= 500 => "5xx",
        _ => "Other",
    }
}
