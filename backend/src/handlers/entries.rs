use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AppError,
    models::{EntryKind, FilterOptions, LogEntry, Page, Pagination, DEFAULT_PER_PAGE},
    repositories::log_entry::LogEntryFilters,
    state::AppState,
    utils::time::{parse_datetime_value, RangeBound},
};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct EntryListQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub method: Option<String>,
    pub status_code: Option<i32>,
    pub user_id: Option<i64>,
    pub endpoint: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogEntryResponse {
    pub id: i64,
    #[serde(rename = "type")]
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
    pub created_at: DateTime<Utc>,
}

impl From<LogEntry> for LogEntryResponse {
    fn from(entry: LogEntry) -> Self {
        Self {
            id: entry.id,
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
            request_headers: entry.request_headers.map(|value| value.0),
            response_headers: entry.response_headers.map(|value| value.0),
            request_body: entry.request_body,
            response_body: entry.response_body,
            event_name: entry.event_name,
            event_data: entry.event_data.map(|value| value.0),
            metadata: entry.metadata.map(|value| value.0),
            created_at: entry.created_at,
        }
    }
}

pub async fn list_entries(
    State(state): State<AppState>,
    Query(q): Query<EntryListQuery>,
) -> Result<Json<Page<LogEntryResponse>>, AppError> {
    let (pagination, filters) = validate_list_query(q)?;
    let page = state.store.query(&filters, pagination).await?;
    Ok(Json(page.map(LogEntryResponse::from)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<LogEntryResponse>, AppError> {
    let entry = state
        .store
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Entry {id} not found")))?;
    Ok(Json(LogEntryResponse::from(entry)))
}

pub async fn filter_options(
    State(state): State<AppState>,
) -> Result<Json<FilterOptions>, AppError> {
    Ok(Json(state.store.filter_options().await?))
}

pub(crate) fn validate_list_query(
    q: EntryListQuery,
) -> Result<(Pagination, LogEntryFilters), AppError> {
    let pagination = Pagination::new(
        q.page.unwrap_or(1),
        q.per_page.unwrap_or(DEFAULT_PER_PAGE),
    );

    let kind = normalize_filter(q.kind)
        .map(|value| value.parse::<EntryKind>())
        .transpose()
        .map_err(|_| AppError::BadRequest("`type` must be request or event".into()))?;

    let from = parse_bound(q.from.as_deref(), RangeBound::Start)
        .map_err(|e| AppError::BadRequest(e.into()))?;
    let to = parse_bound(q.to.as_deref(), RangeBound::End)
        .map_err(|e| AppError::BadRequest(e.into()))?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(AppError::BadRequest(
                "`from` must be before or equal to `to`".into(),
            ));
        }
    }

    Ok((
        pagination,
        LogEntryFilters {
            kind,
            method: normalize_filter(q.method).map(|value| value.to_ascii_uppercase()),
            status_code: q.status_code,
            user_id: q.user_id,
            endpoint: normalize_filter(q.endpoint),
            from,
            to,
        },
    ))
}

fn normalize_filter(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bound(
    raw: Option<&str>,
    bound: RangeBound,
) -> Result<Option<DateTime<Utc>>, &'static str> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    parse_datetime_value(value, bound)
        .map(Some)
        .ok_or(match bound {
            RangeBound::Start => "`from` must be a valid datetime (RFC3339 or YYYY-MM-DD)",
            RangeBound::End => "`to` must be a valid datetime (RFC3339 or YYYY-MM-DD)",
        })
}
