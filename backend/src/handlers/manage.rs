use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    error::AppError,
    handlers::entries::LogEntryResponse,
    models::{EntryStats, Pagination, StatusGroupCount},
    repositories::log_entry::{DateRange, LogEntryFilters},
    state::AppState,
    utils::time::{parse_datetime_value, RangeBound},
};

const RECENT_WINDOW_HOURS: i64 = 24;
const RECENT_LIMIT: i64 = 10;
/// Rough on-disk footprint of one row, used for the size estimate.
const ESTIMATED_ENTRY_BYTES: i64 = 2 * 1024;

#[derive(Debug, Serialize, Deserialize)]
pub struct OverviewResponse {
    pub stats: EntryStats,
    pub recent_entries: Vec<LogEntryResponse>,
    pub status_distribution: Vec<StatusGroupCount>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ManageResponse {
    pub stats: EntryStats,
    pub total_entries: i64,
    pub old_entries: i64,
    pub retention_days: u32,
    pub estimated_size_bytes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
    pub deleted: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CleanupDaysParams {
    #[validate(range(min = 1, max = 36500))]
    pub days: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CleanupRangePayload {
    #[validate(length(min = 1))]
    pub from: String,
    #[validate(length(min = 1))]
    pub to: String,
}

pub async fn overview(State(state): State<AppState>) -> Result<Json<OverviewResponse>, AppError> {
    let stats = state.store.stats().await?;
    let recent = state
        .store
        .query(
            &LogEntryFilters {
                from: Some(Utc::now() - Duration::hours(RECENT_WINDOW_HOURS)),
                ..LogEntryFilters::default()
            },
            Pagination::new(1, RECENT_LIMIT),
        )
        .await?;
    let status_distribution = state.store.status_groups().await?;

    Ok(Json(OverviewResponse {
        stats,
        recent_entries: recent
            .items
            .into_iter()
            .map(LogEntryResponse::from)
            .collect(),
        status_distribution,
    }))
}

pub async fn manage(State(state): State<AppState>) -> Result<Json<ManageResponse>, AppError> {
    let retention_days = state.retention_days();
    let stats = state.store.stats().await?;
    let total_entries = state.store.count().await?;
    let old_entries = state.store.count_older_than(retention_days).await?;

    Ok(Json(ManageResponse {
        stats,
        total_entries,
        old_entries,
        retention_days,
        estimated_size_bytes: total_entries.saturating_mul(ESTIMATED_ENTRY_BYTES),
    }))
}

pub async fn cleanup_older_than(
    State(state): State<AppState>,
    Path(params): Path<CleanupDaysParams>,
) -> Result<Json<CleanupResponse>, AppError> {
    params.validate()?;
    let days = u32::try_from(params.days)
        .map_err(|_| AppError::BadRequest("`days` is out of range".into()))?;

    let deleted = state.store.delete_older_than(days).await?;
    tracing::info!(days, deleted, "Logbook cleanup by age");

    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Deleted {deleted} entries older than {days} days."),
        deleted,
    }))
}

pub async fn cleanup_range(
    State(state): State<AppState>,
    Json(payload): Json<CleanupRangePayload>,
) -> Result<Json<CleanupResponse>, AppError> {
    let range = validate_range(&payload)?;

    let deleted = state.store.delete_range(range).await?;
    tracing::info!(
        from = %range.from(),
        to = %range.to(),
        deleted,
        "Logbook cleanup by date range"
    );

    Ok(Json(CleanupResponse {
        success: true,
        message: format!(
            "Deleted {deleted} entries between {} and {}.",
            payload.from.trim(),
            payload.to.trim()
        ),
        deleted,
    }))
}

pub async fn cleanup_all(State(state): State<AppState>) -> Result<Json<CleanupResponse>, AppError> {
    let deleted = state.store.delete_all().await?;
    tracing::warn!(deleted, "Logbook wiped");

    Ok(Json(CleanupResponse {
        success: true,
        message: format!("Deleted all {deleted} entries."),
        deleted,
    }))
}

/// Rejects the payload before anything is deleted.
pub(crate) fn validate_range(payload: &CleanupRangePayload) -> Result<DateRange, AppError> {
    payload.validate()?;

    let from = parse_datetime_value(&payload.from, RangeBound::Start);
    let to = parse_datetime_value(&payload.to, RangeBound::End);

    let mut errors = ValidationErrors::new();
    if from.is_none() {
        errors.add("from", ValidationError::new("invalid_date"));
    }
    if to.is_none() {
        errors.add("to", ValidationError::new("invalid_date"));
    }
    let (Some(from), Some(to)) = (from, to) else {
        return Err(errors.into());
    };

    DateRange::new(from, to).map_err(|_| {
        let mut errors = ValidationErrors::new();
        errors.add("to", ValidationError::new("after_or_equal_from"));
        errors.into()
    })
}
