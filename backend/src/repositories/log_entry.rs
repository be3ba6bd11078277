use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool, Postgres, QueryBuilder};

use crate::models::{
    EndpointCount, EntryKind, EntryStats, FilterOptions, LogEntry, NewLogEntry, Pagination,
    StatusGroupCount, TOP_ENDPOINTS_LIMIT,
};

const SELECT_COLUMNS: &str = "SELECT id, kind, method, url, endpoint, status_code, \
     response_time_ms, ip_address, user_agent, user_id, token_id, request_headers, \
     response_headers, request_body, response_body, event_name, event_data, metadata, \
     created_at FROM logbook_entries";

/// Conjunctive, independently optional filters over stored entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogEntryFilters {
    pub kind: Option<EntryKind>,
    pub method: Option<String>,
    pub status_code: Option<i32>,
    pub user_id: Option<i64>,
    /// Case-sensitive substring of the endpoint template.
    pub endpoint: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`.
    pub to: Option<DateTime<Utc>>,
}

impl LogEntryFilters {
    /// In-process evaluation with the same semantics as the SQL filters.
    pub fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(kind) = self.kind {
            if entry.kind != kind {
                return false;
            }
        }
        if let Some(method) = self.method.as_deref() {
            if entry.method.as_deref() != Some(method) {
                return false;
            }
        }
        if let Some(status_code) = self.status_code {
            if entry.status_code != Some(status_code) {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if entry.user_id != Some(user_id) {
                return false;
            }
        }
        if let Some(endpoint) = self.endpoint.as_deref() {
            match entry.endpoint.as_deref() {
                Some(value) if value.contains(endpoint) => {}
                _ => return false,
            }
        }
        if let Some(from) = self.from {
            if entry.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.created_at > to {
                return false;
            }
        }
        true
    }
}

/// Inclusive `created_at` window; construction rejects inverted bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("`from` must be before or equal to `to`")]
pub struct InvertedDateRange;

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, InvertedDateRange> {
        if from > to {
            return Err(InvertedDateRange);
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> DateTime<Utc> {
        self.from
    }

    pub fn to(&self) -> DateTime<Utc> {
        self.to
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }
}

pub async fn insert_log_entry(pool: &PgPool, entry: &NewLogEntry) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO logbook_entries \
         (kind, method, url, endpoint, status_code, response_time_ms, ip_address, user_agent, \
         user_id, token_id, request_headers, response_headers, request_body, response_body, \
         event_name, event_data, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         RETURNING id",
    )
    .bind(entry.kind)
    .bind(&entry.method)
    .bind(&entry.url)
    .bind(&entry.endpoint)
    .bind(entry.status_code)
    .bind(entry.response_time_ms)
    .bind(&entry.ip_address)
    .bind(&entry.user_agent)
    .bind(entry.user_id)
    .bind(&entry.token_id)
    .bind(entry.request_headers.as_ref().map(Json))
    .bind(entry.response_headers.as_ref().map(Json))
    .bind(&entry.request_body)
    .bind(&entry.response_body)
    .bind(&entry.event_name)
    .bind(entry.event_data.as_ref().map(Json))
    .bind(entry.metadata.as_ref().map(Json))
    .bind(entry.created_at.unwrap_or_else(Utc::now))
    .fetch_one(pool)
    .await
}

pub async fn fetch_log_entry(pool: &PgPool, id: i64) -> Result<Option<LogEntry>, sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COLUMNS);
    builder.push(" WHERE id = ").push_bind(id);
    builder
        .build_query_as::<LogEntry>()
        .fetch_optional(pool)
        .await
}

pub async fn list_log_entries(
    pool: &PgPool,
    filters: &LogEntryFilters,
    pagination: Pagination,
) -> Result<(Vec<LogEntry>, i64), sqlx::Error> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(SELECT_COLUMNS);
    let mut has_clause = false;
    apply_log_entry_filters(&mut builder, &mut has_clause, filters);
    builder
        .push(" ORDER BY created_at DESC, id DESC")
        .push(" LIMIT ")
        .push_bind(pagination.per_page)
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    let items = builder.build_query_as::<LogEntry>().fetch_all(pool).await?;

    let mut count_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM logbook_entries");
    let mut count_has_clause = false;
    apply_log_entry_filters(&mut count_builder, &mut count_has_clause, filters);
    let total = count_builder
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok((items, total))
}

pub async fn count_log_entries(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM logbook_entries")
        .fetch_one(pool)
        .await
}

pub async fn count_log_entries_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM logbook_entries WHERE created_at < $1")
        .bind(cutoff)
        .fetch_one(pool)
        .await
}

pub async fn delete_log_entries_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM logbook_entries WHERE created_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_log_entries_between(
    pool: &PgPool,
    range: DateRange,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM logbook_entries WHERE created_at BETWEEN $1 AND $2")
        .bind(range.from())
        .bind(range.to())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn delete_all_log_entries(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM logbook_entries")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn fetch_stats(pool: &PgPool) -> Result<EntryStats, sqlx::Error> {
    let (total_requests, total_events, error_requests, avg_response_time_ms) =
        sqlx::query_as::<_, (i64, i64, i64, Option<f64>)>(
            "SELECT \
             COUNT(*) FILTER (WHERE kind = 'request'), \
             COUNT(*) FILTER (WHERE kind = 'event'), \
             COUNT(*) FILTER (WHERE kind = 'request' AND status_code >= 400), \
             AVG(response_time_ms) FILTER (WHERE kind = 'request') \
             FROM logbook_entries",
        )
        .fetch_one(pool)
        .await?;

    let top_endpoints = sqlx::query_as::<_, (Option<String>, i64)>(
        "SELECT endpoint, COUNT(*) AS count FROM logbook_entries \
         WHERE kind = 'request' GROUP BY endpoint \
         ORDER BY count DESC, endpoint ASC LIMIT $1",
    )
    .bind(TOP_ENDPOINTS_LIMIT as i64)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(|(endpoint, count)| EndpointCount { endpoint, count })
    .collect();

    Ok(EntryStats::new(
        total_requests,
        total_events,
        error_requests,
        avg_response_time_ms,
        top_endpoints,
    ))
}

pub async fn fetch_status_groups(pool: &PgPool) -> Result<Vec<StatusGroupCount>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (String, i64)>(
        "SELECT CASE \
         WHEN status_code >= 200 AND status_code < 300 THEN '2xx' \
         WHEN status_code >= 300 AND status_code < 400 THEN '3xx' \
         WHEN status_code >= 400 AND status_code < 500 THEN '4xx' \
         WHEN status_code >= 500 THEN '5xx' \
         ELSE 'Other' END AS status_group, \
         COUNT(*) AS count \
         FROM logbook_entries WHERE kind = 'request' \
         GROUP BY status_group ORDER BY status_group",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(status_group, count)| StatusGroupCount {
            status_group,
            count,
        })
        .collect())
}

pub async fn fetch_filter_options(pool: &PgPool) -> Result<FilterOptions, sqlx::Error> {
    let methods = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT method FROM logbook_entries \
         WHERE kind = 'request' AND method IS NOT NULL ORDER BY method",
    )
    .fetch_all(pool)
    .await?;
    let status_codes = sqlx::query_scalar::<_, i32>(
        "SELECT DISTINCT status_code FROM logbook_entries \
         WHERE kind = 'request' AND status_code IS NOT NULL ORDER BY status_code",
    )
    .fetch_all(pool)
    .await?;

    Ok(FilterOptions {
        methods,
        status_codes,
    })
}

fn apply_log_entry_filters(
    builder: &mut QueryBuilder<'_, Postgres>,
    has_clause: &mut bool,
    filters: &LogEntryFilters,
) {
    if let Some(kind) = filters.kind {
        push_clause(builder, has_clause);
        builder.push("kind = ").push_bind(kind.as_str());
    }
    if let Some(method) = filters.method.as_ref() {
        push_clause(builder, has_clause);
        builder.push("method = ").push_bind(method.to_string());
    }
    if let Some(status_code) = filters.status_code {
        push_clause(builder, has_clause);
        builder.push("status_code = ").push_bind(status_code);
    }
    if let Some(user_id) = filters.user_id {
        push_clause(builder, has_clause);
        builder.push("user_id = ").push_bind(user_id);
    }
    if let Some(endpoint) = filters.endpoint.as_ref() {
        // strpos keeps `%` and `_` literal, unlike LIKE.
        push_clause(builder, has_clause);
        builder
            .push("strpos(endpoint, ")
            .push_bind(endpoint.to_string())
            .push(") > 0");
    }
    if let Some(from) = filters.from {
        push_clause(builder, has_clause);
        builder.push("created_at >= ").push_bind(from);
    }
    if let Some(to) = filters.to {
        push_clause(builder, has_clause);
        builder.push("created_at <= ").push_bind(to);
    }
}

fn push_clause(builder: &mut QueryBuilder<'_, Postgres>, has_clause: &mut bool) {
    if *has_clause {
        builder.push(" AND ");
    } else {
        builder.push(" WHERE ");
        *has_clause = true;
    }
}
