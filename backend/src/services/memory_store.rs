use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    models::{
        status_group, EndpointCount, EntryKind, EntryStats, FilterOptions, LogEntry, NewLogEntry,
        Page, Pagination, StatusGroupCount, TOP_ENDPOINTS_LIMIT,
    },
    repositories::log_entry::{DateRange, LogEntryFilters},
    services::entry_store::{EntryStore, StoreError},
};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    entries: Vec<LogEntry>,
}

/// Process-local store with the same query semantics as the Postgres one.
/// Selected with `LOGBOOK_DB_CONNECTION=memory`; contents vanish on exit.
#[derive(Debug, Default)]
pub struct MemoryEntryStore {
    inner: RwLock<Inner>,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<LogEntry> {
        self.inner.read().await.entries.clone()
    }

    async fn retain(&self, keep: impl Fn(&LogEntry) -> bool) -> u64 {
        let mut inner = self.inner.write().await;
        let before = inner.entries.len();
        inner.entries.retain(|entry| keep(entry));
        (before - inner.entries.len()) as u64
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn create(&self, entry: NewLogEntry) -> Result<i64, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.entries.push(LogEntry::from_new(id, entry, Utc::now()));
        Ok(id)
    }

    async fn find(&self, id: i64) -> Result<Option<LogEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.entries.iter().find(|entry| entry.id == id).cloned())
    }

    async fn query(
        &self,
        filters: &LogEntryFilters,
        pagination: Pagination,
    ) -> Result<Page<LogEntry>, StoreError> {
        let inner = self.inner.read().await;
        let mut matched: Vec<&LogEntry> = inner
            .entries
            .iter()
            .filter(|entry| filters.matches(entry))
            .collect();
        matched.sort_by_key(|entry| Reverse((entry.created_at, entry.id)));

        let total = matched.len() as i64;
        let items = matched
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.per_page as usize)
            .cloned()
            .collect();
        Ok(Page::new(items, total, pagination))
    }

    async fn count(&self) -> Result<i64, StoreError> {
        Ok(self.inner.read().await.entries.len() as i64)
    }

    async fn count_before(&self, cutoff: DateTime<Utc>) -> Result<i64, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .entries
            .iter()
            .filter(|entry| entry.created_at < cutoff)
            .count() as i64)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        Ok(self.retain(|entry| entry.created_at >= cutoff).await)
    }

    async fn delete_range(&self, range: DateRange) -> Result<u64, StoreError> {
        Ok(self.retain(|entry| !range.contains(entry.created_at)).await)
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        Ok(self.retain(|_| false).await)
    }

    async fn stats(&self) -> Result<EntryStats, StoreError> {
        let inner = self.inner.read().await;
        let requests: Vec<&LogEntry> = inner
            .entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Request)
            .collect();
        let total_events = inner
            .entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Event)
            .count() as i64;
        let error_requests = requests.iter().filter(|entry| entry.is_error()).count() as i64;

        let timings: Vec<f64> = requests
            .iter()
            .filter_map(|entry| entry.response_time_ms)
            .collect();
        let avg_response_time_ms = if timings.is_empty() {
            None
        } else {
            Some(timings.iter().sum::<f64>() / timings.len() as f64)
        };

        let mut per_endpoint: HashMap<Option<String>, i64> = HashMap::new();
        for entry in &requests {
            *per_endpoint.entry(entry.endpoint.clone()).or_default() += 1;
        }
        let mut top_endpoints: Vec<EndpointCount> = per_endpoint
            .into_iter()
            .map(|(endpoint, count)| EndpointCount { endpoint, count })
            .collect();
        // Mirrors `ORDER BY count DESC, endpoint ASC` with NULLs last.
        top_endpoints.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.endpoint.is_none().cmp(&b.endpoint.is_none()))
                .then_with(|| a.endpoint.cmp(&b.endpoint))
        });
        top_endpoints.truncate(TOP_ENDPOINTS_LIMIT);

        Ok(EntryStats::new(
            requests.len() as i64,
            total_events,
            error_requests,
            avg_response_time_ms,
            top_endpoints,
        ))
    }

    async fn status_groups(&self) -> Result<Vec<StatusGroupCount>, StoreError> {
        let inner = self.inner.read().await;
        let mut groups: BTreeMap<&'static str, i64> = BTreeMap::new();
        for entry in inner
            .entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Request)
        {
            *groups.entry(status_group(entry.status_code)).or_default() += 1;
        }
        Ok(groups
            .into_iter()
            .map(|(group, count)| StatusGroupCount {
                status_group: group.to_string(),
                count,
            })
            .collect())
    }

    async fn filter_options(&self) -> Result<FilterOptions, StoreError> {
        let inner = self.inner.read().await;
        let requests = inner
            .entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::Request);
        let methods: BTreeSet<String> = requests
            .clone()
            .filter_map(|entry| entry.method.clone())
            .collect();
        let status_codes: BTreeSet<i32> = requests.filter_map(|entry| entry.status_code).collect();
        Ok(FilterOptions {
            methods: methods.into_iter().collect(),
            status_codes: status_codes.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn request(status: i32, endpoint: &str) -> NewLogEntry {
        NewLogEntry {
            method: Some("GET".into()),
            endpoint: Some(endpoint.into()),
            status_code: Some(status),
            response_time_ms: Some(10.0),
            ..NewLogEntry::request()
        }
    }

    fn aged(mut entry: NewLogEntry, days: i64) -> NewLogEntry {
        entry.created_at = Some(Utc::now() - Duration::days(days));
        entry
    }

    #[tokio::test]
    async fn stats_report_counts_and_error_rate() {
        let store = MemoryEntryStore::new();
        for _ in 0..10 {
            store.create(request(200, "/api/users")).await.unwrap();
        }
        for _ in 0..2 {
            store.create(request(404, "/api/missing")).await.unwrap();
        }
        for _ in 0..3 {
            store
                .create(NewLogEntry::event("user.login", json!({})))
                .await
                .unwrap();
        }

        let stats = store.stats().await.unwrap();

        assert_eq!(stats.total_requests, 12);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.error_rate_pct, 16.67);
        assert_eq!(stats.avg_response_time_ms, 10.0);
        assert_eq!(
            stats.top_endpoints[0],
            EndpointCount {
                endpoint: Some("/api/users".into()),
                count: 10
            }
        );
        assert_eq!(stats.top_endpoints.len(), 2);
    }

    #[tokio::test]
    async fn stats_on_empty_store_are_zero() {
        let stats = MemoryEntryStore::new().stats().await.unwrap();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.error_rate_pct, 0.0);
        assert_eq!(stats.avg_response_time_ms, 0.0);
        assert!(stats.top_endpoints.is_empty());
    }

    #[tokio::test]
    async fn average_ignores_missing_timings() {
        let store = MemoryEntryStore::new();
        store.create(request(200, "/a")).await.unwrap();
        let mut untimed = request(200, "/a");
        untimed.response_time_ms = None;
        store.create(untimed).await.unwrap();
        let mut slow = request(200, "/a");
        slow.response_time_ms = Some(20.0);
        store.create(slow).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.avg_response_time_ms, 15.0);
    }

    #[tokio::test]
    async fn top_endpoints_are_capped_at_ten() {
        let store = MemoryEntryStore::new();
        for index in 0..12 {
            store
                .create(request(200, &format!("/api/{index}")))
                .await
                .unwrap();
        }
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.top_endpoints.len(), TOP_ENDPOINTS_LIMIT);
    }

    #[tokio::test]
    async fn delete_older_than_removes_only_old_entries_once() {
        let store = MemoryEntryStore::new();
        for _ in 0..5 {
            store.create(aged(request(200, "/old"), 100)).await.unwrap();
        }
        for _ in 0..3 {
            store.create(aged(request(200, "/new"), 10)).await.unwrap();
        }

        assert_eq!(store.count_older_than(90).await.unwrap(), 5);
        assert_eq!(store.delete_older_than(90).await.unwrap(), 5);
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(store.delete_older_than(90).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_range_is_inclusive() {
        let store = MemoryEntryStore::new();
        let at = Utc::now() - Duration::days(5);
        let mut inside = request(200, "/a");
        inside.created_at = Some(at);
        store.create(inside).await.unwrap();
        store.create(aged(request(200, "/b"), 30)).await.unwrap();
        store.create(request(200, "/c")).await.unwrap();

        let range = DateRange::new(at, at).unwrap();
        assert_eq!(store.delete_range(range).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn delete_all_reports_removed_rows() {
        let store = MemoryEntryStore::new();
        store.create(request(200, "/a")).await.unwrap();
        store
            .create(NewLogEntry::event("e", json!({})))
            .await
            .unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn query_orders_newest_first_and_paginates() {
        let store = MemoryEntryStore::new();
        for days in [3, 1, 2] {
            store
                .create(aged(request(200, &format!("/d{days}")), days))
                .await
                .unwrap();
        }

        let page = store
            .query(&LogEntryFilters::default(), Pagination::new(1, 2))
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].endpoint.as_deref(), Some("/d1"));
        assert_eq!(page.items[1].endpoint.as_deref(), Some("/d2"));

        let second = store
            .query(&LogEntryFilters::default(), Pagination::new(2, 2))
            .await
            .unwrap();
        assert_eq!(second.items.len(), 1);
        assert_eq!(second.items[0].endpoint.as_deref(), Some("/d3"));
    }

    #[tokio::test]
    async fn status_groups_and_filter_options_cover_requests_only() {
        let store = MemoryEntryStore::new();
        store.create(request(200, "/a")).await.unwrap();
        store.create(request(201, "/a")).await.unwrap();
        let mut post = request(500, "/b");
        post.method = Some("POST".into());
        store.create(post).await.unwrap();
        store
            .create(NewLogEntry::event("e", json!({})))
            .await
            .unwrap();

        let groups = store.status_groups().await.unwrap();
        assert_eq!(
            groups,
            vec![
                StatusGroupCount {
                    status_group: "2xx".into(),
                    count: 2
                },
                StatusGroupCount {
                    status_group: "5xx".into(),
                    count: 1
                },
            ]
        );

        let options = store.filter_options().await.unwrap();
        assert_eq!(options.methods, vec!["GET".to_string(), "POST".to_string()]);
        assert_eq!(options.status_codes, vec![200, 201, 500]);
    }
}
