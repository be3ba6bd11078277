use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::{
    config::LogbookConfig,
    models::{bounded_url, NewLogEntry},
    services::{
        entry_store::{EntryStore, StoreError},
        exchange::{CaptureOverrides, RequestView, ResponseView},
        token_introspection::TokenIntrospector,
    },
    utils::{
        body::process_body,
        mask::{bearer_token, mask_headers, redact_value, token_fingerprint},
    },
};

/// Something the host application can attribute events to, usually its
/// user model.
pub trait LogbookSubject {
    fn logbook_id(&self) -> i64;

    fn logbook_email(&self) -> Option<&str> {
        None
    }
}

/// Capture pipeline and event entry point. Holds the configuration read at
/// startup and the store every capture ends up in.
#[derive(Clone)]
pub struct LogbookService {
    config: Arc<LogbookConfig>,
    store: Arc<dyn EntryStore>,
    introspector: Option<Arc<dyn TokenIntrospector>>,
}

impl LogbookService {
    pub fn new(config: Arc<LogbookConfig>, store: Arc<dyn EntryStore>) -> Self {
        Self {
            config,
            store,
            introspector: None,
        }
    }

    pub fn with_introspector(mut self, introspector: Arc<dyn TokenIntrospector>) -> Self {
        self.introspector = Some(introspector);
        self
    }

    pub fn config(&self) -> &LogbookConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn EntryStore> {
        &self.store
    }

    /// Enabled, not excluded, and the method is on the allow-list.
    pub fn should_capture(&self, method: &str, path: &str) -> bool {
        self.config.enabled
            && !self.config.is_route_excluded(path)
            && self.config.is_method_included(method)
    }

    /// Looks up the bearer token's owner. Any failure leaves the user unset.
    pub async fn resolve_token_user(&self, headers: &HeaderMap) -> Option<i64> {
        if !self.config.extract_user_from_token {
            return None;
        }
        let introspector = self.introspector.as_ref()?;
        let token = bearer_token(headers)?;

        match introspector.resolve_user(token).await {
            Ok(user_id) => user_id,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    token_id = %token_fingerprint(token),
                    "Token introspection failed; capturing without user"
                );
                None
            }
        }
    }

    /// Records one request/response exchange.
    ///
    /// Returns `Ok(None)` when the exchange is filtered out. Store failures
    /// are returned; everything optional degrades to null instead.
    pub async fn capture<Q, R>(
        &self,
        request: &Q,
        response: &R,
        elapsed_ms: f64,
        overrides: CaptureOverrides,
    ) -> Result<Option<i64>, StoreError>
    where
        Q: RequestView + ?Sized,
        R: ResponseView + ?Sized,
    {
        if !self.should_capture(request.method(), request.path()) {
            return Ok(None);
        }

        let overrides = match overrides.user_id {
            Some(_) => overrides,
            None => CaptureOverrides {
                user_id: self.resolve_token_user(request.headers()).await,
            },
        };

        let entry = build_request_entry(&self.config, request, response, elapsed_ms, overrides);
        let id = self.store.create(entry).await?;
        Ok(Some(id))
    }

    /// Records a named application event. Route and method filters do not
    /// apply here.
    pub async fn event(
        &self,
        name: &str,
        data: Value,
        user_id: Option<i64>,
    ) -> Result<Option<i64>, StoreError> {
        self.record_event(name, data, user_id, None, None).await
    }

    /// Like [`event`](Self::event), with ip and user agent taken from the
    /// request being served.
    pub async fn event_from_request<Q>(
        &self,
        request: &Q,
        name: &str,
        data: Value,
        user_id: Option<i64>,
    ) -> Result<Option<i64>, StoreError>
    where
        Q: RequestView + ?Sized,
    {
        self.record_event(
            name,
            data,
            user_id.or_else(|| request.principal_id()),
            request.ip_address().map(str::to_string),
            request.user_agent().map(str::to_string),
        )
        .await
    }

    pub async fn log_login<S>(
        &self,
        subject: &S,
        additional: Map<String, Value>,
    ) -> Result<Option<i64>, StoreError>
    where
        S: LogbookSubject + ?Sized,
    {
        let data = merge(session_payload(subject), additional);
        self.event("user.login", data, Some(subject.logbook_id()))
            .await
    }

    pub async fn log_logout<S>(
        &self,
        subject: &S,
        additional: Map<String, Value>,
    ) -> Result<Option<i64>, StoreError>
    where
        S: LogbookSubject + ?Sized,
    {
        let data = merge(session_payload(subject), additional);
        self.event("user.logout", data, Some(subject.logbook_id()))
            .await
    }

    /// Records `user.<action>`.
    pub async fn log_action<S>(
        &self,
        subject: &S,
        action: &str,
        data: Map<String, Value>,
    ) -> Result<Option<i64>, StoreError>
    where
        S: LogbookSubject + ?Sized,
    {
        let mut base = Map::new();
        base.insert("user_id".into(), json!(subject.logbook_id()));
        base.insert("action".into(), json!(action));
        let payload = merge(base, data);
        self.event(
            &format!("user.{action}"),
            payload,
            Some(subject.logbook_id()),
        )
        .await
    }

    /// Deletes entries past the configured retention window.
    pub async fn sweep_expired(&self) -> Result<u64, StoreError> {
        self.store
            .delete_older_than(self.config.retention_days)
            .await
    }

    async fn record_event(
        &self,
        name: &str,
        data: Value,
        user_id: Option<i64>,
        ip_address: Option<String>,
        user_agent: Option<String>,
    ) -> Result<Option<i64>, StoreError> {
        if !self.config.enabled {
            return Ok(None);
        }

        let data = if self.config.redact_event_data {
            redact_value(&data, &self.config.mask_fields)
        } else {
            data
        };

        let entry = NewLogEntry {
            user_id,
            ip_address,
            user_agent,
            ..NewLogEntry::event(name, data)
        };
        let id = self.store.create(entry).await?;
        Ok(Some(id))
    }
}

/// Builds the row for one exchange. Pure apart from the generated request
/// id when the client sent none.
pub fn build_request_entry<Q, R>(
    config: &LogbookConfig,
    request: &Q,
    response: &R,
    elapsed_ms: f64,
    overrides: CaptureOverrides,
) -> NewLogEntry
where
    Q: RequestView + ?Sized,
    R: ResponseView + ?Sized,
{
    let user_id = overrides.user_id.or_else(|| request.principal_id());
    let token = bearer_token(request.headers());
    let endpoint = request
        .route_template()
        .unwrap_or_else(|| request.path())
        .to_string();

    let metadata = json!({
        "route": request.route_template(),
        "has_auth_token": token.is_some(),
        "is_authenticated": user_id.is_some(),
        "request_id": request_id(request.headers()),
    });

    NewLogEntry {
        method: Some(request.method().to_ascii_uppercase()),
        url: Some(bounded_url(request.full_url())),
        endpoint: Some(endpoint),
        status_code: Some(i32::from(response.status_code())),
        response_time_ms: Some(clamp_elapsed(elapsed_ms)),
        ip_address: request.ip_address().map(str::to_string),
        user_agent: request.user_agent().map(str::to_string),
        user_id,
        token_id: token.map(token_fingerprint),
        request_headers: Some(mask_headers(request.headers())),
        response_headers: Some(mask_headers(response.headers())),
        request_body: process_body(
            request.body(),
            &config.mask_fields,
            config.truncate_body_at,
        ),
        response_body: process_body(
            response.body(),
            &config.mask_fields,
            config.truncate_body_at,
        ),
        metadata: Some(metadata),
        ..NewLogEntry::request()
    }
}

fn clamp_elapsed(elapsed_ms: f64) -> f64 {
    if elapsed_ms.is_finite() && elapsed_ms > 0.0 {
        elapsed_ms
    } else {
        0.0
    }
}

pub fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .or_else(|| headers.get("x-correlation-id"))
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn session_payload<S: LogbookSubject + ?Sized>(subject: &S) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("user_id".into(), json!(subject.logbook_id()));
    data.insert("email".into(), json!(subject.logbook_email()));
    data.insert(
        "timestamp".into(),
        json!(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    data
}

fn merge(mut base: Map<String, Value>, additional: Map<String, Value>) -> Value {
    base.extend(additional);
    Value::Object(base)
}
