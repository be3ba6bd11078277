//! Read-only views over an inbound request and its response.
//!
//! The capture pipeline only talks to these traits, so any HTTP stack can be
//! adapted at its boundary. The owned snapshots are what the axum middleware
//! builds, and they can outlive the request for deferred capture.

use axum::body::Bytes;
use axum::http::{header::USER_AGENT, HeaderMap};

pub trait RequestView {
    fn method(&self) -> &str;

    /// Scheme, host, path and query as seen by the server.
    fn full_url(&self) -> &str;

    fn path(&self) -> &str;

    /// Route template the request matched, e.g. `/api/users/{id}`.
    fn route_template(&self) -> Option<&str> {
        None
    }

    fn headers(&self) -> &HeaderMap;

    fn body(&self) -> Option<&[u8]>;

    /// Id of the authenticated principal, if the host resolved one.
    fn principal_id(&self) -> Option<i64> {
        None
    }

    fn ip_address(&self) -> Option<&str> {
        None
    }

    fn user_agent(&self) -> Option<&str> {
        self.headers()
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
    }
}

pub trait ResponseView {
    fn status_code(&self) -> u16;

    fn headers(&self) -> &HeaderMap;

    fn body(&self) -> Option<&[u8]>;
}

/// Values supplied by the caller that win over what the request carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureOverrides {
    pub user_id: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
    pub method: String,
    pub url: String,
    pub path: String,
    pub route_template: Option<String>,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub principal_id: Option<i64>,
    pub ip_address: Option<String>,
}

impl RequestView for RequestSnapshot {
    fn method(&self) -> &str {
        &self.method
    }

    fn full_url(&self) -> &str {
        &self.url
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn route_template(&self) -> Option<&str> {
        self.route_template.as_deref()
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    fn principal_id(&self) -> Option<i64> {
        self.principal_id
    }

    fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl ResponseView for ResponseSnapshot {
    fn status_code(&self) -> u16 {
        self.status
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}
