use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::utils::{mask::MaskFields, route_pattern::RoutePatterns, time::MAX_RETENTION_DAYS};

pub const DEFAULT_MASK_FIELDS: &[&str] = &[
    "password",
    "password_confirmation",
    "token",
    "api_key",
    "secret",
    "access_token",
    "refresh_token",
    "credit_card",
    "ssn",
    "cvv",
];

pub const DEFAULT_EXCLUDED_ROUTES: &[&str] = &[
    "logbook/*",
    "telescope/*",
    "horizon/*",
    "_debugbar/*",
    "health-check",
    "up",
];

pub const DEFAULT_INCLUDED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

const MEMORY_CONNECTION: &str = "memory";

/// Where entries are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres(String),
}

/// Settings read by the capture pipeline and the admin surface.
#[derive(Debug, Clone, PartialEq)]
pub struct LogbookConfig {
    pub enabled: bool,
    pub mask_fields: MaskFields,
    pub truncate_body_at: usize,
    pub retention_days: u32,
    pub excluded_routes: RoutePatterns,
    pub included_methods: Vec<String>,
    pub database_connection: Option<String>,
    pub async_logging: bool,
    pub queue_name: String,
    pub queue_capacity: usize,
    pub extract_user_from_token: bool,
    pub redact_event_data: bool,
    pub max_buffered_body_bytes: usize,
    pub route_prefix: String,
}

impl Default for LogbookConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mask_fields: MaskFields::new(DEFAULT_MASK_FIELDS),
            truncate_body_at: 10 * 1024,
            retention_days: 90,
            excluded_routes: RoutePatterns::new(DEFAULT_EXCLUDED_ROUTES),
            included_methods: DEFAULT_INCLUDED_METHODS
                .iter()
                .map(|method| method.to_string())
                .collect(),
            database_connection: None,
            async_logging: false,
            queue_name: "default".to_string(),
            queue_capacity: 1024,
            extract_user_from_token: true,
            redact_event_data: true,
            max_buffered_body_bytes: 1024 * 1024,
            route_prefix: "logbook".to_string(),
        }
    }
}

impl LogbookConfig {
    pub fn is_method_included(&self, method: &str) -> bool {
        self.included_methods
            .iter()
            .any(|included| included.eq_ignore_ascii_case(method))
    }

    /// Configured exclusions plus everything under the admin prefix.
    pub fn is_route_excluded(&self, path: &str) -> bool {
        self.excluded_routes.is_match(path) || self.is_admin_route(path)
    }

    pub fn is_admin_route(&self, path: &str) -> bool {
        let prefix = self.route_prefix.trim_matches('/');
        let path = path.trim().trim_matches('/');
        !prefix.is_empty()
            && path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: Option<String>,
    pub bind_addr: SocketAddr,
    pub cleanup_interval_hours: u64,
    pub logbook: LogbookConfig,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Builds the configuration from an arbitrary key lookup. Missing or
    /// unparsable values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = LogbookConfig::default();
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let logbook = LogbookConfig {
            enabled: parse_bool(get("LOGBOOK_ENABLED"), defaults.enabled),
            mask_fields: get("LOGBOOK_MASK_FIELDS")
                .map(|raw| MaskFields::new(split_list(&raw)))
                .unwrap_or(defaults.mask_fields),
            truncate_body_at: parse_or(get("LOGBOOK_TRUNCATE_AT"), defaults.truncate_body_at),
            retention_days: parse_or(get("LOGBOOK_RETENTION_DAYS"), defaults.retention_days)
                .clamp(1, MAX_RETENTION_DAYS),
            excluded_routes: get("LOGBOOK_EXCLUDED_ROUTES")
                .map(|raw| RoutePatterns::new(split_list(&raw)))
                .unwrap_or(defaults.excluded_routes),
            included_methods: get("LOGBOOK_INCLUDED_METHODS")
                .map(|raw| {
                    split_list(&raw)
                        .into_iter()
                        .map(|method| method.to_ascii_uppercase())
                        .collect()
                })
                .unwrap_or(defaults.included_methods),
            database_connection: get("LOGBOOK_DB_CONNECTION"),
            async_logging: parse_bool(get("LOGBOOK_ASYNC_LOGGING"), defaults.async_logging),
            queue_name: get("LOGBOOK_QUEUE_NAME").unwrap_or(defaults.queue_name),
            queue_capacity: parse_or(get("LOGBOOK_QUEUE_CAPACITY"), defaults.queue_capacity)
                .max(1),
            extract_user_from_token: parse_bool(
                get("LOGBOOK_EXTRACT_USER_FROM_TOKEN"),
                defaults.extract_user_from_token,
            ),
            redact_event_data: parse_bool(
                get("LOGBOOK_REDACT_EVENTS"),
                defaults.redact_event_data,
            ),
            max_buffered_body_bytes: parse_or(
                get("LOGBOOK_MAX_BUFFERED_BODY"),
                defaults.max_buffered_body_bytes,
            ),
            route_prefix: get("LOGBOOK_UI_PREFIX")
                .map(|prefix| prefix.trim_matches('/').to_string())
                .filter(|prefix| !prefix.is_empty())
                .unwrap_or(defaults.route_prefix),
        };

        Config {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "postgres://localhost/logbook".to_string()),
            jwt_secret: get("LOGBOOK_JWT_SECRET"),
            bind_addr: parse_or(
                get("LOGBOOK_BIND_ADDR"),
                SocketAddr::from(([0, 0, 0, 0], 3000)),
            ),
            cleanup_interval_hours: parse_or(get("LOGBOOK_CLEANUP_INTERVAL_HOURS"), 0),
            logbook,
        }
    }

    /// `LOGBOOK_DB_CONNECTION` wins over `DATABASE_URL`; `memory` keeps
    /// entries in process.
    pub fn store_backend(&self) -> StoreBackend {
        match self.logbook.database_connection.as_deref() {
            Some(connection) if connection.eq_ignore_ascii_case(MEMORY_CONNECTION) => {
                StoreBackend::Memory
            }
            Some(connection) => StoreBackend::Postgres(connection.to_string()),
            None => StoreBackend::Postgres(self.database_url.clone()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(default)
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value.map(|raw| raw.to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
