use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, Router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use logbook_backend::{
    config::Config,
    db::connect_store,
    services::{CaptureDispatcher, JwtIntrospector, LogbookService},
    state::AppState,
    utils::mask::mask_secret,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logbook_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        enabled = config.logbook.enabled,
        async_logging = config.logbook.async_logging,
        queue = %config.logbook.queue_name,
        retention_days = config.logbook.retention_days,
        truncate_body_at = config.logbook.truncate_body_at,
        jwt_secret = %config.jwt_secret.as_deref().map(mask_secret).unwrap_or_else(|| "<unset>".into()),
        "Loaded configuration from environment/.env"
    );

    let store = connect_store(&config).await?;

    let mut logbook = LogbookService::new(Arc::new(config.logbook.clone()), store.clone());
    if config.logbook.extract_user_from_token {
        if let Some(secret) = config.jwt_secret.as_deref() {
            logbook = logbook.with_introspector(Arc::new(JwtIntrospector::new(secret)));
        }
    }

    let mut state = AppState::new(config.clone(), store).with_logbook(logbook);
    if config.logbook.async_logging {
        let (dispatcher, _worker) = CaptureDispatcher::spawn(
            state.logbook.clone(),
            &config.logbook.queue_name,
            config.logbook.queue_capacity,
        );
        state = state.with_dispatcher(dispatcher);
    }

    if config.cleanup_interval_hours > 0 {
        spawn_retention_sweep(
            state.logbook.clone(),
            Duration::from_secs(config.cleanup_interval_hours * 60 * 60),
        );
    }

    let host = Router::new().route("/up", get(|| async { "ok" }));
    let app = logbook_backend::app(host, state);

    tracing::info!("Server listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn spawn_retention_sweep(logbook: Arc<LogbookService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match logbook.sweep_expired().await {
                Ok(deleted) => tracing::info!(
                    deleted,
                    retention_days = logbook.config().retention_days,
                    "Scheduled logbook cleanup finished"
                ),
                Err(err) => tracing::warn!(error = ?err, "Scheduled logbook cleanup failed"),
            }
        }
    });
}
