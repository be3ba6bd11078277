pub mod entries;
pub mod manage;

use axum::{
    routing::{delete, get},
    Router,
};

use crate::state::AppState;

/// Read and retention endpoints, mounted under `/{prefix}/api`.
pub fn admin_routes(prefix: &str) -> Router<AppState> {
    let api = Router::new()
        .route("/overview", get(manage::overview))
        .route("/entries", get(entries::list_entries))
        .route("/entries/{id}", get(entries::get_entry))
        .route("/filters", get(entries::filter_options))
        .route("/manage", get(manage::manage))
        .route(
            "/manage/cleanup/days/{days}",
            delete(manage::cleanup_older_than),
        )
        .route("/manage/cleanup/range", delete(manage::cleanup_range))
        .route("/manage/cleanup/all", delete(manage::cleanup_all));

    Router::new().nest(&format!("/{}/api", prefix.trim_matches('/')), api)
}
