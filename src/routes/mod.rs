pub mod api;
pub mod assets;
pub mod auth;
pub mod media;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every HTTP surface of the app, with request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(assets::router())
        .merge(auth::router())
        .merge(api::router())
        .merge(media::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
