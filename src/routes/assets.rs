use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use rust_embed::Embed;

use crate::client::views::View;
use crate::state::AppState;

#[derive(Embed)]
#[folder = "assets/"]
struct Assets;

const SHELL: &str = "index.html";

/// Client-side views all load the same page; the view is picked in the browser.
pub fn router() -> Router<AppState> {
    View::ALL
        .iter()
        .filter_map(View::path)
        .fold(Router::new(), |router, path| router.route(path, get(shell)))
        .route("/assets/{*path}", get(serve))
}

pub async fn shell() -> Response {
    match Assets::get(SHELL) {
        Some(file) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/html; charset=utf-8"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            file.data.to_vec(),
        )
            .into_response(),
        None => {
            tracing::error!("Embedded {} is missing", SHELL);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn serve(Path(path): Path<String>) -> Response {
    match Assets::get(&path) {
        Some(file) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.as_ref().to_string()),
                    (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
                ],
                file.data.to_vec(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
