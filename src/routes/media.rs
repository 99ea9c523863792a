use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::storage::{Bucket, StorageError};

pub fn router() -> Router<AppState> {
    Router::new().route("/storage/{bucket}/{*path}", get(serve))
}

/// GET /storage/{bucket}/{*path}: public object download.
async fn serve(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> AppResult<Response> {
    let bucket: Bucket = bucket.parse().map_err(|_| AppError::NotFound)?;
    let data = match state.media.download(bucket, &path).await {
        Ok(data) => data,
        Err(StorageError::NotFound | StorageError::InvalidPath(_)) => {
            return Err(AppError::NotFound)
        }
        Err(e) => return Err(e.into()),
    };

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime.as_ref().to_string()),
            (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
        ],
        data,
    )
        .into_response())
}
