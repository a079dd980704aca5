use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use amparo_db::queries::MarkerPatch;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// A marker carries at most five photos.
const MAX_IMAGES: usize = 5;

/// Attach a photo to a marker. The body is stored opaquely on disk and a
/// durable reference is appended to the marker's image list; the files are
/// served statically under `/images`.
pub async fn upload_image(
    State(state): State<AppState>,
    Path((city, id)): Path<(String, Uuid)>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    if body.is_empty() {
        return Err(ApiError::validation("image body must not be empty"));
    }

    let store = state.store.clone();
    let city2 = city.clone();
    let marker = tokio::task::spawn_blocking(move || store.get(&city2, id))
        .await
        .map_err(|e| ApiError::internal(e.into()))??;

    if marker.image_urls.len() >= MAX_IMAGES {
        return Err(ApiError::validation("a request carries at most 5 photos"));
    }

    let slot = marker.image_urls.len();
    let dir = state.image_dir.join(&city).join(id.to_string());
    let filename = format!("image_{slot}");

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal(e.into()))?;
    tokio::fs::write(dir.join(&filename), &body)
        .await
        .map_err(|e| ApiError::internal(e.into()))?;

    let url = format!("/images/{city}/{id}/{filename}");
    let mut image_urls = marker.image_urls;
    image_urls.push(url.clone());

    let store = state.store.clone();
    let updated = tokio::task::spawn_blocking(move || {
        let patch = MarkerPatch {
            image_urls: Some(image_urls),
            ..Default::default()
        };
        store.update(&city, id, &patch)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    info!("stored photo {} for marker {}", url, id);
    Ok((StatusCode::CREATED, Json(updated)))
}
