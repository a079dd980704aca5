use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use amparo_db::models::CommentRow;
use amparo_types::api::{Claims, CreateCommentRequest};
use amparo_types::models::Comment;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

pub async fn list_comments(
    State(state): State<AppState>,
    Path((city, marker_id)): Path<(String, Uuid)>,
) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let comments = tokio::task::spawn_blocking(move || {
        let rows = db.comments_for_marker(&city, &marker_id.to_string())?;
        rows.into_iter()
            .map(|row| row.into_comment())
            .collect::<anyhow::Result<Vec<Comment>>>()
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    Ok(Json(comments))
}

/// Pledge help on a marker. Any signed-in user may pledge; the selected
/// needs say which of the marker's needs the helper intends to cover.
pub async fn create_comment(
    State(state): State<AppState>,
    Path((city, marker_id)): Path<(String, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.text.trim().is_empty() {
        return Err(ApiError::validation("comment text must not be empty"));
    }

    let store = state.store.clone();
    let db = state.db.clone();
    let comment = tokio::task::spawn_blocking(move || {
        // Pledging against a ghost marker is a 404, not a dangling comment.
        store.get(&city, marker_id)?;

        let comment = Comment {
            id: Uuid::new_v4(),
            city: city.clone(),
            marker_id,
            user_id: claims.sub,
            user_name: claims.name.clone(),
            text: req.text,
            other: req.other,
            selected_needs: req.selected_needs,
            kind: "helpSent".to_string(),
            created_at: Utc::now(),
        };

        let row = CommentRow {
            id: comment.id.to_string(),
            city: comment.city.clone(),
            marker_id: comment.marker_id.to_string(),
            user_id: comment.user_id.to_string(),
            user_name: comment.user_name.clone(),
            text: comment.text.clone(),
            other: comment.other.clone(),
            selected_needs: serde_json::to_string(&comment.selected_needs)
                .unwrap_or_else(|_| "[]".to_string()),
            kind: comment.kind.clone(),
            created_at: comment.created_at.to_rfc3339(),
        };
        db.insert_comment(&row)
            .map_err(amparo_core::Error::Transient)?;
        Ok::<_, amparo_core::Error>(comment)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok((StatusCode::CREATED, Json(comment)))
}
