use std::str::FromStr;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use amparo_core::geo::GeoPoint;
use amparo_core::policy::{self, Capability};
use amparo_types::api::{Claims, CountsResponse, ReorderRequest, TransitionRequest};
use amparo_types::models::{Marker, Need, NewMarker, Status};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{actor_from, maybe_claims};
use crate::store_creator;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Free-text search over description and contact.
    pub q: Option<String>,
    /// Comma-separated need keys; all must be present (AND).
    pub needs: Option<String>,
    /// Comma-separated statuses; defaults to the publicly visible set.
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_radius_km")]
    pub radius_km: f64,
    pub status: Option<String>,
}

fn default_radius_km() -> f64 {
    50.0
}

fn parse_list<T: FromStr<Err = String>>(raw: &str) -> ApiResult<Vec<T>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(ApiError::validation))
        .collect()
}

/// Requests the public map shows: still open for help.
const PUBLIC_STATUSES: [Status; 2] = [Status::Triage, Status::InProgress];

fn redact(mut marker: Marker) -> Marker {
    marker.document = None;
    marker
}

pub async fn list_markers(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<impl IntoResponse> {
    let statuses = match &query.status {
        Some(raw) => parse_list::<Status>(raw)?,
        None => PUBLIC_STATUSES.to_vec(),
    };
    let needs = match &query.needs {
        Some(raw) => parse_list::<Need>(raw)?,
        None => vec![],
    };

    let facade = state.facade.clone();
    let markers = tokio::task::spawn_blocking(move || {
        facade.search(&city, Some(&statuses), query.q.as_deref(), &needs)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok(Json(markers.into_iter().map(redact).collect::<Vec<_>>()))
}

pub async fn nearby(
    State(state): State<AppState>,
    Query(query): Query<NearbyQuery>,
) -> ApiResult<impl IntoResponse> {
    let statuses = match &query.status {
        Some(raw) => parse_list::<Status>(raw)?,
        None => PUBLIC_STATUSES.to_vec(),
    };

    let facade = state.facade.clone();
    let markers = tokio::task::spawn_blocking(move || {
        facade.nearest_requests(
            GeoPoint::new(query.lat, query.lng),
            query.radius_km,
            Some(&statuses),
        )
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok(Json(markers.into_iter().map(redact).collect::<Vec<_>>()))
}

/// Citizen help request form. Anonymous callers always land in triage; a
/// Bearer token lets authority staff create pre-verified requests.
pub async fn create_marker(
    State(state): State<AppState>,
    Path(city): Path<String>,
    headers: HeaderMap,
    Json(new): Json<NewMarker>,
) -> ApiResult<impl IntoResponse> {
    let claims = maybe_claims(&headers, &state.jwt_secret);

    let store = state.store.clone();
    let marker = tokio::task::spawn_blocking(move || {
        let actor = claims.as_ref().map(actor_from);
        store.create(&city, new, store_creator(actor.as_ref()))
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok((StatusCode::CREATED, Json(marker)))
}

pub async fn get_marker(
    State(state): State<AppState>,
    Path((city, id)): Path<(String, Uuid)>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let claims = maybe_claims(&headers, &state.jwt_secret);
    let authenticated = claims.is_some();

    let store = state.store.clone();
    let db = state.db.clone();
    let marker = tokio::task::spawn_blocking(move || {
        let marker = store.get(&city, id)?;
        if let Some(claims) = claims {
            // Reads by signed-in helpers feed the activity trail; a failed
            // write must not fail the lookup.
            let logged = db.insert_user_read(
                &Uuid::new_v4().to_string(),
                &claims.sub.to_string(),
                &id.to_string(),
                "marker_view",
                &Utc::now().to_rfc3339(),
            );
            if let Err(e) = logged {
                warn!("activity log write failed (marker_view): {e}");
            }
        }
        Ok::<_, amparo_core::Error>(marker)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok(Json(if authenticated { marker } else { redact(marker) }))
}

pub async fn transition(
    State(state): State<AppState>,
    Path((city, id)): Path<(String, Uuid)>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<TransitionRequest>,
) -> ApiResult<impl IntoResponse> {
    let engine = state.engine.clone();
    let marker = tokio::task::spawn_blocking(move || {
        let actor = actor_from(&claims);
        engine.transition(&actor, &city, id, req.status, req.reason.as_deref())
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok(Json(marker))
}

pub async fn reorder(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<impl IntoResponse> {
    let engine = state.engine.clone();
    tokio::task::spawn_blocking(move || {
        let actor = actor_from(&claims);
        engine.reorder(&actor, &city, &req.ordered_ids)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn counts(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ViewManagement)?;
    policy::ensure_city(&actor, &city)?;

    let engine = state.engine.clone();
    let counts = tokio::task::spawn_blocking(move || engine.counts_by_status(&city))
        .await
        .map_err(|e| ApiError::internal(e.into()))??;

    Ok(Json(CountsResponse { counts }))
}
