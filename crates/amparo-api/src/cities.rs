use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use amparo_core::policy::{self, Capability};
use amparo_types::api::{ApproveCityRequest, Claims, CreateCityRequest, SuggestCityRequest};
use amparo_types::models::{City, CityRequest};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::actor_from;

pub async fn list_cities(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let db = state.db.clone();
    let cities = tokio::task::spawn_blocking(move || {
        let rows = db.list_cities()?;
        rows.into_iter()
            .map(|row| row.into_city())
            .collect::<anyhow::Result<Vec<City>>>()
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    Ok(Json(cities))
}

/// Register a city partition directly. Super only.
pub async fn create_city(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCityRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageCities)?;

    if req.slug.trim().is_empty() || !req.slug.chars().all(|c| c.is_ascii_lowercase() || c == '-') {
        return Err(ApiError::validation(
            "slug must be lowercase ascii words separated by dashes",
        ));
    }
    if !req.lat.is_finite() || !req.lng.is_finite() {
        return Err(ApiError::validation("centroid coordinates must be finite"));
    }

    let city = City {
        slug: req.slug,
        name: req.name,
        lat: req.lat,
        lng: req.lng,
        created_at: Utc::now(),
    };

    let db = state.db.clone();
    let city2 = city.clone();
    tokio::task::spawn_blocking(move || db.insert_city(&city2))
        .await
        .map_err(|e| ApiError::internal(e.into()))?
        .map_err(ApiError::internal)?;

    Ok((StatusCode::CREATED, Json(city)))
}

/// Public suggestion box for cities not yet covered.
pub async fn suggest_city(
    State(state): State<AppState>,
    Json(req): Json<SuggestCityRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("city name must not be empty"));
    }

    let request = CityRequest {
        id: Uuid::new_v4(),
        name: req.name,
        requested_at: Utc::now(),
    };

    let db = state.db.clone();
    let request2 = request.clone();
    tokio::task::spawn_blocking(move || {
        db.insert_city_request(
            &request2.id.to_string(),
            &request2.name,
            &request2.requested_at.to_rfc3339(),
        )
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn list_city_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageCities)?;

    let db = state.db.clone();
    let requests = tokio::task::spawn_blocking(move || {
        let rows = db.list_city_requests()?;
        rows.into_iter()
            .map(|row| row.into_city_request())
            .collect::<anyhow::Result<Vec<CityRequest>>>()
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    Ok(Json(requests))
}

/// Approval turns the suggestion into a real city and removes it. The
/// reviewer supplies the slug and centroid the suggestion lacks.
pub async fn approve_city_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ApproveCityRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageCities)?;

    if !req.lat.is_finite() || !req.lng.is_finite() {
        return Err(ApiError::validation("centroid coordinates must be finite"));
    }

    let db = state.db.clone();
    let city = tokio::task::spawn_blocking(move || {
        let pending = db
            .get_city_request(&id.to_string())
            .map_err(amparo_core::Error::Transient)?
            .ok_or_else(|| amparo_core::Error::not_found("city request", id))?;

        let city = City {
            slug: req.slug,
            name: pending.name,
            lat: req.lat,
            lng: req.lng,
            created_at: Utc::now(),
        };
        db.insert_city(&city).map_err(amparo_core::Error::Transient)?;
        db.delete_city_request(&id.to_string())
            .map_err(amparo_core::Error::Transient)?;
        Ok::<_, amparo_core::Error>(city)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok((StatusCode::CREATED, Json(city)))
}

pub async fn reject_city_request(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageCities)?;

    let db = state.db.clone();
    let removed = tokio::task::spawn_blocking(move || db.delete_city_request(&id.to_string()))
        .await
        .map_err(|e| ApiError::internal(e.into()))?
        .map_err(ApiError::internal)?;

    if !removed {
        return Err(ApiError(amparo_core::Error::not_found("city request", id)));
    }
    Ok(StatusCode::NO_CONTENT)
}
