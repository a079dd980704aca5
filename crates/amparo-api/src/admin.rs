use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use uuid::Uuid;

use amparo_core::policy::{self, Capability};
use amparo_types::api::{Claims, CreateUserRequest, CreateUserResponse, UpdateUserRequest};
use amparo_types::models::User;

use crate::AppState;
use crate::auth::{generate_password, hash_password};
use crate::error::{ApiError, ApiResult};
use crate::middleware::actor_from;

/// Staff roster of one city. Admins see their own city; super sees any.
pub async fn list_users(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageUsers)?;
    policy::ensure_city(&actor, &city)?;

    let db = state.db.clone();
    let users = tokio::task::spawn_blocking(move || {
        let rows = db.users_by_city(&city)?;
        rows.into_iter()
            .map(|row| row.into_user())
            .collect::<anyhow::Result<Vec<User>>>()
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    Ok(Json(users))
}

/// Provision a staff account with a generated initial password. The
/// password is returned once and never stored in the clear.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageUsers)?;
    policy::ensure_city(&actor, &req.city)?;

    if !req.email.contains('@') {
        return Err(ApiError::validation("email address is not valid"));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }

    let password = generate_password();
    let password_hash = hash_password(&password)?;

    let user = User {
        id: Uuid::new_v4(),
        email: req.email,
        name: req.name,
        role: req.role,
        city: req.city,
        phone_number: req.phone_number,
        created_at: Utc::now(),
    };

    let db = state.db.clone();
    let user2 = user.clone();
    let created = tokio::task::spawn_blocking(move || {
        if db.get_city(&user2.city)?.is_none() {
            return Ok(None);
        }
        if db.get_user_by_email(&user2.email)?.is_some() {
            return Ok(Some(false));
        }
        db.create_user(&user2, &password_hash)?;
        Ok::<_, anyhow::Error>(Some(true))
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    match created {
        None => Err(ApiError(amparo_core::Error::not_found("city", &user.city))),
        Some(false) => Err(ApiError::validation(
            "an account with this email already exists",
        )),
        Some(true) => Ok((
            StatusCode::CREATED,
            Json(CreateUserResponse {
                user_id: user.id,
                password,
            }),
        )),
    }
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ManageUsers)?;

    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let row = db
            .get_user_by_id(&id.to_string())
            .map_err(amparo_core::Error::Transient)?
            .ok_or_else(|| amparo_core::Error::not_found("user", id))?;
        let target = row.into_user().map_err(amparo_core::Error::Transient)?;

        // An admin may only manage accounts of their own city.
        policy::ensure_city(&actor, &target.city)?;
        if let Some(city) = &req.city {
            policy::ensure_city(&actor, city)?;
        }

        db.update_user(
            &id.to_string(),
            req.name.as_deref(),
            req.role.map(|r| r.as_str()),
            req.city.as_deref(),
            req.phone_number.as_deref(),
        )
        .map_err(amparo_core::Error::Transient)?;

        let row = db
            .get_user_by_id(&id.to_string())
            .map_err(amparo_core::Error::Transient)?
            .ok_or_else(|| amparo_core::Error::not_found("user", id))?;
        row.into_user().map_err(amparo_core::Error::Transient)
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))??;

    Ok(Json(user))
}
