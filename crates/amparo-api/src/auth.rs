use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use uuid::Uuid;

use amparo_types::api::{
    Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
};
use amparo_types::models::{Role, User};

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Volunteer self-registration. Staff accounts are provisioned through the
/// admin panel instead; self-signup always lands on the helping role.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    if !req.email.contains('@') {
        return Err(ApiError::validation("email address is not valid"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::validation("password must be at least 8 characters"));
    }
    if req.name.trim().is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }

    let city = req.city.clone();
    let email = req.email.clone();
    let state2 = state.clone();
    let taken = tokio::task::spawn_blocking(move || {
        if state2.db.get_city(&city)?.is_none() {
            return Ok::<_, anyhow::Error>(None);
        }
        Ok(Some(state2.db.get_user_by_email(&email)?.is_some()))
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    match taken {
        None => {
            return Err(ApiError(amparo_core::Error::not_found("city", &req.city)));
        }
        Some(true) => {
            return Err(ApiError::validation("an account with this email already exists"));
        }
        Some(false) => {}
    }

    let password_hash = hash_password(&req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        email: req.email,
        name: req.name,
        role: Role::Helping,
        city: req.city,
        phone_number: req.phone_number,
        created_at: Utc::now(),
    };

    let state2 = state.clone();
    let user2 = user.clone();
    tokio::task::spawn_blocking(move || state2.db.create_user(&user2, &password_hash))
        .await
        .map_err(|e| ApiError::internal(e.into()))?
        .map_err(ApiError::internal)?;

    let token = create_token(&state.jwt_secret, &user).map_err(ApiError::internal)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: user.id,
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let email = req.email.clone();
    let state2 = state.clone();
    let row = tokio::task::spawn_blocking(move || state2.db.get_user_by_email(&email))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let parsed_hash =
        PasswordHash::new(&row.password).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    let user = row
        .into_user()
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let token =
        create_token(&state.jwt_secret, &user).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(LoginResponse {
        user_id: user.id,
        name: user.name,
        role: user.role,
        city: user.city,
        token,
    }))
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::internal(anyhow::anyhow!("password hash failed: {e}")))
}

pub fn create_token(secret: &str, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        city: user.city.clone(),
        exp: (Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Initial password for admin-provisioned accounts, shown exactly once.
pub fn generate_password() -> String {
    const CHARS: &[u8] =
        b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*()_+?><:{}[]";
    let mut rng = rand::rng();
    (0..12)
        .map(|_| CHARS[rng.random_range(0..CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_passwords_are_long_enough_and_vary() {
        let a = generate_password();
        let b = generate_password();
        assert_eq!(a.chars().count(), 12);
        assert_ne!(a, b);
    }
}
