use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use amparo_types::api::Claims;
use amparo_types::models::Actor;

use crate::AppState;

fn decode_claims(token: &str, secret: &str) -> Option<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|data| data.claims)
}

/// Claims from a Bearer header, if present and valid. Used by the few public
/// endpoints that behave differently for authenticated callers.
pub fn maybe_claims(headers: &HeaderMap, secret: &str) -> Option<Claims> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .strip_prefix("Bearer ")?;
    decode_claims(token, secret)
}

/// Extract and validate JWT from the Authorization header. A missing or
/// invalid token is 401 — being unauthenticated is a precursor state, not
/// an authorization failure.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let claims =
        maybe_claims(req.headers(), &state.jwt_secret).ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// The explicit identity every engine and policy call takes.
pub fn actor_from(claims: &Claims) -> Actor {
    Actor {
        user_id: claims.sub,
        email: claims.email.clone(),
        role: claims.role,
        city: claims.city.clone(),
    }
}
