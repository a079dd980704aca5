use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Need, Role, Status};

// -- JWT Claims --

/// JWT claims shared between amparo-api (REST middleware) and amparo-gateway
/// (WebSocket authentication). Canonical definition lives here in
/// amparo-types to eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub city: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub city: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub name: String,
    pub role: Role,
    pub city: String,
    pub token: String,
}

// -- Markers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TransitionRequest {
    pub status: Status,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ReorderRequest {
    /// Marker ids in the desired priority order; position becomes the rank.
    pub ordered_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountsResponse {
    pub counts: BTreeMap<Status, usize>,
}

// -- Comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
    #[serde(default)]
    pub other: Option<String>,
    #[serde(default)]
    pub selected_needs: BTreeSet<Need>,
}

// -- Cities --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateCityRequest {
    pub slug: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuggestCityRequest {
    pub name: String,
}

/// Approving a suggestion needs the data the suggestion itself lacks.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ApproveCityRequest {
    pub slug: String,
    pub lat: f64,
    pub lng: f64,
}

// -- Users (admin) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub city: String,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// The generated initial password is returned exactly once, at creation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserResponse {
    pub user_id: Uuid,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

// -- Reports --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeopleReached {
    pub adults: u64,
    pub kids: u64,
    pub elderly: u64,
    pub pcd: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CityReport {
    pub city: String,
    pub date: String,
    pub total: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub by_need: BTreeMap<Need, usize>,
    pub people: PeopleReached,
}
