use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// New markers sort after every manually ranked one until a manager orders them.
pub const UNRANKED_INDEX: i64 = 100_000_000;

/// Workflow stage of a help request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    Triage,
    InProgress,
    Done,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Triage,
        Status::InProgress,
        Status::Done,
        Status::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Triage => "triage",
            Status::InProgress => "inProgress",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triage" => Ok(Status::Triage),
            "inProgress" => Ok(Status::InProgress),
            "done" => Ok(Status::Done),
            "cancelled" => Ok(Status::Cancelled),
            other => Err(format!("unknown status: {}", other)),
        }
    }
}

/// Account roles. Assigned at creation, changed only by an admin actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    CityHall,
    Triage,
    Management,
    Helping,
    Super,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::CityHall,
        Role::Triage,
        Role::Management,
        Role::Helping,
        Role::Super,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::CityHall => "city_hall",
            Role::Triage => "triage",
            Role::Management => "management",
            Role::Helping => "helping",
            Role::Super => "super",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "city_hall" => Ok(Role::CityHall),
            "triage" => Ok(Role::Triage),
            "management" => Ok(Role::Management),
            "helping" => Ok(Role::Helping),
            "super" => Ok(Role::Super),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Kinds of aid a request can ask for. Closed vocabulary — an unknown need
/// is a deserialization error, not a runtime lookup miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Need {
    Cleanup,
    FoodWater,
    Reconstruction,
    MedicalAid,
    ClothCleanup,
    Medicines,
    Cloth,
    CivilDefenseCheckup,
    Trousseau,
    Furniture,
}

impl FromStr for Need {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cleanup" => Ok(Need::Cleanup),
            "foodWater" => Ok(Need::FoodWater),
            "reconstruction" => Ok(Need::Reconstruction),
            "medicalAid" => Ok(Need::MedicalAid),
            "clothCleanup" => Ok(Need::ClothCleanup),
            "medicines" => Ok(Need::Medicines),
            "cloth" => Ok(Need::Cloth),
            "civilDefenseCheckup" => Ok(Need::CivilDefenseCheckup),
            "trousseau" => Ok(Need::Trousseau),
            "furniture" => Ok(Need::Furniture),
            other => Err(format!("unknown need: {}", other)),
        }
    }
}

impl Need {
    pub const ALL: [Need; 10] = [
        Need::Cleanup,
        Need::FoodWater,
        Need::Reconstruction,
        Need::MedicalAid,
        Need::ClothCleanup,
        Need::Medicines,
        Need::Cloth,
        Need::CivilDefenseCheckup,
        Need::Trousseau,
        Need::Furniture,
    ];
}

/// Where the requesting family is currently staying. A single field — the
/// options are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HousingStatus {
    #[default]
    Home,
    WithFamily,
    Shelter,
}

impl HousingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HousingStatus::Home => "home",
            HousingStatus::WithFamily => "withFamily",
            HousingStatus::Shelter => "shelter",
        }
    }
}

impl FromStr for HousingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "home" => Ok(HousingStatus::Home),
            "withFamily" => Ok(HousingStatus::WithFamily),
            "shelter" => Ok(HousingStatus::Shelter),
            other => Err(format!("unknown housing status: {}", other)),
        }
    }
}

/// One citizen's request for aid, the map-pin record everything else
/// revolves around. Lives in exactly one city partition for its whole life.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub id: Uuid,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    pub contact: String,
    /// Identity document (CPF/RG). PII — redact in public views.
    pub document: Option<String>,
    pub description: String,
    pub needs: BTreeSet<Need>,
    pub housing: HousingStatus,
    pub status: Status,
    /// Manual priority rank among inProgress markers of the same city.
    pub index: i64,
    pub is_city_hall: bool,
    pub adults: u32,
    pub kids: u32,
    pub elderly: u32,
    pub pcd: bool,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub update_reason: Option<String>,
}

/// Payload for creating a marker, before the store assigns identity,
/// timestamps, status and rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMarker {
    pub lat: f64,
    pub lng: f64,
    pub contact: String,
    #[serde(default)]
    pub document: Option<String>,
    pub description: String,
    #[serde(default)]
    pub needs: BTreeSet<Need>,
    #[serde(default)]
    pub housing: HousingStatus,
    #[serde(default)]
    pub is_city_hall: bool,
    #[serde(default)]
    pub adults: u32,
    #[serde(default)]
    pub kids: u32,
    #[serde(default)]
    pub elderly: u32,
    #[serde(default)]
    pub pcd: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub city: String,
    pub phone_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct City {
    pub slug: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub created_at: DateTime<Utc>,
}

/// A pending suggestion for a new city partition. Deleted on review.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CityRequest {
    pub id: Uuid,
    pub name: String,
    pub requested_at: DateTime<Utc>,
}

/// A pledge of help (or note) attached to a marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub city: String,
    pub marker_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub text: String,
    pub other: Option<String>,
    pub selected_needs: BTreeSet<Need>,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated identity every policy and lifecycle call receives
/// explicitly. There is no ambient current-user context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub city: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_json_names_are_camel_case() {
        assert_eq!(
            serde_json::to_string(&Status::InProgress).unwrap(),
            "\"inProgress\""
        );
        assert_eq!("cancelled".parse::<Status>().unwrap(), Status::Cancelled);
    }

    #[test]
    fn role_json_names_are_snake_case() {
        assert_eq!(
            serde_json::to_string(&Role::CityHall).unwrap(),
            "\"city_hall\""
        );
        assert_eq!("super".parse::<Role>().unwrap(), Role::Super);
    }

    #[test]
    fn unknown_need_is_rejected() {
        assert!(serde_json::from_str::<Need>("\"teleportation\"").is_err());
        assert_eq!(
            serde_json::from_str::<Need>("\"civilDefenseCheckup\"").unwrap(),
            Need::CivilDefenseCheckup
        );
    }

    #[test]
    fn new_marker_defaults_are_empty() {
        let m: NewMarker = serde_json::from_str(
            r#"{"lat":-29.6,"lng":-53.2,"contact":"Ana - 555","description":"flooded"}"#,
        )
        .unwrap();
        assert!(m.needs.is_empty());
        assert_eq!(m.housing, HousingStatus::Home);
        assert!(!m.is_city_hall);
        assert_eq!(m.adults, 0);
    }
}
