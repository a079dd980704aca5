//! Database row types — these map directly to SQLite rows.
//! Distinct from the amparo-types API models to keep the DB layer
//! independent; conversion to domain types happens here, next to the rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use amparo_types::models::{City, CityRequest, Comment, Marker, User};

pub struct MarkerRow {
    pub city: String,
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub contact: String,
    pub document: Option<String>,
    pub description: String,
    pub needs: String,
    pub housing: String,
    pub status: String,
    pub idx: i64,
    pub is_city_hall: bool,
    pub adults: i64,
    pub kids: i64,
    pub elderly: i64,
    pub pcd: bool,
    pub image_urls: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub updated_by: Option<String>,
    pub update_reason: Option<String>,
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub role: String,
    pub city: String,
    pub phone_number: Option<String>,
    pub created_at: String,
}

pub struct CityRow {
    pub slug: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub created_at: String,
}

pub struct CityRequestRow {
    pub id: String,
    pub name: String,
    pub requested_at: String,
}

pub struct CommentRow {
    pub id: String,
    pub city: String,
    pub marker_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
    pub other: Option<String>,
    pub selected_needs: String,
    pub kind: String,
    pub created_at: String,
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .with_context(|| format!("bad timestamp: {raw}"))
}

impl MarkerRow {
    pub fn into_marker(self) -> Result<Marker> {
        Ok(Marker {
            id: self.id.parse().context("bad marker id")?,
            city: self.city,
            lat: self.lat,
            lng: self.lng,
            contact: self.contact,
            document: self.document,
            description: self.description,
            needs: serde_json::from_str(&self.needs).context("bad needs set")?,
            housing: self
                .housing
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?,
            status: self
                .status
                .parse()
                .map_err(|e: String| anyhow::anyhow!(e))?,
            index: self.idx,
            is_city_hall: self.is_city_hall,
            adults: self.adults as u32,
            kids: self.kids as u32,
            elderly: self.elderly as u32,
            pcd: self.pcd,
            image_urls: serde_json::from_str(&self.image_urls).context("bad image list")?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: self.updated_at.as_deref().map(parse_timestamp).transpose()?,
            updated_by: self.updated_by,
            update_reason: self.update_reason,
        })
    }
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: self.id.parse().context("bad user id")?,
            email: self.email,
            name: self.name,
            role: self.role.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            city: self.city,
            phone_number: self.phone_number,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl CityRow {
    pub fn into_city(self) -> Result<City> {
        Ok(City {
            slug: self.slug,
            name: self.name,
            lat: self.lat,
            lng: self.lng,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl CityRequestRow {
    pub fn into_city_request(self) -> Result<CityRequest> {
        Ok(CityRequest {
            id: self.id.parse().context("bad city request id")?,
            name: self.name,
            requested_at: parse_timestamp(&self.requested_at)?,
        })
    }
}

impl CommentRow {
    pub fn into_comment(self) -> Result<Comment> {
        Ok(Comment {
            id: self.id.parse().context("bad comment id")?,
            city: self.city,
            marker_id: self.marker_id.parse().context("bad marker id")?,
            user_id: self.user_id.parse().context("bad user id")?,
            user_name: self.user_name,
            text: self.text,
            other: self.other,
            selected_needs: serde_json::from_str(&self.selected_needs)
                .context("bad selected needs")?,
            kind: self.kind,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
