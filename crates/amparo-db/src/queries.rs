use std::collections::BTreeSet;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;

use amparo_types::models::{City, HousingStatus, Marker, Need, Status, User};

use crate::Database;
use crate::models::{CityRequestRow, CityRow, CommentRow, MarkerRow, UserRow};

/// Field-level merge patch for a marker. `None` leaves a column untouched;
/// last write wins, no conflict detection.
#[derive(Debug, Default, Clone)]
pub struct MarkerPatch {
    pub status: Option<Status>,
    pub index: Option<i64>,
    pub contact: Option<String>,
    pub description: Option<String>,
    pub needs: Option<BTreeSet<Need>>,
    pub housing: Option<HousingStatus>,
    pub image_urls: Option<Vec<String>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
    pub update_reason: Option<String>,
}

impl MarkerPatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.index.is_none()
            && self.contact.is_none()
            && self.description.is_none()
            && self.needs.is_none()
            && self.housing.is_none()
            && self.image_urls.is_none()
            && self.updated_at.is_none()
            && self.updated_by.is_none()
            && self.update_reason.is_none()
    }
}

impl Database {
    // -- Markers --

    pub fn insert_marker(&self, marker: &Marker) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO markers (city, id, lat, lng, contact, document, description,
                                      needs, housing, status, idx, is_city_hall,
                                      adults, kids, elderly, pcd, image_urls, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                rusqlite::params![
                    marker.city,
                    marker.id.to_string(),
                    marker.lat,
                    marker.lng,
                    marker.contact,
                    marker.document,
                    marker.description,
                    serde_json::to_string(&marker.needs)?,
                    marker.housing.as_str(),
                    marker.status.as_str(),
                    marker.index,
                    marker.is_city_hall,
                    marker.adults,
                    marker.kids,
                    marker.elderly,
                    marker.pcd,
                    serde_json::to_string(&marker.image_urls)?,
                    marker.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_marker(&self, city: &str, id: &str) -> Result<Option<MarkerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MARKER_COLUMNS} FROM markers WHERE city = ?1 AND id = ?2"
            ))?;
            stmt.query_row([city, id], marker_from_row).optional()
        })
    }

    /// Apply a field merge. Returns false when the marker does not exist.
    pub fn update_marker(&self, city: &str, id: &str, patch: &MarkerPatch) -> Result<bool> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(index) = patch.index {
            sets.push("idx = ?");
            values.push(Box::new(index));
        }
        if let Some(contact) = &patch.contact {
            sets.push("contact = ?");
            values.push(Box::new(contact.clone()));
        }
        if let Some(description) = &patch.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(needs) = &patch.needs {
            sets.push("needs = ?");
            values.push(Box::new(serde_json::to_string(needs)?));
        }
        if let Some(housing) = patch.housing {
            sets.push("housing = ?");
            values.push(Box::new(housing.as_str()));
        }
        if let Some(image_urls) = &patch.image_urls {
            sets.push("image_urls = ?");
            values.push(Box::new(serde_json::to_string(image_urls)?));
        }
        if let Some(updated_at) = patch.updated_at {
            sets.push("updated_at = ?");
            values.push(Box::new(updated_at.to_rfc3339()));
        }
        if let Some(updated_by) = &patch.updated_by {
            sets.push("updated_by = ?");
            values.push(Box::new(updated_by.clone()));
        }
        if let Some(update_reason) = &patch.update_reason {
            sets.push("update_reason = ?");
            values.push(Box::new(update_reason.clone()));
        }

        if sets.is_empty() {
            // Nothing to merge; report existence only.
            return Ok(self.get_marker(city, id)?.is_some());
        }

        values.push(Box::new(city.to_string()));
        values.push(Box::new(id.to_string()));

        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE markers SET {} WHERE city = ?{} AND id = ?{}",
                sets.iter()
                    .enumerate()
                    .map(|(i, s)| s.replace('?', &format!("?{}", i + 1)))
                    .collect::<Vec<_>>()
                    .join(", "),
                sets.len() + 1,
                sets.len() + 2,
            );
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let changed = conn.execute(&sql, params.as_slice())?;
            Ok(changed > 0)
        })
    }

    /// Markers of one city, optionally restricted to a status set, ordered by
    /// manual rank with creation time as the tie-break.
    pub fn query_markers(&self, city: &str, statuses: Option<&[Status]>) -> Result<Vec<MarkerRow>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {MARKER_COLUMNS} FROM markers WHERE city = ?1");
            let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(city.to_string())];

            if let Some(statuses) = statuses {
                if statuses.is_empty() {
                    return Ok(vec![]);
                }
                let placeholders: Vec<String> = (0..statuses.len())
                    .map(|i| format!("?{}", i + 2))
                    .collect();
                sql.push_str(&format!(" AND status IN ({})", placeholders.join(", ")));
                for status in statuses {
                    params.push(Box::new(status.as_str()));
                }
            }

            sql.push_str(" ORDER BY idx ASC, created_at ASC");

            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let rows = stmt
                .query_map(refs.as_slice(), marker_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Markers created within [start, end) — the report window.
    pub fn markers_created_between(
        &self,
        city: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MarkerRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MARKER_COLUMNS} FROM markers
                 WHERE city = ?1 AND created_at >= ?2 AND created_at < ?3
                 ORDER BY created_at ASC"
            ))?;
            let rows = stmt
                .query_map(
                    rusqlite::params![city, start.to_rfc3339(), end.to_rfc3339()],
                    marker_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Users --

    pub fn create_user(&self, user: &User, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password, name, role, city, phone_number, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                rusqlite::params![
                    user.id.to_string(),
                    user.email,
                    password_hash,
                    user.name,
                    user.role.as_str(),
                    user.city,
                    user.phone_number,
                    user.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE email = ?1"
            ))?;
            stmt.query_row([email], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))?;
            stmt.query_row([id], user_from_row).optional()
        })
    }

    pub fn users_by_city(&self, city: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users WHERE city = ?1 ORDER BY name ASC"
            ))?;
            let rows = stmt
                .query_map([city], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_users(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
        })
    }

    pub fn update_user(
        &self,
        id: &str,
        name: Option<&str>,
        role: Option<&str>,
        city: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<bool> {
        let mut sets: Vec<&'static str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(name) = name {
            sets.push("name = ?");
            values.push(Box::new(name.to_string()));
        }
        if let Some(role) = role {
            sets.push("role = ?");
            values.push(Box::new(role.to_string()));
        }
        if let Some(city) = city {
            sets.push("city = ?");
            values.push(Box::new(city.to_string()));
        }
        if let Some(phone) = phone_number {
            sets.push("phone_number = ?");
            values.push(Box::new(phone.to_string()));
        }

        if sets.is_empty() {
            return Ok(self.get_user_by_id(id)?.is_some());
        }

        values.push(Box::new(id.to_string()));

        self.with_conn(|conn| {
            let sql = format!(
                "UPDATE users SET {} WHERE id = ?{}",
                sets.iter()
                    .enumerate()
                    .map(|(i, s)| s.replace('?', &format!("?{}", i + 1)))
                    .collect::<Vec<_>>()
                    .join(", "),
                sets.len() + 1,
            );
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            Ok(conn.execute(&sql, params.as_slice())? > 0)
        })
    }

    // -- Cities --

    pub fn insert_city(&self, city: &City) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cities (slug, name, lat, lng, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    city.slug,
                    city.name,
                    city.lat,
                    city.lng,
                    city.created_at.to_rfc3339()
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_city(&self, slug: &str) -> Result<Option<CityRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT slug, name, lat, lng, created_at FROM cities WHERE slug = ?1",
            )?;
            stmt.query_row([slug], city_from_row).optional()
        })
    }

    pub fn list_cities(&self) -> Result<Vec<CityRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT slug, name, lat, lng, created_at FROM cities ORDER BY slug")?;
            let rows = stmt
                .query_map([], city_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- City requests --

    pub fn insert_city_request(&self, id: &str, name: &str, requested_at: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO city_requests (id, name, requested_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, name, requested_at],
            )?;
            Ok(())
        })
    }

    pub fn get_city_request(&self, id: &str) -> Result<Option<CityRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, requested_at FROM city_requests WHERE id = ?1")?;
            stmt.query_row([id], |row| {
                Ok(CityRequestRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    requested_at: row.get(2)?,
                })
            })
            .optional()
        })
    }

    pub fn list_city_requests(&self) -> Result<Vec<CityRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, name, requested_at FROM city_requests ORDER BY requested_at")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(CityRequestRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        requested_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn delete_city_request(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM city_requests WHERE id = ?1", [id])? > 0))
    }

    // -- Comments --

    pub fn insert_comment(&self, row: &CommentRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, city, marker_id, user_id, user_name, text, other,
                                       selected_needs, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    row.id,
                    row.city,
                    row.marker_id,
                    row.user_id,
                    row.user_name,
                    row.text,
                    row.other,
                    row.selected_needs,
                    row.kind,
                    row.created_at,
                ],
            )?;
            Ok(())
        })
    }

    pub fn comments_for_marker(&self, city: &str, marker_id: &str) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, city, marker_id, user_id, user_name, text, other,
                        selected_needs, kind, created_at
                 FROM comments WHERE city = ?1 AND marker_id = ?2
                 ORDER BY created_at ASC",
            )?;
            let rows = stmt
                .query_map([city, marker_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        city: row.get(1)?,
                        marker_id: row.get(2)?,
                        user_id: row.get(3)?,
                        user_name: row.get(4)?,
                        text: row.get(5)?,
                        other: row.get(6)?,
                        selected_needs: row.get(7)?,
                        kind: row.get(8)?,
                        created_at: row.get(9)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Activity log --

    pub fn insert_user_read(
        &self,
        id: &str,
        user_id: &str,
        marker_id: &str,
        kind: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_reads (id, user_id, marker_id, kind, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, user_id, marker_id, kind, created_at],
            )?;
            Ok(())
        })
    }

    pub fn insert_user_update(
        &self,
        id: &str,
        user_id: &str,
        marker_id: &str,
        kind: &str,
        payload: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO user_updates (id, user_id, marker_id, kind, payload, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, user_id, marker_id, kind, payload, created_at],
            )?;
            Ok(())
        })
    }
}

const MARKER_COLUMNS: &str = "city, id, lat, lng, contact, document, description, needs, housing, \
                              status, idx, is_city_hall, adults, kids, elderly, pcd, image_urls, \
                              created_at, updated_at, updated_by, update_reason";

const USER_COLUMNS: &str = "id, email, password, name, role, city, phone_number, created_at";

fn marker_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<MarkerRow, rusqlite::Error> {
    Ok(MarkerRow {
        city: row.get(0)?,
        id: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        contact: row.get(4)?,
        document: row.get(5)?,
        description: row.get(6)?,
        needs: row.get(7)?,
        housing: row.get(8)?,
        status: row.get(9)?,
        idx: row.get(10)?,
        is_city_hall: row.get(11)?,
        adults: row.get(12)?,
        kids: row.get(13)?,
        elderly: row.get(14)?,
        pcd: row.get(15)?,
        image_urls: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        updated_by: row.get(19)?,
        update_reason: row.get(20)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<UserRow, rusqlite::Error> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: row.get(2)?,
        name: row.get(3)?,
        role: row.get(4)?,
        city: row.get(5)?,
        phone_number: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn city_from_row(row: &rusqlite::Row<'_>) -> std::result::Result<CityRow, rusqlite::Error> {
    Ok(CityRow {
        slug: row.get(0)?,
        name: row.get(1)?,
        lat: row.get(2)?,
        lng: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amparo_types::models::{HousingStatus, Marker, Need, Role, UNRANKED_INDEX};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_city(db: &Database) {
        db.insert_city(&City {
            slug: "agudo".into(),
            name: "Agudo".into(),
            lat: -29.6447,
            lng: -53.2515,
            created_at: Utc::now(),
        })
        .unwrap();
    }

    fn sample_marker(city: &str) -> Marker {
        Marker {
            id: Uuid::new_v4(),
            city: city.into(),
            lat: -29.6,
            lng: -53.2,
            contact: "Ana - 55999990000".into(),
            document: None,
            description: "casa alagada".into(),
            needs: [Need::Cleanup, Need::FoodWater].into_iter().collect(),
            housing: HousingStatus::WithFamily,
            status: Status::Triage,
            index: UNRANKED_INDEX,
            is_city_hall: false,
            adults: 2,
            kids: 1,
            elderly: 0,
            pcd: false,
            image_urls: vec![],
            created_at: Utc::now(),
            updated_at: None,
            updated_by: None,
            update_reason: None,
        }
    }

    #[test]
    fn marker_round_trip() {
        let db = Database::open_in_memory().unwrap();
        sample_city(&db);

        let marker = sample_marker("agudo");
        db.insert_marker(&marker).unwrap();

        let loaded = db
            .get_marker("agudo", &marker.id.to_string())
            .unwrap()
            .unwrap()
            .into_marker()
            .unwrap();
        assert_eq!(loaded.id, marker.id);
        assert_eq!(loaded.needs, marker.needs);
        assert_eq!(loaded.housing, HousingStatus::WithFamily);
        assert_eq!(loaded.status, Status::Triage);
        assert_eq!(loaded.index, UNRANKED_INDEX);
    }

    #[test]
    fn patch_merges_only_given_fields() {
        let db = Database::open_in_memory().unwrap();
        sample_city(&db);

        let marker = sample_marker("agudo");
        db.insert_marker(&marker).unwrap();

        let patch = MarkerPatch {
            status: Some(Status::InProgress),
            index: Some(3),
            ..Default::default()
        };
        assert!(db.update_marker("agudo", &marker.id.to_string(), &patch).unwrap());

        let loaded = db
            .get_marker("agudo", &marker.id.to_string())
            .unwrap()
            .unwrap()
            .into_marker()
            .unwrap();
        assert_eq!(loaded.status, Status::InProgress);
        assert_eq!(loaded.index, 3);
        assert_eq!(loaded.description, "casa alagada");
    }

    #[test]
    fn update_missing_marker_reports_absence() {
        let db = Database::open_in_memory().unwrap();
        sample_city(&db);
        let patch = MarkerPatch {
            index: Some(0),
            ..Default::default()
        };
        assert!(!db.update_marker("agudo", &Uuid::new_v4().to_string(), &patch).unwrap());
    }

    #[test]
    fn status_filter_and_ordering() {
        let db = Database::open_in_memory().unwrap();
        sample_city(&db);

        let mut a = sample_marker("agudo");
        a.status = Status::InProgress;
        a.index = 5;
        let mut b = sample_marker("agudo");
        b.status = Status::InProgress;
        b.index = 3;
        let c = sample_marker("agudo");

        for m in [&a, &b, &c] {
            db.insert_marker(m).unwrap();
        }

        let rows = db
            .query_markers("agudo", Some(&[Status::InProgress]))
            .unwrap();
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![b.id.to_string(), a.id.to_string()]);
    }

    #[test]
    fn user_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let user = User {
            id: Uuid::new_v4(),
            email: "triagem@agudo.example".into(),
            name: "Triagem Agudo".into(),
            role: Role::Triage,
            city: "agudo".into(),
            phone_number: Some("+55 55 9999-0000".into()),
            created_at: Utc::now(),
        };
        db.create_user(&user, "argon2-hash").unwrap();

        let loaded = db
            .get_user_by_email("triagem@agudo.example")
            .unwrap()
            .unwrap();
        assert_eq!(loaded.password, "argon2-hash");
        assert_eq!(loaded.into_user().unwrap().role, Role::Triage);
        assert_eq!(db.count_users().unwrap(), 1);
    }

    #[test]
    fn city_request_lifecycle() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4().to_string();
        db.insert_city_request(&id, "Restinga Sêca", &Utc::now().to_rfc3339())
            .unwrap();
        assert_eq!(db.list_city_requests().unwrap().len(), 1);
        assert!(db.delete_city_request(&id).unwrap());
        assert!(!db.delete_city_request(&id).unwrap());
    }
}
