use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use amparo_core::policy::{self, Capability};
use amparo_types::api::{CityReport, Claims, PeopleReached};
use amparo_types::models::{Marker, Status};

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::middleware::actor_from;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    /// Day to report on, `YYYY-MM-DD`. Defaults to today (UTC).
    pub date: Option<String>,
}

/// Aggregate one day of incoming requests: totals by status and need plus
/// how many people the requests cover.
pub fn aggregate(city: &str, date: NaiveDate, markers: &[Marker]) -> CityReport {
    let mut by_status: BTreeMap<Status, usize> = Status::ALL.iter().map(|&s| (s, 0)).collect();
    let mut by_need = BTreeMap::new();
    let mut people = PeopleReached {
        adults: 0,
        kids: 0,
        elderly: 0,
        pcd: 0,
    };

    for marker in markers {
        *by_status.entry(marker.status).or_default() += 1;
        for &need in &marker.needs {
            *by_need.entry(need).or_default() += 1;
        }
        people.adults += marker.adults as u64;
        people.kids += marker.kids as u64;
        people.elderly += marker.elderly as u64;
        if marker.pcd {
            people.pcd += 1;
        }
    }

    CityReport {
        city: city.to_string(),
        date: date.to_string(),
        total: markers.len(),
        by_status,
        by_need,
        people,
    }
}

pub async fn city_report(
    State(state): State<AppState>,
    Path(city): Path<String>,
    Query(query): Query<ReportQuery>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let actor = actor_from(&claims);
    policy::ensure(&actor, Capability::ViewReports)?;
    policy::ensure_city(&actor, &city)?;

    let date = match &query.date {
        Some(raw) => raw
            .parse::<NaiveDate>()
            .map_err(|_| ApiError::validation("date must be YYYY-MM-DD"))?,
        None => Utc::now().date_naive(),
    };

    let start = Utc
        .from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid"));
    let end = start + chrono::Duration::days(1);

    let db = state.db.clone();
    let city2 = city.clone();
    let markers = tokio::task::spawn_blocking(move || {
        let rows = db.markers_created_between(&city2, start, end)?;
        rows.into_iter()
            .map(|row| row.into_marker())
            .collect::<anyhow::Result<Vec<Marker>>>()
    })
    .await
    .map_err(|e| ApiError::internal(e.into()))?
    .map_err(ApiError::internal)?;

    Ok(Json(aggregate(&city, date, &markers)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use amparo_types::models::{HousingStatus, Need, UNRANKED_INDEX};
    use uuid::Uuid;

    fn marker(status: Status, needs: &[Need], adults: u32, pcd: bool) -> Marker {
        Marker {
            id: Uuid::new_v4(),
            city: "agudo".into(),
            lat: -29.6,
            lng: -53.2,
            contact: "x".into(),
            document: None,
            description: "y".into(),
            needs: needs.iter().copied().collect(),
            housing: HousingStatus::Home,
            status,
            index: UNRANKED_INDEX,
            is_city_hall: false,
            adults,
            kids: 1,
            elderly: 0,
            pcd,
            image_urls: vec![],
            created_at: Utc::now(),
            updated_at: None,
            updated_by: None,
            update_reason: None,
        }
    }

    #[test]
    fn aggregates_cover_status_needs_and_people() {
        let date = "2024-05-10".parse().unwrap();
        let markers = vec![
            marker(Status::Triage, &[Need::Cleanup], 2, false),
            marker(Status::InProgress, &[Need::Cleanup, Need::FoodWater], 3, true),
            marker(Status::Done, &[], 1, false),
        ];

        let report = aggregate("agudo", date, &markers);
        assert_eq!(report.total, 3);
        assert_eq!(report.by_status[&Status::Triage], 1);
        assert_eq!(report.by_status[&Status::Cancelled], 0);
        assert_eq!(report.by_need[&Need::Cleanup], 2);
        assert_eq!(report.by_need[&Need::FoodWater], 1);
        assert_eq!(report.people.adults, 6);
        assert_eq!(report.people.kids, 3);
        assert_eq!(report.people.pcd, 1);
    }

    #[test]
    fn empty_day_is_an_empty_report() {
        let date = "2024-05-10".parse().unwrap();
        let report = aggregate("agudo", date, &[]);
        assert_eq!(report.total, 0);
        assert!(report.by_need.is_empty());
        assert_eq!(report.by_status[&Status::Done], 0);
    }
}
