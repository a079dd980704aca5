use std::sync::Arc;

use amparo_core::error::{Error, Result};
use amparo_core::filter;
use amparo_core::geo::{self, GeoPoint};
use amparo_types::models::{City, Marker, Need, Status};

use crate::store::RequestStore;

/// Read-side views over the store for map and list UIs.
#[derive(Clone)]
pub struct QueryFacade {
    store: Arc<RequestStore>,
}

impl QueryFacade {
    pub fn new(store: Arc<RequestStore>) -> Self {
        Self { store }
    }

    /// Markers near a point, gathered city by city.
    ///
    /// Cities within range are visited in ascending centroid distance and
    /// each city's matching markers are concatenated whole. The result is
    /// distance-prioritized, not globally sorted: a closer city's markers
    /// always precede a farther city's, even when an individual marker in
    /// the farther city is numerically nearer. Views rely on that grouping.
    pub fn nearest_requests(
        &self,
        center: GeoPoint,
        radius_km: f64,
        statuses: Option<&[Status]>,
    ) -> Result<Vec<Marker>> {
        if !center.is_finite() || !radius_km.is_finite() || radius_km < 0.0 {
            return Err(Error::Validation("center and radius must be finite".into()));
        }

        let bbox = geo::bounding_box(center.lat, center.lng, radius_km);

        let mut cities: Vec<(City, f64)> = self
            .store
            .db()
            .list_cities()
            .map_err(Error::Transient)?
            .into_iter()
            .map(|row| row.into_city().map_err(Error::Transient))
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            // Cheap box check first, exact distance second.
            .filter(|city| bbox.contains(GeoPoint::new(city.lat, city.lng)))
            .map(|city| {
                let d = geo::distance_km(center, GeoPoint::new(city.lat, city.lng));
                (city, d)
            })
            .filter(|(_, d)| *d <= radius_km)
            .collect();

        cities.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut markers = Vec::new();
        for (city, _) in cities {
            markers.extend(self.store.query(&city.slug, statuses)?);
        }
        Ok(markers)
    }

    /// One city's markers with the list-view filters applied: status set,
    /// free-text search, and an AND over required needs.
    pub fn search(
        &self,
        city: &str,
        statuses: Option<&[Status]>,
        text: Option<&str>,
        required_needs: &[Need],
    ) -> Result<Vec<Marker>> {
        let mut markers = self.store.query(city, statuses)?;

        if let Some(q) = text.filter(|q| !q.trim().is_empty()) {
            markers.retain(|m| filter::text_matches(m, q));
        }
        if !required_needs.is_empty() {
            markers.retain(|m| filter::matches_needs(m, required_needs));
        }
        Ok(markers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Creator;
    use amparo_db::Database;
    use amparo_types::models::{HousingStatus, NewMarker};
    use chrono::Utc;

    fn setup() -> (QueryFacade, Arc<RequestStore>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for (slug, name, lat, lng) in [
            ("agudo", "Agudo", -29.6447, -53.2515),
            ("restinga-seca", "Restinga Sêca", -29.8200, -53.3780),
            ("porto-alegre", "Porto Alegre", -30.0346, -51.2177),
        ] {
            db.insert_city(&City {
                slug: slug.into(),
                name: name.into(),
                lat,
                lng,
                created_at: Utc::now(),
            })
            .unwrap();
        }
        let store = Arc::new(RequestStore::new(db));
        (QueryFacade::new(Arc::clone(&store)), store)
    }

    fn request_in(store: &RequestStore, city: &str, description: &str, needs: &[Need]) -> Marker {
        store
            .create(
                city,
                NewMarker {
                    lat: -29.7,
                    lng: -53.3,
                    contact: "Contato - 5550000".into(),
                    document: None,
                    description: description.into(),
                    needs: needs.iter().copied().collect(),
                    housing: HousingStatus::Home,
                    is_city_hall: false,
                    adults: 1,
                    kids: 0,
                    elderly: 0,
                    pcd: false,
                },
                Creator::Citizen,
            )
            .unwrap()
    }

    #[test]
    fn nearby_groups_by_city_distance() {
        let (facade, store) = setup();
        let far = request_in(&store, "porto-alegre", "telhado", &[]);
        let near = request_in(&store, "agudo", "telhado", &[]);
        let mid = request_in(&store, "restinga-seca", "telhado", &[]);

        // Centered on Agudo with a radius that reaches all three cities.
        let all = facade
            .nearest_requests(GeoPoint::new(-29.6447, -53.2515), 300.0, None)
            .unwrap();
        let ids: Vec<_> = all.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![near.id, mid.id, far.id]);
    }

    #[test]
    fn radius_excludes_distant_cities() {
        let (facade, store) = setup();
        request_in(&store, "porto-alegre", "telhado", &[]);
        let near = request_in(&store, "agudo", "telhado", &[]);

        // Porto Alegre is ~190 km from Agudo; a 60 km radius drops it.
        let close = facade
            .nearest_requests(GeoPoint::new(-29.6447, -53.2515), 60.0, None)
            .unwrap();
        assert_eq!(close.len(), 1);
        assert_eq!(close[0].id, near.id);
    }

    #[test]
    fn nan_center_is_rejected() {
        let (facade, _) = setup();
        assert!(matches!(
            facade.nearest_requests(GeoPoint::new(f64::NAN, 0.0), 10.0, None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn search_combines_text_and_needs_as_and() {
        let (facade, store) = setup();
        request_in(&store, "agudo", "água parada no pátio", &[Need::Cleanup]);
        let both = request_in(
            &store,
            "agudo",
            "água e comida para quatro",
            &[Need::FoodWater, Need::Cleanup],
        );

        let hits = facade
            .search(
                "agudo",
                None,
                Some("água"),
                &[Need::FoodWater, Need::Cleanup],
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, both.id);
    }
}
