//! Great-circle distance and bounding-box helpers.
//!
//! Pure arithmetic, no failure modes. Non-finite input propagates NaN —
//! callers validate coordinates before calling.

/// A lat/lng pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_PER_DEG_LAT: f64 = 110.574;
const KM_PER_DEG_LNG: f64 = 111.32;

/// Haversine great-circle distance in kilometers.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + (d_lng / 2.0).sin().powi(2) * lat1.cos() * lat2.cos();
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Axis-aligned box guaranteed to contain every point within `radius_km` of
/// the center. Over-inclusive near the poles; never falsely excludes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lng >= self.min_lng && p.lng <= self.max_lng
    }
}

pub fn bounding_box(lat: f64, lng: f64, radius_km: f64) -> BoundingBox {
    let delta_lat = radius_km / KM_PER_DEG_LAT;
    let delta_lng = radius_km / (KM_PER_DEG_LNG * (std::f64::consts::PI * lat / 180.0).cos());

    BoundingBox {
        min_lat: lat - delta_lat,
        max_lat: lat + delta_lat,
        min_lng: lng - delta_lng,
        max_lng: lng + delta_lng,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AGUDO: GeoPoint = GeoPoint {
        lat: -29.6447,
        lng: -53.2515,
    };
    const SANTA_MARIA: GeoPoint = GeoPoint {
        lat: -29.6842,
        lng: -53.8069,
    };

    #[test]
    fn distance_is_symmetric() {
        let ab = distance_km(AGUDO, SANTA_MARIA);
        let ba = distance_km(SANTA_MARIA, AGUDO);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_km(AGUDO, AGUDO), 0.0);
    }

    #[test]
    fn one_degree_of_latitude() {
        // ~111.19 km per degree of latitude, within 0.5%.
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = distance_km(a, b);
        assert!((d - 111.19).abs() / 111.19 < 0.005, "got {d}");
    }

    #[test]
    fn neighboring_cities_are_tens_of_km_apart() {
        let d = distance_km(AGUDO, SANTA_MARIA);
        assert!(d > 50.0 && d < 60.0, "got {d}");
    }

    #[test]
    fn bounding_box_never_excludes_points_in_radius() {
        let center = AGUDO;
        let radius = 25.0;
        let bbox = bounding_box(center.lat, center.lng, radius);

        // Sweep a ring of bearings at and inside the radius.
        for step in 0..72 {
            let bearing = (step as f64) * 5.0_f64.to_radians();
            for r in [0.5, radius / 2.0, radius * 0.999] {
                let d_lat = (r / KM_PER_DEG_LAT) * bearing.cos();
                let d_lng = (r / (KM_PER_DEG_LNG * center.lat.to_radians().cos())) * bearing.sin();
                let p = GeoPoint::new(center.lat + d_lat, center.lng + d_lng);
                if distance_km(center, p) <= radius {
                    assert!(bbox.contains(p), "excluded in-radius point {p:?}");
                }
            }
        }
    }

    #[test]
    fn bounding_box_widens_longitude_away_from_equator() {
        let equator = bounding_box(0.0, 0.0, 10.0);
        let south = bounding_box(-60.0, 0.0, 10.0);
        assert!((south.max_lng - south.min_lng) > (equator.max_lng - equator.min_lng));
    }
}
