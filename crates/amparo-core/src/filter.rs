use amparo_types::models::{Marker, Need};

/// True iff every required need is present on the marker — logical AND.
/// An empty requirement matches everything.
pub fn matches_needs(marker: &Marker, required: &[Need]) -> bool {
    required.iter().all(|need| marker.needs.contains(need))
}

/// Case-insensitive substring match against description or contact.
pub fn text_matches(marker: &Marker, query: &str) -> bool {
    let q = query.to_lowercase();
    marker.description.to_lowercase().contains(&q) || marker.contact.to_lowercase().contains(&q)
}

#[cfg(test)]
mod tests {
    use super::*;
    use amparo_types::models::{HousingStatus, Status};
    use chrono::Utc;
    use uuid::Uuid;

    fn marker(needs: &[Need], description: &str, contact: &str) -> Marker {
        Marker {
            id: Uuid::new_v4(),
            city: "agudo".into(),
            lat: -29.6,
            lng: -53.2,
            contact: contact.into(),
            document: None,
            description: description.into(),
            needs: needs.iter().copied().collect(),
            housing: HousingStatus::Home,
            status: Status::Triage,
            index: amparo_types::models::UNRANKED_INDEX,
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
    fn empty_requirement_is_vacuously_true() {
        let m = marker(&[], "casa alagada", "Ana - 5555");
        assert!(matches_needs(&m, &[]));
    }

    #[test]
    fn single_need_requires_that_need() {
        let m = marker(&[Need::MedicalAid], "remédios", "Bia - 5551");
        assert!(matches_needs(&m, &[Need::MedicalAid]));
        assert!(!matches_needs(&m, &[Need::FoodWater]));
    }

    #[test]
    fn all_required_needs_must_match() {
        let m = marker(&[Need::Cleanup, Need::FoodWater], "lama e fome", "Caio - 5552");
        assert!(matches_needs(&m, &[Need::Cleanup, Need::FoodWater]));
        // AND, not OR: one match out of two is not enough.
        assert!(!matches_needs(&m, &[Need::Cleanup, Need::MedicalAid]));
    }

    #[test]
    fn text_search_covers_description_and_contact() {
        let m = marker(&[], "Telhado destruído", "Dona Maria - 5553");
        assert!(text_matches(&m, "telhado"));
        assert!(text_matches(&m, "MARIA"));
        assert!(!text_matches(&m, "enchente"));
    }
}
