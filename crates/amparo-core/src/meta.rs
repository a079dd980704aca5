//! Static display metadata keyed by the closed enumerations. Keeping labels
//! and icon names next to the enum variants means an invalid key cannot
//! exist at runtime.

use amparo_types::models::{Need, Role, Status};

pub fn need_label(need: Need) -> &'static str {
    match need {
        Need::Cleanup => "Limpeza no Local",
        Need::FoodWater => "Comida & Água",
        Need::Reconstruction => "Reconstrução",
        Need::MedicalAid => "Assistência Médica",
        Need::ClothCleanup => "Limpeza de Roupas",
        Need::Medicines => "Medicamentos",
        Need::Cloth => "Roupas",
        Need::CivilDefenseCheckup => "Visita Defesa Civil",
        Need::Trousseau => "Enxoval",
        Need::Furniture => "Móveis",
    }
}

pub fn need_icon(need: Need) -> &'static str {
    match need {
        Need::Cleanup => "clean_hands",
        Need::FoodWater => "local_offer",
        Need::Reconstruction => "home_repair_service",
        Need::MedicalAid => "local_hospital",
        Need::ClothCleanup => "cleaning_services",
        Need::Medicines => "medication",
        Need::Cloth => "checkroom",
        Need::CivilDefenseCheckup => "health_and_safety",
        Need::Trousseau => "bed",
        Need::Furniture => "chair",
    }
}

pub fn status_label(status: Status) -> &'static str {
    match status {
        Status::Triage => "Em Análise",
        Status::InProgress => "Em Progresso",
        Status::Done => "Concluído",
        Status::Cancelled => "Cancelado",
    }
}

pub fn status_color(status: Status) -> &'static str {
    match status {
        Status::Triage => "#FF9800",
        Status::InProgress => "#2196F3",
        Status::Done => "#4CAF50",
        Status::Cancelled => "#F44336",
    }
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "Administrador",
        Role::CityHall => "Funcionário Municipal",
        Role::Triage => "Triagem",
        Role::Management => "Gestão",
        Role::Helping => "Ajudando",
        Role::Super => "Super",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_need_has_metadata() {
        for need in Need::ALL {
            assert!(!need_label(need).is_empty());
            assert!(!need_icon(need).is_empty());
        }
    }

    #[test]
    fn status_colors_are_hex() {
        for status in Status::ALL {
            assert!(status_color(status).starts_with('#'));
        }
    }
}
