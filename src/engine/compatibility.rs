//! Whether a driver can take an order: availability, exclusion and vehicle
//! capacity. Pure; nothing here reads the store.

use serde::Serialize;

use crate::engine::capacity::VehicleCapacity;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::order::Order;

/// What an order asks of a driver. Quantities are sanitized on construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Requirements {
    pub weight_kg: f64,
    pub volume_m3: f64,
    pub excluded_driver_ids: Vec<String>,
}

impl Requirements {
    pub fn new(weight_kg: f64, volume_m3: f64) -> Self {
        Self {
            weight_kg: sanitize(weight_kg),
            volume_m3: sanitize(volume_m3),
            excluded_driver_ids: Vec::new(),
        }
    }

    pub fn for_order(order: &Order) -> Self {
        Self::new(order.weight_kg, order.volume_m3).excluding(order.excluded_driver_ids.clone())
    }

    pub fn excluding(mut self, driver_ids: Vec<String>) -> Self {
        self.excluded_driver_ids = driver_ids;
        self
    }
}

/// Negative, NaN and infinite requirements mean "no requirement".
fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compatibility {
    pub assignable: bool,
    /// Blocking reasons, most relevant first.
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub capacity_kg: Option<f64>,
    pub capacity_volume_m3: Option<f64>,
    pub meets_weight: bool,
    /// True when the volume could not be verified: that is only a warning.
    pub meets_volume: bool,
    pub is_available: bool,
    pub is_excluded: bool,
}

pub fn evaluate(driver: &Driver, requirements: &Requirements) -> Compatibility {
    let capacity = VehicleCapacity::parse(&driver.vehicle_capacity);
    let required_kg = sanitize(requirements.weight_kg);
    let required_m3 = sanitize(requirements.volume_m3);

    let mut reasons = Vec::new();
    let mut warnings = Vec::new();

    let availability_reason = unavailability_reason(driver);
    let is_available = availability_reason.is_none();
    reasons.extend(availability_reason);

    let is_excluded = requirements
        .excluded_driver_ids
        .iter()
        .any(|id| id == &driver.id);
    if is_excluded {
        reasons.push("Chauffeur exclu pour cette commande".to_string());
    }

    let meets_weight = match capacity.weight_kg {
        _ if required_kg == 0.0 => true,
        Some(kg) if kg >= required_kg => true,
        Some(kg) => {
            reasons.push(format!("Capacité insuffisante : {kg} kg < {required_kg} kg requis"));
            false
        }
        None => {
            reasons.push(format!(
                "Capacité du véhicule inconnue — impossible de garantir {required_kg} kg"
            ));
            false
        }
    };

    let meets_volume = match capacity.volume_m3 {
        _ if required_m3 == 0.0 => true,
        Some(m3) if m3 >= required_m3 => true,
        Some(m3) => {
            reasons.push(format!("Volume insuffisant : {m3} m³ < {required_m3} m³ requis"));
            false
        }
        None => {
            warnings.push(format!(
                "Volume du véhicule non renseigné — vérifier manuellement {required_m3} m³"
            ));
            true
        }
    };

    Compatibility {
        assignable: reasons.is_empty(),
        reasons,
        warnings,
        capacity_kg: capacity.weight_kg,
        capacity_volume_m3: capacity.volume_m3,
        meets_weight,
        meets_volume,
        is_available,
        is_excluded,
    }
}

fn unavailability_reason(driver: &Driver) -> Option<String> {
    if !driver.is_active() {
        return Some("Chauffeur inactif — sélection impossible".to_string());
    }

    let reason = match driver.status {
        DriverStatus::Available => return None,
        DriverStatus::Paused => "Chauffeur en pause — sélection impossible",
        DriverStatus::OnTrip => "Chauffeur en course — sélection impossible",
        DriverStatus::Offline => "Chauffeur hors ligne — sélection impossible",
    };
    Some(reason.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{evaluate, Requirements};
    use crate::models::driver::{Driver, DriverLifecycle, DriverStatus};

    fn driver(status: DriverStatus, capacity: &str) -> Driver {
        Driver {
            id: "DRV-101".to_string(),
            name: "test-driver".to_string(),
            status,
            active: true,
            lifecycle_status: DriverLifecycle::Active,
            vehicle_capacity: capacity.to_string(),
            vehicle: None,
            phone: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn weight_above_capacity_blocks_with_capacity_reason() {
        let result = evaluate(&driver(DriverStatus::Available, "800 kg"), &Requirements::new(900.0, 0.0));

        assert!(!result.assignable);
        assert!(!result.meets_weight);
        assert!(result.reasons[0].contains("Capacité"));
    }

    #[test]
    fn weight_within_capacity_is_compatible() {
        let result = evaluate(&driver(DriverStatus::Available, "800 kg"), &Requirements::new(700.0, 0.0));

        assert!(result.assignable);
        assert!(result.meets_weight);
        assert_eq!(result.capacity_kg, Some(800.0));
    }

    #[test]
    fn unknown_volume_is_only_a_warning() {
        let result = evaluate(&driver(DriverStatus::Available, "800 kg"), &Requirements::new(50.0, 2.0));

        assert!(result.assignable);
        assert!(result.reasons.is_empty());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("Volume"));
        assert_eq!(result.capacity_volume_m3, None);
    }

    #[test]
    fn known_insufficient_volume_blocks() {
        let result = evaluate(&driver(DriverStatus::Available, "800 kg / 3 m3"), &Requirements::new(0.0, 5.0));

        assert!(!result.assignable);
        assert!(!result.meets_volume);
        assert!(result.reasons[0].contains("Volume insuffisant"));
    }

    #[test]
    fn unknown_weight_with_requirement_blocks() {
        let result = evaluate(&driver(DriverStatus::Available, "12 m3"), &Requirements::new(10.0, 0.0));

        assert!(!result.assignable);
        assert_eq!(result.capacity_kg, None);
    }

    #[test]
    fn paused_driver_is_never_assignable() {
        let result = evaluate(&driver(DriverStatus::Paused, "800 kg"), &Requirements::new(10.0, 0.0));

        assert!(!result.assignable);
        assert!(!result.is_available);
        assert_eq!(result.reasons[0], "Chauffeur en pause — sélection impossible");
    }

    #[test]
    fn each_unavailable_status_has_its_own_reason() {
        let paused = evaluate(&driver(DriverStatus::Paused, "800 kg"), &Requirements::default());
        let on_trip = evaluate(&driver(DriverStatus::OnTrip, "800 kg"), &Requirements::default());
        let offline = evaluate(&driver(DriverStatus::Offline, "800 kg"), &Requirements::default());

        assert_ne!(paused.reasons, on_trip.reasons);
        assert_ne!(on_trip.reasons, offline.reasons);
        assert_ne!(paused.reasons, offline.reasons);
    }

    #[test]
    fn inactive_driver_is_rejected_even_when_available() {
        let mut inactive = driver(DriverStatus::Available, "800 kg");
        inactive.active = false;
        assert!(!evaluate(&inactive, &Requirements::default()).assignable);

        let mut archived = driver(DriverStatus::Available, "800 kg");
        archived.lifecycle_status = DriverLifecycle::Archived;
        assert!(!evaluate(&archived, &Requirements::default()).assignable);
    }

    #[test]
    fn excluded_driver_is_rejected_regardless_of_fit() {
        let requirements = Requirements::new(10.0, 0.0).excluding(vec!["DRV-101".to_string()]);
        let result = evaluate(&driver(DriverStatus::Available, "800 kg"), &requirements);

        assert!(!result.assignable);
        assert!(result.is_excluded);
        assert!(result.meets_weight);
    }

    #[test]
    fn negative_or_nan_requirements_count_as_none() {
        let result = evaluate(&driver(DriverStatus::Available, "camion"), &Requirements::new(-5.0, f64::NAN));

        assert!(result.assignable);
        assert!(result.warnings.is_empty());
    }
}
