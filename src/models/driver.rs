use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverStatus {
    Online,
    OnTrip,
    Offline,
    OnBreak,
}

impl DriverStatus {
    pub fn parse_label(raw: &str) -> Option<Self> {
        let folded: String = raw
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();

        match folded.as_str() {
            "online" | "available" => Some(DriverStatus::Online),
            "ontrip" | "busy" => Some(DriverStatus::OnTrip),
            "offline" => Some(DriverStatus::Offline),
            "onbreak" | "break" => Some(DriverStatus::OnBreak),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VehicleType {
    #[default]
    Sedan,
    Suv,
    Van,
    Motorbike,
    Bicycle,
}

/// A candidate for assignment. Ephemeral: recomputed on every lookup and
/// never kept beyond the lookup response it arrived in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyDriver {
    pub id: Uuid,
    pub name: String,
    pub status: DriverStatus,
    pub distance_m: f64,
    pub eta_secs: u32,
    pub rating: f64,
    pub vehicle: VehicleType,
    pub trust_score: f64,
}
