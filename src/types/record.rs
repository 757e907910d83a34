//! Record types for the vehicle registry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A registered vehicle.
///
/// `created_at` is the primary ordering key for browsing and `id` the
/// tiebreak key; together they define the total order every page query
/// relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    /// Unique vehicle id.
    pub id: Uuid,

    /// When the record entered the registry.
    pub created_at: DateTime<Utc>,

    /// Plate number as registered.
    pub plate_number: String,

    /// Chassis number, when known.
    pub chassis_number: Option<String>,

    /// LTO registration number, when known.
    pub registration_number: Option<String>,

    /// Current driver's full name.
    pub driver_name: String,

    /// Id of the office the vehicle is assigned to.
    pub office_id: Uuid,

    /// Name of the office the vehicle is assigned to.
    pub office_name: String,

    /// Vehicle category (e.g. "Truck", "Sedan").
    pub vehicle_type: String,

    /// Engine category (e.g. "Diesel", "Gasoline").
    pub engine_type: String,

    /// Number of wheels.
    pub wheels: i64,

    /// Most recent emission test, attached by the batched enrichment step.
    /// `None` when enrichment was not requested or no test exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_test: Option<LatestTest>,
}

/// Input for registering a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVehicle {
    /// Plate number as registered.
    pub plate_number: String,
    /// Chassis number, when known.
    pub chassis_number: Option<String>,
    /// LTO registration number, when known.
    pub registration_number: Option<String>,
    /// Current driver's full name.
    pub driver_name: String,
    /// Id of the office the vehicle is assigned to.
    pub office_id: Uuid,
    /// Name of the office the vehicle is assigned to.
    pub office_name: String,
    /// Vehicle category.
    pub vehicle_type: String,
    /// Engine category.
    pub engine_type: String,
    /// Number of wheels.
    pub wheels: i64,
    /// Registration timestamp. `None` means "now"; imports and backfills may
    /// supply an explicit value.
    pub created_at: Option<DateTime<Utc>>,
}

/// An emission test performed on a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmissionTest {
    /// Unique test id.
    pub id: Uuid,
    /// The tested vehicle.
    pub vehicle_id: Uuid,
    /// Date the test was performed.
    pub test_date: NaiveDate,
    /// Calendar year of the testing period.
    pub year: i32,
    /// Quarter of the testing period (1-4).
    pub quarter: i32,
    /// Whether the vehicle passed.
    pub result: bool,
}

/// Input for recording an emission test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEmissionTest {
    /// The tested vehicle.
    pub vehicle_id: Uuid,
    /// Date the test was performed.
    pub test_date: NaiveDate,
    /// Calendar year of the testing period.
    pub year: i32,
    /// Quarter of the testing period (1-4).
    pub quarter: i32,
    /// Whether the vehicle passed.
    pub result: bool,
}

/// The latest emission test for a vehicle, reduced from its test history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatestTest {
    /// Date of the most recent test.
    pub test_date: NaiveDate,
    /// Whether the vehicle passed that test.
    pub result: bool,
}

/// Distinct attribute values present in the registry, for filter dropdowns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Office names with at least one vehicle.
    pub offices: Vec<String>,
    /// Vehicle categories in use.
    pub vehicle_types: Vec<String>,
    /// Engine categories in use.
    pub engine_types: Vec<String>,
    /// Wheel counts in use.
    pub wheels: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Vehicle {
        Vehicle {
            id: Uuid::nil(),
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
            plate_number: "ABC-1234".to_string(),
            chassis_number: None,
            registration_number: None,
            driver_name: "Juan dela Cruz".to_string(),
            office_id: Uuid::nil(),
            office_name: "City ENRO".to_string(),
            vehicle_type: "Truck".to_string(),
            engine_type: "Diesel".to_string(),
            wheels: 6,
            latest_test: None,
        }
    }

    #[test]
    fn test_unenriched_vehicle_omits_latest_test() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("latest_test").is_none());
        assert_eq!(json["plate_number"], "ABC-1234");
    }

    #[test]
    fn test_enriched_vehicle_serializes_latest_test() {
        let mut vehicle = sample();
        vehicle.latest_test = Some(LatestTest {
            test_date: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
            result: true,
        });

        let json = serde_json::to_value(vehicle).unwrap();
        assert_eq!(json["latest_test"]["result"], true);
        assert_eq!(json["latest_test"]["test_date"], "2024-05-20");
    }
}
