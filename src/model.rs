//! Fleet snapshot and plan entities shared by every core component.
//!
//! These types mirror the store-backed records an external service would
//! hand the core at the start of a planning run (read-only for the
//! duration of that run) and the trips the core hands back at the end.
//! Persistence itself — how a store loads or writes these — is out of
//! scope; only the shape is owned here.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LocationId = Uuid;
pub type RouteId = Uuid;
pub type DriverId = Uuid;
pub type VehicleId = Uuid;
pub type TrailerId = Uuid;
pub type ScheduleId = Uuid;
pub type TripId = Uuid;

/// Litres held by one delivery credit / one full trailer / one full tank.
pub const LITERS_PER_UNIT: u32 = 17_500;

/// Role a location plays in the network. Exactly one of each exists per snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationRole {
    Source,
    Parking,
    Destination,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub role: LocationRole,
}

/// Directed pair with a positive integer duration in minutes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub from: LocationId,
    pub to: LocationId,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverCategory {
    Resident,
    OnCall,
    Emergency,
}

impl DriverCategory {
    /// Lower sorts first: resident < on_call < emergency, per spec priority order.
    pub fn priority_rank(self) -> u8 {
        match self {
            DriverCategory::Resident => 0,
            DriverCategory::OnCall => 1,
            DriverCategory::Emergency => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub home_base: LocationId,
    pub category: DriverCategory,
    pub phone: Option<String>,
    pub hourly_cost: Option<f32>,
    pub adr_licence_expiry: Option<NaiveDate>,
    /// Explicit per-date availability. Absent dates fall back to the resident
    /// default of "available" (see [`Driver::is_available`]).
    pub availability: HashMap<NaiveDate, bool>,
    /// ADR weekly-extension credits already consumed before this run, keyed by
    /// ISO week number within the planning year.
    pub adr_extensions_used: HashMap<u32, u8>,
}

impl Driver {
    /// A driver is available on `date` if explicitly marked so, or — absent an
    /// explicit entry — if they are a resident (spec.md §4.4 step 1: "explicit
    /// per-driver date set, else only residents").
    pub fn is_available(&self, date: NaiveDate) -> bool {
        self.availability
            .get(&date)
            .copied()
            .unwrap_or(self.category == DriverCategory::Resident)
    }
}

/// Tractor with a built-in integrated tank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub plate: String,
    pub base_location: LocationId,
    pub tank_capacity_liters: u32,
    pub location: LocationId,
    pub tank_full: bool,
}

impl Default for Vehicle {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            plate: String::new(),
            base_location: Uuid::nil(),
            tank_capacity_liters: LITERS_PER_UNIT,
            location: Uuid::nil(),
            tank_full: false,
        }
    }
}

/// Detachable trailer. Never reaches the destination (invariant 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trailer {
    pub id: TrailerId,
    pub plate: String,
    pub base_location: LocationId,
    pub capacity_liters: u32,
    pub location: LocationId,
    pub full: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    Confirmed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub required_liters: u32,
    pub include_weekend: bool,
    pub status: ScheduleStatus,
    pub initial_trailer_states: HashMap<TrailerId, bool>,
    pub initial_vehicle_states: HashMap<VehicleId, bool>,
}

/// Accumulated driving minutes for one driver on one date, plus its ISO week.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DriverWorkLog {
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub driving_minutes: u32,
    pub iso_week: u32,
    pub extended_day: bool,
}

/// Wire-stable trip-type vocabulary (spec.md §6; persisted verbatim).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripType {
    #[serde(rename = "SHUTTLE_LIVIGNO")]
    ShuttleLivigno,
    #[serde(rename = "SUPPLY_MILANO")]
    SupplyMilano,
    #[serde(rename = "FULL_ROUND")]
    FullRound,
    #[serde(rename = "TRANSFER_TIRANO")]
    TransferTirano,
    #[serde(rename = "SHUTTLE_FROM_LIVIGNO")]
    ShuttleFromLivigno,
    #[serde(rename = "SUPPLY_FROM_LIVIGNO")]
    SupplyFromLivigno,
}

impl TripType {
    /// Delivery-credit litres per spec.md §6's table.
    pub fn delivery_liters(self) -> u32 {
        match self {
            TripType::ShuttleLivigno
            | TripType::ShuttleFromLivigno
            | TripType::SupplyFromLivigno
            | TripType::FullRound => LITERS_PER_UNIT,
            TripType::SupplyMilano | TripType::TransferTirano => 0,
        }
    }

    /// Whether this trip type physically visits the destination (for the
    /// entry-window check).
    pub fn visits_destination(self) -> bool {
        matches!(
            self,
            TripType::ShuttleLivigno
                | TripType::ShuttleFromLivigno
                | TripType::SupplyFromLivigno
                | TripType::FullRound
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

/// One trailer's role within a trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailerBinding {
    pub trailer_id: TrailerId,
    pub liters_loaded: u32,
    pub drop_off_location_id: Option<LocationId>,
    pub is_pickup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub schedule_id: ScheduleId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub date: NaiveDate,
    pub departure_time_minutes: u32,
    pub return_time_minutes: u32,
    pub trip_type: TripType,
    pub status: TripStatus,
    pub trailers: Vec<TrailerBinding>,
}

/// Read-only collection of entity records for one planning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetSnapshot {
    pub locations: Vec<Location>,
    pub routes: Vec<Route>,
    pub drivers: Vec<Driver>,
    pub vehicles: Vec<Vehicle>,
    pub trailers: Vec<Trailer>,
    pub work_logs: Vec<DriverWorkLog>,
}

impl FleetSnapshot {
    pub fn location_with_role(&self, role: LocationRole) -> Option<&Location> {
        self.locations.iter().find(|l| l.role == role)
    }

    pub fn route_duration(&self, from: LocationId, to: LocationId) -> Option<u32> {
        self.routes
            .iter()
            .find(|r| r.from == from && r.to == to)
            .map(|r| r.duration_minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(category: DriverCategory) -> Driver {
        Driver {
            id: Uuid::new_v4(),
            name: "test".into(),
            home_base: Uuid::new_v4(),
            category,
            phone: None,
            hourly_cost: None,
            adr_licence_expiry: None,
            availability: HashMap::new(),
            adr_extensions_used: HashMap::new(),
        }
    }

    #[test]
    fn resident_defaults_to_available() {
        let d = driver(DriverCategory::Resident);
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        assert!(d.is_available(date));
    }

    #[test]
    fn on_call_defaults_to_unavailable() {
        let d = driver(DriverCategory::OnCall);
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        assert!(!d.is_available(date));
    }

    #[test]
    fn explicit_availability_overrides_default() {
        let mut d = driver(DriverCategory::Resident);
        let date = NaiveDate::from_ymd_opt(2026, 7, 27).unwrap();
        d.availability.insert(date, false);
        assert!(!d.is_available(date));
    }

    #[test]
    fn trip_type_liters_table_matches_spec() {
        assert_eq!(TripType::ShuttleLivigno.delivery_liters(), 17_500);
        assert_eq!(TripType::ShuttleFromLivigno.delivery_liters(), 17_500);
        assert_eq!(TripType::SupplyFromLivigno.delivery_liters(), 17_500);
        assert_eq!(TripType::FullRound.delivery_liters(), 17_500);
        assert_eq!(TripType::SupplyMilano.delivery_liters(), 0);
        assert_eq!(TripType::TransferTirano.delivery_liters(), 0);
    }

    #[test]
    fn trip_type_serialises_bit_exact() {
        let json = serde_json::to_string(&TripType::ShuttleFromLivigno).unwrap();
        assert_eq!(json, "\"SHUTTLE_FROM_LIVIGNO\"");
    }
}
