//! C1: turns a fleet snapshot and a schedule into the parameters every
//! downstream component (builder, greedy scheduler, materialiser) shares.

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::CoreError;
use crate::model::{
    Driver, DriverId, DriverWorkLog, FleetSnapshot, LocationId, LocationRole, Schedule,
    ScheduleId, Trailer, Vehicle,
};

/// The four directed route durations the core ever needs (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct RouteDurations {
    pub source_to_parking: u32,
    pub parking_to_source: u32,
    pub parking_to_destination: u32,
    pub destination_to_parking: u32,
}

/// Everything C2/C3/C4/C5 need, resolved once per planning run.
#[derive(Debug, Clone)]
pub struct PlanningParameters {
    pub schedule_id: ScheduleId,
    pub working_days: Vec<NaiveDate>,
    pub location_source: LocationId,
    pub location_parking: LocationId,
    pub location_destination: LocationId,
    pub routes: RouteDurations,
    /// Canonical home-base pools, sorted by category priority then id.
    pub drivers_parking: Vec<Driver>,
    pub drivers_destination: Vec<Driver>,
    /// Per-day active-driver counts, aligned index-for-index with `working_days`.
    pub d_t: Vec<u32>,
    pub d_l: Vec<u32>,
    pub initial_full_trailers: u32,
    pub initial_empty_trailers: u32,
    pub initial_full_tanks: u32,
    pub initial_empty_tanks: u32,
    pub total_trailers: u32,
    pub total_tractors: u32,
    pub tractors_at_destination: u32,
    pub required_liters: u32,
    pub vehicles: Vec<Vehicle>,
    pub trailers: Vec<Trailer>,
    pub work_logs: Vec<DriverWorkLog>,
}

impl PlanningParameters {
    /// Available drivers on `date`, partitioned by home base, in canonical order.
    pub fn available_drivers_on(&self, date: NaiveDate) -> (Vec<&Driver>, Vec<&Driver>) {
        let parking = self
            .drivers_parking
            .iter()
            .filter(|d| d.is_available(date))
            .collect();
        let destination = self
            .drivers_destination
            .iter()
            .filter(|d| d.is_available(date))
            .collect();
        (parking, destination)
    }
}

/// Per-driver availability overrides supplied by the caller, keyed by driver
/// then by the specific date being overridden.
pub type AvailabilityOverride = HashMap<DriverId, HashMap<NaiveDate, bool>>;

pub fn resolve(
    snapshot: &FleetSnapshot,
    schedule: &Schedule,
    availability_override: Option<&AvailabilityOverride>,
) -> Result<PlanningParameters, CoreError> {
    let source = snapshot
        .location_with_role(LocationRole::Source)
        .ok_or_else(|| CoreError::InputInvalid("missing source-role location".into()))?;
    let parking = snapshot
        .location_with_role(LocationRole::Parking)
        .ok_or_else(|| CoreError::InputInvalid("missing parking-role location".into()))?;
    let destination = snapshot
        .location_with_role(LocationRole::Destination)
        .ok_or_else(|| CoreError::InputInvalid("missing destination-role location".into()))?;

    let route_duration = |from: LocationId, to: LocationId, label: &str| {
        snapshot
            .route_duration(from, to)
            .ok_or_else(|| CoreError::InputInvalid(format!("missing route: {label}")))
    };
    let routes = RouteDurations {
        source_to_parking: route_duration(source.id, parking.id, "source -> parking")?,
        parking_to_source: route_duration(parking.id, source.id, "parking -> source")?,
        parking_to_destination: route_duration(
            parking.id,
            destination.id,
            "parking -> destination",
        )?,
        destination_to_parking: route_duration(
            destination.id,
            parking.id,
            "destination -> parking",
        )?,
    };

    let mut drivers = snapshot.drivers.clone();
    if let Some(overrides) = availability_override {
        for driver in &mut drivers {
            if let Some(dates) = overrides.get(&driver.id) {
                for (date, available) in dates {
                    driver.availability.insert(*date, *available);
                }
            }
        }
    }
    if drivers.is_empty() {
        return Err(CoreError::InputInvalid("zero active drivers".into()));
    }

    let mut drivers_parking: Vec<Driver> = drivers
        .iter()
        .filter(|d| d.home_base == parking.id)
        .cloned()
        .collect();
    let mut drivers_destination: Vec<Driver> = drivers
        .iter()
        .filter(|d| d.home_base == destination.id)
        .cloned()
        .collect();
    drivers_parking.sort_by_key(|d| (d.category.priority_rank(), d.id));
    drivers_destination.sort_by_key(|d| (d.category.priority_rank(), d.id));
    if drivers_parking.is_empty() && drivers_destination.is_empty() {
        return Err(CoreError::InputInvalid(
            "zero active drivers at either home base".into(),
        ));
    }

    if snapshot.vehicles.is_empty() {
        return Err(CoreError::InputInvalid("zero vehicles".into()));
    }
    if snapshot.trailers.is_empty() {
        return Err(CoreError::InputInvalid("zero trailers".into()));
    }

    let working_days = working_day_list(schedule.start_date, schedule.end_date, schedule.include_weekend);
    if working_days.is_empty() {
        return Err(CoreError::InputInvalid("empty working-day list".into()));
    }

    let d_t: Vec<u32> = working_days
        .iter()
        .map(|d| drivers_parking.iter().filter(|dr| dr.is_available(*d)).count() as u32)
        .collect();
    let d_l: Vec<u32> = working_days
        .iter()
        .map(|d| drivers_destination.iter().filter(|dr| dr.is_available(*d)).count() as u32)
        .collect();

    let trailer_full = |t: &Trailer| {
        schedule
            .initial_trailer_states
            .get(&t.id)
            .copied()
            .unwrap_or(t.full)
    };
    let vehicle_full = |v: &Vehicle| {
        schedule
            .initial_vehicle_states
            .get(&v.id)
            .copied()
            .unwrap_or(v.tank_full)
    };

    let initial_full_trailers = snapshot
        .trailers
        .iter()
        .filter(|t| t.location == parking.id && trailer_full(t))
        .count() as u32;
    let initial_empty_trailers = snapshot
        .trailers
        .iter()
        .filter(|t| t.location == parking.id && !trailer_full(t))
        .count() as u32;
    let initial_full_tanks = snapshot
        .vehicles
        .iter()
        .filter(|v| v.location == parking.id && vehicle_full(v))
        .count() as u32;
    let initial_empty_tanks = snapshot
        .vehicles
        .iter()
        .filter(|v| v.location == parking.id && !vehicle_full(v))
        .count() as u32;
    let tractors_at_destination = snapshot
        .vehicles
        .iter()
        .filter(|v| v.location == destination.id)
        .count() as u32;

    Ok(PlanningParameters {
        schedule_id: schedule.id,
        working_days,
        location_source: source.id,
        location_parking: parking.id,
        location_destination: destination.id,
        routes,
        drivers_parking,
        drivers_destination,
        d_t,
        d_l,
        initial_full_trailers,
        initial_empty_trailers,
        initial_full_tanks,
        initial_empty_tanks,
        total_trailers: snapshot.trailers.len() as u32,
        total_tractors: snapshot.vehicles.len() as u32,
        tractors_at_destination,
        required_liters: schedule.required_liters,
        vehicles: snapshot.vehicles.clone(),
        trailers: snapshot.trailers.clone(),
        work_logs: snapshot.work_logs.clone(),
    })
}

fn working_day_list(start: NaiveDate, end: NaiveDate, include_weekend: bool) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        if include_weekend || !matches!(cursor.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(cursor);
        }
        cursor += Duration::days(1);
    }
    days
}
