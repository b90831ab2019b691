//! Shared scenario builders for the integration tests, mirroring the
//! fixtures each unit test module already builds inline but parameterised
//! over fleet/driver counts so whole-pipeline scenarios stay readable.

use chrono::NaiveDate;
use fuelsched::model::{
    Driver, DriverCategory, FleetSnapshot, Location, LocationRole, Route, Schedule,
    ScheduleStatus, Trailer, Vehicle,
};
use uuid::Uuid;

pub struct Topology {
    pub source: Uuid,
    pub parking: Uuid,
    pub destination: Uuid,
}

pub fn topology() -> Topology {
    Topology {
        source: Uuid::new_v4(),
        parking: Uuid::new_v4(),
        destination: Uuid::new_v4(),
    }
}

pub fn empty_snapshot(topo: &Topology) -> FleetSnapshot {
    let mut snapshot = FleetSnapshot::default();
    snapshot.locations = vec![
        Location { id: topo.source, name: "Milano".into(), role: LocationRole::Source },
        Location { id: topo.parking, name: "Tirano".into(), role: LocationRole::Parking },
        Location { id: topo.destination, name: "Livigno".into(), role: LocationRole::Destination },
    ];
    snapshot.routes = vec![
        Route { id: Uuid::new_v4(), from: topo.source, to: topo.parking, duration_minutes: 90 },
        Route { id: Uuid::new_v4(), from: topo.parking, to: topo.source, duration_minutes: 90 },
        Route { id: Uuid::new_v4(), from: topo.parking, to: topo.destination, duration_minutes: 60 },
        Route { id: Uuid::new_v4(), from: topo.destination, to: topo.parking, duration_minutes: 60 },
    ];
    snapshot
}

pub fn add_resident(snapshot: &mut FleetSnapshot, home_base: Uuid) -> Uuid {
    add_driver(snapshot, home_base, DriverCategory::Resident)
}

pub fn add_driver(snapshot: &mut FleetSnapshot, home_base: Uuid, category: DriverCategory) -> Uuid {
    let id = Uuid::new_v4();
    snapshot.drivers.push(Driver {
        id,
        name: format!("driver-{id}"),
        home_base,
        category,
        phone: None,
        hourly_cost: None,
        adr_licence_expiry: None,
        availability: Default::default(),
        adr_extensions_used: Default::default(),
    });
    id
}

pub fn add_tractor(snapshot: &mut FleetSnapshot, location: Uuid, tank_full: bool) -> Uuid {
    let id = Uuid::new_v4();
    snapshot.vehicles.push(Vehicle {
        id,
        plate: format!("V-{id}"),
        location,
        tank_full,
        ..Default::default()
    });
    id
}

pub fn add_trailer(snapshot: &mut FleetSnapshot, location: Uuid, full: bool) -> Uuid {
    let id = Uuid::new_v4();
    snapshot.trailers.push(Trailer {
        id,
        plate: format!("T-{id}"),
        base_location: location,
        capacity_liters: 17_500,
        location,
        full,
    });
    id
}

pub fn one_day_schedule(required_liters: u32) -> Schedule {
    date_range_schedule(
        NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
        NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
        required_liters,
    )
}

pub fn date_range_schedule(start: NaiveDate, end: NaiveDate, required_liters: u32) -> Schedule {
    Schedule {
        id: Uuid::new_v4(),
        name: "integration-test".into(),
        start_date: start,
        end_date: end,
        required_liters,
        include_weekend: false,
        status: ScheduleStatus::Draft,
        initial_trailer_states: Default::default(),
        initial_vehicle_states: Default::default(),
    }
}
