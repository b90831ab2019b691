//! Universal properties from spec.md §8, checked against whole-pipeline runs
//! (resolver -> greedy scheduler -> materialiser -> ADR validator).

mod common;

use std::collections::HashMap;

use chrono::NaiveDate;
use fuelsched::adr;
use fuelsched::config::EngineConfig;
use fuelsched::greedy;
use fuelsched::materialize;
use fuelsched::model::{DriverId, TrailerId, VehicleId};
use fuelsched::resolver::{resolve, AvailabilityOverride};

fn resource_rich_snapshot() -> (common::Topology, fuelsched::model::FleetSnapshot) {
    let topo = common::topology();
    let mut snapshot = common::empty_snapshot(&topo);
    for _ in 0..4 {
        common::add_trailer(&mut snapshot, topo.parking, true);
    }
    common::add_trailer(&mut snapshot, topo.parking, false);
    common::add_trailer(&mut snapshot, topo.parking, false);
    common::add_tractor(&mut snapshot, topo.destination, true);
    common::add_tractor(&mut snapshot, topo.parking, true);
    common::add_tractor(&mut snapshot, topo.parking, true);
    common::add_resident(&mut snapshot, topo.destination);
    common::add_resident(&mut snapshot, topo.parking);
    common::add_resident(&mut snapshot, topo.parking);
    (topo, snapshot)
}

/// Property 1: no two trips assigned to the same driver, vehicle, or trailer
/// overlap in time.
#[test]
fn no_double_booked_driver_vehicle_or_trailer() {
    let (_, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);
    let plan = materialize::materialize(
        &params,
        &snapshot,
        &result.days,
        Some(result.objective_liters),
        config.timing.slot_minutes,
        config.timing.shift_start_minutes,
    )
    .unwrap();

    let mut by_driver: HashMap<(DriverId, NaiveDate), Vec<(u32, u32)>> = HashMap::new();
    let mut by_vehicle: HashMap<(VehicleId, NaiveDate), Vec<(u32, u32)>> = HashMap::new();
    let mut by_trailer: HashMap<(TrailerId, NaiveDate), Vec<(u32, u32)>> = HashMap::new();
    for trip in &plan.trips {
        let window = (trip.departure_time_minutes, trip.return_time_minutes);
        by_driver.entry((trip.driver_id, trip.date)).or_default().push(window);
        by_vehicle.entry((trip.vehicle_id, trip.date)).or_default().push(window);
        for binding in &trip.trailers {
            by_trailer.entry((binding.trailer_id, trip.date)).or_default().push(window);
        }
    }
    for windows in by_driver.values().chain(by_vehicle.values()).chain(by_trailer.values()) {
        assert_no_overlap(windows);
    }
}

fn assert_no_overlap(windows: &[(u32, u32)]) {
    let mut sorted = windows.to_vec();
    sorted.sort();
    for pair in sorted.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlapping windows: {pair:?}");
    }
}

/// Property 2 (shift half): every trip's `[departureTime, returnTime)`
/// window lies within its day's shift window.
#[test]
fn trips_stay_within_the_shift_window() {
    let (_, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);
    let plan = materialize::materialize(
        &params,
        &snapshot,
        &result.days,
        Some(result.objective_liters),
        config.timing.slot_minutes,
        config.timing.shift_start_minutes,
    )
    .unwrap();

    let shift_end = config.timing.shift_start_minutes + config.timing.shift_minutes;
    for trip in &plan.trips {
        assert!(trip.departure_time_minutes >= config.timing.shift_start_minutes);
        assert!(trip.return_time_minutes <= shift_end, "{trip:?} overruns the shift");
    }
}

/// Arrival-at-destination offset (minutes into the trip), mirroring the
/// formulas `greedy::schedule` and `bin/solver.rs` use when admitting a
/// destination-visiting task against the entry window.
fn arrival_offset(trip_type: fuelsched::model::TripType, duration: u32) -> Option<u32> {
    use fuelsched::model::TripType;
    match trip_type {
        TripType::ShuttleLivigno => Some(duration / 2),
        TripType::ShuttleFromLivigno | TripType::SupplyFromLivigno => Some(duration),
        TripType::FullRound => Some(duration * 2 / 3),
        TripType::SupplyMilano | TripType::TransferTirano => None,
    }
}

/// Property 2 (entry-window half): every trip that physically visits the
/// destination arrives there within the configured Livigno entry window.
#[test]
fn destination_visits_land_within_the_entry_window() {
    let (_, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);
    let plan = materialize::materialize(
        &params,
        &snapshot,
        &result.days,
        Some(result.objective_liters),
        config.timing.slot_minutes,
        config.timing.shift_start_minutes,
    )
    .unwrap();

    let window_start = config.timing.shift_start_minutes + config.timing.livigno_entry_start_minutes;
    let window_end = config.timing.shift_start_minutes + config.timing.livigno_entry_end_minutes;

    for trip in &plan.trips {
        if !trip.trip_type.visits_destination() {
            continue;
        }
        let duration = trip.return_time_minutes - trip.departure_time_minutes;
        let Some(offset) = arrival_offset(trip.trip_type, duration) else {
            continue;
        };
        let arrival = trip.departure_time_minutes + offset;
        assert!(
            arrival >= window_start && arrival <= window_end,
            "{trip:?} arrives at {arrival}, outside [{window_start}, {window_end}]"
        );
    }
}

/// Property 3: the ADR validator never flags a plan the greedy scheduler
/// itself produced, since the scheduler enforces the same caps while
/// building it.
#[test]
fn greedy_plans_pass_their_own_adr_validation() {
    let (_, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);
    let plan = materialize::materialize(
        &params,
        &snapshot,
        &result.days,
        Some(result.objective_liters),
        config.timing.slot_minutes,
        config.timing.shift_start_minutes,
    )
    .unwrap();

    let report = adr::validate(&plan, &snapshot.drivers, &snapshot.work_logs, &config.limits);
    assert!(report.is_clean(), "{:?}", report.violations);
}

/// Property 4: trailer and tank pools are conserved day over day — nothing
/// is created or destroyed, so `ft_start + et_start` (and `tf_start +
/// te_start`) stay constant across the whole horizon.
#[test]
fn fleet_pools_are_conserved_across_days() {
    let topo = common::topology();
    let mut snapshot = common::empty_snapshot(&topo);
    for _ in 0..4 {
        common::add_trailer(&mut snapshot, topo.parking, true);
    }
    common::add_tractor(&mut snapshot, topo.parking, true);
    common::add_tractor(&mut snapshot, topo.parking, true);
    common::add_resident(&mut snapshot, topo.parking);
    common::add_resident(&mut snapshot, topo.parking);

    let schedule = common::date_range_schedule(
        NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
        NaiveDate::from_ymd_opt(2026, 7, 31).unwrap(),
        50_000,
    );
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);

    for day in &result.days {
        assert_eq!(day.ft_start + day.et_start, params.total_trailers);
        assert_eq!(day.tf_start + day.te_start, params.initial_full_tanks + params.initial_empty_tanks);
    }
}

/// Property 5: total delivery-credit litres equals the reported objective —
/// enforced directly by `materialize`, which rejects a mismatch.
#[test]
fn materialized_litres_equal_reported_objective() {
    let (_, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);
    let plan = materialize::materialize(
        &params,
        &snapshot,
        &result.days,
        Some(result.objective_liters),
        config.timing.slot_minutes,
        config.timing.shift_start_minutes,
    )
    .unwrap();
    assert_eq!(plan.objective_liters, result.objective_liters);
}

/// Property 6: widening the availability set never reduces the capacity
/// estimate (`capacity_search`'s monotone guarantee).
#[test]
fn wider_availability_never_reduces_capacity() {
    let (topo, mut snapshot) = resource_rich_snapshot();
    let on_call = common::add_driver(&mut snapshot, topo.parking, fuelsched::model::DriverCategory::OnCall);
    let schedule = common::one_day_schedule(35_000);
    let config = EngineConfig::default();

    let narrow = resolve(&snapshot, &schedule, None).unwrap();
    let narrow_result = greedy::schedule(&narrow, &config);

    let mut overrides = AvailabilityOverride::new();
    overrides.entry(on_call).or_default().insert(schedule.start_date, true);
    let wide = resolve(&snapshot, &schedule, Some(&overrides)).unwrap();
    let wide_result = greedy::schedule(&wide, &config);

    assert!(wide_result.objective_liters >= narrow_result.objective_liters);
}

/// Property 7: re-running the greedy scheduler on an unchanged input is
/// deterministic (idempotent in its assignment decisions and objective).
#[test]
fn greedy_schedule_is_deterministic() {
    let (_, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();

    let first = greedy::schedule(&params, &config);
    let second = greedy::schedule(&params, &config);

    assert_eq!(first.objective_liters, second.objective_liters);
    assert_eq!(format!("{:?}", first.days), format!("{:?}", second.days));
}

/// Property 8: every full-trailer pickup binding is consumed from the
/// parking pool and returns there (or to source), never left registered at
/// the destination location.
#[test]
fn trailers_never_end_up_registered_at_destination() {
    let (topo, snapshot) = resource_rich_snapshot();
    let schedule = common::one_day_schedule(35_000);
    let params = resolve(&snapshot, &schedule, None).unwrap();
    let config = EngineConfig::default();
    let result = greedy::schedule(&params, &config);
    let plan = materialize::materialize(
        &params,
        &snapshot,
        &result.days,
        Some(result.objective_liters),
        config.timing.slot_minutes,
        config.timing.shift_start_minutes,
    )
    .unwrap();

    for trip in &plan.trips {
        for binding in &trip.trailers {
            assert_ne!(
                (binding.drop_off_location_id, binding.is_pickup),
                (Some(topo.destination), true),
                "a pickup binding must never claim the destination as drop-off"
            );
        }
    }
}
