//! C5: binds the abstract (driver-index, task, slot) assignments either
//! pipeline produces onto concrete tractor, trailer, and driver identities
//! (spec.md §4.5).

use std::collections::VecDeque;

use chrono::NaiveDate;

use crate::cpsat::types::{SolverOutput, TaskTag};
use crate::error::CoreError;
use crate::model::{
    Driver, DriverId, FleetSnapshot, ScheduleId, Trailer, TrailerBinding, TrailerId, Trip,
    TripStatus, Vehicle, VehicleId,
};
use crate::resolver::PlanningParameters;

/// Which home-base pool a driver index is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverSide {
    Parking,
    Destination,
}

/// One abstract assignment, as produced by either C2+C3 or C4.
#[derive(Debug, Clone, Copy)]
pub struct TaskAssignment {
    pub driver_index: usize,
    pub side: DriverSide,
    pub tag: TaskTag,
    pub slot: u32,
}

/// One working day's plan in the shape C5 consumes, regardless of origin.
#[derive(Debug, Clone)]
pub struct DayPlan {
    pub date: NaiveDate,
    pub ft_start: u32,
    pub et_start: u32,
    pub tf_start: u32,
    pub te_start: u32,
    /// Sorted by start slot, per spec.md §4.5 step 2 and §5's ordering guarantee.
    pub assignments: Vec<TaskAssignment>,
}

/// Converts a solver result into the shared `DayPlan` shape.
pub fn from_solver_output(output: &SolverOutput) -> Vec<DayPlan> {
    output
        .days
        .iter()
        .map(|day| {
            let mut assignments = Vec::new();
            for (index, schedule) in day.drivers_t.iter().enumerate() {
                for start in &schedule.starts {
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Parking,
                        tag: start.task,
                        slot: start.slot,
                    });
                }
            }
            for (index, schedule) in day.drivers_l.iter().enumerate() {
                for start in &schedule.starts {
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Destination,
                        tag: start.task,
                        slot: start.slot,
                    });
                }
            }
            for refill in &day.refill_starts {
                assignments.push(TaskAssignment {
                    driver_index: usize::MAX,
                    side: DriverSide::Parking,
                    tag: refill.task,
                    slot: refill.slot,
                });
            }
            assignments.sort_by_key(|a| a.slot);
            DayPlan {
                date: day.date,
                ft_start: day.ft_start,
                et_start: day.et_start,
                tf_start: day.tf_start,
                te_start: day.te_start,
                assignments,
            }
        })
        .collect()
}

fn base_minutes(tag: TaskTag) -> u32 {
    match tag {
        TaskTag::S => 345,
        TaskTag::U => 240,
        TaskTag::V => 270,
        TaskTag::A => 585,
        TaskTag::R => 30,
        // Full round has no dedicated entry in spec.md §4.2's duration
        // table; it reuses A's Milano-Livigno-Milano leg time since it
        // covers the same ground end to end in one driver's day.
        TaskTag::F => 585,
    }
}

#[derive(Debug, Clone)]
struct Pending<T> {
    available_at: u32,
    id: T,
}

/// Result of a completed materialisation run.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MaterializedPlan {
    pub schedule_id: ScheduleId,
    pub trips: Vec<Trip>,
    pub objective_liters: u32,
}

/// Binds abstract assignments onto concrete resources, day by day, in the
/// order spec.md §4.5 describes. `solver_objective_liters` is the value the
/// equivalence check (step 4) validates against; pass `None` when the
/// caller has no authoritative objective to compare against (e.g. a
/// capacity-estimation run).
pub fn materialize(
    params: &PlanningParameters,
    snapshot: &FleetSnapshot,
    days: &[DayPlan],
    solver_objective_liters: Option<u32>,
    slot_minutes: u32,
    shift_start_minutes: u32,
) -> Result<MaterializedPlan, CoreError> {
    let mut trips = Vec::new();

    // Local partition of trailer/vehicle identities at parking, reset at
    // the start of every day per spec.md §4.5 step 1.
    let parking_trailers: Vec<&Trailer> = snapshot
        .trailers
        .iter()
        .filter(|t| t.location == params.location_parking)
        .collect();
    let parking_vehicles: Vec<&Vehicle> = snapshot
        .vehicles
        .iter()
        .filter(|v| v.location == params.location_parking)
        .collect();
    let destination_vehicles: Vec<&Vehicle> = snapshot
        .vehicles
        .iter()
        .filter(|v| v.location == params.location_destination)
        .collect();

    for day in days {
        let (available_parking, available_destination) = params.available_drivers_on(day.date);

        let mut full_trailers: VecDeque<TrailerId> = parking_trailers
            .iter()
            .take(day.ft_start as usize)
            .map(|t| t.id)
            .collect();
        let mut empty_trailers: VecDeque<TrailerId> = parking_trailers
            .iter()
            .skip(day.ft_start as usize)
            .take(day.et_start as usize)
            .map(|t| t.id)
            .collect();
        let mut full_tanks: VecDeque<VehicleId> = parking_vehicles
            .iter()
            .take(day.tf_start as usize)
            .map(|v| v.id)
            .collect();
        let mut empty_tanks: VecDeque<VehicleId> = parking_vehicles
            .iter()
            .skip(day.tf_start as usize)
            .take(day.te_start as usize)
            .map(|v| v.id)
            .collect();
        let mut destination_tractors: VecDeque<VehicleId> =
            destination_vehicles.iter().map(|v| v.id).collect();

        let mut pending_full_trailers: Vec<Pending<TrailerId>> = Vec::new();
        let mut pending_empty_trailers: Vec<Pending<TrailerId>> = Vec::new();
        let mut pending_full_tanks: Vec<Pending<VehicleId>> = Vec::new();
        let mut pending_empty_tanks: Vec<Pending<VehicleId>> = Vec::new();

        for assignment in &day.assignments {
            let mature_now = |queue: &mut Vec<Pending<_>>,
                               target: &mut VecDeque<_>,
                               at: u32| {
                queue.retain(|p| {
                    if p.available_at <= at {
                        target.push_back(p.id.clone());
                        false
                    } else {
                        true
                    }
                });
            };
            let start_minute = assignment.slot * slot_minutes;
            mature_now(&mut pending_full_trailers, &mut full_trailers, start_minute);
            mature_now(&mut pending_empty_trailers, &mut empty_trailers, start_minute);
            mature_now(&mut pending_full_tanks, &mut full_tanks, start_minute);
            mature_now(&mut pending_empty_tanks, &mut empty_tanks, start_minute);

            let duration = base_minutes(assignment.tag);
            let departure = shift_start_minutes + start_minute;
            let return_time = departure + duration;

            let driver_id = if assignment.tag == TaskTag::R {
                // R may be attached to any currently-free parking driver for
                // traceability only (spec.md §4.5 step 2).
                available_parking
                    .first()
                    .map(|d| d.id)
                    .ok_or_else(|| CoreError::MaterialisationMismatch("no parking driver to attach R to".into()))?
            } else {
                match assignment.side {
                    DriverSide::Parking => available_parking
                        .get(assignment.driver_index)
                        .map(|d| d.id)
                        .ok_or_else(|| {
                            CoreError::MaterialisationMismatch(format!(
                                "no parking driver at index {}",
                                assignment.driver_index
                            ))
                        })?,
                    DriverSide::Destination => available_destination
                        .get(assignment.driver_index)
                        .map(|d| d.id)
                        .ok_or_else(|| {
                            CoreError::MaterialisationMismatch(format!(
                                "no destination driver at index {}",
                                assignment.driver_index
                            ))
                        })?,
                }
            };

            let (vehicle_id, trailers) = match assignment.tag {
                TaskTag::S => {
                    let vehicle = empty_tanks.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no empty-tank tractor for S".into())
                    })?;
                    let trailer = empty_trailers.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no empty trailer for S".into())
                    })?;
                    pending_full_tanks.push(Pending { available_at: return_time, id: vehicle });
                    pending_full_trailers.push(Pending { available_at: return_time, id: trailer });
                    (
                        vehicle,
                        vec![TrailerBinding {
                            trailer_id: trailer,
                            liters_loaded: crate::model::LITERS_PER_UNIT,
                            drop_off_location_id: None,
                            is_pickup: true,
                        }],
                    )
                }
                TaskTag::U => {
                    let vehicle = full_tanks.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no full-tank tractor for U".into())
                    })?;
                    pending_empty_tanks.push(Pending { available_at: return_time, id: vehicle });
                    (vehicle, Vec::new())
                }
                TaskTag::V => {
                    let vehicle = destination_tractors.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no destination tractor for V".into())
                    })?;
                    let trailer = full_trailers.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no full trailer for V".into())
                    })?;
                    pending_empty_trailers.push(Pending { available_at: return_time, id: trailer });
                    destination_tractors.push_back(vehicle);
                    (
                        vehicle,
                        vec![TrailerBinding {
                            trailer_id: trailer,
                            liters_loaded: crate::model::LITERS_PER_UNIT,
                            drop_off_location_id: Some(params.location_destination),
                            is_pickup: false,
                        }],
                    )
                }
                TaskTag::A => {
                    let vehicle = destination_tractors.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no destination tractor for A".into())
                    })?;
                    let trailer = empty_trailers.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no empty trailer for A".into())
                    })?;
                    pending_full_trailers.push(Pending { available_at: return_time, id: trailer });
                    destination_tractors.push_back(vehicle);
                    (
                        vehicle,
                        vec![TrailerBinding {
                            trailer_id: trailer,
                            liters_loaded: crate::model::LITERS_PER_UNIT,
                            drop_off_location_id: Some(params.location_parking),
                            is_pickup: false,
                        }],
                    )
                }
                TaskTag::R => {
                    let vehicle = empty_tanks.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no empty-tank tractor for R".into())
                    })?;
                    let trailer = full_trailers.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no full trailer for R".into())
                    })?;
                    pending_full_tanks.push(Pending { available_at: return_time, id: vehicle });
                    pending_empty_trailers.push(Pending { available_at: return_time, id: trailer });
                    (
                        vehicle,
                        vec![TrailerBinding {
                            trailer_id: trailer,
                            liters_loaded: 0,
                            drop_off_location_id: None,
                            is_pickup: false,
                        }],
                    )
                }
                TaskTag::F => {
                    // Same-day Milano-Livigno-Milano run through the
                    // tractor's own tank, no trailer involved: an empty
                    // tank leaves parking and an empty tank comes back.
                    let vehicle = empty_tanks.pop_front().ok_or_else(|| {
                        CoreError::MaterialisationMismatch("no empty-tank tractor for full round".into())
                    })?;
                    pending_empty_tanks.push(Pending { available_at: return_time, id: vehicle });
                    (vehicle, Vec::new())
                }
            };

            trips.push(Trip {
                id: uuid::Uuid::new_v4(),
                schedule_id: params.schedule_id,
                driver_id,
                vehicle_id,
                date: day.date,
                departure_time_minutes: departure,
                return_time_minutes: return_time,
                trip_type: assignment.tag.to_trip_type(),
                status: TripStatus::Planned,
                trailers,
            });
        }

        // Unconditionally mature everything left pending at day end
        // (spec.md §4.4 step 6 / §4.5 carry-over), so tomorrow's reset sees
        // the full count even if a task's return time exceeds the shift.
        for p in pending_full_trailers.drain(..) {
            full_trailers.push_back(p.id);
        }
        for p in pending_empty_trailers.drain(..) {
            empty_trailers.push_back(p.id);
        }
        for p in pending_full_tanks.drain(..) {
            full_tanks.push_back(p.id);
        }
        for p in pending_empty_tanks.drain(..) {
            empty_tanks.push_back(p.id);
        }
    }

    // Credit comes from the trip type's delivery table (spec.md §6), not
    // from trailer bindings: U and the full round both deliver a unit
    // through the tractor's integrated tank with no trailer involved.
    let objective_liters: u32 = trips.iter().map(|t| t.trip_type.delivery_liters()).sum();

    if let Some(expected) = solver_objective_liters {
        if objective_liters != expected {
            return Err(CoreError::MaterialisationMismatch(format!(
                "materialised litres {objective_liters} != solver objective {expected}"
            )));
        }
    }

    Ok(MaterializedPlan {
        schedule_id: params.schedule_id,
        trips,
        objective_liters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DriverCategory, Location, LocationRole, Route, ScheduleStatus, Vehicle};
    use crate::resolver::{resolve, RouteDurations};
    use uuid::Uuid;

    fn snapshot_and_params() -> (FleetSnapshot, PlanningParameters) {
        let source = Uuid::new_v4();
        let parking = Uuid::new_v4();
        let destination = Uuid::new_v4();
        let mut snapshot = FleetSnapshot::default();
        snapshot.locations = vec![
            Location { id: source, name: "Milano".into(), role: LocationRole::Source },
            Location { id: parking, name: "Tirano".into(), role: LocationRole::Parking },
            Location { id: destination, name: "Livigno".into(), role: LocationRole::Destination },
        ];
        snapshot.routes = vec![
            Route { id: Uuid::new_v4(), from: source, to: parking, duration_minutes: 90 },
            Route { id: Uuid::new_v4(), from: parking, to: source, duration_minutes: 90 },
            Route { id: Uuid::new_v4(), from: parking, to: destination, duration_minutes: 60 },
            Route { id: Uuid::new_v4(), from: destination, to: parking, duration_minutes: 60 },
        ];
        let driver = Driver {
            id: Uuid::new_v4(),
            name: "Resident".into(),
            home_base: parking,
            category: DriverCategory::Resident,
            phone: None,
            hourly_cost: None,
            adr_licence_expiry: None,
            availability: Default::default(),
            adr_extensions_used: Default::default(),
        };
        snapshot.drivers = vec![driver];
        snapshot.vehicles = vec![Vehicle { id: Uuid::new_v4(), location: parking, tank_full: true, ..Default::default() }];
        snapshot.trailers = vec![Trailer {
            id: Uuid::new_v4(),
            plate: "T1".into(),
            base_location: parking,
            capacity_liters: 17_500,
            location: parking,
            full: true,
        }];
        let schedule = crate::model::Schedule {
            id: Uuid::new_v4(),
            name: "t".into(),
            start_date: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 7, 27).unwrap(),
            required_liters: 17_500,
            include_weekend: false,
            status: ScheduleStatus::Draft,
            initial_trailer_states: Default::default(),
            initial_vehicle_states: Default::default(),
        };
        let params = resolve(&snapshot, &schedule, None).unwrap();
        (snapshot, params)
    }

    #[test]
    fn materializes_single_u_task() {
        let (snapshot, params) = snapshot_and_params();
        let day = DayPlan {
            date: params.working_days[0],
            ft_start: 0,
            et_start: 0,
            tf_start: 1,
            te_start: 0,
            assignments: vec![TaskAssignment {
                driver_index: 0,
                side: DriverSide::Parking,
                tag: TaskTag::U,
                slot: 0,
            }],
        };
        let plan = materialize(&params, &snapshot, &[day], Some(17_500), 15, 360).unwrap();
        assert_eq!(plan.trips.len(), 1);
        assert_eq!(plan.objective_liters, 17_500);
    }

    #[test]
    fn mismatch_against_objective_is_rejected() {
        let (snapshot, params) = snapshot_and_params();
        let day = DayPlan {
            date: params.working_days[0],
            ft_start: 0,
            et_start: 0,
            tf_start: 1,
            te_start: 0,
            assignments: vec![TaskAssignment {
                driver_index: 0,
                side: DriverSide::Parking,
                tag: TaskTag::U,
                slot: 0,
            }],
        };
        let err = materialize(&params, &snapshot, &[day], Some(35_000), 15, 360).unwrap_err();
        assert!(matches!(err, CoreError::MaterialisationMismatch(_)));
    }

    #[test]
    fn missing_resource_is_rejected() {
        let (snapshot, params) = snapshot_and_params();
        let day = DayPlan {
            date: params.working_days[0],
            ft_start: 0,
            et_start: 0,
            tf_start: 0,
            te_start: 1,
            assignments: vec![TaskAssignment {
                driver_index: 0,
                side: DriverSide::Parking,
                tag: TaskTag::U,
                slot: 0,
            }],
        };
        let err = materialize(&params, &snapshot, &[day], None, 15, 360).unwrap_err();
        assert!(matches!(err, CoreError::MaterialisationMismatch(_)));
    }
}
