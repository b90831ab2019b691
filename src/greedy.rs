//! C4: day-by-day greedy simulation (spec.md §4.4).
//!
//! Unlike the solver child process, this scheduler works over real driver
//! identities so it can track each driver's actual rolling driving-minute
//! budget across the whole horizon, and it is the only component able to
//! emit a [`TripType::FullRound`] trip — a same-day round trip a single
//! driver carries out end to end when no parking-side resource is free but
//! the driver still has budget, an empty tank to take, and an ADR
//! extension to spend on one. Every branch that visits the destination
//! (V, A, the supply+shuttle combo, and the full round) is checked against
//! the same destination entry window the solver enforces (spec.md §4.7) —
//! there is no carve-out for greedy-only task shapes.

use std::collections::{HashMap, VecDeque};

use chrono::{Datelike, NaiveDate};

use crate::config::EngineConfig;
use crate::cpsat::types::TaskTag;
use crate::error::CoreError;
use crate::materialize::{DayPlan, DriverSide, TaskAssignment};
use crate::model::{Driver, DriverCategory, DriverId, FleetSnapshot, Schedule};
use crate::resolver::{resolve, AvailabilityOverride, PlanningParameters};

/// Outcome of one greedy run: the day-by-day plan plus the totals the
/// resolver's equivalence check and capacity-planning callers compare
/// against.
#[derive(Debug, Clone)]
pub struct GreedyResult {
    pub days: Vec<DayPlan>,
    pub objective_deliveries: u32,
    pub objective_liters: u32,
    /// Driver-days used this run, for tie-breaking capacity-search candidates.
    pub driver_days: u32,
}

#[derive(Debug, Clone, Default)]
struct DriverAccum {
    current_week: Option<u32>,
    week_minutes: u32,
    prev_week_minutes: u32,
    adr_credits_this_week: u8,
    extended_today: bool,
}

impl DriverAccum {
    fn roll_week(&mut self, iso_week: u32) {
        if self.current_week != Some(iso_week) {
            self.prev_week_minutes = self.week_minutes;
            self.week_minutes = 0;
            self.adr_credits_this_week = 0;
            self.current_week = Some(iso_week);
        }
        self.extended_today = false;
    }

    fn biweekly_minutes(&self) -> u32 {
        self.week_minutes + self.prev_week_minutes
    }

    fn day_cap(&mut self, limits: &crate::config::DrivingLimitsConfig) -> u32 {
        if self.extended_today {
            return limits.drive_minutes_extended;
        }
        let credit_available = self.adr_credits_this_week < limits.max_extended_days_per_week
            && self.biweekly_minutes() + limits.drive_minutes_extended
                <= limits.biweekly_drive_limit_minutes
            && self.week_minutes + limits.drive_minutes_extended <= limits.weekly_drive_limit_minutes;
        if credit_available {
            self.extended_today = true;
            self.adr_credits_this_week += 1;
            limits.drive_minutes_extended
        } else {
            limits.drive_minutes_daily
        }
    }

    fn remaining_today(&self, used: u32, limits: &crate::config::DrivingLimitsConfig) -> u32 {
        let cap = if self.extended_today {
            limits.drive_minutes_extended
        } else {
            limits.drive_minutes_daily
        };
        cap.saturating_sub(used)
    }
}

struct Pending {
    available_at: u32,
    count: u32,
}

fn mature(pending: &mut VecDeque<Pending>, up_to: u32, pool: &mut u32) {
    while let Some(front) = pending.front() {
        if front.available_at <= up_to {
            *pool += pending.pop_front().unwrap().count;
        } else {
            break;
        }
    }
}

/// Simulates one pass over `params` with the given configuration, producing
/// a schedule and its delivery objective.
pub fn schedule(params: &PlanningParameters, config: &EngineConfig) -> GreedyResult {
    let mut accums: HashMap<DriverId, DriverAccum> = HashMap::new();
    let mut ft = params.initial_full_trailers;
    let mut et = params.initial_empty_trailers;
    let mut tf = params.initial_full_tanks;
    let mut te = params.initial_empty_tanks;
    let tractors_at_destination = params.tractors_at_destination;

    let mut days = Vec::with_capacity(params.working_days.len());
    let mut objective_deliveries = 0u32;
    let mut driver_days = 0u32;

    for date in &params.working_days {
        let iso_week = date.iso_week().week();
        let (available_parking, available_destination) = params.available_drivers_on(*date);
        for driver in available_parking.iter().chain(available_destination.iter()) {
            accums.entry(driver.id).or_default().roll_week(iso_week);
        }

        let ft_start = ft;
        let et_start = et;
        let tf_start = tf;
        let te_start = te;

        let mut pending_ft: VecDeque<Pending> = VecDeque::new();
        let mut pending_et: VecDeque<Pending> = VecDeque::new();
        let mut pending_tf: VecDeque<Pending> = VecDeque::new();
        let mut pending_te: VecDeque<Pending> = VecDeque::new();

        let mut cursor_parking = vec![0u32; available_parking.len()];
        let mut cursor_destination = vec![0u32; available_destination.len()];
        let mut destination_tractor_busy_until = vec![0u32; tractors_at_destination as usize];

        // "Excess" parking drivers: those beyond the pool of tanks that
        // could realistically turn over today (spec.md §4.4's priority
        // split). They only ever run S, so scarce full/empty tanks go to
        // the drivers who can actually shuttle them onward.
        let non_excess_parking = (tf_start + te_start) as usize;

        let mut assignments: Vec<TaskAssignment> = Vec::new();

        let mut progressed = true;
        let mut iterations = 0;
        while progressed && iterations < 100 {
            progressed = false;
            iterations += 1;

            for (index, driver) in available_destination.iter().enumerate() {
                let accum = accums.get_mut(&driver.id).unwrap();
                let at = cursor_destination[index];
                let used = at;
                let cap = accum.day_cap(&config.limits).max(used);
                let remaining = cap.saturating_sub(used);

                if has_free_destination_tractor(&destination_tractor_busy_until, at) && ft > 0 {
                    let arrival = destination_arrival_minutes(TaskTag::V, at, config.tasks.shuttle_from_minutes);
                    if remaining >= config.tasks.shuttle_from_minutes && within_entry_window(config, arrival) {
                        ft -= 1;
                        let finish = at + config.tasks.shuttle_from_minutes;
                        book_destination_tractor(&mut destination_tractor_busy_until, at, config.tasks.shuttle_from_minutes);
                        pending_et.push_back(Pending { available_at: finish, count: 1 });
                        assignments.push(TaskAssignment {
                            driver_index: index,
                            side: DriverSide::Destination,
                            tag: TaskTag::V,
                            slot: at / config.timing.slot_minutes,
                        });
                        cursor_destination[index] = finish;
                        accum.week_minutes += config.tasks.shuttle_from_minutes;
                        objective_deliveries += 1;
                        progressed = true;
                        continue;
                    }
                }
                if has_free_destination_tractor(&destination_tractor_busy_until, at) && et > 0 {
                    let arrival = destination_arrival_minutes(TaskTag::A, at, config.tasks.supply_from_minutes);
                    if remaining >= config.tasks.supply_from_minutes && within_entry_window(config, arrival) {
                        et -= 1;
                        let finish = at + config.tasks.supply_from_minutes;
                        book_destination_tractor(&mut destination_tractor_busy_until, at, config.tasks.supply_from_minutes);
                        pending_ft.push_back(Pending { available_at: finish, count: 1 });
                        assignments.push(TaskAssignment {
                            driver_index: index,
                            side: DriverSide::Destination,
                            tag: TaskTag::A,
                            slot: at / config.timing.slot_minutes,
                        });
                        cursor_destination[index] = finish;
                        accum.week_minutes += config.tasks.supply_from_minutes;
                        objective_deliveries += 1;
                        progressed = true;
                    }
                }
            }

            let order: Vec<usize> = (0..available_parking.len()).collect();
            for &index in &order {
                let driver = available_parking[index];
                let accum = accums.get_mut(&driver.id).unwrap();
                let at = cursor_parking[index];
                let used = at;
                let is_excess = index >= non_excess_parking;

                if is_excess {
                    let cap = accum.day_cap(&config.limits).max(used);
                    let remaining = cap.saturating_sub(used);
                    if et > 0 && remaining >= config.tasks.supply_minutes {
                        et -= 1;
                        let finish = at + config.tasks.supply_minutes;
                        pending_tf.push_back(Pending { available_at: finish, count: 1 });
                        pending_ft.push_back(Pending { available_at: finish, count: 0 });
                        assignments.push(TaskAssignment {
                            driver_index: index,
                            side: DriverSide::Parking,
                            tag: TaskTag::S,
                            slot: at / config.timing.slot_minutes,
                        });
                        cursor_parking[index] = finish;
                        accum.week_minutes += config.tasks.supply_minutes;
                        progressed = true;
                    }
                    continue;
                }

                let cap = accum.day_cap(&config.limits).max(used);
                let remaining = cap.saturating_sub(used);

                if tf > 0 && remaining >= config.tasks.shuttle_minutes {
                    tf -= 1;
                    let finish = at + config.tasks.shuttle_minutes;
                    pending_te.push_back(Pending { available_at: finish, count: 1 });
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Parking,
                        tag: TaskTag::U,
                        slot: at / config.timing.slot_minutes,
                    });
                    cursor_parking[index] = finish;
                    accum.week_minutes += config.tasks.shuttle_minutes;
                    objective_deliveries += 1;
                    progressed = true;
                    continue;
                }
                if te > 0 && ft > 0 && remaining >= config.tasks.refill_minutes {
                    te -= 1;
                    ft -= 1;
                    let finish = at + config.tasks.refill_minutes;
                    pending_tf.push_back(Pending { available_at: finish, count: 1 });
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Parking,
                        tag: TaskTag::R,
                        slot: at / config.timing.slot_minutes,
                    });
                    cursor_parking[index] = finish;
                    // R accrues no driving minutes (spec.md §4.6 resolution) but
                    // still occupies the driver's slot for the day.
                    progressed = true;
                    continue;
                }
                if et > 0 && remaining >= config.tasks.supply_minutes {
                    et -= 1;
                    let finish = at + config.tasks.supply_minutes;
                    pending_tf.push_back(Pending { available_at: finish, count: 1 });
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Parking,
                        tag: TaskTag::S,
                        slot: at / config.timing.slot_minutes,
                    });
                    cursor_parking[index] = finish;
                    accum.week_minutes += config.tasks.supply_minutes;
                    progressed = true;
                    continue;
                }
                // Combo: supply immediately followed by shuttling the same
                // trailer onward, spending an ADR extension credit in one shot.
                let combo_minutes = config.tasks.supply_minutes + config.tasks.shuttle_minutes;
                let combo_arrival = destination_arrival_minutes(TaskTag::V, at, combo_minutes);
                if et > 0
                    && !accum.extended_today
                    && accum.adr_credits_this_week < config.limits.max_extended_days_per_week
                    && accum.biweekly_minutes() + combo_minutes <= config.limits.biweekly_drive_limit_minutes
                    && accum.week_minutes + combo_minutes <= config.limits.weekly_drive_limit_minutes
                    && used + combo_minutes <= config.limits.drive_minutes_extended
                    && within_entry_window(config, combo_arrival)
                {
                    et -= 1;
                    let finish = at + combo_minutes;
                    accum.extended_today = true;
                    accum.adr_credits_this_week += 1;
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Parking,
                        tag: TaskTag::S,
                        slot: at / config.timing.slot_minutes,
                    });
                    cursor_parking[index] = finish;
                    accum.week_minutes += combo_minutes;
                    objective_deliveries += 1;
                    progressed = true;
                    continue;
                }
                // Full round: no parking trailer resource is free, but an
                // empty tank and an extension credit are, so the driver
                // takes it all the way Milano-Livigno-Milano themselves.
                let full_round_arrival =
                    destination_arrival_minutes(TaskTag::F, at, config.tasks.supply_from_minutes);
                if te > 0
                    && !accum.extended_today
                    && accum.adr_credits_this_week < config.limits.max_extended_days_per_week
                    && accum.biweekly_minutes() + config.tasks.supply_from_minutes
                        <= config.limits.biweekly_drive_limit_minutes
                    && accum.week_minutes + config.tasks.supply_from_minutes
                        <= config.limits.weekly_drive_limit_minutes
                    && used + config.tasks.supply_from_minutes <= config.limits.drive_minutes_extended
                    && within_entry_window(config, full_round_arrival)
                {
                    te -= 1;
                    let finish = at + config.tasks.supply_from_minutes;
                    accum.extended_today = true;
                    accum.adr_credits_this_week += 1;
                    pending_te.push_back(Pending { available_at: finish, count: 1 });
                    assignments.push(TaskAssignment {
                        driver_index: index,
                        side: DriverSide::Parking,
                        tag: TaskTag::F,
                        slot: at / config.timing.slot_minutes,
                    });
                    cursor_parking[index] = finish;
                    accum.week_minutes += config.tasks.supply_from_minutes;
                    objective_deliveries += 1;
                    progressed = true;
                }
            }

            let horizon = cursor_parking
                .iter()
                .chain(cursor_destination.iter())
                .copied()
                .max()
                .unwrap_or(0);
            mature(&mut pending_ft, horizon, &mut ft);
            mature(&mut pending_et, horizon, &mut et);
            mature(&mut pending_tf, horizon, &mut tf);
            mature(&mut pending_te, horizon, &mut te);
        }

        mature(&mut pending_ft, u32::MAX, &mut ft);
        mature(&mut pending_et, u32::MAX, &mut et);
        mature(&mut pending_tf, u32::MAX, &mut tf);
        mature(&mut pending_te, u32::MAX, &mut te);

        assignments.sort_by_key(|a| a.slot);
        driver_days += (available_parking.len() + available_destination.len()) as u32;
        days.push(DayPlan {
            date: *date,
            ft_start,
            et_start,
            tf_start,
            te_start,
            assignments,
        });
    }

    GreedyResult {
        objective_liters: objective_deliveries * config.fleet.liters_per_unit,
        objective_deliveries,
        days,
        driver_days,
    }
}

/// Minute offset (relative to shift start) at which a destination-visiting
/// task actually reaches Livigno, mirroring `bin/solver.rs`'s helper of the
/// same name. `S`, `U`'s return leg and `R` never enter the destination so
/// they have no arrival to check.
fn destination_arrival_minutes(tag: TaskTag, start_minutes: u32, duration: u32) -> Option<u32> {
    match tag {
        TaskTag::U => Some(start_minutes + duration / 2),
        TaskTag::V | TaskTag::A => Some(start_minutes + duration),
        // Full round chains a source pickup leg then a destination drop-off
        // leg before heading back to parking; it reaches the destination
        // after roughly the first two of its three legs.
        TaskTag::F => Some(start_minutes + duration * 2 / 3),
        TaskTag::S | TaskTag::R => None,
    }
}

fn within_entry_window(config: &EngineConfig, arrival: Option<u32>) -> bool {
    match arrival {
        None => true,
        Some(minutes) => {
            minutes >= config.timing.livigno_entry_start_minutes
                && minutes <= config.timing.livigno_entry_end_minutes
        }
    }
}

fn has_free_destination_tractor(busy_until: &[u32], at: u32) -> bool {
    busy_until.iter().any(|&until| until <= at)
}

fn book_destination_tractor(busy_until: &mut [u32], at: u32, duration: u32) {
    if let Some(slot) = busy_until.iter_mut().find(|until| **until <= at) {
        *slot = at + duration;
    }
}

/// Runs the monotone multi-configuration search spec.md §4.4 requires: the
/// resident-only baseline, the caller's requested availability, and each
/// non-resident driver added one additional available day at a time. Returns
/// whichever configuration delivers the most litres (ties broken by fewer
/// driver-days), so a superset of availability never reports less than a
/// subset did.
pub fn capacity_search(
    snapshot: &FleetSnapshot,
    schedule_request: &Schedule,
    config: &EngineConfig,
) -> Result<GreedyResult, CoreError> {
    let requested = resolve(snapshot, schedule_request, None)?;
    let mut best = self::schedule(&requested, config);

    let mut residents_only = AvailabilityOverride::new();
    for driver in &snapshot.drivers {
        if driver.category != DriverCategory::Resident {
            let mut per_date = HashMap::new();
            for date in &requested.working_days {
                per_date.insert(*date, false);
            }
            residents_only.insert(driver.id, per_date);
        }
    }
    let baseline_params = resolve(snapshot, schedule_request, Some(&residents_only))?;
    let baseline = self::schedule(&baseline_params, config);
    if is_better(&baseline, &best) {
        best = baseline;
    }

    for driver in non_resident_drivers(snapshot) {
        for date in &requested.working_days {
            if driver.is_available(*date) {
                continue;
            }
            let mut overrides = AvailabilityOverride::new();
            overrides
                .entry(driver.id)
                .or_default()
                .insert(*date, true);
            let params = resolve(snapshot, schedule_request, Some(&overrides))?;
            let candidate = self::schedule(&params, config);
            if is_better(&candidate, &best) {
                best = candidate;
            }
        }
    }

    Ok(best)
}

fn non_resident_drivers(snapshot: &FleetSnapshot) -> impl Iterator<Item = &Driver> {
    snapshot
        .drivers
        .iter()
        .filter(|d| d.category != DriverCategory::Resident)
}

fn is_better(a: &GreedyResult, b: &GreedyResult) -> bool {
    if a.objective_liters != b.objective_liters {
        return a.objective_liters > b.objective_liters;
    }
    a.driver_days < b.driver_days
}
