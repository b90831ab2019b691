//! `fuelsched-solver`: the child-process search engine C3 drives over JSON
//! on standard streams (spec.md §4.2, §4.3).
//!
//! This is a bounded constructive search, not a full CP-SAT binding: no
//! OR-tools dependency is available to wrap, so this binary is an honest,
//! deterministic stand-in that respects the same constraint classes and
//! speaks the same wire contract a real constraint solver would. It tries a
//! handful of seed-perturbed construction orders within the wall-clock
//! budget and keeps the best.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use chrono::{Datelike, NaiveDate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use fuelsched::cpsat::types::{
    DayResult, DriverSchedule, InitialState, OutputFrame, ProgressReport, RefillStart,
    SolverInput, SolverOutput, SolverStatus, TaskStart, TaskTag,
};

#[tokio::main]
async fn main() -> ExitCode {
    let mut raw = String::new();
    if let Err(e) = io::BufRead::read_line(&mut io::stdin().lock(), &mut raw) {
        eprintln!("fuelsched-solver: reading stdin: {e}");
        return ExitCode::FAILURE;
    }
    let input: SolverInput = match serde_json::from_str(raw.trim()) {
        Ok(input) => input,
        Err(e) => {
            eprintln!("fuelsched-solver: parsing input: {e}");
            let output = SolverOutput {
                status: SolverStatus::ModelInvalid,
                objective_deliveries: 0,
                objective_liters: 0,
                days: Vec::new(),
            };
            print_result(&output);
            return ExitCode::FAILURE;
        }
    };

    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if serde_json::from_str::<serde_json::Value>(&line)
                .ok()
                .and_then(|v| v.get("stop").and_then(|s| s.as_bool()))
                .unwrap_or(false)
            {
                let _ = stop_tx.send(()).await;
            }
        }
    });

    let deadline = Instant::now() + Duration::from_secs(input.time_limit_seconds.max(1) as u64);
    let mut best: Option<SolverOutput> = None;
    let mut solutions_found = 0u32;
    let start_instant = Instant::now();

    for attempt in 0..16u64 {
        if Instant::now() >= deadline || stop_rx.try_recv().is_ok() {
            break;
        }
        let candidate = construct(&input, input.seed.wrapping_add(attempt));
        solutions_found += 1;
        let better = best
            .as_ref()
            .map(|b| is_better(&candidate, b))
            .unwrap_or(true);
        if better {
            best = Some(candidate.clone());
            print_progress(&ProgressReport {
                solutions: solutions_found,
                objective_deliveries: candidate.objective_deliveries,
                objective_liters: candidate.objective_liters,
                elapsed_seconds: start_instant.elapsed().as_secs_f32(),
            });
        }
        // Single-worker, few-candidate search: further attempts rarely help
        // once the first deterministic pass already saturates capacity.
        if input.num_search_workers <= 1 && attempt >= 3 {
            break;
        }
    }

    let mut output = best.unwrap_or(SolverOutput {
        status: SolverStatus::Unknown,
        objective_deliveries: 0,
        objective_liters: 0,
        days: Vec::new(),
    });
    if output.days.is_empty() && !input.d_t.is_empty() {
        output.status = SolverStatus::Infeasible;
    } else if stop_rx.try_recv().is_ok() {
        // best-known plan stands; status already FEASIBLE/OPTIMAL from construct().
    } else if output.status == SolverStatus::Unknown {
        output.status = SolverStatus::Feasible;
    }
    print_result(&output);
    ExitCode::SUCCESS
}

fn is_better(a: &SolverOutput, b: &SolverOutput) -> bool {
    // Maximise deliveries; tie-break on fewer total trips (proxy for the
    // spec's "smaller total tractor distance" second tie-break).
    if a.objective_deliveries != b.objective_deliveries {
        return a.objective_deliveries > b.objective_deliveries;
    }
    trip_count(a) < trip_count(b)
}

fn trip_count(output: &SolverOutput) -> u32 {
    output
        .days
        .iter()
        .map(|d| d.s + d.u + d.v + d.a + d.r)
        .sum()
}

fn print_progress(progress: &ProgressReport) {
    let frame = OutputFrame::Progress {
        progress: *progress,
    };
    println!("{}", serde_json::to_string(&frame).expect("progress frame serialises"));
    let _ = io::stdout().flush();
}

fn print_result(output: &SolverOutput) {
    let frame = OutputFrame::Result {
        result: output.clone(),
    };
    println!("{}", serde_json::to_string(&frame).expect("result frame serialises"));
    let _ = io::stdout().flush();
}

/// Per driver-index rolling accumulators. Driver indices are positional
/// within each day's active roster (0..D_T[d] or 0..D_L[d]); the solver has
/// no visibility into real driver identity continuity across days, so this
/// tracks weekly/biweekly minutes against the index's *position*, which the
/// materialisation stage is free to bind to different concrete drivers day
/// to day. The authoritative per-identity check runs later, in the ADR
/// validator, against the materialised plan.
#[derive(Debug, Clone, Default)]
struct DriverAccum {
    current_week: Option<u32>,
    week_minutes: u32,
    prev_week_minutes: u32,
    /// Combined budget per spec.md §4.2: A-task bookings and extended-day
    /// activations draw from the same rolling-week allowance.
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
}

fn destination_arrival_minutes(tag: TaskTag, start_minutes: u32, duration: u32) -> Option<u32> {
    match tag {
        TaskTag::U => Some(start_minutes + duration / 2),
        TaskTag::V | TaskTag::A => Some(start_minutes + duration),
        TaskTag::S | TaskTag::R => None,
        // The solver child process never constructs F; only the greedy
        // scheduler does, and it checks the entry window itself.
        TaskTag::F => None,
    }
}

fn within_entry_window(input: &SolverInput, arrival: Option<u32>) -> bool {
    match arrival {
        None => true,
        Some(minutes) => {
            minutes >= input.livigno_entry_start_minutes && minutes <= input.livigno_entry_end_minutes
        }
    }
}

/// Base durations, mirroring the §4.2 table (independent of EngineConfig so
/// the solver binary has no build-time dependency on the orchestrator crate's
/// config loading).
const SUPPLY_MINUTES: u32 = 345;
const SHUTTLE_MINUTES: u32 = 240;
const SHUTTLE_FROM_MINUTES: u32 = 270;
const SUPPLY_FROM_MINUTES: u32 = 585;
const REFILL_MINUTES: u32 = 30;

fn construct(input: &SolverInput, seed: u64) -> SolverOutput {
    // Different seeds perturb iteration order only; the resource/time
    // bookkeeping is otherwise identical, which is enough to occasionally
    // surface a higher-objective construction to keep across attempts.
    let reverse_destination = seed % 2 == 1;
    let reverse_parking = (seed / 2) % 2 == 1;
    let slots_per_shift = input.shift_minutes / input.slot_minutes;
    let tractors_at_destination = input
        .total_tractors
        .saturating_sub(input.initial_state.tf + input.initial_state.te);

    let mut ft = input.initial_state.ft;
    let mut et = input.initial_state.et;
    let mut tf = input.initial_state.tf;
    let mut te = input.initial_state.te;

    let max_parking = input.d_t.iter().copied().max().unwrap_or(0) as usize;
    let max_destination = input.d_l.iter().copied().max().unwrap_or(0) as usize;
    let mut parking_accum = vec![DriverAccum::default(); max_parking];
    let mut destination_accum = vec![DriverAccum::default(); max_destination];

    let mut days = Vec::with_capacity(input.d_t.len());
    let mut objective_deliveries = 0u32;

    for (day_index, (&d_t, &d_l)) in input.d_t.iter().zip(input.d_l.iter()).enumerate() {
        let date = input
            .start_date
            .checked_add_signed(chrono::Duration::days(day_index as i64))
            .unwrap_or(input.start_date);
        let iso_week = date.iso_week().week();

        let ft_start = ft;
        let et_start = et;
        let tf_start = tf;
        let te_start = te;

        // Pending resources that mature at a known minute offset within the
        // day (spec.md §4.4 step 5/6: pending queues matured unconditionally
        // by day end; here we simply add them at their maturity slot).
        let mut pending_ft: VecDeque<(u32, u32)> = VecDeque::new(); // (minute, count)
        let mut pending_tf: VecDeque<(u32, u32)> = VecDeque::new();
        let mut pending_et: VecDeque<(u32, u32)> = VecDeque::new();
        let mut pending_te: VecDeque<(u32, u32)> = VecDeque::new();

        let mut cursors_t = vec![0u32; d_t as usize];
        let mut cursors_l = vec![0u32; d_l as usize];
        for i in 0..d_t as usize {
            parking_accum[i].roll_week(iso_week);
        }
        for j in 0..d_l as usize {
            destination_accum[j].roll_week(iso_week);
        }

        let mut drivers_t: Vec<DriverSchedule> = vec![DriverSchedule::default(); d_t as usize];
        let mut drivers_l: Vec<DriverSchedule> = vec![DriverSchedule::default(); d_l as usize];
        let mut refill_starts = Vec::new();
        let (mut s_count, mut u_count, mut v_count, mut a_count, mut r_count) = (0u32, 0u32, 0u32, 0u32, 0u32);
        let mut destination_tractors_busy_until = vec![0u32; tractors_at_destination as usize];

        let mut progressed = true;
        let mut iterations = 0;
        while progressed && iterations < 100 {
            progressed = false;
            iterations += 1;

            // Destination drivers: prefer V (drains FT), else A within ADR budget.
            let destination_order: Vec<usize> = if reverse_destination {
                (0..d_l as usize).rev().collect()
            } else {
                (0..d_l as usize).collect()
            };
            for j in destination_order {
                let accum = &mut destination_accum[j];
                let daily_cap = day_cap(accum, input);
                let free_slot = cursors_l[j];
                if ft > 0 {
                    let arrival = destination_arrival_minutes(TaskTag::V, free_slot, SHUTTLE_FROM_MINUTES);
                    if free_slot + SHUTTLE_FROM_MINUTES <= input.shift_minutes
                        && within_entry_window(input, arrival)
                        && free_slot + SHUTTLE_FROM_MINUTES <= daily_cap
                        && has_free_destination_tractor(&destination_tractors_busy_until, free_slot)
                    {
                        book_destination_tractor(&mut destination_tractors_busy_until, free_slot, SHUTTLE_FROM_MINUTES);
                        ft -= 1;
                        et += 1;
                        objective_deliveries += 1;
                        v_count += 1;
                        drivers_l[j].starts.push(TaskStart {
                            task: TaskTag::V,
                            slot: free_slot / input.slot_minutes,
                        });
                        cursors_l[j] += SHUTTLE_FROM_MINUTES;
                        accum.week_minutes += SHUTTLE_FROM_MINUTES;
                        progressed = true;
                        continue;
                    }
                }
                if et > 0 && accum.adr_credits_this_week < input.max_extended_days_per_week {
                    let arrival = destination_arrival_minutes(TaskTag::A, free_slot, SUPPLY_FROM_MINUTES);
                    if free_slot + SUPPLY_FROM_MINUTES <= input.shift_minutes
                        && within_entry_window(input, arrival)
                        && has_free_destination_tractor(&destination_tractors_busy_until, free_slot)
                    {
                        book_destination_tractor(&mut destination_tractors_busy_until, free_slot, SUPPLY_FROM_MINUTES);
                        et -= 1;
                        pending_ft.push_back((free_slot + SUPPLY_FROM_MINUTES, 1));
                        objective_deliveries += 1;
                        a_count += 1;
                        accum.adr_credits_this_week += 1;
                        drivers_l[j].starts.push(TaskStart {
                            task: TaskTag::A,
                            slot: free_slot / input.slot_minutes,
                        });
                        cursors_l[j] += SUPPLY_FROM_MINUTES;
                        accum.week_minutes += SUPPLY_FROM_MINUTES;
                        progressed = true;
                    }
                }
            }

            // Parking drivers: prefer U (drains Tf), else R (drains FT via
            // refill), else S (builds up FT/Tf from empty stock).
            let parking_order: Vec<usize> = if reverse_parking {
                (0..d_t as usize).rev().collect()
            } else {
                (0..d_t as usize).collect()
            };
            for i in parking_order {
                let accum = &mut parking_accum[i];
                let daily_cap = day_cap(accum, input);
                let free_slot = cursors_t[i];
                if tf > 0 {
                    let arrival = destination_arrival_minutes(TaskTag::U, free_slot, SHUTTLE_MINUTES);
                    if free_slot + SHUTTLE_MINUTES <= input.shift_minutes
                        && free_slot + SHUTTLE_MINUTES <= daily_cap
                        && within_entry_window(input, arrival)
                    {
                        tf -= 1;
                        pending_te.push_back((free_slot + SHUTTLE_MINUTES, 1));
                        objective_deliveries += 1;
                        u_count += 1;
                        drivers_t[i].starts.push(TaskStart {
                            task: TaskTag::U,
                            slot: free_slot / input.slot_minutes,
                        });
                        cursors_t[i] += SHUTTLE_MINUTES;
                        accum.week_minutes += SHUTTLE_MINUTES;
                        progressed = true;
                        continue;
                    }
                }
                if te > 0 && ft > 0 && free_slot + REFILL_MINUTES <= input.shift_minutes {
                    ft -= 1;
                    te -= 1;
                    pending_et.push_back((free_slot + REFILL_MINUTES, 1));
                    pending_tf.push_back((free_slot + REFILL_MINUTES, 1));
                    r_count += 1;
                    refill_starts.push(RefillStart {
                        task: TaskTag::R,
                        slot: free_slot / input.slot_minutes,
                        count: None,
                    });
                    // R has no road travel, so it does not advance the
                    // driver's driving-minute tally, but still claims their
                    // non-overlap time slot (invariant 1).
                    cursors_t[i] += REFILL_MINUTES;
                    progressed = true;
                    continue;
                }
                if et > 0 && free_slot + SUPPLY_MINUTES <= input.shift_minutes && free_slot + SUPPLY_MINUTES <= daily_cap {
                    et -= 1;
                    pending_ft.push_back((free_slot + SUPPLY_MINUTES, 1));
                    pending_tf.push_back((free_slot + SUPPLY_MINUTES, 1));
                    s_count += 1;
                    drivers_t[i].starts.push(TaskStart {
                        task: TaskTag::S,
                        slot: free_slot / input.slot_minutes,
                    });
                    cursors_t[i] += SUPPLY_MINUTES;
                    accum.week_minutes += SUPPLY_MINUTES;
                    progressed = true;
                }
            }

            // Mature any pending resources whose time has come before the
            // next iteration re-evaluates driver options.
            let horizon = cursors_t.iter().chain(cursors_l.iter()).copied().max().unwrap_or(0);
            mature(&mut pending_ft, horizon, &mut ft);
            mature(&mut pending_et, horizon, &mut et);
            mature(&mut pending_tf, horizon, &mut tf);
            mature(&mut pending_te, horizon, &mut te);
        }

        // End of day: unconditionally mature everything still pending.
        mature(&mut pending_ft, u32::MAX, &mut ft);
        mature(&mut pending_et, u32::MAX, &mut et);
        mature(&mut pending_tf, u32::MAX, &mut tf);
        mature(&mut pending_te, u32::MAX, &mut te);

        days.push(DayResult {
            date,
            d_t,
            d_l,
            s: s_count,
            u: u_count,
            v: v_count,
            a: a_count,
            r: r_count,
            drivers_t,
            drivers_l,
            refill_starts,
            ft_start,
            et_start,
            tf_start,
            te_start,
            ft_end: ft,
            et_end: et,
            tf_end: tf,
            te_end: te,
        });
        let _ = slots_per_shift;
    }

    let objective_liters = objective_deliveries * input.liters_per_unit;
    SolverOutput {
        status: SolverStatus::Feasible,
        objective_deliveries,
        objective_liters,
        days,
    }
}

/// The cap in force for this driver-index today. Marks (and, the first time
/// it is actually needed, spends) this week's extended-day credit — the
/// combined A-task/extended-day budget of spec.md §4.2.
fn day_cap(accum: &mut DriverAccum, input: &SolverInput) -> u32 {
    if accum.extended_today {
        return input.drive_minutes_extended;
    }
    let credit_available = accum.adr_credits_this_week < input.max_extended_days_per_week
        && accum.biweekly_minutes() + input.drive_minutes_extended <= input.biweekly_drive_limit_minutes
        && accum.week_minutes + input.drive_minutes_extended <= input.weekly_drive_limit_minutes;
    if credit_available {
        accum.extended_today = true;
        accum.adr_credits_this_week += 1;
        input.drive_minutes_extended
    } else {
        input.drive_minutes_daily
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

fn mature(pending: &mut VecDeque<(u32, u32)>, up_to: u32, pool: &mut u32) {
    while let Some(&(minute, count)) = pending.front() {
        if minute <= up_to {
            *pool += count;
            pending.pop_front();
        } else {
            break;
        }
    }
}
