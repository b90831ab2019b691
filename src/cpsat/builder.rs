//! C2: translates resolved planning parameters into the solver's JSON
//! input document. The five task letters, their resource effects, and the
//! constraint classes themselves live in the child process (`fuelsched-solver`)
//! so this builder stays a thin, testable translation step.

use crate::config::EngineConfig;
use crate::cpsat::types::{InitialState, SolverInput};
use crate::resolver::PlanningParameters;

/// Caller-supplied search controls (spec.md §4.3).
#[derive(Debug, Clone, Copy)]
pub struct SolverLimits {
    pub time_limit_seconds: u32,
    pub num_search_workers: u32,
    pub seed: u64,
}

impl SolverLimits {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            time_limit_seconds: config.solver.time_limit_seconds,
            num_search_workers: config.solver.num_search_workers,
            seed: config.solver.seed,
        }
    }

    /// Clamp to the optimal-run ceiling (spec.md §4.3: up to 14 400 s).
    pub fn clamped(self, config: &EngineConfig) -> Self {
        Self {
            time_limit_seconds: self
                .time_limit_seconds
                .min(config.solver.max_time_limit_seconds),
            ..self
        }
    }
}

pub fn build_input(
    params: &PlanningParameters,
    config: &EngineConfig,
    limits: &SolverLimits,
) -> SolverInput {
    let start_date = *params
        .working_days
        .first()
        .expect("resolver guarantees a non-empty working-day list");
    let end_date = *params
        .working_days
        .last()
        .expect("resolver guarantees a non-empty working-day list");

    SolverInput {
        start_date,
        end_date,
        d_t: params.d_t.clone(),
        d_l: params.d_l.clone(),
        initial_state: InitialState {
            ft: params.initial_full_trailers,
            et: params.initial_empty_trailers,
            tf: params.initial_full_tanks,
            te: params.initial_empty_tanks,
        },
        liters_per_unit: config.fleet.liters_per_unit,
        total_trailers: params.total_trailers,
        total_tractors: params.total_tractors,
        shift_minutes: config.timing.shift_minutes,
        slot_minutes: config.timing.slot_minutes,
        drive_minutes_daily: config.limits.drive_minutes_daily,
        drive_minutes_extended: config.limits.drive_minutes_extended,
        max_extended_days_per_week: config.limits.max_extended_days_per_week,
        weekly_drive_limit_minutes: config.limits.weekly_drive_limit_minutes,
        biweekly_drive_limit_minutes: config.limits.biweekly_drive_limit_minutes,
        livigno_entry_start_minutes: config.timing.livigno_entry_start_minutes,
        livigno_entry_end_minutes: config.timing.livigno_entry_end_minutes,
        time_limit_seconds: limits.time_limit_seconds,
        num_search_workers: limits.num_search_workers,
        seed: limits.seed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::RouteDurations;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn params() -> PlanningParameters {
        PlanningParameters {
            schedule_id: Uuid::new_v4(),
            working_days: vec![NaiveDate::from_ymd_opt(2026, 7, 27).unwrap()],
            location_source: Uuid::new_v4(),
            location_parking: Uuid::new_v4(),
            location_destination: Uuid::new_v4(),
            routes: RouteDurations {
                source_to_parking: 90,
                parking_to_source: 90,
                parking_to_destination: 60,
                destination_to_parking: 60,
            },
            drivers_parking: Vec::new(),
            drivers_destination: Vec::new(),
            d_t: vec![2],
            d_l: vec![1],
            initial_full_trailers: 4,
            initial_empty_trailers: 0,
            initial_full_tanks: 0,
            initial_empty_tanks: 3,
            total_trailers: 4,
            total_tractors: 3,
            tractors_at_destination: 1,
            required_liters: 70_000,
            vehicles: Vec::new(),
            trailers: Vec::new(),
            work_logs: Vec::new(),
        }
    }

    #[test]
    fn builds_input_with_spec_defaults() {
        let config = EngineConfig::default();
        let limits = SolverLimits::from_config(&config);
        let input = build_input(&params(), &config, &limits);
        assert_eq!(input.d_t, vec![2]);
        assert_eq!(input.initial_state.ft, 4);
        assert_eq!(input.shift_minutes, 720);
        assert_eq!(input.liters_per_unit, 17_500);
        assert_eq!(input.time_limit_seconds, 60);
    }

    #[test]
    fn limits_clamp_to_configured_ceiling() {
        let config = EngineConfig::default();
        let limits = SolverLimits {
            time_limit_seconds: 99_999,
            num_search_workers: 1,
            seed: 1,
        }
        .clamped(&config);
        assert_eq!(limits.time_limit_seconds, config.solver.max_time_limit_seconds);
    }
}
