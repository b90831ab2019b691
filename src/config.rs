//! TOML-based engine configuration and the built-in default preset.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::CoreError;

/// Top-level engine configuration parsed from TOML.
///
/// All fields have defaults matching spec.md §6's solver input block.
/// Load from TOML with [`EngineConfig::from_toml_file`] or use
/// [`EngineConfig::default`] for the built-in baseline.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub timing: TimingConfig,
    pub limits: DrivingLimitsConfig,
    pub fleet: FleetConfig,
    pub tasks: TaskDurationsConfig,
    pub solver: SolverConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            limits: DrivingLimitsConfig::default(),
            fleet: FleetConfig::default(),
            tasks: TaskDurationsConfig::default(),
            solver: SolverConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, CoreError> {
        let raw = fs::read_to_string(path)
            .map_err(|e| CoreError::InputInvalid(format!("reading `{}`: {e}", path.display())))?;
        toml::from_str(&raw)
            .map_err(|e| CoreError::InputInvalid(format!("parsing `{}`: {e}", path.display())))
    }
}

/// Slot/shift discretisation (spec.md §4.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    pub slot_minutes: u32,
    pub shift_minutes: u32,
    pub shift_start_minutes: u32,
    pub livigno_entry_start_minutes: u32,
    pub livigno_entry_end_minutes: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 15,
            shift_minutes: 720,
            shift_start_minutes: 6 * 60,
            livigno_entry_start_minutes: 120,
            livigno_entry_end_minutes: 750,
        }
    }
}

impl TimingConfig {
    pub fn slots_per_shift(&self) -> u32 {
        self.shift_minutes / self.slot_minutes
    }
}

/// ADR driving-time regulation (spec.md §3 invariants 5-6, §4.2).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DrivingLimitsConfig {
    pub drive_minutes_daily: u32,
    pub drive_minutes_extended: u32,
    pub max_extended_days_per_week: u8,
    pub weekly_drive_limit_minutes: u32,
    pub biweekly_drive_limit_minutes: u32,
    pub break_window_minutes: u32,
    pub break_duration_minutes: u32,
    pub max_adr_exceptions_per_week: u8,
    pub soft_warning_threshold_pct: f32,
}

impl Default for DrivingLimitsConfig {
    fn default() -> Self {
        Self {
            drive_minutes_daily: 540,
            drive_minutes_extended: 600,
            max_extended_days_per_week: 2,
            weekly_drive_limit_minutes: 3_360,
            biweekly_drive_limit_minutes: 5_400,
            break_window_minutes: 270,
            break_duration_minutes: 45,
            max_adr_exceptions_per_week: 2,
            soft_warning_threshold_pct: 0.90,
        }
    }
}

/// Fleet-wide physical constants (spec.md §3).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FleetConfig {
    pub liters_per_unit: u32,
    pub default_tank_capacity_liters: u32,
    pub default_trailer_capacity_liters: u32,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            liters_per_unit: 17_500,
            default_tank_capacity_liters: 17_500,
            default_trailer_capacity_liters: 17_500,
        }
    }
}

/// Base minutes per task letter (spec.md §4.2 table).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskDurationsConfig {
    pub supply_minutes: u32,
    pub shuttle_minutes: u32,
    pub shuttle_from_minutes: u32,
    pub supply_from_minutes: u32,
    pub refill_minutes: u32,
}

impl Default for TaskDurationsConfig {
    fn default() -> Self {
        Self {
            supply_minutes: 345,
            shuttle_minutes: 240,
            shuttle_from_minutes: 270,
            supply_from_minutes: 585,
            refill_minutes: 30,
        }
    }
}

/// Solver search controls (spec.md §4.3).
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolverConfig {
    pub time_limit_seconds: u32,
    pub max_time_limit_seconds: u32,
    pub num_search_workers: u32,
    pub seed: u64,
    pub poll_interval_seconds: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_seconds: 60,
            max_time_limit_seconds: 14_400,
            num_search_workers: 1,
            seed: 42,
            poll_interval_seconds: 2,
        }
    }
}
