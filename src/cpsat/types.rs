//! Bit-exact JSON wire shapes for the solver child process (spec.md §6).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One of the five fixed-length task letters (spec.md §4.2), plus the
/// legacy `F` (full round) tag the greedy scheduler alone can emit
/// (spec.md §6) — the solver child process never constructs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskTag {
    S,
    U,
    V,
    A,
    R,
    F,
}

impl TaskTag {
    pub fn to_trip_type(self) -> crate::model::TripType {
        use crate::model::TripType;
        match self {
            TaskTag::S => TripType::SupplyMilano,
            TaskTag::U => TripType::ShuttleLivigno,
            TaskTag::V => TripType::ShuttleFromLivigno,
            TaskTag::A => TripType::SupplyFromLivigno,
            TaskTag::R => TripType::TransferTirano,
            TaskTag::F => TripType::FullRound,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InitialState {
    #[serde(rename = "FT")]
    pub ft: u32,
    #[serde(rename = "ET")]
    pub et: u32,
    #[serde(rename = "Tf")]
    pub tf: u32,
    #[serde(rename = "Te")]
    pub te: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverInput {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(rename = "D_T")]
    pub d_t: Vec<u32>,
    #[serde(rename = "D_L")]
    pub d_l: Vec<u32>,
    pub initial_state: InitialState,
    pub liters_per_unit: u32,
    pub total_trailers: u32,
    pub total_tractors: u32,
    pub shift_minutes: u32,
    pub slot_minutes: u32,
    pub drive_minutes_daily: u32,
    pub drive_minutes_extended: u32,
    pub max_extended_days_per_week: u8,
    pub weekly_drive_limit_minutes: u32,
    pub biweekly_drive_limit_minutes: u32,
    pub livigno_entry_start_minutes: u32,
    pub livigno_entry_end_minutes: u32,
    pub time_limit_seconds: u32,
    pub num_search_workers: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SolverStatus {
    Optimal,
    Feasible,
    Infeasible,
    #[serde(rename = "MODEL_INVALID")]
    ModelInvalid,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TaskStart {
    pub task: TaskTag,
    pub slot: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverSchedule {
    pub starts: Vec<TaskStart>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RefillStart {
    pub task: TaskTag,
    pub slot: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayResult {
    pub date: NaiveDate,
    #[serde(rename = "D_T")]
    pub d_t: u32,
    #[serde(rename = "D_L")]
    pub d_l: u32,
    #[serde(rename = "S")]
    pub s: u32,
    #[serde(rename = "U")]
    pub u: u32,
    #[serde(rename = "V")]
    pub v: u32,
    #[serde(rename = "A")]
    pub a: u32,
    #[serde(rename = "R")]
    pub r: u32,
    pub drivers_t: Vec<DriverSchedule>,
    pub drivers_l: Vec<DriverSchedule>,
    pub refill_starts: Vec<RefillStart>,
    #[serde(rename = "FT_start")]
    pub ft_start: u32,
    #[serde(rename = "ET_start")]
    pub et_start: u32,
    #[serde(rename = "Tf_start")]
    pub tf_start: u32,
    #[serde(rename = "Te_start")]
    pub te_start: u32,
    #[serde(rename = "FT_end")]
    pub ft_end: u32,
    #[serde(rename = "ET_end")]
    pub et_end: u32,
    #[serde(rename = "Tf_end")]
    pub tf_end: u32,
    #[serde(rename = "Te_end")]
    pub te_end: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOutput {
    pub status: SolverStatus,
    pub objective_deliveries: u32,
    pub objective_liters: u32,
    pub days: Vec<DayResult>,
}

/// Progress frame streamed on stdout while the child searches (spec.md §4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProgressReport {
    pub solutions: u32,
    pub objective_deliveries: u32,
    pub objective_liters: u32,
    pub elapsed_seconds: f32,
}

/// One newline-delimited frame of the child's stdout protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputFrame {
    Progress { progress: ProgressReport },
    Result { result: SolverOutput },
}

/// One newline-delimited frame of the child's stdin protocol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StopMessage {
    pub stop: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_tag_serialises_as_bare_letter() {
        assert_eq!(serde_json::to_string(&TaskTag::V).unwrap(), "\"V\"");
        assert_eq!(serde_json::to_string(&TaskTag::F).unwrap(), "\"F\"");
    }

    #[test]
    fn full_round_tag_maps_to_full_round_trip_type() {
        assert_eq!(TaskTag::F.to_trip_type(), crate::model::TripType::FullRound);
    }

    #[test]
    fn solver_status_matches_spec_vocabulary() {
        assert_eq!(
            serde_json::to_string(&SolverStatus::ModelInvalid).unwrap(),
            "\"MODEL_INVALID\""
        );
        assert_eq!(
            serde_json::to_string(&SolverStatus::Optimal).unwrap(),
            "\"OPTIMAL\""
        );
    }

    #[test]
    fn initial_state_uses_spec_field_names() {
        let state = InitialState { ft: 1, et: 2, tf: 3, te: 4 };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"FT\":1"));
        assert!(json.contains("\"Te\":4"));
    }
}
