//! C7: validates a materialised plan against ADR driver-hour regulation
//! (spec.md §3 invariants 5-6, §4.7).

use std::collections::HashMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::config::DrivingLimitsConfig;
use crate::materialize::MaterializedPlan;
use crate::model::{Driver, DriverId, DriverWorkLog, TripType};

/// The six checkable failure modes (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DailyLimit,
    WeeklyLimit,
    BiweeklyLimit,
    MissingBreak,
    ExtendedDayOveruse,
    LicenceExpired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub driver_id: DriverId,
    pub kind: ViolationKind,
    pub date: chrono::NaiveDate,
    pub detail: String,
}

/// A near-limit condition that does not block confirmation (spec.md §4.7:
/// warn at `soft_warning_threshold_pct` of the relevant cap).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoftWarning {
    pub driver_id: DriverId,
    pub kind: ViolationKind,
    pub date: chrono::NaiveDate,
    pub detail: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdrReport {
    pub violations: Vec<Violation>,
    pub warnings: Vec<SoftWarning>,
}

impl AdrReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

struct WeekTotals {
    daily: HashMap<chrono::NaiveDate, u32>,
    extended_days: u32,
}

/// Validates every trip in `plan` against `limits`, consuming prior
/// `work_logs` so multi-day and rolling-window checks see driving minutes
/// accrued before this planning horizon began.
pub fn validate(
    plan: &MaterializedPlan,
    drivers: &[Driver],
    work_logs: &[DriverWorkLog],
    limits: &DrivingLimitsConfig,
) -> AdrReport {
    let mut report = AdrReport::default();
    let driver_by_id: HashMap<DriverId, &Driver> = drivers.iter().map(|d| (d.id, d)).collect();

    let mut minutes_by_driver_date: HashMap<(DriverId, chrono::NaiveDate), u32> = HashMap::new();
    let mut trips_by_driver_date: HashMap<(DriverId, chrono::NaiveDate), Vec<&crate::model::Trip>> =
        HashMap::new();
    for trip in &plan.trips {
        let minutes = driving_minutes(trip.trip_type, trip.return_time_minutes - trip.departure_time_minutes);
        *minutes_by_driver_date
            .entry((trip.driver_id, trip.date))
            .or_insert(0) += minutes;
        trips_by_driver_date
            .entry((trip.driver_id, trip.date))
            .or_default()
            .push(trip);
    }

    for driver in drivers {
        let Some(driver) = driver_by_id.get(&driver.id) else { continue };
        if let Some(expiry) = driver.adr_licence_expiry {
            for ((driver_id, date), _) in &minutes_by_driver_date {
                if *driver_id == driver.id && *date > expiry {
                    report.violations.push(Violation {
                        driver_id: driver.id,
                        kind: ViolationKind::LicenceExpired,
                        date: *date,
                        detail: format!("ADR licence expired {expiry}, plan uses driver on {date}"),
                    });
                }
            }
        }
    }

    let mut prior_weekly: HashMap<(DriverId, u32), u32> = HashMap::new();
    for log in work_logs {
        *prior_weekly.entry((log.driver_id, log.iso_week)).or_insert(0) += log.driving_minutes;
    }

    let mut all_dates: Vec<(DriverId, chrono::NaiveDate)> =
        minutes_by_driver_date.keys().copied().collect();
    all_dates.sort();

    for &(driver_id, date) in &all_dates {
        let minutes = minutes_by_driver_date[&(driver_id, date)];
        let iso_week = date.iso_week().week();
        let is_extended = minutes > limits.drive_minutes_daily;
        let cap = if is_extended {
            limits.drive_minutes_extended
        } else {
            limits.drive_minutes_daily
        };

        if minutes > cap {
            report.violations.push(Violation {
                driver_id,
                kind: ViolationKind::DailyLimit,
                date,
                detail: format!("{minutes} driving minutes exceeds the {cap}-minute cap"),
            });
        } else if (minutes as f32) >= cap as f32 * limits.soft_warning_threshold_pct {
            report.warnings.push(SoftWarning {
                driver_id,
                kind: ViolationKind::DailyLimit,
                date,
                detail: format!("{minutes}/{cap} daily driving minutes used"),
            });
        }

        if let Some(trips) = trips_by_driver_date.get(&(driver_id, date)) {
            if needs_break(trips, limits) {
                report.violations.push(Violation {
                    driver_id,
                    kind: ViolationKind::MissingBreak,
                    date,
                    detail: format!(
                        "no {}-minute break within a {}-minute driving window",
                        limits.break_duration_minutes, limits.break_window_minutes
                    ),
                });
            }
        }

        let week_total: u32 = all_dates
            .iter()
            .filter(|(d, dt)| *d == driver_id && dt.iso_week().week() == iso_week)
            .map(|(d, dt)| minutes_by_driver_date[&(*d, *dt)])
            .sum();
        if week_total > limits.weekly_drive_limit_minutes {
            report.violations.push(Violation {
                driver_id,
                kind: ViolationKind::WeeklyLimit,
                date,
                detail: format!(
                    "{week_total} weekly driving minutes exceeds the {}-minute cap",
                    limits.weekly_drive_limit_minutes
                ),
            });
        } else if week_total as f32 >= limits.weekly_drive_limit_minutes as f32 * limits.soft_warning_threshold_pct {
            report.warnings.push(SoftWarning {
                driver_id,
                kind: ViolationKind::WeeklyLimit,
                date,
                detail: format!("{week_total}/{} weekly driving minutes used", limits.weekly_drive_limit_minutes),
            });
        }

        let prior = prior_weekly.get(&(driver_id, iso_week.saturating_sub(1))).copied().unwrap_or(0);
        let biweekly_total = week_total + prior;
        if biweekly_total > limits.biweekly_drive_limit_minutes {
            report.violations.push(Violation {
                driver_id,
                kind: ViolationKind::BiweeklyLimit,
                date,
                detail: format!(
                    "{biweekly_total} biweekly driving minutes exceeds the {}-minute cap",
                    limits.biweekly_drive_limit_minutes
                ),
            });
        }

        let extended_days_this_week = all_dates
            .iter()
            .filter(|(d, dt)| {
                *d == driver_id
                    && dt.iso_week().week() == iso_week
                    && minutes_by_driver_date[&(*d, *dt)] > limits.drive_minutes_daily
            })
            .count() as u8;
        if extended_days_this_week > limits.max_extended_days_per_week {
            report.violations.push(Violation {
                driver_id,
                kind: ViolationKind::ExtendedDayOveruse,
                date,
                detail: format!(
                    "{extended_days_this_week} extended days this week exceeds the {}-day allowance",
                    limits.max_extended_days_per_week
                ),
            });
        }
    }

    report
}

fn driving_minutes(trip_type: TripType, duration: u32) -> u32 {
    match trip_type {
        // R accrues no driving minutes but still occupies the slot
        // (spec.md §4.6 open-question resolution).
        TripType::TransferTirano => 0,
        _ => duration,
    }
}

fn needs_break(trips: &[&crate::model::Trip], limits: &DrivingLimitsConfig) -> bool {
    let mut sorted: Vec<&&crate::model::Trip> = trips.iter().collect();
    sorted.sort_by_key(|t| t.departure_time_minutes);
    let mut continuous_since = None;
    let mut previous_end = None;
    for trip in sorted {
        if trip.trip_type == TripType::TransferTirano {
            continue;
        }
        let start = continuous_since.unwrap_or(trip.departure_time_minutes);
        if let Some(prev_end) = previous_end {
            let gap = trip.departure_time_minutes.saturating_sub(prev_end);
            if gap >= limits.break_duration_minutes {
                continuous_since = Some(trip.departure_time_minutes);
                previous_end = Some(trip.return_time_minutes);
                continue;
            }
        }
        if trip.return_time_minutes.saturating_sub(start) > limits.break_window_minutes {
            return true;
        }
        continuous_since = Some(start);
        previous_end = Some(trip.return_time_minutes);
    }
    false
}
