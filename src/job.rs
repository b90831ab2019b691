//! C6: runs a planning request as a cancellable background job, polling the
//! solver driver or the greedy scheduler, and persisting the materialised
//! result through an injected [`PlanSink`] (spec.md §4.6, §5).
//!
//! The store, the real CP-SAT-backed `fuelsched-solver` binary (this crate
//! ships a deterministic stand-in, see `bin/solver.rs`) and whatever talks
//! HTTP to this controller all live outside the core; this module owns only
//! the job state machine and the single in-memory job table spec.md calls
//! for.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::cpsat::builder::{build_input, SolverLimits};
use crate::cpsat::driver::SolverDriver;
use crate::cpsat::types::{ProgressReport, SolverStatus};
use crate::error::{CoreError, Warning};
use crate::greedy;
use crate::materialize::{self, MaterializedPlan};
use crate::model::{FleetSnapshot, Schedule, ScheduleId, Trip};
use crate::resolver::{resolve, AvailabilityOverride};

pub type JobId = Uuid;

/// External vocabulary of spec.md §4.6: `status` in `{queued, running,
/// completed, failed, cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Which planning pipeline a job runs. Both share the same `DayPlan` shape
/// downstream, so C5 treats them identically (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pipeline {
    CpSat,
    Greedy,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::CpSat
    }
}

/// Caller-supplied inputs to `start` (spec.md §4.6: "schedule, availability,
/// limits").
pub struct StartRequest {
    pub snapshot: FleetSnapshot,
    pub schedule: Schedule,
    pub availability_override: Option<AvailabilityOverride>,
    pub pipeline: Pipeline,
    pub limits: SolverLimits,
}

/// A point-in-time view of one job, as `get` returns it.
#[derive(Debug, Clone)]
pub struct JobView {
    pub job_id: JobId,
    pub schedule_id: ScheduleId,
    pub status: JobStatus,
    pub progress: Option<ProgressReport>,
    pub result: Option<MaterializedPlan>,
    pub warnings: Vec<Warning>,
    pub error: Option<String>,
}

struct JobRecord {
    schedule_id: ScheduleId,
    status: JobStatus,
    progress: Option<ProgressReport>,
    result: Option<MaterializedPlan>,
    warnings: Vec<Warning>,
    error: Option<String>,
}

impl JobRecord {
    fn view(&self, job_id: JobId) -> JobView {
        JobView {
            job_id,
            schedule_id: self.schedule_id,
            status: self.status,
            progress: self.progress,
            result: self.result.clone(),
            warnings: self.warnings.clone(),
            error: self.error.clone(),
        }
    }
}

/// The persistence seam spec.md §4.6 describes: "delete all prior trips of
/// the schedule, then insert the new trip list", treated by this crate as
/// one atomic call. A real adapter wraps this in a database transaction;
/// this crate ships only [`InMemoryPlanSink`] for tests and local runs.
pub trait PlanSink: Send + Sync + 'static {
    fn replace(&self, schedule_id: ScheduleId, trips: Vec<Trip>) -> Result<(), CoreError>;
}

/// In-memory test double for [`PlanSink`]; not a substitute for a real store.
#[derive(Default)]
pub struct InMemoryPlanSink {
    plans: Mutex<HashMap<ScheduleId, Vec<Trip>>>,
}

impl InMemoryPlanSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn plan_for(&self, schedule_id: ScheduleId) -> Option<Vec<Trip>> {
        self.plans.lock().expect("plan sink mutex poisoned").get(&schedule_id).cloned()
    }
}

impl PlanSink for InMemoryPlanSink {
    fn replace(&self, schedule_id: ScheduleId, trips: Vec<Trip>) -> Result<(), CoreError> {
        self.plans
            .lock()
            .map_err(|_| CoreError::TransientIo("plan sink mutex poisoned".into()))?
            .insert(schedule_id, trips);
        Ok(())
    }
}

/// C6: exactly one running/queued job per schedule id, backed by an
/// in-memory job table (spec.md §4.6).
pub struct JobController<S: PlanSink> {
    config: Arc<EngineConfig>,
    solver_binary: PathBuf,
    plan_sink: Arc<S>,
    active_schedule: Arc<Mutex<HashMap<ScheduleId, JobId>>>,
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
    stops: Arc<Mutex<HashMap<JobId, watch::Sender<bool>>>>,
}

impl<S: PlanSink> JobController<S> {
    pub fn new(config: EngineConfig, solver_binary: impl Into<PathBuf>, plan_sink: S) -> Self {
        Self {
            config: Arc::new(config),
            solver_binary: solver_binary.into(),
            plan_sink: Arc::new(plan_sink),
            active_schedule: Arc::new(Mutex::new(HashMap::new())),
            jobs: Arc::new(Mutex::new(HashMap::new())),
            stops: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// `start(schedule, availability, limits) -> jobId` (spec.md §4.6).
    /// Rejects a second concurrent job for the same schedule, per spec's
    /// "either queues or rejects per configuration" — this controller rejects.
    pub fn start(&self, request: StartRequest) -> Result<JobId, CoreError> {
        let schedule_id = request.schedule.id;
        {
            let mut active = self.active_schedule.lock().expect("active-schedule mutex poisoned");
            if let Some(existing) = active.get(&schedule_id) {
                let jobs = self.jobs.lock().expect("jobs mutex poisoned");
                if let Some(record) = jobs.get(existing) {
                    if matches!(record.status, JobStatus::Queued | JobStatus::Running) {
                        return Err(CoreError::JobAlreadyRunning);
                    }
                }
            }
            let job_id = Uuid::new_v4();
            active.insert(schedule_id, job_id);

            self.jobs.lock().expect("jobs mutex poisoned").insert(
                job_id,
                JobRecord {
                    schedule_id,
                    status: JobStatus::Queued,
                    progress: None,
                    result: None,
                    warnings: Vec::new(),
                    error: None,
                },
            );
            let (stop_tx, stop_rx) = watch::channel(false);
            self.stops.lock().expect("stops mutex poisoned").insert(job_id, stop_tx);

            let jobs = Arc::clone(&self.jobs);
            let config = Arc::clone(&self.config);
            let solver_binary = self.solver_binary.clone();
            let plan_sink = Arc::clone(&self.plan_sink);
            tokio::spawn(run_job(job_id, request, jobs, config, solver_binary, plan_sink, stop_rx));

            Ok(job_id)
        }
    }

    /// `get(jobId) -> {status, progress?, result?, error?}`.
    pub fn get(&self, job_id: JobId) -> Option<JobView> {
        self.jobs
            .lock()
            .expect("jobs mutex poisoned")
            .get(&job_id)
            .map(|record| record.view(job_id))
    }

    /// `stop(jobId) -> ack`: cooperative cancellation (spec.md §4.6, §5).
    pub fn stop(&self, job_id: JobId) -> Result<(), CoreError> {
        let stops = self.stops.lock().expect("stops mutex poisoned");
        let sender = stops
            .get(&job_id)
            .ok_or_else(|| CoreError::JobNotFound(job_id.to_string()))?;
        let _ = sender.send(true);
        Ok(())
    }

    /// `result(jobId) -> plan` (only when completed).
    pub fn result(&self, job_id: JobId) -> Result<MaterializedPlan, CoreError> {
        let jobs = self.jobs.lock().expect("jobs mutex poisoned");
        let record = jobs
            .get(&job_id)
            .ok_or_else(|| CoreError::JobNotFound(job_id.to_string()))?;
        match (&record.status, &record.result) {
            (JobStatus::Completed, Some(plan)) => Ok(plan.clone()),
            _ => Err(CoreError::JobNotFound(format!(
                "job {job_id} has not completed (status: {:?})",
                record.status
            ))),
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_job<S: PlanSink>(
    job_id: JobId,
    request: StartRequest,
    jobs: Arc<Mutex<HashMap<JobId, JobRecord>>>,
    config: Arc<EngineConfig>,
    solver_binary: PathBuf,
    plan_sink: Arc<S>,
    stop_rx: watch::Receiver<bool>,
) {
    set_status(&jobs, job_id, JobStatus::Running);
    tracing::info!(%job_id, schedule_id = %request.schedule.id, "job started");

    let params = match resolve(
        &request.snapshot,
        &request.schedule,
        request.availability_override.as_ref(),
    ) {
        Ok(params) => params,
        Err(e) => {
            fail_job(&jobs, job_id, &e.to_string());
            return;
        }
    };

    let outcome = match request.pipeline {
        Pipeline::Greedy => {
            let greedy_result = greedy::schedule(&params, &config);
            materialize::materialize(
                &params,
                &request.snapshot,
                &greedy_result.days,
                Some(greedy_result.objective_liters),
                config.timing.slot_minutes,
                config.timing.shift_start_minutes,
            )
        }
        Pipeline::CpSat => {
            let input = build_input(&params, &config, &request.limits);
            let driver = SolverDriver::new(&solver_binary);
            let jobs_progress = Arc::clone(&jobs);
            let solver_result = driver
                .run(&input, stop_rx.clone(), move |progress| {
                    set_progress(&jobs_progress, job_id, progress);
                })
                .await;

            let output = match solver_result {
                Ok(output) => output,
                Err(e) => {
                    fail_job(&jobs, job_id, &e.to_string());
                    return;
                }
            };

            let no_plan = match output.status {
                SolverStatus::Infeasible | SolverStatus::ModelInvalid => {
                    Some(CoreError::SolverInfeasible.to_string())
                }
                SolverStatus::Unknown if output.days.is_empty() => {
                    Some(CoreError::SolverTimeoutNoPlan.to_string())
                }
                _ => None,
            };
            if let Some(message) = no_plan {
                // Per spec.md §5: a stop during solver execution with no
                // surviving feasible plan ends the job `cancelled`, not
                // `failed` — only an unrequested timeout/infeasibility is an
                // error.
                if *stop_rx.borrow() {
                    set_status(&jobs, job_id, JobStatus::Cancelled);
                } else {
                    fail_job(&jobs, job_id, &message);
                }
                return;
            }

            let days = materialize::from_solver_output(&output);
            materialize::materialize(
                &params,
                &request.snapshot,
                &days,
                Some(output.objective_liters),
                config.timing.slot_minutes,
                config.timing.shift_start_minutes,
            )
        }
    };

    // From here on a stop request is ignored until persistence completes
    // (spec.md §5): materialisation and persistence failures are always
    // `failed`, never `cancelled`.
    let plan = match outcome {
        Ok(plan) => plan,
        Err(e) => {
            fail_job(&jobs, job_id, &e.to_string());
            return;
        }
    };

    if let Err(e) = plan_sink.replace(plan.schedule_id, plan.trips.clone()) {
        fail_job(&jobs, job_id, &e.to_string());
        return;
    }

    let mut jobs = jobs.lock().expect("jobs mutex poisoned");
    if let Some(record) = jobs.get_mut(&job_id) {
        record.status = JobStatus::Completed;
        record.result = Some(plan);
    }
    tracing::info!(%job_id, "job completed");
}

fn set_status(jobs: &Mutex<HashMap<JobId, JobRecord>>, job_id: JobId, status: JobStatus) {
    if let Some(record) = jobs.lock().expect("jobs mutex poisoned").get_mut(&job_id) {
        record.status = status;
    }
}

fn set_progress(jobs: &Mutex<HashMap<JobId, JobRecord>>, job_id: JobId, progress: ProgressReport) {
    if let Some(record) = jobs.lock().expect("jobs mutex poisoned").get_mut(&job_id) {
        record.progress = Some(progress);
    }
}

fn fail_job(jobs: &Mutex<HashMap<JobId, JobRecord>>, job_id: JobId, message: &str) {
    tracing::warn!(%job_id, error = message, "job failed");
    if let Some(record) = jobs.lock().expect("jobs mutex poisoned").get_mut(&job_id) {
        record.status = JobStatus::Failed;
        record.error = Some(message.to_string());
    }
}
