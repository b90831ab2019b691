//! Integration coverage for the job controller's lifecycle state machine,
//! exercised through the greedy pipeline so no child-process solver binary
//! is required (spec.md §4.6).

mod common;

use std::time::Duration;

use fuelsched::config::EngineConfig;
use fuelsched::cpsat::SolverLimits;
use fuelsched::error::CoreError;
use fuelsched::job::{InMemoryPlanSink, JobController, JobStatus, Pipeline, StartRequest};

fn resource_rich_snapshot_and_schedule() -> (fuelsched::model::FleetSnapshot, fuelsched::model::Schedule) {
    let topo = common::topology();
    let mut snapshot = common::empty_snapshot(&topo);
    common::add_trailer(&mut snapshot, topo.parking, true);
    common::add_trailer(&mut snapshot, topo.parking, true);
    common::add_tractor(&mut snapshot, topo.parking, true);
    common::add_resident(&mut snapshot, topo.parking);
    let schedule = common::one_day_schedule(17_500);
    (snapshot, schedule)
}

async fn await_terminal(
    controller: &JobController<InMemoryPlanSink>,
    job_id: fuelsched::job::JobId,
) -> fuelsched::job::JobView {
    let mut view = controller.get(job_id).unwrap();
    for _ in 0..200 {
        if matches!(
            view.status,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        ) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        view = controller.get(job_id).unwrap();
    }
    view
}

#[tokio::test]
async fn result_before_completion_is_not_found() {
    let controller = JobController::new(EngineConfig::default(), "fuelsched-solver", InMemoryPlanSink::new());
    let (snapshot, schedule) = resource_rich_snapshot_and_schedule();
    let job_id = controller
        .start(StartRequest {
            snapshot,
            schedule,
            availability_override: None,
            pipeline: Pipeline::Greedy,
            limits: SolverLimits::from_config(&EngineConfig::default()),
        })
        .unwrap();

    // Immediately after start the job is at least queued; asking for its
    // result before the background task has a chance to complete it fails.
    let immediate = controller.result(job_id);
    if immediate.is_err() {
        assert!(matches!(immediate.unwrap_err(), CoreError::JobNotFound(_)));
    }

    let view = await_terminal(&controller, job_id).await;
    assert!(matches!(view.status, JobStatus::Completed));
    assert!(controller.result(job_id).is_ok());
}

#[tokio::test]
async fn invalid_input_fails_the_job_not_the_caller() {
    let controller = JobController::new(EngineConfig::default(), "fuelsched-solver", InMemoryPlanSink::new());
    let topo = common::topology();
    let snapshot = common::empty_snapshot(&topo); // no drivers, no vehicles, no trailers
    let schedule = common::one_day_schedule(17_500);

    let job_id = controller
        .start(StartRequest {
            snapshot,
            schedule,
            availability_override: None,
            pipeline: Pipeline::Greedy,
            limits: SolverLimits::from_config(&EngineConfig::default()),
        })
        .unwrap();

    let view = await_terminal(&controller, job_id).await;
    assert!(matches!(view.status, JobStatus::Failed));
    assert!(view.error.is_some());
}

#[tokio::test]
async fn a_schedule_can_be_rerun_once_its_prior_job_finishes() {
    let controller = JobController::new(EngineConfig::default(), "fuelsched-solver", InMemoryPlanSink::new());
    let (snapshot, schedule) = resource_rich_snapshot_and_schedule();
    let limits = SolverLimits::from_config(&EngineConfig::default());

    let first = controller
        .start(StartRequest {
            snapshot: snapshot.clone(),
            schedule: schedule.clone(),
            availability_override: None,
            pipeline: Pipeline::Greedy,
            limits,
        })
        .unwrap();
    await_terminal(&controller, first).await;

    let second = controller
        .start(StartRequest {
            snapshot,
            schedule,
            availability_override: None,
            pipeline: Pipeline::Greedy,
            limits,
        })
        .unwrap();
    let view = await_terminal(&controller, second).await;
    assert!(matches!(view.status, JobStatus::Completed));
}

#[tokio::test]
async fn stopping_an_already_completed_job_is_a_no_op_ack() {
    let controller = JobController::new(EngineConfig::default(), "fuelsched-solver", InMemoryPlanSink::new());
    let (snapshot, schedule) = resource_rich_snapshot_and_schedule();
    let job_id = controller
        .start(StartRequest {
            snapshot,
            schedule,
            availability_override: None,
            pipeline: Pipeline::Greedy,
            limits: SolverLimits::from_config(&EngineConfig::default()),
        })
        .unwrap();
    await_terminal(&controller, job_id).await;

    assert!(controller.stop(job_id).is_ok());
    let view = controller.get(job_id).unwrap();
    assert!(matches!(view.status, JobStatus::Completed));
}
