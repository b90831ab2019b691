//! fuelsched — fuel-tanker logistics scheduling engine entry point.

use std::fs;
use std::path::Path;
use std::process;
use std::time::Duration;

use fuelsched::config::EngineConfig;
use fuelsched::cpsat::SolverLimits;
use fuelsched::job::{InMemoryPlanSink, JobController, JobStatus, StartRequest};
use fuelsched::model::{FleetSnapshot, Schedule};

mod cli;

fn load_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> T {
    let raw = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("error: failed to read {what} from {}: {e}", path.display());
        process::exit(1);
    });
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        eprintln!("error: failed to parse {what} from {}: {e}", path.display());
        process::exit(1);
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = cli::parse_args().unwrap_or_else(|e| {
        eprintln!("error: {e}");
        cli::print_usage();
        process::exit(1);
    });

    #[cfg(feature = "api")]
    if opts.serve {
        return run_server(opts);
    }

    run_job(opts);
}

#[cfg(feature = "api")]
fn run_server(opts: cli::CliOptions) {
    use std::net::SocketAddr;
    use std::sync::Arc;

    let addr: SocketAddr = opts.api_bind.parse().unwrap_or_else(|e| {
        eprintln!("error: invalid --api-bind address \"{}\": {e}", opts.api_bind);
        process::exit(1);
    });

    let config = load_config(opts.config.as_deref());
    let solver_binary = opts.solver_binary.clone().unwrap_or_else(default_solver_binary);
    let limits = SolverLimits::from_config(&config);
    let controller = JobController::new(config, solver_binary, InMemoryPlanSink::new());
    let state = Arc::new(fuelsched::api::AppState::new(controller, limits));

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    rt.block_on(fuelsched::api::serve(state, addr));
}

fn load_config(path: Option<&Path>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::from_toml_file(path).unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        }),
        None => EngineConfig::default(),
    }
}

fn default_solver_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap_or_else(|_| "fuelsched".into());
    path.set_file_name(if cfg!(windows) { "fuelsched-solver.exe" } else { "fuelsched-solver" });
    path
}

/// Runs a single planning job to completion and prints the resulting plan (or
/// error) to stdout/stderr, polling the job controller the way a CLI client
/// of the API would.
fn run_job(opts: cli::CliOptions) {
    let snapshot: FleetSnapshot = load_json(opts.snapshot.as_deref().expect("required by cli"), "fleet snapshot");
    let schedule: Schedule = load_json(opts.schedule.as_deref().expect("required by cli"), "schedule");

    let config = load_config(opts.config.as_deref());
    let solver_binary = opts.solver_binary.clone().unwrap_or_else(default_solver_binary);
    let mut limits = SolverLimits::from_config(&config);
    if let Some(seconds) = opts.time_limit_seconds {
        limits.time_limit_seconds = seconds;
    }

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });

    let controller = JobController::new(config, solver_binary, InMemoryPlanSink::new());
    let job_id = controller
        .start(StartRequest {
            snapshot,
            schedule,
            availability_override: None,
            pipeline: opts.pipeline,
            limits,
        })
        .unwrap_or_else(|e| {
            eprintln!("error: {e}");
            process::exit(1);
        });

    let view = rt.block_on(async {
        loop {
            let view = controller.get(job_id).expect("job was just started");
            if matches!(
                view.status,
                JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
            ) {
                break view;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    match view.status {
        JobStatus::Completed => {
            let plan = view.result.expect("completed job carries a result");
            let json = serde_json::to_string_pretty(&plan).expect("plan serialises");
            if let Some(path) = &opts.out {
                fs::write(path, json).unwrap_or_else(|e| {
                    eprintln!("error: failed to write plan to {}: {e}", path.display());
                    process::exit(1);
                });
            } else {
                println!("{json}");
            }
            for warning in &view.warnings {
                eprintln!("warning [{}]: {}", warning.component, warning.message);
            }
        }
        JobStatus::Failed => {
            eprintln!("error: {}", view.error.unwrap_or_else(|| "job failed".to_string()));
            process::exit(1);
        }
        JobStatus::Cancelled => {
            eprintln!("error: job was cancelled before producing a plan");
            process::exit(1);
        }
        JobStatus::Queued | JobStatus::Running => unreachable!("loop only exits on a terminal status"),
    }
}
