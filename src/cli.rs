use std::env;
use std::path::PathBuf;

use fuelsched::job::Pipeline;

pub struct CliOptions {
    pub snapshot: Option<PathBuf>,
    pub schedule: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub pipeline: Pipeline,
    pub time_limit_seconds: Option<u32>,
    pub out: Option<PathBuf>,
    pub solver_binary: Option<PathBuf>,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub api_bind: String,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    if args.len() == 1 && (args[0] == "--help" || args[0] == "-h") {
        print_usage();
        std::process::exit(0);
    }
    parse_options(&args)
}

fn parse_options(args: &[String]) -> Result<CliOptions, String> {
    let mut i = 0usize;
    let mut snapshot = None;
    let mut schedule = None;
    let mut config = None;
    let mut pipeline = Pipeline::CpSat;
    let mut time_limit_seconds = None;
    let mut out = None;
    let mut solver_binary = None;
    #[cfg(feature = "api")]
    let mut serve = false;
    #[cfg(feature = "api")]
    let mut api_bind = "127.0.0.1:3000".to_string();

    while i < args.len() {
        match args[i].as_str() {
            "--snapshot" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --snapshot (expected a JSON file path)")?;
                if snapshot.replace(PathBuf::from(path)).is_some() {
                    return Err("--snapshot provided more than once".to_string());
                }
            }
            "--schedule" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --schedule (expected a JSON file path)")?;
                if schedule.replace(PathBuf::from(path)).is_some() {
                    return Err("--schedule provided more than once".to_string());
                }
            }
            "--config" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--pipeline" => {
                i += 1;
                let name = args.next_or_err(i, "missing value for --pipeline (expected cpsat or greedy)")?;
                pipeline = match name {
                    "cpsat" => Pipeline::CpSat,
                    "greedy" => Pipeline::Greedy,
                    other => return Err(format!("unknown pipeline \"{other}\" (expected cpsat or greedy)")),
                };
            }
            "--time-limit" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --time-limit (expected seconds)")?;
                time_limit_seconds = Some(
                    raw.parse::<u32>()
                        .map_err(|_| format!("--time-limit value \"{raw}\" is not a valid number of seconds"))?,
                );
            }
            "--out" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --out (expected a file path)")?;
                if out.replace(PathBuf::from(path)).is_some() {
                    return Err("--out provided more than once".to_string());
                }
            }
            "--solver-binary" => {
                i += 1;
                let path = args.next_or_err(i, "missing value for --solver-binary (expected a file path)")?;
                if solver_binary.replace(PathBuf::from(path)).is_some() {
                    return Err("--solver-binary provided more than once".to_string());
                }
            }
            #[cfg(feature = "api")]
            "--serve" => {
                serve = true;
            }
            #[cfg(feature = "api")]
            "--api-bind" => {
                i += 1;
                let addr = args.next_or_err(i, "missing value for --api-bind (expected host:port)")?;
                api_bind = addr.to_string();
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    #[cfg(feature = "api")]
    if serve {
        return Ok(CliOptions {
            snapshot,
            schedule,
            config,
            pipeline,
            time_limit_seconds,
            out,
            solver_binary,
            serve,
            api_bind,
        });
    }

    if snapshot.is_none() {
        return Err("--snapshot is required (a fleet snapshot JSON file)".to_string());
    }
    if schedule.is_none() {
        return Err("--schedule is required (a schedule JSON file)".to_string());
    }

    Ok(CliOptions {
        snapshot,
        schedule,
        config,
        pipeline,
        time_limit_seconds,
        out,
        solver_binary,
        #[cfg(feature = "api")]
        serve,
        #[cfg(feature = "api")]
        api_bind,
    })
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index).map(String::as_str).ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fuelsched --snapshot <path> --schedule <path> [--config <path>] [--pipeline cpsat|greedy]");
    eprintln!("            [--time-limit <seconds>] [--out <path>] [--solver-binary <path>]");
    #[cfg(feature = "api")]
    eprintln!("  fuelsched --serve [--api-bind <host:port>]");
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;
    use fuelsched::job::Pipeline;

    #[test]
    fn requires_snapshot_and_schedule() {
        let err = parse_args_from(vec![]).unwrap_err();
        assert!(err.contains("--snapshot"));
    }

    #[test]
    fn parses_snapshot_and_schedule() {
        let opts = parse_args_from(vec![
            "--snapshot".to_string(),
            "snapshot.json".to_string(),
            "--schedule".to_string(),
            "schedule.json".to_string(),
        ])
        .expect("parse should succeed");
        assert_eq!(opts.snapshot.as_deref().and_then(|p| p.to_str()), Some("snapshot.json"));
        assert_eq!(opts.schedule.as_deref().and_then(|p| p.to_str()), Some("schedule.json"));
        assert!(matches!(opts.pipeline, Pipeline::CpSat));
    }

    #[test]
    fn parses_greedy_pipeline_choice() {
        let opts = parse_args_from(vec![
            "--snapshot".to_string(),
            "s.json".to_string(),
            "--schedule".to_string(),
            "sc.json".to_string(),
            "--pipeline".to_string(),
            "greedy".to_string(),
        ])
        .expect("parse should succeed");
        assert!(matches!(opts.pipeline, Pipeline::Greedy));
    }

    #[test]
    fn rejects_unknown_pipeline() {
        let err = parse_args_from(vec![
            "--snapshot".to_string(),
            "s.json".to_string(),
            "--schedule".to_string(),
            "sc.json".to_string(),
            "--pipeline".to_string(),
            "bogus".to_string(),
        ])
        .unwrap_err();
        assert!(err.contains("bogus"));
    }
}
