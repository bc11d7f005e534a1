use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use upf_bridge::catalog::{self, ReferencePlanner};
use upf_bridge::config::SolverConfig;
use upf_bridge::service::{Client, Server, SolveOutcome, Verdict};
use upf_bridge::sim::Simulator;

/// Sends every catalog problem through an in-process solver and checks the plans that come back.
#[derive(Parser)]
#[command(name = "upf_bridge")]
struct Args {
    /// Solver configuration (TOML) attached to every request
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write every encoded request to this directory
    #[arg(long)]
    dump: Option<PathBuf>,

    /// Only run the named problem
    #[arg(long)]
    only: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let default = if verbose { "upf_bridge=debug" } else { "upf_bridge=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).compact())
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logger(args.verbose);

    let config = match &args.config {
        Some(path) => SolverConfig::load(path)?,
        None => SolverConfig::new(),
    };
    let server = Server::new(ReferencePlanner::new()?, Simulator::new());
    let mut client = Client::new(&server);
    if let Some(dir) = &args.dump {
        client = client.with_dump_dir(dir);
    }

    let mut failures = 0;
    for (name, example) in catalog::examples()? {
        if args.only.as_ref().map_or(false, |only| *only != name) {
            continue;
        }
        let plan = match client.solve(&example.problem, &config)? {
            SolveOutcome::Plan(plan) => plan,
            SolveOutcome::NotFound => {
                warn!(problem = %name, "no plan");
                failures += 1;
                continue;
            }
        };
        print!("{}:\n{}", name, plan);
        match client.validate(&example.problem, &plan)? {
            Verdict::Valid => info!(problem = %name, steps = plan.len(), "valid"),
            Verdict::Invalid(reason) => {
                error!(problem = %name, %reason, "invalid plan");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        return Err(format!("{} problem(s) without a valid plan", failures).into());
    }
    Ok(())
}
