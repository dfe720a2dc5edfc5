//! Offline trainer for the settings optimizer surrogates.
//!
//! Samples the physics engine over a wide grid and writes the cost and
//! compute forests as JSON model files.

use std::path::PathBuf;
use std::process;

use tracing::info;
use tracing_subscriber::EnvFilter;

use dc_twin::config::TwinConfig;
use dc_twin::optimizer::train::{TrainParams, train};
use dc_twin::sim::physics::PhysicsEngine;

struct CliArgs {
    config_path: Option<PathBuf>,
    out_dir: PathBuf,
    params: TrainParams,
}

fn print_help() {
    eprintln!("train_optimizer: fit the optimizer surrogate models");
    eprintln!();
    eprintln!("Usage: train_optimizer [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>     Take physics constants and price from a TOML config");
    eprintln!("  --out-dir <path>    Output directory (default: models)");
    eprintln!("  --samples <usize>   Synthetic samples (default: 20000)");
    eprintln!("  --trees <usize>     Trees per forest (default: 30)");
    eprintln!("  --max-depth <usize> Maximum tree depth (default: 10)");
    eprintln!("  --seed <u64>        Sampling and bootstrap seed (default: 42)");
    eprintln!("  --help              Show this help message");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        out_dir: PathBuf::from("models"),
        params: TrainParams::default(),
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--help" || flag == "-h" {
            print_help();
            process::exit(0);
        }
        i += 1;
        let Some(raw) = args.get(i) else {
            fail(format!("{flag} requires an argument"));
        };
        let count = || {
            raw.parse::<usize>()
                .unwrap_or_else(|_| fail(format!("{flag} value \"{raw}\" is not a valid count")))
        };
        match flag {
            "--config" => cli.config_path = Some(PathBuf::from(raw)),
            "--out-dir" => cli.out_dir = PathBuf::from(raw),
            "--samples" => cli.params.samples = count(),
            "--trees" => cli.params.forest.trees = count(),
            "--max-depth" => cli.params.forest.max_depth = count(),
            "--seed" => {
                cli.params.forest.seed = raw
                    .parse()
                    .unwrap_or_else(|_| fail(format!("--seed value \"{raw}\" is not a valid u64")));
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }
    cli
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut cli = parse_args();
    let cfg = match cli.config_path {
        Some(ref path) => TwinConfig::from_toml_file(path).unwrap_or_else(|e| fail(e)),
        None => TwinConfig::baseline(),
    };
    cli.params.cost_per_kwh_usd = cfg.simulation.cost_per_kwh_usd;

    let engine = PhysicsEngine::new(cfg.physics);
    let models = train(&engine, &cli.params).unwrap_or_else(|e| fail(e));

    let cost_path = cli.out_dir.join("optimizer_cost.json");
    let compute_path = cli.out_dir.join("optimizer_compute.json");
    models.cost.save(&cost_path).unwrap_or_else(|e| fail(e));
    models.compute.save(&compute_path).unwrap_or_else(|e| fail(e));
    info!(
        cost = %cost_path.display(),
        compute = %compute_path.display(),
        "optimizer models written"
    );
}
