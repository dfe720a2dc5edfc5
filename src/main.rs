//! Data-center twin entry point: CLI wiring, config loading and the tick loop.

use std::io;
use std::path::Path;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dc_twin::config::TwinConfig;
use dc_twin::io::export::TelemetryWriter;
use dc_twin::optimizer::{Profile, SettingsOptimizer, Suggestion};
use dc_twin::scenario::ScenarioStore;
use dc_twin::sim::clock::Clock;
use dc_twin::sim::engine::{TickReport, Twin};
use dc_twin::sink::{ConsoleSink, FanOut, TickSink};

/// Parsed CLI arguments.
struct CliArgs {
    config_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    ticks: Option<u64>,
    catalog: Option<String>,
    interval_ms: Option<u64>,
    telemetry_out: Option<String>,
    auto_pilot: Option<Profile>,
    suggest: Option<Profile>,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("dc-twin: data-center digital twin");
    eprintln!();
    eprintln!("Usage: dc-twin [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (baseline, heatwave, eco)");
    eprintln!("  --seed <u64>             Override the random seed");
    eprintln!("  --ticks <u64>            Ticks to run (0 = until interrupted)");
    eprintln!("  --catalog <path>         Scenario catalog (JSON)");
    eprintln!("  --interval-ms <u64>      Wall-clock spacing between ticks");
    eprintln!("  --telemetry-out <path>   Export per-tick telemetry to CSV");
    eprintln!("  --auto-pilot <profile>   Apply optimizer settings before every tick");
    eprintln!("  --suggest <profile>      Print an optimizer suggestion after the run");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Serve the live twin over HTTP while ticking");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("Profiles: greedy, sustainable, balanced.");
    eprintln!("If no --config or --preset is given, the baseline preset is used.");
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("error: {message}");
    process::exit(1);
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str, what: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => fail(format!("{flag} requires {what}")),
    }
}

fn number<T: std::str::FromStr>(raw: &str, flag: &str, kind: &str) -> T {
    raw.parse::<T>()
        .unwrap_or_else(|_| fail(format!("{flag} value \"{raw}\" is not a valid {kind}")))
}

fn profile(raw: &str) -> Profile {
    raw.parse::<Profile>().unwrap_or_else(|e| fail(e))
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        config_path: None,
        preset: None,
        seed_override: None,
        ticks: None,
        catalog: None,
        interval_ms: None,
        telemetry_out: None,
        auto_pilot: None,
        suggest: None,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--config" => {
                cli.config_path = Some(value(&args, &mut i, "--config", "a path argument").to_string());
            }
            "--preset" => {
                cli.preset = Some(value(&args, &mut i, "--preset", "a name argument").to_string());
            }
            "--seed" => {
                let raw = value(&args, &mut i, "--seed", "a u64 argument");
                cli.seed_override = Some(number(raw, "--seed", "u64"));
            }
            "--ticks" => {
                let raw = value(&args, &mut i, "--ticks", "a u64 argument");
                cli.ticks = Some(number(raw, "--ticks", "u64"));
            }
            "--catalog" => {
                cli.catalog = Some(value(&args, &mut i, "--catalog", "a path argument").to_string());
            }
            "--interval-ms" => {
                let raw = value(&args, &mut i, "--interval-ms", "a u64 argument");
                cli.interval_ms = Some(number(raw, "--interval-ms", "u64"));
            }
            "--telemetry-out" => {
                cli.telemetry_out =
                    Some(value(&args, &mut i, "--telemetry-out", "a path argument").to_string());
            }
            "--auto-pilot" => {
                cli.auto_pilot = Some(profile(value(&args, &mut i, "--auto-pilot", "a profile")));
            }
            "--suggest" => {
                cli.suggest = Some(profile(value(&args, &mut i, "--suggest", "a profile")));
            }
            #[cfg(feature = "api")]
            "--serve" => {
                cli.serve = true;
            }
            #[cfg(feature = "api")]
            "--port" => {
                let raw = value(&args, &mut i, "--port", "a u16 argument");
                cli.port = number(raw, "--port", "u16");
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

/// Loads the configuration and applies CLI overrides.
fn load_config(cli: &CliArgs) -> TwinConfig {
    // --config takes priority, then --preset, then baseline
    let loaded = if let Some(ref path) = cli.config_path {
        TwinConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        TwinConfig::from_preset(name)
    } else {
        Ok(TwinConfig::baseline())
    };
    let mut cfg = loaded.unwrap_or_else(|e| fail(e));

    if let Some(seed) = cli.seed_override {
        cfg.simulation.seed = Some(seed);
    }
    if let Some(ticks) = cli.ticks {
        cfg.simulation.ticks = ticks;
    }
    if let Some(ref catalog) = cli.catalog {
        cfg.simulation.catalog.clone_from(catalog);
    }
    if let Some(ms) = cli.interval_ms {
        cfg.simulation.tick_interval_ms = ms;
    }
    if cli.auto_pilot.is_some() {
        cfg.optimizer.auto_pilot = cli.auto_pilot;
    }

    let errors = cfg.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }
    cfg
}

/// Runs the clock, feeding every emitted report to `sinks` and `publish`.
fn run_loop(
    twin: &mut Twin,
    clock: &mut Clock,
    sinks: &mut dyn TickSink,
    auto_pilot: Option<Profile>,
    mut publish: impl FnMut(&TickReport, f64),
) -> io::Result<()> {
    let mut outcome = Ok(());
    clock.run_while(|_| {
        if let Some(profile) = auto_pilot {
            if let Suggestion::NotReady = twin.auto_optimize(profile) {
                warn!(%profile, "auto-pilot skipped, optimizer not ready");
            }
        }
        let Some(report) = twin.tick() else {
            return true;
        };
        publish(&report, twin.current_ambient());
        outcome = sinks.emit(&report);
        outcome.is_ok()
    });
    outcome?;
    sinks.finish()
}

fn describe(suggestion: Suggestion, profile: Profile, ambient_c: f64) -> String {
    match suggestion {
        Suggestion::NotReady => "optimizer not ready (model files missing)".to_string(),
        Suggestion::NoCandidate => format!("no viable candidate for {profile}"),
        Suggestion::Found {
            inlet_c,
            workload_percent,
            reward,
        } => format!(
            "{profile} at ambient {ambient_c:.1}°C: inlet {inlet_c}°C, workload {workload_percent}% \
             (reward {reward:.4})"
        ),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();
    let cfg = load_config(&cli);

    let seed = cfg.simulation.seed.unwrap_or_else(|| rand::rng().random());
    info!(seed, "random sources seeded");

    let store = ScenarioStore::load(Path::new(&cfg.simulation.catalog)).unwrap_or_else(|e| fail(e));
    if store.is_empty() {
        warn!("scenario catalog has no records; ticks will emit nothing");
    }
    let optimizer = Arc::new(SettingsOptimizer::load(
        Path::new(&cfg.optimizer.cost_model),
        Path::new(&cfg.optimizer.compute_model),
    ));
    let mut twin = Twin::new(store, Arc::clone(&optimizer), &cfg, seed);

    let mut sinks = FanOut::new();
    sinks.push(ConsoleSink::new(io::stdout()));
    if let Some(ref path) = cli.telemetry_out {
        let writer = TelemetryWriter::create(Path::new(path))
            .unwrap_or_else(|e| fail(format!("failed to create CSV: {e}")));
        sinks.push(writer);
    }

    let ticks = (cfg.simulation.ticks > 0).then_some(cfg.simulation.ticks);
    let mut clock = Clock::new(ticks, Duration::from_millis(cfg.simulation.tick_interval_ms));
    let auto_pilot = cfg.optimizer.auto_pilot;

    #[cfg(feature = "api")]
    if cli.serve {
        serve_live(twin, clock, sinks, auto_pilot, &cfg, optimizer, seed, cli.port);
        return;
    }

    if let Err(e) = run_loop(&mut twin, &mut clock, &mut sinks, auto_pilot, |_, _| {}) {
        fail(format!("failed to write output: {e}"));
    }
    if let Some(ref path) = cli.telemetry_out {
        info!(path = %path, "telemetry written");
    }

    if let Some(profile) = cli.suggest {
        let suggestion = twin.suggest(profile);
        println!("{}", describe(suggestion, profile, twin.current_ambient()));
    }
}

/// Ticks on a worker thread while the API serves the latest state.
#[cfg(feature = "api")]
#[expect(clippy::too_many_arguments)]
fn serve_live(
    mut twin: Twin,
    mut clock: Clock,
    mut sinks: FanOut,
    auto_pilot: Option<Profile>,
    cfg: &TwinConfig,
    optimizer: Arc<SettingsOptimizer>,
    seed: u64,
    port: u16,
) {
    use std::net::SocketAddr;

    use dc_twin::api::{self, AppState};

    /// Seed offset for API suggestion queries.
    const API_SEED_OFFSET: u64 = 101;

    let state = Arc::new(AppState::new(
        optimizer,
        cfg.optimizer.profile,
        cfg.optimizer.samples,
        seed.wrapping_add(API_SEED_OFFSET),
    ));

    let writer = Arc::clone(&state);
    std::thread::spawn(move || {
        let result = run_loop(&mut twin, &mut clock, &mut sinks, auto_pilot, |report, ambient| {
            writer.publish(report.clone(), ambient);
        });
        match result {
            Ok(()) => info!(ticks = twin.ticks(), "tick loop finished; serving last state"),
            Err(e) => warn!(error = %e, "tick loop stopped"),
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let rt = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| fail(format!("failed to create tokio runtime: {e}")));
    if let Err(e) = rt.block_on(api::serve(state, addr)) {
        fail(format!("server error: {e}"));
    }
}
