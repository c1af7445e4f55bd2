//! HAR Stream Agent CLI
//!
//! Streams motion samples to a remote activity classifier.

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use har_stream_agent::{
    classifier::ClassifierClient,
    collector::{Activity, ReaderSource, SampleSource, SimulatedGenerator, SimulatedSource},
    config::Config,
    core::{estimate_calories, format_duration, SessionAggregator, SummaryBuilder, ThrottledDispatcher},
    pipeline::{classifier_predictor, run_session, StreamingSession},
    stats::{create_shared_stats_with_persistence, PipelineStats},
    VERSION,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "har-stream")]
#[command(version = VERSION)]
#[command(about = "Stream motion-sensor windows to an activity classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// Synthetic samples cycling through activities
    Simulated,
    /// One JSON sample per line on standard input
    Stdin,
    /// Samples posted to the ingest server (requires server feature)
    Http,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a streaming session
    Start {
        /// Where samples come from
        #[arg(long, value_enum, default_value = "simulated")]
        source: SourceKind,

        /// Classifier base URL (overrides config)
        #[arg(long)]
        classifier_url: Option<String>,

        /// Body weight in kg for calorie estimates
        #[arg(long)]
        weight: Option<f64>,

        /// Sample rate of the simulated source in Hz
        #[arg(long)]
        rate: Option<f64>,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Port for the ingest server (http source only)
        #[arg(long)]
        port: Option<u16>,

        /// Seed for the simulated source
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Check classifier service health
    Health {
        /// Classifier base URL (overrides config)
        #[arg(long)]
        classifier_url: Option<String>,
    },

    /// Print simulated samples as JSON lines
    Simulate {
        /// Number of samples to print
        #[arg(long, short, default_value = "500")]
        count: usize,

        /// Sample rate in Hz
        #[arg(long)]
        rate: Option<f64>,

        /// Seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Estimate calories for an activity
    Calories {
        /// Activity label, e.g. WALKING
        #[arg(long)]
        activity: String,

        /// Duration in seconds
        #[arg(long)]
        seconds: f64,

        /// Body weight in kg
        #[arg(long)]
        weight: Option<f64>,
    },

    /// Show configuration
    Config,

    /// Show cumulative pipeline statistics
    Stats,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            source,
            classifier_url,
            weight,
            rate,
            duration,
            port,
            seed,
        } => {
            let mut config = load_config();
            if let Some(url) = classifier_url {
                config.classifier_url = url;
            }
            if let Some(weight) = weight {
                config.weight_kg = weight;
            }
            if let Some(rate) = rate {
                config.sample_rate_hz = rate;
            }
            if let Some(port) = port {
                config.server_port = port;
            }
            cmd_start(config, source, duration.map(Duration::from_secs), seed);
        }
        Commands::Health { classifier_url } => {
            let mut config = load_config();
            if let Some(url) = classifier_url {
                config.classifier_url = url;
            }
            cmd_health(&config);
        }
        Commands::Simulate { count, rate, seed } => {
            let rate = rate.unwrap_or_else(|| load_config().sample_rate_hz);
            cmd_simulate(count, rate, seed);
        }
        Commands::Calories {
            activity,
            seconds,
            weight,
        } => {
            let weight = weight.unwrap_or_else(|| load_config().weight_kg);
            cmd_calories(&activity, seconds, weight);
        }
        Commands::Config => {
            cmd_config();
        }
        Commands::Stats => {
            cmd_stats();
        }
    }
}

fn load_config() -> Config {
    Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {e}; using defaults");
        Config::default()
    })
}

fn build_runtime() -> tokio::runtime::Runtime {
    match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting async runtime: {e}");
            std::process::exit(1);
        }
    }
}

fn cmd_start(config: Config, kind: SourceKind, duration: Option<Duration>, seed: Option<u64>) {
    println!("HAR Stream Agent v{VERSION}");
    println!();

    if let Err(e) = config.validate() {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
    if let Err(e) = config.ensure_directories() {
        eprintln!("Warning: Could not create directories: {e}");
    }
    let timezone = config.tz().unwrap_or(chrono_tz::Tz::UTC);

    let runtime = build_runtime();
    let client = match ClassifierClient::new(config.classifier()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    println!("Starting session...");
    println!("  Classifier: {}", config.classifier_url);
    let health = runtime.block_on(client.check_health());
    println!("  Classifier status: {}", health.status);
    if !health.is_healthy() {
        eprintln!("Warning: classifier is not ready; predictions will fail until it is");
    }
    println!(
        "  Dispatch interval: {} ms",
        config.min_dispatch_interval.as_millis()
    );
    println!("  Weight: {} kg", config.weight_kg);

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let aggregator = Arc::new(Mutex::new(SessionAggregator::with_weight(config.weight_kg)));
    let dispatcher = Arc::new(ThrottledDispatcher::new(
        config.min_dispatch_interval,
        classifier_predictor(client),
    ));
    let mut session = StreamingSession::new(
        dispatcher,
        aggregator.clone(),
        stats.clone(),
        runtime.handle().clone(),
    );

    #[cfg(feature = "server")]
    let mut server_shutdown = None;

    let mut source: Box<dyn SampleSource> = match kind {
        SourceKind::Simulated => {
            println!("  Source: simulated ({} Hz)", config.sample_rate_hz);
            let source = SimulatedSource::new(config.sample_rate_hz);
            Box::new(match seed {
                Some(seed) => source.with_seed(seed),
                None => source,
            })
        }
        SourceKind::Stdin => {
            println!("  Source: stdin (one JSON sample per line)");
            Box::new(ReaderSource::stdin())
        }
        #[cfg(feature = "server")]
        SourceKind::Http => {
            use har_stream_agent::collector::ChannelSource;
            use har_stream_agent::server::{self, ServerConfig, ServerState};

            let source = ChannelSource::new();
            let state = ServerState::new(source.sink(), stats.clone(), aggregator.clone());
            match runtime.block_on(server::run(ServerConfig::new(config.server_port), state)) {
                Ok((addr, shutdown)) => {
                    println!("  Source: http (POST samples to http://{addr}/samples)");
                    server_shutdown = Some(shutdown);
                }
                Err(e) => {
                    eprintln!("Error starting ingest server: {e}");
                    std::process::exit(1);
                }
            }
            Box::new(source)
        }
        #[cfg(not(feature = "server"))]
        SourceKind::Http => {
            eprintln!("Error: the http source requires the server feature");
            std::process::exit(1);
        }
    };

    if let Some(limit) = duration {
        println!("  Duration: {}", format_duration(limit.as_secs_f64()));
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    if let Err(e) = run_session(&mut session, source.as_mut(), &running, duration) {
        eprintln!("Error starting source: {e}");
    }

    println!();
    println!("Stopping session...");
    session.teardown();

    #[cfg(feature = "server")]
    if let Some(shutdown) = server_shutdown {
        let _ = shutdown.send(());
    }

    let builder = SummaryBuilder::new(timezone);
    let summary = {
        let agg = aggregator.lock().unwrap_or_else(|e| e.into_inner());
        print_session(&builder, &agg);
        builder.build(&agg, source.name(), Utc::now())
    };

    let export_path = config.export_path.join(format!(
        "session_{}.json",
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => {
            if let Err(e) = std::fs::write(&export_path, json) {
                eprintln!("Error writing session summary: {e}");
            } else {
                println!("Exported session summary to {export_path:?}");
            }
        }
        Err(e) => {
            eprintln!("Error serializing session summary: {e}");
        }
    }

    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save pipeline stats: {e}");
    }

    // Calls still in flight are abandoned; their results would be ignored.
    runtime.shutdown_timeout(Duration::from_secs(1));

    println!();
    println!("{}", stats.summary());
}

fn print_session(builder: &SummaryBuilder, agg: &SessionAggregator) {
    println!();
    println!("Session Summary");
    println!("===============");
    println!("Predictions: {}", agg.prediction_count());

    let mut durations: Vec<_> = agg.durations().iter().collect();
    durations.sort_by(|a, b| b.1.total_cmp(a.1));
    for (activity, secs) in durations {
        println!(
            "  {:<18} {:>8}  {:>7.1} kcal",
            activity.display_name(),
            format_duration(*secs),
            estimate_calories(*activity, *secs, agg.weight_kg())
        );
    }
    println!("Total calories: {:.1} kcal", agg.total_calories());

    let timeline = builder.format_timeline(agg);
    if !timeline.is_empty() {
        println!();
        println!("Recent activity:");
        for line in timeline.iter().rev().take(10) {
            println!("  {line}");
        }
    }
}

fn cmd_health(config: &Config) {
    let client = match ClassifierClient::new(config.classifier()) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let runtime = build_runtime();
    let report = runtime.block_on(client.check_health());

    println!("Classifier: {}", config.classifier_url);
    println!("Status: {}", report.status);
    println!("  Model loaded: {}", report.model_loaded);
    println!("  Scaler loaded: {}", report.scaler_loaded);
    if let Some(service) = &report.service {
        println!("  Service: {service}");
    }
    if let Some(version) = &report.version {
        println!("  Version: {version}");
    }

    if !report.is_healthy() {
        std::process::exit(1);
    }
}

fn cmd_simulate(count: usize, rate: f64, seed: Option<u64>) {
    if !(rate.is_finite() && rate > 0.0) {
        eprintln!("Error: rate must be positive");
        std::process::exit(1);
    }

    let mut generator = match seed {
        Some(seed) => SimulatedGenerator::with_seed(seed),
        None => SimulatedGenerator::new(),
    };

    for i in 0..count {
        let sample = generator.sample_at(Duration::from_secs_f64(i as f64 / rate));
        match serde_json::to_string(&sample) {
            Ok(line) => println!("{line}"),
            Err(e) => {
                eprintln!("Error serializing sample: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn cmd_calories(label: &str, seconds: f64, weight: f64) {
    let activity = Activity::from_label(label);
    if activity == Activity::Unknown {
        eprintln!("Warning: unknown activity '{label}', using resting rate");
    }
    println!(
        "{} for {}: {:.1} kcal at {} kg",
        activity.display_name(),
        format_duration(seconds),
        estimate_calories(activity, seconds, weight),
        weight
    );
}

fn cmd_config() {
    let config = load_config();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
}

fn cmd_stats() {
    let config = load_config();
    let path = config.stats_path();

    if !path.exists() {
        println!("No previous session data found.");
        return;
    }

    let stats = PipelineStats::with_persistence(path);
    let snapshot = stats.snapshot();
    println!("Cumulative Statistics:");
    println!("  Samples accepted: {}", snapshot.samples_accepted);
    println!("  Samples rejected: {}", snapshot.samples_rejected);
    println!("  Windows emitted: {}", snapshot.windows_emitted);
    println!("  Predictions: {}", snapshot.predictions);
    println!("  Dispatches skipped: {}", snapshot.dispatches_skipped);
    println!("  Dispatches failed: {}", snapshot.dispatches_failed);
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not set Ctrl+C handler: {e}");
    }
}
