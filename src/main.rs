use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::io::Read;
use tracing::{error, info};

use repscope::{AnalysisOrchestrator, ExerciseType, Frame, Landmark, RepscopeConfig};

#[derive(Parser, Debug)]
#[command(name = "repscope")]
#[command(about = "Exercise analytics from pose landmark streams")]
#[command(version)]
#[command(long_about = "Analyzes a recorded pose-landmark session: derives joint angles, \
counts repetitions with adaptive thresholds, classifies the exercise from its range-of-motion \
signature, and scores movement form against biomechanical reference windows. Reads a JSON \
session document and writes the analysis result as JSON to stdout.")]
struct Args {
    /// Session document to analyze ("-" for stdin)
    #[arg(default_value = "-", help = "Path to a JSON session document, or - for stdin")]
    input: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "repscope.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Pin the exercise type instead of classifying
    #[arg(short, long, value_name = "EXERCISE", help = "Skip classification and analyze as this exercise (squat, deadlift, push_up, bicep_curl, lunge)")]
    exercise: Option<String>,

    /// Fail instead of degrading when data is insufficient
    #[arg(long, help = "Treat insufficient data as a hard failure")]
    strict: bool,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit without analyzing")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,
}

/// One frame as it appears in the session document
#[derive(Debug, Deserialize)]
struct FrameDocument {
    /// Milliseconds from session start
    timestamp_ms: u64,
    landmarks: Vec<Landmark>,
}

/// Top-level session document
#[derive(Debug, Deserialize)]
struct SessionDocument {
    frames: Vec<FrameDocument>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle special modes that don't require full initialization
    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    // Initialize logging
    init_logging(&args)?;

    info!("Starting repscope v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    // Load and validate configuration
    let mut config = match RepscopeConfig::load_from_file(&args.config) {
        Ok(config) => {
            info!("Configuration loaded successfully from: {}", args.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if args.validate_config {
        match config.validate() {
            Ok(()) => {
                info!("Configuration validation successful");
                println!("✓ Configuration is valid");
                return Ok(());
            }
            Err(e) => {
                error!("Configuration validation failed: {}", e);
                eprintln!("✗ Configuration validation failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    config.validate()?;
    if args.strict {
        config.session.strict = true;
    }

    let hint = args
        .exercise
        .as_deref()
        .map(|name| {
            name.parse::<ExerciseType>()
                .map_err(|e| anyhow::anyhow!(e))
        })
        .transpose()
        .context("invalid --exercise value")?;

    let frames = read_session(&args.input)?;
    info!("Loaded {} frames from {}", frames.len(), args.input);

    let orchestrator = AnalysisOrchestrator::new(config);
    let outcome = orchestrator.analyze_frames(&frames, hint)?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);

    if outcome.is_failed() {
        std::process::exit(1);
    }

    Ok(())
}

/// Read and decode a session document, converting wire frames to
/// session-relative frames in document order
fn read_session(input: &str) -> Result<Vec<Frame>> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read session document from stdin")?;
        buf
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read session document: {}", input))?
    };

    let document: SessionDocument =
        serde_json::from_str(&raw).context("failed to parse session document")?;

    Ok(document
        .frames
        .into_iter()
        .enumerate()
        .map(|(index, frame)| {
            Frame::new(
                index as u64,
                std::time::Duration::from_millis(frame.timestamp_ms),
                frame.landmarks,
            )
        })
        .collect())
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt, Layer};

    // Determine log level based on flags
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    // Create environment filter
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("repscope={}", log_level)));

    // Configure format based on options
    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => {
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        }
        Some("compact") => {
            fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .boxed()
        }
        Some("pretty") | None => {
            fmt::layer()
                .pretty()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(args.debug)
                .with_file(args.debug)
                .with_line_number(args.debug)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Repscope Configuration File");
    println!("# This is the default configuration with all available options");
    println!();
    let rendered = toml::to_string_pretty(&RepscopeConfig::default())?;
    println!("{}", rendered);
    Ok(())
}
