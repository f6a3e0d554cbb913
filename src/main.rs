//! handmouse - drive the OS pointer from hand landmarks.
//!
//! Reads a landmark stream (JSONL from a detector process or a
//! recording), evaluates the gesture engine each frame, and injects
//! pointer and button events.

mod config;
mod engine;
mod hand;
mod sink;
mod source;
mod stats;

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::sink::{ActionSink, EnigoSink, LogSink};
use crate::source::{JsonlSource, SourceEvent};
use crate::stats::TickStats;

/// Log a stats summary every this many ticks (~10s at 30fps).
const STATS_INTERVAL_TICKS: u64 = 300;

#[derive(Parser, Debug)]
#[command(name = "handmouse", about = "Hand-landmark driven pointer control")]
struct Cli {
    /// Config file path (default: the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Landmark stream: a JSONL file, or "-" for stdin
    #[arg(long, default_value = "-")]
    input: String,

    /// Log actions instead of injecting them
    #[arg(long)]
    dry_run: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("handmouse {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handmouse=info".into()),
        )
        .init();

    info!("handmouse v{} starting", env!("CARGO_PKG_VERSION"));

    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut cfg = config::load(&config_path)?;
    config::ensure_defaults(&mut cfg);
    cfg.validate()?;
    // Write back so autofilled defaults become visible and editable.
    config::save(&config_path, &cfg)?;
    info!("config loaded from {}", config_path.display());

    let screen = sink::screen_size();
    let mut engine = Engine::new(&cfg, screen)?;

    let mut sink: Box<dyn ActionSink> = if cli.dry_run {
        info!("dry run: actions are logged, not injected");
        Box::new(LogSink)
    } else {
        Box::new(EnigoSink::new()?)
    };

    let mut source = if cli.input == "-" {
        JsonlSource::stdin()
    } else {
        JsonlSource::open(&PathBuf::from(&cli.input))?
    };

    let mut tick_stats = TickStats::default();
    let result = run_loop(
        &mut engine,
        sink.as_mut(),
        &mut source,
        &mut tick_stats,
        &config_path,
        &mut cfg,
    );

    // Whatever ended the loop, no button stays down.
    engine.release_all(sink.as_mut());
    info!("exited after {}", tick_stats.summary());
    result
}

fn run_loop(
    engine: &mut Engine,
    sink: &mut dyn ActionSink,
    source: &mut JsonlSource,
    tick_stats: &mut TickStats,
    config_path: &std::path::Path,
    cfg: &mut config::Config,
) -> anyhow::Result<()> {
    loop {
        let event = match source.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => {
                info!("landmark stream ended");
                return Ok(());
            }
            Err(e) => {
                error!("landmark stream failed: {e}");
                return Err(e.into());
            }
        };
        match event {
            SourceEvent::Frame(frame) => {
                let start = Instant::now();
                engine.tick(&frame, sink);
                tick_stats.record(start.elapsed().as_secs_f64() * 1000.0);
                if tick_stats.total_ticks() % STATS_INTERVAL_TICKS == 0 {
                    info!("{}", tick_stats.summary());
                }
            }
            SourceEvent::CalibrateBegin(hand) => engine.calibrate_begin(hand),
            SourceEvent::CalibrateAdvance => {
                let was_calibrating = engine.calibrating();
                let next = engine.calibrate_advance();
                if !was_calibrating {
                    warn!("calibration advance without an active session");
                    continue;
                }
                // Persist after every committed step so a crash keeps
                // the learned parameters.
                engine.calibration().write_entries(&mut cfg.calibration);
                if let Err(e) = config::save(config_path, cfg) {
                    warn!("failed to persist calibration: {e}");
                }
                if next.is_none() {
                    info!("calibration finished and saved");
                }
            }
            SourceEvent::CalibrateCancel => engine.calibrate_cancel(),
            SourceEvent::Quit => {
                info!("quit requested");
                return Ok(());
            }
        }
    }
}
