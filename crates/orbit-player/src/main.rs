//! Orbit Player - headless host for the spatial motion engine
//!
//! Loads the YAML configuration, connects the OSC backend, generates a
//! circular demo trajectory and loops it from the next downbeat. The main
//! thread acts as the UI thread: it pumps the event loop that delivers
//! pattern status notifications.
//!
//! ## Command line flags
//!
//! - `--config <path>`: configuration file (default: `<config dir>/orbit/player.yaml`)
//! - `--duration <seconds>`: exit after this long (default: run until killed)
//! - `--write-config`: write the effective configuration to the config path and exit

mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use orbit_core::{
    ui_channel, Measure, MotionEngine, PatternGenerator, PatternStatusListener,
    PatternStatusMessage, TempoClock,
};

use config::PlayerConfig;

/// How long the UI loop waits for work before checking the deadline
const UI_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Args {
    config_path: PathBuf,
    duration: Option<Duration>,
    write_config: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args {
        config_path: config::default_config_path(),
        duration: None,
        write_config: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config_path = PathBuf::from(path);
            }
            "--duration" => {
                let secs: f64 = iter
                    .next()
                    .context("--duration needs a number of seconds")?
                    .parse()
                    .context("--duration must be a number")?;
                args.duration = Some(Duration::from_secs_f64(secs.max(0.0)));
            }
            "--write-config" => args.write_config = true,
            other => bail!("Unknown argument: {}", other),
        }
    }
    Ok(args)
}

/// Logs every pattern status change
struct StatusLogger;

impl PatternStatusListener for StatusLogger {
    fn pattern_status_changed(&self, message: &PatternStatusMessage) {
        log::info!(
            "Pattern '{}' on channel {}: {}",
            message.pattern.name(),
            message.channel,
            message.status
        );
    }
}

fn main() -> Result<()> {
    // Initialize logger - set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;
    log::info!("orbit-player starting up");

    let config: PlayerConfig = config::load_config(&args.config_path);
    if args.write_config {
        return config::save_config(&config, &args.config_path);
    }

    let sink = orbit_osc::build_sink(&config.backend).context("Failed to open OSC backend")?;
    let (ui, ui_loop) = ui_channel();
    let engine = MotionEngine::new(config.engine.clone(), sink, ui);

    let status_logger = Arc::new(StatusLogger);
    engine.add_listener(&status_logger);

    let demo = &config.demo;
    let generator = PatternGenerator::Circle {
        radius: demo.radius,
        elevation: demo.elevation,
        revolutions: demo.revolutions,
    };
    let pattern = engine
        .generate_pattern(demo.channel, "demo-orbit", &generator, Measure::bars(demo.length_bars))
        .context("Failed to generate demo trajectory")?;

    engine.start();
    // Strictly after now, so the first bar is never missed
    let at = TempoClock::next_down_beat(engine.clock().now() + Measure::new(0, 0, 1));
    engine
        .schedule_playing(&pattern, None, at)
        .context("Failed to schedule demo trajectory")?;
    log::info!("Demo trajectory scheduled for {}", at);

    let deadline = args.duration.map(|d| Instant::now() + d);
    loop {
        ui_loop.run_for(UI_POLL_INTERVAL);
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }

    engine.stop();
    ui_loop.run_pending();
    log::info!("orbit-player finished at {}", engine.clock().now());
    Ok(())
}
