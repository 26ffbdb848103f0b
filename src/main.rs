use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use seqplay::cli::Args;
use seqplay::config::{self, DecodeMode, PlayerConfig};
use seqplay::{SequenceController, SequenceEnded, SequenceLooped};

/// Initialize env_logger from verbosity flags and the --log option
fn init_logging(args: &Args) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| "seqplay.log".into());
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

/// Config file values with CLI flags on top
fn build_config(args: &Args) -> Result<PlayerConfig> {
    let path_config = config::PathConfig::from_env_and_cli(args.config_dir.clone());
    let config_path = config::config_file(config::CONFIG_FILE, &path_config);
    info!("Config path: {}", config_path.display());

    let mut cfg = PlayerConfig::load_or_default(&config_path)?;
    if let Some(workers) = args.workers {
        cfg.workers = workers;
    }
    if let Some(buffer) = args.buffer {
        cfg.buffer_frames = buffer;
    }
    if let Some(looping) = args.loop_playback {
        cfg.loop_enabled = looping != 0;
    }
    if let Some(speed) = args.speed {
        cfg.playback_speed = speed;
    }
    if args.reverse {
        cfg.reverse_at_loop = true;
    }
    if args.persist_gpu {
        cfg.persist_gpu_cache = true;
    }
    if args.compressed {
        cfg.decode_mode = DecodeMode::Compressed;
    }
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("seqplay {} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Command-line args: {:?}", args);

    let cfg = build_config(&args)?;
    debug!("Effective config: {:?}", cfg);

    let mut controller = SequenceController::with_config(cfg);

    let loops = Arc::new(AtomicUsize::new(0));
    {
        let loops = Arc::clone(&loops);
        controller.event_bus().subscribe::<SequenceLooped, _>(move |e| {
            let n = loops.fetch_add(1, Ordering::Relaxed) + 1;
            info!("Loop {} completed: {}", n, e.0.sequence_path.display());
        });
    }
    controller.event_bus().subscribe::<SequenceEnded, _>(|e| {
        info!(
            "Sequence ended: {} ({:?})",
            e.0.sequence_path.display(),
            e.0.frame_size
        );
    });

    controller
        .load(&args.path, args.fps)
        .with_context(|| format!("Failed to load sequence {}", args.path.display()))?;

    match controller.estimate_memory_bytes() {
        Ok(bytes) => {
            let fits = controller.fits_in_memory().unwrap_or(false);
            println!(
                "{} frames, full cache needs {:.1} MB ({})",
                controller.num_frames(),
                bytes as f64 / (1024.0 * 1024.0),
                if fits { "fits in memory" } else { "exceeds available memory" }
            );
        }
        Err(e) => warn!("Capacity estimate unavailable: {}", e),
    }

    let tick_rate = if args.tick_rate > 0.0 { args.tick_rate } else { 60.0 };
    let dt = 1.0 / tick_rate;
    let run_for = args.seconds.unwrap_or_else(|| {
        controller.duration() / controller.playback_speed()
    });
    let tick = Duration::from_secs_f32(dt);

    controller.play();
    let start = Instant::now();
    let mut last_report = start;

    while start.elapsed().as_secs_f32() < run_for {
        let tick_start = Instant::now();
        controller.update(dt);

        if last_report.elapsed() >= Duration::from_secs(1) {
            println!("{}", controller.status_line());
            debug!("{}", controller.state_strip());
            last_report = Instant::now();
        }

        // Non-looping playback stops by itself
        if !controller.is_playing() {
            break;
        }
        if let Some(rest) = tick.checked_sub(tick_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    println!("{}", controller.status().summary());
    println!("{} loops", loops.load(Ordering::Relaxed));
    Ok(())
}
