#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{Level as TraceLevel, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use firelamp::constants::{RESTART_EXIT_CODE, paths, timing};
use firelamp::{
    ButtonGesture, CommandOrigin, DirStorage, HostPlatform, Lamp, LampOptions, StartupError, builtin_effects, mqtt,
    platform,
};

#[derive(Parser, Debug)]
#[command(name = "firelamp", version, about = "Fire Lamp settings host")]
struct Args {
    /// Directory holding settings.json and effects.json
    #[arg(long, env = "FIRELAMP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Idle time after the last change before saving
    #[arg(long, env = "FIRELAMP_SAVE_INTERVAL_MS", default_value_t = timing::SAVE_INTERVAL_MS)]
    save_interval_ms: u64,

    /// Delay used to coalesce state notifications
    #[arg(long, env = "FIRELAMP_NOTIFY_DELAY_MS", default_value_t = timing::NOTIFY_DELAY_MS)]
    notify_delay_ms: u64,

    #[arg(long, env = "FIRELAMP_TICK_MS", default_value_t = timing::TICK_MS)]
    tick_ms: u64,

    /// Hardware id in hex, used for the unique id on first boot
    #[arg(long, env = "FIRELAMP_HARDWARE_ID", value_parser = parse_hex)]
    hardware_id: Option<u32>,
}

fn parse_hex(s: &str) -> Result<u32, std::num::ParseIntError> {
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
}

/// One line from stdin
#[derive(Debug)]
enum Input {
    Command(CommandOrigin, String),
    Button(ButtonGesture),
}

fn parse_input(line: &str) -> Result<Input> {
    let (verb, rest) = line.trim().split_once(char::is_whitespace).unwrap_or((line.trim(), ""));
    let rest = rest.trim();
    match verb {
        "config" => Ok(Input::Command(CommandOrigin::Config, rest.to_string())),
        "state" => Ok(Input::Command(CommandOrigin::State, rest.to_string())),
        "button" => Ok(Input::Button(rest.parse()?)),
        other => bail!("unknown input '{other}', expected config, state or button"),
    }
}

fn spawn_input_reader(tx: mpsc::Sender<String>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(line) if line.trim().is_empty() => continue,
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
            debug!("Input closed");
        })
        .context("Failed to spawn stdin reader")
}

fn default_data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(paths::APP_DIR);
    path
}

fn hardware_id(args: &Args) -> u32 {
    args.hardware_id
        .or_else(|| platform::read_machine_id(Path::new(paths::MACHINE_ID)))
        .unwrap_or_else(|| {
            warn!("No hardware id available, using 0");
            0
        })
}

fn main() -> Result<()> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let data_dir = args.data_dir.clone().unwrap_or_else(default_data_dir);
    let storage = DirStorage::open(&data_dir)
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;
    info!(path = %data_dir.display(), "Using data directory");

    let options = LampOptions {
        save_interval: Duration::from_millis(args.save_interval_ms),
        notify_delay: Duration::from_millis(args.notify_delay_ms),
    };
    let host = HostPlatform::new(hardware_id(&args), platform::detect_local_ip());

    let mut lamp = match Lamp::initialize(storage, host, builtin_effects(), options, Instant::now()) {
        Ok(lamp) => lamp,
        Err(e @ StartupError::RestartRequested { .. }) => {
            error!(error = %e, "Storage repaired, restarting");
            std::process::exit(RESTART_EXIT_CODE);
        }
        Err(e) => return Err(e).context("Failed to start lamp"),
    };
    info!(client_id = %mqtt::client_id(&lamp.store().mqtt.name), "Announcing as client");
    lamp.announce();

    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        signal_hook::flag::register(SIGINT, Arc::clone(&shutdown)).context("Failed to register SIGINT")?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&shutdown)).context("Failed to register SIGTERM")?;
    }

    // Stdin thread -> main loop
    let (input_tx, input_rx) = mpsc::channel();
    let _input_handle = spawn_input_reader(input_tx)?;

    let tick = Duration::from_millis(args.tick_ms.max(1));
    while !shutdown.load(Ordering::Relaxed) {
        while let Ok(line) = input_rx.try_recv() {
            let now = Instant::now();
            match parse_input(&line) {
                Ok(Input::Command(origin, payload)) => {
                    let result = lamp.submit(origin, &payload, now);
                    debug!(origin = %origin, result = ?result, "Command submitted");
                }
                Ok(Input::Button(gesture)) => {
                    lamp.handle_button(gesture, now);
                }
                Err(e) => warn!(error = %e, "Ignoring input"),
            }
        }

        lamp.tick(Instant::now());
        thread::sleep(tick);
    }

    info!("Shutting down");
    lamp.flush_pending(Instant::now());
    let stats = lamp.stats();
    info!(
        mutations = stats.mutations,
        flushes = stats.flushes,
        failed_commits = stats.failed_commits,
        "Stopped"
    );
    Ok(())
}
