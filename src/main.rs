//! urja-eps - battery monitor and safety shutdown daemon
//!
//! Runs the 2 Hz sense/estimate/display/cutoff loop until SIGINT or SIGTERM,
//! or until the host it protects goes down.

use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use urja_eps::app::EpsApp;
use urja_eps::config::AppConfig;
use urja_eps::devices::create_devices;
use urja_eps::error::{Error, Result};

const DEFAULT_CONFIG_PATH: &str = "/etc/urja-eps.toml";

#[derive(Parser)]
#[command(name = "urja-eps", version)]
#[command(about = "Battery monitor and safety shutdown for a two-cell powered SBC")]
struct Args {
    /// Config file (positional form)
    #[arg(value_name = "CONFIG")]
    path: Option<PathBuf>,

    /// Config file [default: /etc/urja-eps.toml]
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Use the simulated pack regardless of device.kind
    #[arg(long)]
    mock: bool,

    /// Run a single tick, print the result and exit
    #[arg(long)]
    once: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    dump_config: bool,
}

/// Load the requested file, or defaults if the default file does not exist
fn load_config(args: &Args) -> Result<(AppConfig, String)> {
    match args.config.as_ref().or(args.path.as_ref()) {
        Some(path) => {
            let config = AppConfig::from_file(path)?;
            Ok((config, path.display().to_string()))
        }
        None if PathBuf::from(DEFAULT_CONFIG_PATH).exists() => {
            let config = AppConfig::from_file(DEFAULT_CONFIG_PATH)?;
            Ok((config, DEFAULT_CONFIG_PATH.to_string()))
        }
        None => Ok((AppConfig::default(), "built-in defaults".to_string())),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (config, source) = load_config(&args)?;

    if args.dump_config {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    // RUST_LOG takes precedence over logging.level
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("urja-eps v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", source);
    log::info!(
        "Cutoff {:.2} V, LEDs green > {:.2} V > yellow > {:.2} V >= red, {} Hz",
        config.safety.critical_voltage,
        config.indicator.normal_above,
        config.indicator.low_above,
        config.sampling.frequency_hz
    );

    let devices = create_devices(&config, args.mock)?;
    let mut app = EpsApp::new(&config, devices)?;

    if args.once {
        let report = app.tick_once()?;
        println!("{}", report);
        return Ok(());
    }

    let running = app.running_flag();
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        running.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    log::info!("urja-eps running. Press Ctrl-C to stop.");
    app.run()?;

    if app.safety().is_shutdown_requested() {
        log::warn!("Exiting with a host shutdown pending");
    }
    log::info!("urja-eps stopped");
    Ok(())
}
