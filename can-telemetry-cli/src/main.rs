//! CAN Telemetry CLI Application
//!
//! Command-line front end for the can-telemetry library:
//! - `serve` runs the UDP ingestion pipeline and optionally prints live updates
//! - `simulate` sends synthetic battery, GPS and motor frames to a listener

use anyhow::{Context, Result};
use can_telemetry::{CancellationToken, SignalMap, TelemetryService};
use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

mod config;
mod console;
mod sim;

use config::{AppConfig, ConsoleFormat};

/// CAN Telemetry - Decode CAN frames from UDP and stream live values
#[derive(Parser, Debug)]
#[command(name = "can-telemetry")]
#[command(about = "Decode CAN frames received over UDP and stream live signal values", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Receive, decode and distribute CAN frames
    Serve {
        /// Path to configuration file (telemetry.toml)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Signal map JSON file (overrides the config file)
        #[arg(short, long, value_name = "FILE")]
        map: Option<PathBuf>,

        /// Address to listen on
        #[arg(long, value_name = "IP")]
        bind: Option<IpAddr>,

        /// UDP port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Print every decoded update on stdout
        #[arg(long)]
        print_updates: bool,

        /// Output format for printed updates
        #[arg(long, value_enum)]
        format: Option<ConsoleFormat>,
    },

    /// Send simulated battery frames to a listener
    Simulate {
        /// Target IP address
        #[arg(long, default_value = "127.0.0.1")]
        ip: IpAddr,

        /// Target UDP port
        #[arg(short, long, default_value_t = 1234)]
        port: u16,

        /// Send rate in Hz
        #[arg(short, long, default_value_t = 10.0)]
        rate: f64,

        /// Comma-separated board IDs to simulate
        #[arg(short, long, value_delimiter = ',', default_value = "0,1,2,3,4,5,6,7,8,9")]
        boards: Vec<u8>,

        /// Stop after this many send cycles
        #[arg(long, value_name = "COUNT")]
        cycles: Option<u64>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("CAN Telemetry CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using telemetry library v{}", can_telemetry::VERSION);

    let token = CancellationToken::new();
    let handler_token = token.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupt received, shutting down...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl-C handler")?;

    match args.command {
        Command::Serve {
            config: config_path,
            map,
            bind,
            port,
            print_updates,
            format,
        } => {
            let mut app_config = match &config_path {
                Some(path) => {
                    log::info!("Loading configuration from: {:?}", path);
                    config::load_config(path)?
                }
                None => AppConfig::default(),
            };

            if let Some(map) = map {
                app_config.signals.map_file = map;
            }
            if let Some(bind) = bind {
                app_config.pipeline.bind_address = bind;
            }
            if let Some(port) = port {
                app_config.pipeline.udp_port = port;
            }
            if print_updates {
                app_config.console.enabled = true;
            }
            if let Some(format) = format {
                app_config.console.format = format;
            }

            serve(app_config, token)
        }
        Command::Simulate {
            ip,
            port,
            rate,
            boards,
            cycles,
        } => {
            let sim_config = sim::SimulatorConfig {
                target: SocketAddr::new(ip, port),
                rate_hz: rate,
                boards,
                cycles,
            };
            sim::run(&sim_config, &token)?;
            Ok(())
        }
    }
}

/// Serve mode - run the pipeline until Ctrl-C or a fatal listener error
fn serve(app_config: AppConfig, token: CancellationToken) -> Result<()> {
    let signal_map = SignalMap::load_or_empty(&app_config.signals.map_file);
    let stats = signal_map.stats();
    log::info!(
        "Signal map: {} frames, {} signals",
        stats.num_frames,
        stats.num_signals
    );

    let service = TelemetryService::start(app_config.pipeline.clone(), signal_map, token.clone())
        .context("Failed to start telemetry pipeline")?;

    let console = if app_config.console.enabled {
        Some(console::spawn(
            &service.hub(),
            app_config.console.format,
            app_config.console.queue_capacity,
            token.clone(),
        )?)
    } else {
        None
    };

    let result = service
        .run_until_cancelled()
        .context("Telemetry pipeline stopped with an error");

    token.cancel();
    if let Some(console) = console {
        if console.join().is_err() {
            log::error!("Console viewer panicked");
        }
    }

    result
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
