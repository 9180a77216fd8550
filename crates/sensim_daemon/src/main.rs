use anyhow::Context;
use clap::{Parser, Subcommand};
use sensim_core::{time_seed, SensorFile, DEFAULT_SENSOR_FILE};
use sensim_daemon::config::{DaemonConfig, NetworkConfig};
use sensim_daemon::{logging, Supervisor};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "sensim")]
#[command(about = "Sensor fleet simulator - streams $FIX readings to TCP receivers")]
struct Cli {
    /// Daemon settings (TOML). Defaults to ~/.sensim/config.toml when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Sensor definitions (JSON)
    #[arg(long, global = true, default_value = DEFAULT_SENSOR_FILE)]
    sensors: PathBuf,

    /// Override network.base_port; sensor N listens on base + N
    #[arg(long, global = true)]
    base_port: Option<u16>,

    /// Override network.bind_address
    #[arg(long, global = true)]
    bind: Option<IpAddr>,

    /// Log JSON lines regardless of logging.json
    #[arg(long, global = true)]
    json_logs: bool,

    /// PRNG seed for `run`; a fixed seed replays the same readings
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start every sensor and stream readings until interrupted (default)
    Run,
    /// Validate the sensor file and print each sensor's port and cadence
    Check,
    /// Write the effective daemon settings as TOML
    InitConfig {
        /// Output path (default: ~/.sensim/config.toml)
        output: Option<PathBuf>,
    },
}

fn load_supervisor(sensors: &Path, network: NetworkConfig, seed: u64) -> anyhow::Result<Supervisor> {
    let sensors = SensorFile::load(sensors)
        .context("Invalid sensor configuration")?
        .into_sensors();
    Supervisor::new(sensors, network, seed).context("Invalid listener plan")
}

fn run_fleet(sensors: &Path, network: NetworkConfig, seed: Option<u64>) -> anyhow::Result<()> {
    let seed = seed.unwrap_or_else(time_seed);
    // Everything is validated before the runtime or any task starts
    let supervisor = load_supervisor(sensors, network, seed)?;

    let rt = tokio::runtime::Runtime::new().context("Cannot start tokio runtime")?;
    rt.block_on(async {
        let mut fleet = supervisor.start();

        let stop = tokio::select! {
            _ = fleet.wait() => {
                warn!("All sensor tasks exited");
                true
            }
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    info!("Shutdown requested");
                    true
                }
                Err(e) => {
                    error!(error = %e, "Cannot listen for Ctrl-C, running until killed");
                    false
                }
            },
        };
        if !stop {
            fleet.wait().await;
        }

        fleet.shutdown().await;
    });

    Ok(())
}

fn check(sensors: &Path, network: NetworkConfig) -> anyhow::Result<()> {
    let supervisor = load_supervisor(sensors, network, 0)?;
    let plan = supervisor.plan();

    println!("{}: {} sensor(s) OK", sensors.display(), plan.len());
    for planned in plan {
        println!(
            "  sensor {:>5}  {:<31}  {}  every {:?}",
            planned.sensor_id, planned.sensor_type, planned.addr, planned.interval
        );
    }
    Ok(())
}

fn init_config(config: &DaemonConfig, output: Option<PathBuf>) -> anyhow::Result<()> {
    let path = output.unwrap_or_else(DaemonConfig::get_config_path);
    config.save(&path)?;
    info!(path = %path.display(), "Wrote daemon config");
    Ok(())
}

fn execute(cli: Cli, mut config: DaemonConfig) -> anyhow::Result<()> {
    if let Some(base_port) = cli.base_port {
        config.network.base_port = base_port;
    }
    if let Some(bind) = cli.bind {
        config.network.bind_address = bind;
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_fleet(&cli.sensors, config.network, cli.seed),
        Commands::Check => check(&cli.sensors, config.network),
        Commands::InitConfig { output } => init_config(&config, output),
    }
}

fn main() {
    let cli = Cli::parse();

    let config = DaemonConfig::load(cli.config.as_deref());
    let logging_config = config
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    if let Err(e) = logging::init(&logging_config, cli.json_logs) {
        eprintln!("Logging unavailable: {e}");
    }

    let result = config
        .context("Invalid daemon config")
        .and_then(|config| execute(cli, config));

    if let Err(e) = result {
        error!(error = format!("{e:#}"), "Fatal Error");
        std::process::exit(1);
    }
}
