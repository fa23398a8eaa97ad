//! CLI for bmpmon: sample a BMP280, batch readings into SQLite, serve them over HTTP.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use bmpmon_core::sensors::Accuracy;
use bmpmon_core::{PipelineConfig, SensorConfig, parse_accuracy, parse_address, parse_duration};
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bmpmon")]
#[command(about = "bmpmon: buffered barometric telemetry for the BMP280")]
#[command(version = bmpmon_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where to find the sensor.
#[derive(Args)]
struct SensorArgs {
    /// I2C bus number (/dev/i2c-N)
    #[arg(long, default_value_t = 1)]
    bus: u8,

    /// 7-bit sensor address, hex or decimal
    #[arg(long, default_value = "0x77", value_parser = parse_address)]
    address: u8,

    /// Oversampling preset: ultra-low, low, standard, high, ultra-high
    #[arg(long, default_value = "standard", value_parser = parse_accuracy)]
    accuracy: Accuracy,

    /// Use a simulated sensor instead of the I2C device
    #[arg(long)]
    simulate: bool,
}

impl SensorArgs {
    fn config(&self) -> SensorConfig {
        SensorConfig {
            bus: self.bus,
            address: self.address,
            accuracy: self.accuracy,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Sample on a fixed interval, store readings in batches and serve them over HTTP
    Run {
        #[command(flatten)]
        sensor: SensorArgs,

        /// SQLite database path
        #[arg(long, default_value = "storage.sqlite3")]
        db: PathBuf,

        /// Readings buffered in memory before a flush
        #[arg(long, default_value_t = 10)]
        capacity: usize,

        /// Sampling interval (e.g. 100ms, 30s, 15m, 1h)
        #[arg(long, default_value = "15m", value_parser = parse_duration)]
        interval: Duration,

        /// Host to bind the HTTP server to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// HTTP port
        #[arg(long, default_value_t = 80)]
        port: u16,

        /// Run the pipeline without the HTTP server
        #[arg(long)]
        no_server: bool,
    },

    /// Take live readings without storing them
    Sample {
        #[command(flatten)]
        sensor: SensorArgs,

        /// Number of readings to take
        #[arg(long, default_value_t = 1)]
        count: usize,

        /// Pause between readings
        #[arg(long, default_value = "1s", value_parser = parse_duration)]
        interval: Duration,

        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },

    /// Check that the BMP280 responds and print its calibration
    Probe {
        /// I2C bus number (/dev/i2c-N)
        #[arg(long, default_value_t = 1)]
        bus: u8,

        /// 7-bit sensor address, hex or decimal
        #[arg(long, default_value = "0x77", value_parser = parse_address)]
        address: u8,

        /// Oversampling preset for the test measurement
        #[arg(long, default_value = "standard", value_parser = parse_accuracy)]
        accuracy: Accuracy,
    },

    /// Print the most recent stored readings
    Fetch {
        /// SQLite database path
        #[arg(long, default_value = "storage.sqlite3")]
        db: PathBuf,

        /// Number of readings
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Print a JSON array
        #[arg(long)]
        json: bool,
    },
}

fn main() -> commands::CliResult {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            sensor,
            db,
            capacity,
            interval,
            host,
            port,
            no_server,
        } => commands::run::run(commands::run::RunCommandConfig {
            pipeline: PipelineConfig {
                capacity,
                interval,
                db_path: db,
                ..PipelineConfig::default()
            },
            sensor: sensor.config(),
            simulate: sensor.simulate,
            host,
            port,
            serve_http: !no_server,
        }),
        Commands::Sample {
            sensor,
            count,
            interval,
            json,
        } => commands::sample::run(sensor.config(), sensor.simulate, count, interval, json),
        Commands::Probe {
            bus,
            address,
            accuracy,
        } => commands::probe::run(SensorConfig {
            bus,
            address,
            accuracy,
        }),
        Commands::Fetch { db, count, json } => commands::fetch::run(&db, count, json),
    }
}
