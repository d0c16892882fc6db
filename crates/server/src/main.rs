mod config;
mod station;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use config::StationConfig;
use station::Station;

#[derive(Parser)]
#[command(name = "stationbus-server")]
#[command(about = "Demo station running on the device network")]
struct Args {
    #[arg(short, long, default_value_t = 40)]
    ticks: u32,

    #[arg(long, default_value_t = 10)]
    tick_rate: u32,

    #[arg(short, long, default_value_t = 3)]
    sensors: usize,

    #[arg(long, default_value_t = 10.0, help = "Wireless reception range")]
    wireless_range: f32,

    #[arg(long, default_value_t = 4.0, help = "Distance between sensors")]
    sensor_spacing: f32,

    #[arg(long, help = "Run without pacing to the tick rate")]
    fast: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = StationConfig {
        tick_rate: args.tick_rate.max(1),
        ticks: args.ticks,
        sensor_count: args.sensors,
        sensor_spacing: args.sensor_spacing,
        wireless_range: args.wireless_range,
        ..StationConfig::default()
    };

    let mut station = Station::new(config.clone())?;
    log::info!(
        "station up: {} connections, {} ticks at {} Hz",
        station.connection_count(),
        config.ticks,
        config.tick_rate
    );

    let dt = Duration::from_secs_f32(1.0 / config.tick_rate as f32);
    for _ in 0..config.ticks {
        let start = Instant::now();
        station.tick_once();
        if !args.fast {
            let elapsed = start.elapsed();
            if elapsed < dt {
                thread::sleep(dt - elapsed);
            }
        }
    }

    let delivered = station.delivered();
    station.shutdown();
    log::info!("station down after {} ticks, {} packets delivered", station.tick(), delivered);

    Ok(())
}
