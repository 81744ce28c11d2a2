use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use tracker::config::Config;
use tracker::network::Server;
use tracker::session::Session;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[clap(short, long, default_value = "config.toml")]
    config: PathBuf,
    /// UDP address to receive relay packets on, overrides the config file
    #[clap(short, long)]
    listen: Option<String>,
    /// Pit lane speed limit in km/h, overrides the config file
    #[clap(short, long)]
    speed_limit: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    if let Some(listen) = args.listen {
        config.tracker.listen = listen;
    }
    if let Some(limit) = args.speed_limit {
        config.pit_lane.speed_limit_kmh = Some(limit);
    }
    config.validate()?;

    match config.pit_lane.speed_limit_kmh {
        Some(limit) => info!("Pit lane speed limit set to {} km/h", limit),
        None => info!("No pit lane speed limit configured, penalties disabled"),
    }

    let session = Session::new(config.session_config());
    let server = Server::new(&config.tracker.listen, session).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Tracker stopped: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
