use clap::Parser;
use drone::{service::Drone, Args, DroneConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_logging()?;
    let args = Args::parse();
    let config = DroneConfig::load(&args)?;

    let drone = Drone::bind(config).await?;
    drone.run().await?;
    Ok(())
}
