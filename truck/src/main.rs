use clap::Parser;
use truck::{service::Truck, Args, TruckConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_logging()?;
    let args = Args::parse();
    let config = TruckConfig::load(&args)?;

    let truck = Truck::bind(config).await?;
    truck.run().await?;
    Ok(())
}
