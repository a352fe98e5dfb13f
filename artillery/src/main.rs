use artillery::{service::Artillery, Args, ArtilleryConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_logging()?;
    let args = Args::parse();
    let config = ArtilleryConfig::load(&args);

    let artillery = Artillery::bind(config).await?;
    artillery.run().await?;
    Ok(())
}
