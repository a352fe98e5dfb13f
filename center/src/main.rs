use center::{scheduler::Center, Args, CenterConfig};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    shared::init_logging()?;
    let args = Args::parse();
    let config = CenterConfig::load(&args)?;

    let center = Center::bind(config.params).await?;
    center.run().await?;
    Ok(())
}
