pub mod scheduler;
pub mod swarm;

use clap::Parser;
use shared::config::SimParams;
use shared::AgroResult;
use std::path::PathBuf;

/// The center coordinates every swarm from a single parameter file; unlike
/// artillery it has no lenient fallback — a missing file is fatal.
#[derive(Debug, Parser)]
#[command(name = "center", about = "Swarm coordination center")]
pub struct Args {
    /// Path to the key=value simulation parameter file.
    pub params_path: PathBuf,
}

pub struct CenterConfig {
    pub params: SimParams,
}

impl CenterConfig {
    pub fn load(args: &Args) -> AgroResult<Self> {
        let params = SimParams::load(&args.params_path)?;
        Ok(Self { params })
    }
}
