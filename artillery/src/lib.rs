pub mod service;
pub mod tracking;

use clap::Parser;
use shared::config::SimParams;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "artillery", about = "Anti-drone defense system")]
pub struct Args {
    /// Path to the key=value simulation parameter file. Unlike the other
    /// roles, a missing file here falls back to defaults rather than
    /// aborting.
    pub params_path: PathBuf,
}

pub struct ArtilleryConfig {
    pub params: SimParams,
}

impl ArtilleryConfig {
    pub fn load(args: &Args) -> Self {
        let params = SimParams::load_lenient(&args.params_path);
        Self { params }
    }
}
