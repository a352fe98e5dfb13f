pub mod service;

use clap::Parser;
use shared::config::SimParams;
use shared::AgroResult;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "truck", about = "Launches and relays commands to one swarm's drones")]
pub struct Args {
    /// Path to the key=value simulation parameter file.
    pub params_path: PathBuf,
    /// This truck's id — also its swarm id.
    pub truck_id: u32,
}

pub struct TruckConfig {
    pub params: SimParams,
    pub truck_id: u32,
    pub params_path: PathBuf,
}

impl TruckConfig {
    pub fn load(args: &Args) -> AgroResult<Self> {
        let params = SimParams::load(&args.params_path)?;
        Ok(Self {
            params,
            truck_id: args.truck_id,
            params_path: args.params_path.clone(),
        })
    }
}
