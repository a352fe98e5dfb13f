pub mod flight;
pub mod service;
pub mod state;

use clap::Parser;
use shared::config::SimParams;
use shared::AgroResult;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "drone", about = "Single flight agent within a swarm")]
pub struct Args {
    /// Path to the key=value simulation parameter file.
    pub params_path: PathBuf,
    /// This drone's global id (truck_id*100 + slot + 1).
    pub global_id: u32,
    /// The truck (initial swarm) this drone belongs to.
    pub truck_id: u32,
}

pub struct DroneConfig {
    pub params: SimParams,
    pub global_id: u32,
    pub truck_id: u32,
}

impl DroneConfig {
    pub fn load(args: &Args) -> AgroResult<Self> {
        let params = SimParams::load(&args.params_path)?;
        Ok(Self {
            params,
            global_id: args.global_id,
            truck_id: args.truck_id,
        })
    }
}
