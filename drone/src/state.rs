//! State guarded by a single lock, mirroring `original_source/drone.c`'s
//! `sem_state` binary semaphore protecting `have_link`/`fuel_percent`/
//! `detonated`/`target_*`/position together.

#[derive(Debug, Clone)]
pub struct DroneState {
    pub have_link: bool,
    pub fuel_percent: i32,
    pub detonated: bool,
    pub is_camera: bool,
    pub swarm_id: u32,
    pub target_x: f64,
    pub target_y: f64,
    pub target_id: u32,
    pub target_received: bool,
    pub x: f64,
    pub y: f64,
    pub theta: f64,
    pub announced_reassembly: bool,
    pub entered_defense: bool,
}

impl DroneState {
    pub fn new(swarm_id: u32, is_camera: bool) -> Self {
        Self {
            have_link: true,
            fuel_percent: 100,
            detonated: false,
            is_camera,
            swarm_id,
            target_x: 100.0,
            target_y: 0.0,
            target_id: 0,
            target_received: false,
            x: 0.0,
            y: 0.0,
            theta: 0.0,
            announced_reassembly: false,
            entered_defense: false,
        }
    }
}
