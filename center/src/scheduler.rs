//! The swarm scheduler: a background listener task and a periodic sweep task
//! that both mutate swarm state, guarded by `swarms_lock` and `reassign_lock`
//! (lock order: `reassign_lock` before `swarms_lock`; never send while
//! holding `swarms_lock`). Grounded on `mission_control/src/lib.rs`'s
//! `tokio::spawn` + `tokio::select!` composition and on
//! `original_source/control_center.c`'s listener/sweep split.

use crate::swarm::{target_coords, Assembled, Swarm};
use shared::config::SimParams;
use shared::protocol::{self, Message, MsgType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TERMINATION_STATUSES: [&str; 6] = [
    "DETONATED",
    "FUEL_ZERO_AUTODESTRUCT",
    "LINK_PERMANENT_LOSS",
    "SHOT_DOWN_BY_ARTILLERY",
    "CAMERA_AUTODESTRUCT",
    "ARRIVED_DETONATED",
];

pub struct Center {
    params: SimParams,
    socket: UdpSocket,
    swarms: Mutex<HashMap<u32, Swarm>>,
    reassign_lock: Mutex<()>,
}

impl Center {
    pub async fn bind(params: SimParams) -> shared::AgroResult<Arc<Self>> {
        let port = protocol::port_for_center(params.base_port);
        let socket = UdpSocket::bind((protocol::HOST, port)).await?;

        let num_targets = params.num_targets.max(1);
        let mut swarms = HashMap::with_capacity(params.num_swarms as usize);
        for swarm_id in 0..params.num_swarms {
            let target_id = swarm_id % num_targets;
            let (x, y) = target_coords(target_id, num_targets, params.c);
            swarms.insert(
                swarm_id,
                Swarm::new(swarm_id, swarm_id, params.assembly_size, target_id, x, y),
            );
        }

        info!(port, num_swarms = params.num_swarms, assembly_size = params.assembly_size, "center bound");

        Ok(Arc::new(Self {
            params,
            socket,
            swarms: Mutex::new(swarms),
            reassign_lock: Mutex::new(()),
        }))
    }

    pub async fn run(self: Arc<Self>) -> shared::AgroResult<()> {
        let listener = tokio::spawn(self.clone().listen_loop());
        let sweeper = tokio::spawn(self.clone().sweep_loop());

        tokio::select! {
            res = listener => { res.map_err(|e| shared::error::AgroError::Protocol(e.to_string()))?; }
            res = sweeper => { res.map_err(|e| shared::error::AgroError::Protocol(e.to_string()))?; }
        }
        Ok(())
    }

    async fn listen_loop(self: Arc<Self>) {
        let mut buf = [0u8; protocol::MAX_MSG];
        loop {
            let recv = tokio::time::timeout(Duration::from_millis(100), self.socket.recv_from(&mut buf)).await;
            let n = match recv {
                Ok(Ok((n, _addr))) => n,
                Ok(Err(e)) => {
                    warn!("recv error: {}", e);
                    continue;
                }
                Err(_) => continue, // 100ms timeout: let the sweep task run on schedule
            };
            match Message::decode(&buf[..n]) {
                Some(msg) => self.dispatch(msg).await,
                None => debug!("dropped malformed datagram"),
            }
        }
    }

    async fn dispatch(self: &Arc<Self>, msg: Message) {
        match msg.msg_type {
            MsgType::Hello => self.handle_hello(msg).await,
            MsgType::Status => self.handle_status(msg).await,
            MsgType::Artillery => self.handle_artillery(msg).await,
            MsgType::Command => debug!("center ignores inbound COMMAND-class messages"),
        }
    }

    async fn handle_hello(&self, msg: Message) {
        let swarm_id = msg.swarm_id as u32;
        let mut swarms = self.swarms.lock().await;
        match swarms.get_mut(&swarm_id) {
            Some(swarm) => {
                swarm.mark_hello(msg.drone_id as u32);
                info!(swarm_id, drone_id = msg.drone_id, "HELLO");
            }
            None => debug!(swarm_id, "HELLO for unknown swarm"),
        }
    }

    async fn handle_status(self: &Arc<Self>, msg: Message) {
        let swarm_id = msg.swarm_id as u32;
        let drone_id = msg.drone_id as u32;
        let text = msg.text.as_str();

        if text.starts_with("POS") || text == "LOST_LINK" || text == "LINK_RESTORED" {
            // Informational at this layer — artillery owns position tracking.
            return;
        }
        if text == "IN_ASSEMBLY" {
            self.maybe_dispatch_takeoff(swarm_id).await;
            return;
        }
        if text == "IN_REASSEMBLY" {
            self.maybe_reconform(swarm_id).await;
            return;
        }
        if text == "CAMERA_REPORTED" {
            self.handle_camera_reported(swarm_id).await;
            return;
        }
        if TERMINATION_STATUSES.contains(&text) {
            let reached_target = text == "ARRIVED_DETONATED" || text == "CAMERA_AUTODESTRUCT";
            self.record_termination(swarm_id, drone_id, reached_target).await;
        }
    }

    async fn handle_artillery(self: &Arc<Self>, msg: Message) {
        let text = msg.text.as_str();

        if let Some(rest) = text.strip_prefix("DRONE ") {
            if let Some((id_str, tag)) = rest.split_once(' ') {
                if tag.trim() == "SHOT_DOWN" {
                    if let Ok(global_id) = id_str.trim().parse::<u32>() {
                        if let Some(swarm_id) = self.find_swarm_for_drone(global_id).await {
                            self.record_termination(swarm_id, global_id, false).await;
                        }
                    }
                }
            }
            return;
        }

        if let Some(rest) = text.strip_prefix("TRUCK_READY ") {
            if let Ok(truck_id) = rest.trim().parse::<u32>() {
                let mut swarms = self.swarms.lock().await;
                if let Some(swarm) = swarms.get_mut(&truck_id) {
                    swarm.truck_ready = true;
                }
            }
            info!(%text, "truck readiness announcement");
            return;
        }

        debug!(%text, "unhandled ARTILLERY-class message at center");
    }

    async fn find_swarm_for_drone(&self, global_id: u32) -> Option<u32> {
        let swarms = self.swarms.lock().await;
        swarms
            .values()
            .find(|s| s.slots.iter().flatten().any(|e| e.global_id == global_id))
            .map(|s| s.id)
    }

    async fn record_termination(self: &Arc<Self>, swarm_id: u32, global_id: u32, reached_target: bool) {
        let became_incomplete = {
            let mut swarms = self.swarms.lock().await;
            let Some(swarm) = swarms.get_mut(&swarm_id) else {
                return;
            };
            if !swarm.terminate_drone(global_id, reached_target) {
                debug!(swarm_id, global_id, "duplicate termination notice ignored");
                return;
            }
            let active = swarm.active_count();
            info!(swarm_id, global_id, active, "drone terminated");
            if active == 0 {
                swarm.in_reassembly = false;
                false
            } else if active < swarm.assembly_size() && !swarm.is_destroyed {
                if !swarm.in_reassembly {
                    swarm.in_reassembly = true;
                    swarm.reassembly_start = Some(Instant::now());
                    swarm.assembled = Assembled::NotReady;
                }
                true
            } else {
                false
            }
        };

        if became_incomplete {
            let no_hope = {
                let swarms = self.swarms.lock().await;
                self.no_peer_can_ever_help(&swarms, swarm_id)
            };
            if no_hope {
                self.autodestruct_swarm(swarm_id).await;
            } else {
                self.reconform_from_neighbors(swarm_id).await;
            }
        }

        if self.all_swarms_complete().await {
            self.terminate_simulation().await;
        }
    }

    fn no_peer_can_ever_help(&self, swarms: &HashMap<u32, Swarm>, target_id: u32) -> bool {
        swarms.values().all(|s| s.id == target_id || s.is_terminal())
    }

    async fn handle_camera_reported(&self, swarm_id: u32) {
        let report = {
            let mut swarms = self.swarms.lock().await;
            let Some(swarm) = swarms.get_mut(&swarm_id) else {
                return;
            };
            if swarm.camera_reported {
                return;
            }
            swarm.camera_reported = true;
            let assembly_size = swarm.assembly_size();
            let reached = swarm.reached_target_count();
            let verdict = if reached >= assembly_size.saturating_sub(1) {
                "DESTROYED"
            } else if reached >= 2 {
                "PARTIALLY_DESTROYED"
            } else {
                "INTACT"
            };
            (swarm.target_id, verdict)
        };
        info!(target_id = report.0, verdict = report.1, "target damage report");
    }

    async fn maybe_dispatch_takeoff(self: &Arc<Self>, swarm_id: u32) {
        let dispatch = {
            let mut swarms = self.swarms.lock().await;
            let Some(swarm) = swarms.get_mut(&swarm_id) else {
                return;
            };
            if swarm.assembled != Assembled::NotReady || !swarm.is_full() {
                None
            } else {
                swarm.assembled = Assembled::Ready;
                Some((swarm.truck_id, swarm.target_id, swarm.target_x, swarm.target_y))
            }
        };
        let Some((truck_id, target_id, target_x, target_y)) = dispatch else {
            return;
        };

        self.send_to_truck(truck_id, &format!("TARGET {:.1} {:.1} {}", target_x, target_y, target_id))
            .await;
        self.send_to_truck(truck_id, "TAKEOFF").await;

        let mut swarms = self.swarms.lock().await;
        if let Some(swarm) = swarms.get_mut(&swarm_id) {
            swarm.assembled = Assembled::TakeoffSent;
        }
        drop(swarms);
        info!(swarm_id, "dispatched TARGET + TAKEOFF");
    }

    async fn maybe_reconform(self: &Arc<Self>, swarm_id: u32) {
        let needs = {
            let mut swarms = self.swarms.lock().await;
            match swarms.get_mut(&swarm_id) {
                Some(swarm) if !swarm.is_destroyed && swarm.active_count() > 0 && swarm.active_count() < swarm.assembly_size() => {
                    if !swarm.in_reassembly {
                        swarm.in_reassembly = true;
                        swarm.reassembly_start = Some(Instant::now());
                    }
                    true
                }
                _ => false,
            }
        };
        if needs {
            self.reconform_from_neighbors(swarm_id).await;
        }
    }

    /// Expanding-radius search over peers (T-1, T+1, T-2, T+2, ...), serialized
    /// by `reassign_lock` so donor/recipient accounting never interleaves.
    async fn reconform_from_neighbors(self: &Arc<Self>, target_id: u32) {
        let _guard = self.reassign_lock.lock().await;
        let num_swarms = self.params.num_swarms;
        let mut step = 1u32;
        loop {
            let still_needs = {
                let swarms = self.swarms.lock().await;
                swarms
                    .get(&target_id)
                    .map(|s| !s.is_destroyed && s.active_count() < s.assembly_size())
                    .unwrap_or(false)
            };
            if !still_needs || step > num_swarms {
                break;
            }

            let mut donated = false;
            for candidate in [target_id.checked_sub(step), Some(target_id + step)].into_iter().flatten() {
                if candidate >= num_swarms || candidate == target_id {
                    continue;
                }
                if self.try_reassign_one(candidate, target_id).await {
                    donated = true;
                    break;
                }
            }
            if !donated {
                step += 1;
            }
        }

        let mut swarms = self.swarms.lock().await;
        if let Some(swarm) = swarms.get_mut(&target_id) {
            if swarm.is_full() && swarm.in_reassembly {
                swarm.in_reassembly = false;
                swarm.reassembly_start = None;
                info!(target_id, "swarm fully reconformed");
            }
        }
    }

    /// Attempts to move exactly one drone from `donor_id` to `target_id`.
    /// Returns `true` iff a drone actually moved.
    async fn try_reassign_one(self: &Arc<Self>, donor_id: u32, target_id: u32) -> bool {
        struct Moved {
            drone_id: u32,
            donor_truck_id: u32,
            target_x: f64,
            target_y: f64,
            target_catalog_id: u32,
        }

        let moved = {
            let mut swarms = self.swarms.lock().await;
            let donor_drone = match swarms.get(&donor_id) {
                Some(d) if !d.is_destroyed && d.active_count() > 0 && d.active_count() < d.assembly_size() => d.peek_donor_drone(),
                _ => None,
            };
            let target_needs = swarms.get(&target_id).map(|t| t.active_count() < t.assembly_size()).unwrap_or(false);
            match (donor_drone, target_needs) {
                (Some(drone_id), true) => {
                    swarms.get_mut(&donor_id).unwrap().terminate_drone(drone_id, false);
                    swarms.get_mut(&target_id).unwrap().install_drone(drone_id);

                    // Donor-cascade: a donor that was itself only incomplete
                    // because it donated earlier (rather than through a
                    // termination notice) never went through
                    // `record_termination`, so its own `in_reassembly` timer
                    // may not be running yet. Start it here if needed.
                    let donor = swarms.get_mut(&donor_id).unwrap();
                    if donor.active_count() == 0 {
                        donor.in_reassembly = false;
                    } else if !donor.in_reassembly {
                        donor.in_reassembly = true;
                        donor.reassembly_start = Some(Instant::now());
                    }

                    let donor_truck_id = swarms.get(&donor_id).unwrap().truck_id;
                    let target = swarms.get(&target_id).unwrap();
                    Some(Moved {
                        drone_id,
                        donor_truck_id,
                        target_x: target.target_x,
                        target_y: target.target_y,
                        target_catalog_id: target.target_id,
                    })
                }
                _ => None,
            }
        };

        let Some(moved) = moved else {
            return false;
        };

        // (a) bookkeeping to the donor's truck, envelope drone_id carries
        // which drone moved so the truck's best-effort broadcast can be
        // filtered by the receiving drones.
        let truck_port = protocol::port_for_truck(self.params.base_port, moved.donor_truck_id);
        self.send(
            truck_port,
            Message::new(MsgType::Command, donor_id as i32, moved.drone_id as i32, format!("REASSIGN_ONE_TO {}", target_id)),
        )
        .await;
        // (b) TARGET repeated to the recipient's truck.
        self.send_to_truck(
            target_id,
            &format!("TARGET {:.1} {:.1} {}", moved.target_x, moved.target_y, moved.target_catalog_id),
        )
        .await;
        // (c) RETARGET directly to the moved drone.
        self.send_to_drone(
            target_id,
            moved.drone_id,
            &format!("RETARGET {:.1} {:.1} {}", moved.target_x, moved.target_y, moved.target_catalog_id),
        )
        .await;
        // (d) keep artillery's tracking table's swarm tag in sync.
        self.send_to_artillery(target_id as i32, moved.drone_id as i32, &format!("REASSIGN {} {}", moved.drone_id, target_id))
            .await;

        info!(donor_id, target_id, drone_id = moved.drone_id, "reassigned drone");
        true
    }

    async fn autodestruct_swarm(self: &Arc<Self>, swarm_id: u32) {
        let survivors: Vec<u32> = {
            let mut swarms = self.swarms.lock().await;
            let Some(swarm) = swarms.get_mut(&swarm_id) else {
                return;
            };
            if swarm.is_destroyed {
                return;
            }
            swarm.is_destroyed = true;
            swarm.in_reassembly = false;
            swarm
                .slots
                .iter()
                .filter_map(|s| match s {
                    Some(e) if !e.terminated => Some(e.global_id),
                    _ => None,
                })
                .collect()
        };
        warn!(swarm_id, survivors = survivors.len(), "reconformation infeasible, autodestructing swarm");
        for global_id in survivors {
            self.send_to_drone(swarm_id, global_id, "AUTODESTRUCT_ALL").await;
        }
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        let mut ticks = 0u64;
        loop {
            interval.tick().await;
            self.sweep_once().await;
            ticks += 1;
            if ticks % 5 == 0 {
                self.print_status().await;
            }
            if self.all_swarms_complete().await {
                self.terminate_simulation().await;
                return;
            }
        }
    }

    async fn sweep_once(self: &Arc<Self>) {
        let swarm_ids: Vec<u32> = {
            let swarms = self.swarms.lock().await;
            swarms.keys().copied().collect()
        };
        for swarm_id in swarm_ids {
            let verdict = {
                let swarms = self.swarms.lock().await;
                match swarms.get(&swarm_id) {
                    Some(swarm) if !swarm.is_destroyed && swarm.in_reassembly => {
                        if self.no_peer_can_ever_help(&swarms, swarm_id) {
                            Some(true)
                        } else {
                            let elapsed = swarm.reassembly_start.map(|t| t.elapsed()).unwrap_or_default();
                            Some(elapsed > Duration::from_secs(self.params.max_wait_reassembly_secs))
                        }
                    }
                    _ => None,
                }
            };
            match verdict {
                Some(true) => self.autodestruct_swarm(swarm_id).await,
                Some(false) => self.reconform_from_neighbors(swarm_id).await,
                None => {}
            }
        }
    }

    async fn all_swarms_complete(&self) -> bool {
        let swarms = self.swarms.lock().await;
        swarms.values().all(|s| s.is_terminal())
    }

    async fn terminate_simulation(&self) {
        info!("all swarms complete, terminating");
        self.send_to_artillery(-1, -1, "TERMINATE").await;
        std::process::exit(0);
    }

    async fn print_status(&self) {
        let swarms = self.swarms.lock().await;
        for swarm in swarms.values() {
            info!(
                swarm_id = swarm.id,
                active = swarm.active_count(),
                assembly_size = swarm.assembly_size(),
                destroyed = swarm.is_destroyed,
                in_reassembly = swarm.in_reassembly,
                "swarm status"
            );
        }
    }

    async fn send(&self, port: u16, msg: Message) {
        let bytes = msg.encode();
        if let Err(e) = self.socket.send_to(&bytes, (protocol::HOST, port)).await {
            warn!(port, "send error: {}", e);
        }
    }

    async fn send_to_truck(&self, truck_id: u32, text: &str) {
        let port = protocol::port_for_truck(self.params.base_port, truck_id);
        self.send(port, Message::new(MsgType::Command, truck_id as i32, 0, text)).await;
    }

    async fn send_to_drone(&self, swarm_id: u32, global_id: u32, text: &str) {
        let port = protocol::port_for_drone(self.params.base_port, global_id);
        self.send(port, Message::new(MsgType::Command, swarm_id as i32, global_id as i32, text)).await;
    }

    async fn send_to_artillery(&self, swarm_id: i32, drone_id: i32, text: &str) {
        let port = protocol::port_for_artillery(self.params.base_port);
        self.send(port, Message::new(MsgType::Artillery, swarm_id, drone_id, text)).await;
    }
}
