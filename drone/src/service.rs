//! Drone flight agent: fuel, weapon/camera, and navigation subsystems running
//! as concurrent tasks over one shared, mutex-guarded state, plus a command
//! receive loop. Grounded on `original_source/drone.c`'s three pthreads +
//! main receive loop, and on `drone_simulator/src/flight_controller.rs` for
//! the task-per-subsystem layout. `pthread_cancel`'s cooperative-cancellation
//! role is played by the `autodestruct_received` `AtomicBool`, checked
//! without locking at the top of every loop iteration (SPEC_FULL.md §5); the
//! first task to observe it calls `perform_autodestruct` and the process
//! exit takes the others down with it.

use crate::flight;
use crate::state::DroneState;
use crate::DroneConfig;
use rand::Rng;
use shared::protocol::{self, Message, MsgType};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{Mutex, Notify};
use tracing::{info, warn};

pub struct Drone {
    global_id: u32,
    base_port: u16,
    vx: f64,
    vy: f64,
    r: f64,
    theta_step: f64,
    b: f64,
    a: f64,
    q_link_loss_percent: u32,
    z_recovery_rounds: u32,
    socket: UdpSocket,
    state: Mutex<DroneState>,
    autodestruct_received: AtomicBool,
    takeoff: Notify,
}

impl Drone {
    pub async fn bind(config: DroneConfig) -> shared::AgroResult<Arc<Self>> {
        let port = protocol::port_for_drone(config.params.base_port, config.global_id);
        let socket = UdpSocket::bind((protocol::HOST, port)).await?;
        let is_camera = protocol::is_camera_drone(config.global_id);

        Ok(Arc::new(Self {
            global_id: config.global_id,
            base_port: config.params.base_port,
            vx: config.params.vx,
            vy: config.params.vy,
            r: config.params.r,
            theta_step: config.params.theta_step,
            b: config.params.b,
            a: config.params.a,
            q_link_loss_percent: config.params.q_link_loss_percent,
            z_recovery_rounds: config.params.z_recovery_rounds,
            socket,
            state: Mutex::new(DroneState::new(config.truck_id, is_camera)),
            autodestruct_received: AtomicBool::new(false),
            takeoff: Notify::new(),
        }))
    }

    pub async fn run(self: Arc<Self>) -> shared::AgroResult<()> {
        self.send_hello().await;

        let fuel = tokio::spawn(self.clone().fuel_task());
        let weapon = tokio::spawn(self.clone().weapon_or_camera_task());
        let nav = tokio::spawn(self.clone().flight_task());
        let recv = tokio::spawn(self.clone().receive_loop());

        tokio::select! {
            _ = fuel => {}
            _ = weapon => {}
            _ = nav => {}
            _ = recv => {}
        }
        Ok(())
    }

    async fn send_hello(&self) {
        let swarm_id = self.state.lock().await.swarm_id;
        let text = format!("DRONE_HELLO {} PID {}", self.global_id, std::process::id());
        self.send_center(MsgType::Hello, swarm_id, &text).await;
    }

    async fn send_status(&self, text: &str) {
        let swarm_id = self.state.lock().await.swarm_id;
        self.send_center(MsgType::Status, swarm_id, text).await;
    }

    async fn send_center(&self, msg_type: MsgType, swarm_id: u32, text: &str) {
        let port = protocol::port_for_center(self.base_port);
        let msg = Message::new(msg_type, swarm_id as i32, self.global_id as i32, text);
        if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, port)).await {
            warn!(global_id = self.global_id, "send_center error: {}", e);
        }
    }

    async fn send_pos(&self) {
        let (swarm_id, x, y) = {
            let s = self.state.lock().await;
            (s.swarm_id, s.x, s.y)
        };
        let text = format!("POS {:.1} {:.1}", x, y);
        self.send_center(MsgType::Status, swarm_id, &text).await;

        let artillery_port = protocol::port_for_artillery(self.base_port);
        let msg = Message::new(MsgType::Status, swarm_id as i32, self.global_id as i32, text);
        if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, artillery_port)).await {
            warn!(global_id = self.global_id, "send_pos to artillery error: {}", e);
        }
    }

    async fn send_artillery_notice(&self, text: &str) {
        let swarm_id = self.state.lock().await.swarm_id;
        let port = protocol::port_for_artillery(self.base_port);
        let msg = Message::new(MsgType::Artillery, swarm_id as i32, self.global_id as i32, text);
        if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, port)).await {
            warn!(global_id = self.global_id, "send_artillery_notice error: {}", e);
        }
    }

    async fn perform_autodestruct(&self) -> ! {
        info!(global_id = self.global_id, "executing autodestruct by center order");
        self.send_status("AUTODESTRUCT_CONFIRMED").await;
        {
            let mut s = self.state.lock().await;
            s.detonated = true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::process::exit(0);
    }

    async fn fuel_task(self: Arc<Self>) {
        loop {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            let fuel_percent = {
                let mut s = self.state.lock().await;
                if s.detonated {
                    return;
                }
                s.fuel_percent -= 1;
                s.fuel_percent
            };
            if fuel_percent <= 0 {
                self.send_status("FUEL_ZERO_AUTODESTRUCT").await;
                self.state.lock().await.detonated = true;
                std::process::exit(0);
            }
        }
    }

    async fn weapon_or_camera_task(self: Arc<Self>) {
        loop {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            if self.state.lock().await.detonated {
                return;
            }
        }
    }

    async fn flight_task(self: Arc<Self>) {
        self.assembly_orbit().await;
        self.await_target().await;
        self.advance_to_target().await;
    }

    /// Orbits `(B, 0)` sending `IN_ASSEMBLY`/`POS` until `TAKEOFF` arrives or
    /// 100ms elapses, whichever first — matches the reference's
    /// `sem_timedwait` polling interval.
    async fn assembly_orbit(self: &Arc<Self>) {
        loop {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            if self.state.lock().await.detonated {
                return;
            }

            {
                let mut s = self.state.lock().await;
                let (theta, x, y) = flight::orbit_step(s.theta, self.theta_step, self.b, self.r);
                s.theta = theta;
                s.x = x;
                s.y = y;
            }
            self.send_status("IN_ASSEMBLY").await;
            self.send_pos().await;

            tokio::select! {
                _ = self.takeoff.notified() => {
                    self.send_status("TAKEOFF_RECEIVED").await;
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {}
            }
        }
    }

    async fn await_target(self: &Arc<Self>) {
        loop {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            let (received, detonated) = {
                let s = self.state.lock().await;
                (s.target_received, s.detonated)
            };
            if received || detonated {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn advance_to_target(self: &Arc<Self>) {
        loop {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            if self.state.lock().await.detonated {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;

            let (tx, ty) = {
                let s = self.state.lock().await;
                (s.target_x, s.target_y)
            };

            let (new_x, new_y, distance) = {
                let s = self.state.lock().await;
                flight::advance_step(s.x, s.y, tx, ty, self.vx, self.vy)
            };

            if flight::has_arrived(distance) {
                let is_camera = self.state.lock().await.is_camera;
                if is_camera {
                    self.send_status("CAMERA_REPORTED").await;
                    self.send_status("CAMERA_AUTODESTRUCT").await;
                } else {
                    self.send_status("ARRIVED_DETONATED").await;
                }
                self.state.lock().await.detonated = true;
                std::process::exit(0);
            }

            {
                let mut s = self.state.lock().await;
                s.x = new_x;
                s.y = new_y;
            }
            self.send_pos().await;

            let entered_defense_now = {
                let mut s = self.state.lock().await;
                if !s.entered_defense && flight::in_defense_zone(new_x, self.b, self.a) {
                    s.entered_defense = true;
                    true
                } else {
                    false
                }
            };
            if entered_defense_now {
                self.send_status("ENTERING_DEFENSE").await;
                self.send_artillery_notice(&format!("ENTERING_DEFENSE {}", self.global_id)).await;
            }

            if flight::in_defense_zone(new_x, self.b, self.a) {
                self.maybe_lose_link().await;
            }

            let announce_now = {
                let mut s = self.state.lock().await;
                if flight::in_reassembly_zone(new_x, self.a) && !s.announced_reassembly {
                    s.announced_reassembly = true;
                    true
                } else {
                    false
                }
            };
            if announce_now {
                self.send_status("IN_REASSEMBLY").await;
            }
        }
    }

    async fn maybe_lose_link(self: &Arc<Self>) {
        let roll = rand::thread_rng().gen_range(0..100);
        if roll >= self.q_link_loss_percent {
            return;
        }
        self.state.lock().await.have_link = false;
        self.send_status("LOST_LINK").await;

        let mut recovered = false;
        for _ in 0..self.z_recovery_rounds {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            if rand::thread_rng().gen_range(0..100) < 50 {
                recovered = true;
                break;
            }
        }

        if recovered {
            self.state.lock().await.have_link = true;
            self.send_status("LINK_RESTORED").await;
        } else {
            self.send_status("LINK_PERMANENT_LOSS").await;
            self.state.lock().await.detonated = true;
            std::process::exit(0);
        }
    }

    async fn receive_loop(self: Arc<Self>) {
        let mut buf = [0u8; protocol::MAX_MSG];
        loop {
            if self.autodestruct_received.load(Ordering::SeqCst) {
                self.perform_autodestruct().await;
            }
            let recv = tokio::time::timeout(Duration::from_millis(100), self.socket.recv_from(&mut buf)).await;
            let n = match recv {
                Ok(Ok((n, _addr))) => n,
                Ok(Err(e)) => {
                    warn!(global_id = self.global_id, "recv error: {}", e);
                    continue;
                }
                Err(_) => continue,
            };
            let Some(msg) = Message::decode(&buf[..n]) else {
                continue;
            };
            match msg.msg_type {
                MsgType::Command => self.handle_command(&msg).await,
                MsgType::Artillery => self.handle_artillery(&msg).await,
                _ => {}
            }
        }
    }

    async fn handle_command(self: &Arc<Self>, msg: &Message) {
        let text = msg.text.as_str();
        if text == "TAKEOFF" {
            self.takeoff.notify_one();
        } else if let Some(rest) = text.strip_prefix("TARGET ") {
            if let Some((tx, ty, tid)) = parse_target_triplet(rest) {
                let mut s = self.state.lock().await;
                s.target_x = tx;
                s.target_y = ty;
                s.target_id = tid;
                s.target_received = true;
                info!(global_id = self.global_id, tid, tx, ty, "target assigned");
            }
        } else if let Some(rest) = text.strip_prefix("RETARGET ") {
            if let Some((tx, ty, tid)) = parse_target_triplet(rest) {
                {
                    let mut s = self.state.lock().await;
                    s.target_x = tx;
                    s.target_y = ty;
                    s.target_id = tid;
                    s.target_received = true;
                }
                self.send_status("RETARGET_RECEIVED").await;
            }
        } else if text.starts_with("GO_TO_SWARM") {
            if msg.drone_id as u32 != self.global_id {
                return; // best-effort broadcast addressed to a different drone
            }
            if let Some(target) = text["GO_TO_SWARM".len()..].trim().parse::<u32>().ok() {
                self.state.lock().await.swarm_id = target;
                self.send_status("REASSIGNED").await;
            }
        } else if text == "AUTODESTRUCT_ALL" {
            info!(global_id = self.global_id, "received AUTODESTRUCT_ALL");
            self.autodestruct_received.store(true, Ordering::SeqCst);
        }
    }

    async fn handle_artillery(self: &Arc<Self>, msg: &Message) {
        if msg.text == "HIT" {
            info!(global_id = self.global_id, "hit by artillery");
            self.send_status("SHOT_DOWN_BY_ARTILLERY").await;
            self.state.lock().await.detonated = true;
            std::process::exit(0);
        }
    }
}

fn parse_target_triplet(rest: &str) -> Option<(f64, f64, u32)> {
    let mut parts = rest.split_whitespace();
    let tx: f64 = parts.next()?.parse().ok()?;
    let ty: f64 = parts.next()?.parse().ok()?;
    let tid: u32 = parts.next()?.parse().ok()?;
    Some((tx, ty, tid))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_well_formed_target_triplet() {
        assert_eq!(parse_target_triplet("100.0 50.0 2"), Some((100.0, 50.0, 2)));
    }

    #[test]
    fn rejects_a_malformed_target_triplet() {
        assert_eq!(parse_target_triplet("100.0 abc 2"), None);
        assert_eq!(parse_target_triplet("100.0 50.0"), None);
    }
}
