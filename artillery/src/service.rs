//! Anti-drone defense system: a listener task ingesting position/status
//! reports, a periodic engagement cycle, and a periodic status print.
//! Grounded on `original_source/artillery.c`'s `listener_thread` +
//! `engagement_thread` + main status loop, and on `mission_control`'s
//! `tokio::select!` composition of concurrent background tasks.

use crate::tracking::{self, TrackedDrone};
use crate::ArtilleryConfig;
use rand::Rng;
use shared::protocol::{self, Message, MsgType};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct Artillery {
    base_port: u16,
    w_hit_percent: u32,
    b: f64,
    a: f64,
    artillery_rate_secs: u64,
    socket: UdpSocket,
    tracked: Mutex<HashMap<u32, TrackedDrone>>,
}

impl Artillery {
    pub async fn bind(config: ArtilleryConfig) -> shared::AgroResult<Arc<Self>> {
        let port = protocol::port_for_artillery(config.params.base_port);
        let socket = UdpSocket::bind((protocol::HOST, port)).await?;
        info!(
            port,
            defense_zone = format!("{:.1}..={:.1}", config.params.b, config.params.a),
            hit_chance = config.params.w_hit_percent,
            "artillery online"
        );

        Ok(Arc::new(Self {
            base_port: config.params.base_port,
            w_hit_percent: config.params.w_hit_percent,
            b: config.params.b,
            a: config.params.a,
            artillery_rate_secs: config.params.artillery_rate_secs,
            socket,
            tracked: Mutex::new(HashMap::new()),
        }))
    }

    pub async fn run(self: Arc<Self>) -> shared::AgroResult<()> {
        let listener = tokio::spawn(self.clone().listen_loop());
        let engagement = tokio::spawn(self.clone().engagement_loop());
        let status = tokio::spawn(self.clone().status_loop());

        tokio::select! {
            _ = listener => {}
            _ = engagement => {}
            _ = status => {}
        }
        Ok(())
    }

    async fn listen_loop(self: Arc<Self>) {
        let mut buf = [0u8; protocol::MAX_MSG];
        loop {
            let (n, _addr) = match self.socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("recv error: {}", e);
                    continue;
                }
            };
            let Some(msg) = Message::decode(&buf[..n]) else {
                continue;
            };
            match msg.msg_type {
                MsgType::Status => self.handle_status(&msg).await,
                MsgType::Artillery => self.handle_artillery(&msg).await,
                _ => {}
            }
        }
    }

    async fn handle_status(&self, msg: &Message) {
        let drone_id = msg.drone_id as u32;
        let swarm_id = msg.swarm_id as u32;
        let text = msg.text.as_str();

        if let Some(rest) = text.strip_prefix("POS ") {
            let mut parts = rest.split_whitespace();
            if let (Some(x), Some(y)) = (parts.next().and_then(|v| v.parse().ok()), parts.next().and_then(|v| v.parse().ok())) {
                self.update_drone_position(drone_id, swarm_id, x, y).await;
            }
            return;
        }
        if text == "ARRIVED_DETONATED" || text == "CAMERA_AUTODESTRUCT" {
            self.mark_drone_dead(drone_id).await;
        }
    }

    async fn handle_artillery(self: &Arc<Self>, msg: &Message) {
        let text = msg.text.as_str();

        if text == "TERMINATE" {
            info!("received TERMINATE, shutting down");
            std::process::exit(0);
        }
        if text.contains("SHOT_DOWN") {
            self.mark_drone_dead(msg.drone_id as u32).await;
            return;
        }
        if text.starts_with("ENTERING_DEFENSE") {
            debug!(drone_id = msg.drone_id, "drone reported entering defense zone");
            return;
        }
        if text.starts_with("TRUCK_READY") {
            info!(%text, "truck readiness announcement");
            return;
        }
        if let Some(rest) = text.strip_prefix("REASSIGN ") {
            let mut parts = rest.split_whitespace();
            if let (Some(drone_id), Some(new_swarm)) = (
                parts.next().and_then(|v| v.parse::<u32>().ok()),
                parts.next().and_then(|v| v.parse::<u32>().ok()),
            ) {
                let mut tracked = self.tracked.lock().await;
                if let Some(d) = tracked.get_mut(&drone_id) {
                    d.swarm_id = new_swarm;
                    info!(drone_id, new_swarm, "drone reassigned in tracking table");
                }
            }
        }
    }

    async fn update_drone_position(&self, drone_id: u32, swarm_id: u32, x: f64, y: f64) {
        let now = Instant::now();
        let mut tracked = self.tracked.lock().await;
        let entry = tracked.entry(drone_id).or_insert_with(|| {
            info!(drone_id, swarm_id, "tracking new drone");
            TrackedDrone::new(drone_id, swarm_id, now)
        });

        entry.x = x;
        entry.y = y;
        entry.swarm_id = swarm_id;
        entry.last_update = now;

        let now_in_defense = tracking::in_defense_zone(x, self.b, self.a);
        if !entry.in_defense_zone && now_in_defense {
            info!(drone_id, x, y, "drone entered defense zone");
        } else if entry.in_defense_zone && !now_in_defense && x > self.a {
            info!(drone_id, "drone exited defense zone");
        }
        entry.in_defense_zone = now_in_defense;
    }

    async fn mark_drone_dead(&self, drone_id: u32) {
        let mut tracked = self.tracked.lock().await;
        if let Some(d) = tracked.get_mut(&drone_id) {
            d.active = false;
            info!(drone_id, "removed from active tracking");
        }
    }

    async fn engagement_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.artillery_rate_secs));
        loop {
            interval.tick().await;
            self.engagement_cycle().await;
        }
    }

    async fn engagement_cycle(self: &Arc<Self>) {
        let now = Instant::now();
        let mut hits = Vec::new();
        let mut stale = Vec::new();

        {
            let mut tracked = self.tracked.lock().await;
            for drone in tracked.values_mut() {
                if !drone.active || !drone.in_defense_zone {
                    continue;
                }
                if tracking::is_stale(drone.last_update, now) {
                    stale.push(drone.global_id);
                    drone.active = false;
                    continue;
                }
                if rand::thread_rng().gen_range(0..100) < self.w_hit_percent {
                    hits.push((drone.global_id, drone.swarm_id));
                    drone.active = false;
                }
            }
        }

        for drone_id in stale {
            info!(drone_id, "drone timed out, removed from tracking");
        }
        for (drone_id, swarm_id) in hits {
            info!(drone_id, swarm_id, "firing on drone");
            self.notify_center_hit(drone_id, swarm_id).await;
            self.notify_drone_hit(drone_id).await;
        }
    }

    async fn notify_center_hit(&self, drone_id: u32, swarm_id: u32) {
        let port = protocol::port_for_center(self.base_port);
        let msg = Message::new(MsgType::Artillery, swarm_id as i32, drone_id as i32, format!("DRONE {} SHOT_DOWN", drone_id));
        if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, port)).await {
            warn!(drone_id, "notify_center_hit error: {}", e);
        }
    }

    async fn notify_drone_hit(&self, drone_id: u32) {
        let port = protocol::port_for_drone(self.base_port, drone_id);
        let msg = Message::new(MsgType::Artillery, 0, drone_id as i32, "HIT");
        if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, port)).await {
            warn!(drone_id, "notify_drone_hit error: {}", e);
        }
    }

    async fn status_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(Duration::from_secs(10));
        loop {
            interval.tick().await;
            self.print_status().await;
        }
    }

    async fn print_status(&self) {
        let tracked = self.tracked.lock().await;
        let active = tracked.values().filter(|d| d.active).count();
        let in_defense = tracked.values().filter(|d| d.active && d.in_defense_zone).count();
        info!(active, in_defense, total_tracked = tracked.len(), "artillery status");
    }
}
