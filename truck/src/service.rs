//! Drone-cohort launcher and command relay. Grounded on
//! `sensor_collector/src/lib.rs`'s `Service::new()/run()` split and on
//! `original_source/truck.c`'s relay semantics (`fork`+`execl` translated to
//! `tokio::process::Command`, `SIGCHLD`+`waitpid` translated to awaited child
//! handles).

use crate::TruckConfig;
use shared::protocol::{self, Message, MsgType};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::process::Command;
use tracing::{info, warn};

pub struct Truck {
    truck_id: u32,
    base_port: u16,
    assembly_size: u32,
    params_path: PathBuf,
    socket: UdpSocket,
    target_sent: AtomicBool,
    takeoff_sent: AtomicBool,
    drones_alive: AtomicU32,
}

impl Truck {
    pub async fn bind(config: TruckConfig) -> shared::AgroResult<Arc<Self>> {
        let port = protocol::port_for_truck(config.params.base_port, config.truck_id);
        let socket = UdpSocket::bind((protocol::HOST, port)).await?;
        info!(truck_id = config.truck_id, port, "truck bound");

        Ok(Arc::new(Self {
            truck_id: config.truck_id,
            base_port: config.params.base_port,
            assembly_size: config.params.assembly_size,
            params_path: config.params_path,
            socket,
            target_sent: AtomicBool::new(false),
            takeoff_sent: AtomicBool::new(false),
            drones_alive: AtomicU32::new(0),
        }))
    }

    pub async fn run(self: Arc<Self>) -> shared::AgroResult<()> {
        self.announce_ready().await;
        self.spawn_drones();
        self.listen_loop().await;
        Ok(())
    }

    async fn announce_ready(&self) {
        let center_port = protocol::port_for_center(self.base_port);
        let msg = Message::new(MsgType::Artillery, self.truck_id as i32, 0, format!("TRUCK_READY {}", self.truck_id));
        if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, center_port)).await {
            warn!("failed to announce readiness: {}", e);
        }
    }

    /// Spawns one sibling `drone` process per assembly slot, with the
    /// deterministic global id `truck_id*100 + slot + 1`.
    fn spawn_drones(self: &Arc<Self>) {
        let drone_bin = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|d| d.join("drone")))
            .unwrap_or_else(|| PathBuf::from("drone"));

        for slot in 0..self.assembly_size {
            let global_id = protocol::global_drone_id(self.truck_id, slot);
            let mut cmd = Command::new(&drone_bin);
            cmd.arg(&self.params_path).arg(global_id.to_string()).arg(self.truck_id.to_string());

            match cmd.spawn() {
                Ok(mut child) => {
                    self.drones_alive.fetch_add(1, Ordering::SeqCst);
                    info!(truck_id = self.truck_id, global_id, "spawned drone");
                    let this = self.clone();
                    tokio::spawn(async move {
                        match child.wait().await {
                            Ok(status) => info!(global_id, ?status, "drone process exited"),
                            Err(e) => warn!(global_id, "error waiting on drone process: {}", e),
                        }
                        this.drones_alive.fetch_sub(1, Ordering::SeqCst);
                    });
                }
                Err(e) => warn!(global_id, "failed to spawn drone: {}", e),
            }
        }
    }

    async fn listen_loop(self: &Arc<Self>) {
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
            if msg.msg_type != MsgType::Command {
                continue;
            }
            self.handle_command(&msg).await;
        }
    }

    async fn handle_command(self: &Arc<Self>, msg: &Message) {
        let text = msg.text.as_str();
        if let Some(rest) = text.strip_prefix("TARGET ") {
            self.handle_target(rest).await;
        } else if let Some(rest) = text.strip_prefix("REASSIGN_ONE_TO ") {
            self.handle_reassign(rest, msg.drone_id as u32).await;
        } else if text == "TAKEOFF" {
            self.handle_takeoff().await;
        } else if text == "AUTODESTRUCT_ALL" {
            // Center addresses surviving drones directly; the truck has
            // nothing to relay and simply waits for its children to exit.
            info!(truck_id = self.truck_id, "swarm autodestruct in progress");
        } else {
            tracing::debug!(truck_id = self.truck_id, %text, "unrecognized command");
        }
    }

    async fn handle_target(self: &Arc<Self>, rest: &str) {
        if self.target_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(text) = parse_target_text(rest) else {
            self.target_sent.store(false, Ordering::SeqCst);
            return;
        };
        info!(truck_id = self.truck_id, %text, "broadcasting target to drones");
        self.broadcast_to_own_drones(&text, None).await;
    }

    async fn handle_takeoff(self: &Arc<Self>) {
        if self.takeoff_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(truck_id = self.truck_id, "broadcasting takeoff to drones");
        self.broadcast_to_own_drones("TAKEOFF", None).await;
    }

    /// Best-effort broadcast of `GO_TO_SWARM <target_id>` to every slot this
    /// truck owns. The envelope's `drone_id` carries the id of the one drone
    /// that should actually act; every other receiver ignores it because its
    /// own `global_id` won't match.
    async fn handle_reassign(self: &Arc<Self>, rest: &str, moved_drone_id: u32) {
        let target_id = rest.trim();
        if target_id.parse::<u32>().is_err() {
            return;
        }
        let text = format!("GO_TO_SWARM {}", target_id);
        info!(truck_id = self.truck_id, moved_drone_id, %text, "relaying reassignment");
        self.broadcast_to_own_drones(&text, Some(moved_drone_id)).await;
    }

    async fn broadcast_to_own_drones(&self, text: &str, addressed_drone_id: Option<u32>) {
        for slot in 0..self.assembly_size {
            let gid = protocol::global_drone_id(self.truck_id, slot);
            let drone_id = addressed_drone_id.unwrap_or(gid);
            let port = protocol::port_for_drone(self.base_port, gid);
            let msg = Message::new(MsgType::Command, self.truck_id as i32, drone_id as i32, text);
            if let Err(e) = self.socket.send_to(&msg.encode(), (protocol::HOST, port)).await {
                warn!(gid, "send error: {}", e);
            }
        }
    }
}

/// Reformats `"<x> <y> <id>"` into `"TARGET <x> <y> <id>"`, or `None` if the
/// payload is short a field — kept as a plain function so the one-shot-guard
/// rollback path is testable without a socket.
fn parse_target_text(rest: &str) -> Option<String> {
    let mut parts = rest.split_whitespace();
    let x = parts.next()?;
    let y = parts.next()?;
    let target_id = parts.next()?;
    Some(format!("TARGET {} {} {}", x, y, target_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_target_text() {
        assert_eq!(parse_target_text("100.0 50.0 2"), Some("TARGET 100.0 50.0 2".to_string()));
    }

    #[test]
    fn rejects_short_target_text() {
        assert_eq!(parse_target_text("100.0 50.0"), None);
    }

    #[test]
    fn drone_ports_are_contiguous_per_truck() {
        let truck_id = 3;
        let ports: Vec<u16> = (0..4).map(|slot| protocol::port_for_drone(40000, protocol::global_drone_id(truck_id, slot))).collect();
        assert_eq!(ports, vec![41301, 41302, 41303, 41304]);
    }
}
