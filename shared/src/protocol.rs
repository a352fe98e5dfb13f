//! Wire protocol shared by every role: the ASCII pipe-separated datagram
//! format and the deterministic port map. Grounded on
//! `original_source/common.c`/`common.h`.

use std::net::Ipv4Addr;

pub const MAX_MSG: usize = 256;
pub const HOST: Ipv4Addr = Ipv4Addr::new(127, 0, 0, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgType {
    Hello = 0,
    Command = 1,
    Status = 2,
    Artillery = 3,
}

impl MsgType {
    fn from_i32(v: i32) -> Option<Self> {
        match v {
            0 => Some(MsgType::Hello),
            1 => Some(MsgType::Command),
            2 => Some(MsgType::Status),
            3 => Some(MsgType::Artillery),
            _ => None,
        }
    }
}

/// A single datagram. `truck_id` is intentionally absent: the reference
/// serialization never puts it on the wire even though it is meaningful
/// locally to trucks and the center.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub msg_type: MsgType,
    pub swarm_id: i32,
    pub drone_id: i32,
    pub text: String,
}

impl Message {
    pub fn new(msg_type: MsgType, swarm_id: i32, drone_id: i32, text: impl Into<String>) -> Self {
        Self {
            msg_type,
            swarm_id,
            drone_id,
            text: text.into(),
        }
    }

    /// `"<type>|<swarm_id>|<drone_id>|<text>"`, truncated to fit MAX_MSG.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = format!(
            "{}|{}|{}|{}",
            self.msg_type as i32, self.swarm_id, self.drone_id, self.text
        )
        .into_bytes();
        buf.truncate(MAX_MSG);
        buf
    }

    /// Returns `None` on any malformed field rather than panicking —
    /// receivers ignore truncation and malformed datagrams.
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let s = std::str::from_utf8(buf).ok()?;
        let mut parts = s.splitn(4, '|');
        let msg_type = MsgType::from_i32(parts.next()?.trim().parse().ok()?)?;
        let swarm_id = parts.next()?.trim().parse().ok()?;
        let drone_id = parts.next()?.trim().parse().ok()?;
        let text = parts.next().unwrap_or("").trim_end_matches(['\n', '\r']).to_string();
        Some(Self {
            msg_type,
            swarm_id,
            drone_id,
            text,
        })
    }
}

pub fn port_for_center(base_port: u16) -> u16 {
    base_port + 1
}

pub fn port_for_artillery(base_port: u16) -> u16 {
    base_port + 2
}

pub fn port_for_truck(base_port: u16, truck_id: u32) -> u16 {
    base_port + 100 + truck_id as u16
}

pub fn port_for_drone(base_port: u16, global_id: u32) -> u16 {
    base_port + 1000 + global_id as u16
}

/// `g = truck_id*100 + local_slot + 1`.
pub fn global_drone_id(truck_id: u32, local_slot: u32) -> u32 {
    truck_id * 100 + local_slot + 1
}

/// Convention: a drone is the camera drone of its cohort iff `global_id % 100 == 5`.
pub fn is_camera_drone(global_id: u32) -> bool {
    global_id % 100 == 5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_status_message() {
        let msg = Message::new(MsgType::Status, 2, 17, "POS 123.4 56.7");
        let encoded = msg.encode();
        let decoded = Message::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn omits_truck_id_from_the_wire() {
        let msg = Message::new(MsgType::Hello, 0, 1, "DRONE_HELLO 1 PID 123");
        assert_eq!(String::from_utf8(msg.encode()).unwrap(), "0|0|1|DRONE_HELLO 1 PID 123");
    }

    #[test]
    fn decode_rejects_malformed_type_tag() {
        assert!(Message::decode(b"9|0|1|garbage").is_none());
    }

    #[test]
    fn decode_rejects_non_utf8() {
        assert!(Message::decode(&[0xff, 0xfe, 0xfd]).is_none());
    }

    #[test]
    fn port_map_matches_offsets() {
        assert_eq!(port_for_center(40000), 40001);
        assert_eq!(port_for_artillery(40000), 40002);
        assert_eq!(port_for_truck(40000, 3), 40103);
        assert_eq!(port_for_drone(40000, 205), 41205);
    }

    #[test]
    fn global_id_convention_and_camera_drones() {
        assert_eq!(global_drone_id(2, 4), 205);
        assert!(is_camera_drone(205));
        assert!(!is_camera_drone(204));
    }

    #[test]
    fn encoded_message_never_exceeds_max_size() {
        let huge = "x".repeat(1000);
        let msg = Message::new(MsgType::Status, 0, 0, huge);
        assert!(msg.encode().len() <= MAX_MSG);
    }
}
