//! Tracked-drone table and the pure zone/staleness predicates, factored out
//! of the engagement loop so they're testable without a clock or socket.
//! Grounded on `original_source/artillery.c`'s `tracked_drone_t` array.

use std::time::{Duration, Instant};

pub const STALE_AFTER: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct TrackedDrone {
    pub global_id: u32,
    pub swarm_id: u32,
    pub x: f64,
    pub y: f64,
    pub in_defense_zone: bool,
    pub active: bool,
    pub last_update: Instant,
}

impl TrackedDrone {
    pub fn new(global_id: u32, swarm_id: u32, now: Instant) -> Self {
        Self {
            global_id,
            swarm_id,
            x: 0.0,
            y: 0.0,
            in_defense_zone: false,
            active: true,
            last_update: now,
        }
    }
}

/// `B <= x <= A`, matching the closed interval artillery itself uses (the
/// drone's own zone checks use the half-open `[B, A)` convention; the two
/// only disagree exactly at `x == A`, which is inconsequential here since a
/// drone announces `IN_REASSEMBLY` at that same boundary).
pub fn in_defense_zone(x: f64, b: f64, a: f64) -> bool {
    x >= b && x <= a
}

pub fn is_stale(last_update: Instant, now: Instant) -> bool {
    now.duration_since(last_update) > STALE_AFTER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defense_zone_is_closed_at_both_ends() {
        assert!(in_defense_zone(20.0, 20.0, 50.0));
        assert!(in_defense_zone(50.0, 20.0, 50.0));
        assert!(!in_defense_zone(19.9, 20.0, 50.0));
        assert!(!in_defense_zone(50.1, 20.0, 50.0));
    }

    #[test]
    fn staleness_uses_a_strict_greater_than_ten_seconds() {
        let t0 = Instant::now();
        assert!(!is_stale(t0, t0 + Duration::from_secs(10)));
        assert!(is_stale(t0, t0 + Duration::from_secs(11)));
    }
}
