//! Pure kinematics, factored out of the flight task so phase transitions are
//! testable without a reactor. Grounded on `original_source/drone.c`'s
//! `simulate_flight` (orbit, direction-seeking advance, zone checks) and on
//! `drone_simulator/src/physics.rs` for keeping movement math free of I/O.

pub const ARRIVAL_RADIUS: f64 = 2.0;

/// One orbit tick around `(b, 0)` at radius `r`.
pub fn orbit_step(theta: f64, theta_step: f64, b: f64, r: f64) -> (f64, f64, f64) {
    let theta = theta + theta_step;
    let x = b + r * theta.cos();
    let y = r * theta.sin();
    (theta, x, y)
}

/// One fixed-speed step toward `(tx, ty)`, clamped so it never overshoots.
/// Returns the new position and the pre-step distance to target.
pub fn advance_step(x: f64, y: f64, tx: f64, ty: f64, vx: f64, vy: f64) -> (f64, f64, f64) {
    let dx = tx - x;
    let dy = ty - y;
    let distance = (dx * dx + dy * dy).sqrt();
    if distance == 0.0 {
        return (x, y, distance);
    }
    let norm_dx = dx / distance;
    let norm_dy = dy / distance;
    let mut step_x = vx * norm_dx;
    let mut step_y = vy * norm_dy;
    if step_x.abs() > dx.abs() {
        step_x = dx;
    }
    if step_y.abs() > dy.abs() {
        step_y = dy;
    }
    (x + step_x, y + step_y, distance)
}

pub fn has_arrived(distance: f64) -> bool {
    distance < ARRIVAL_RADIUS
}

pub fn in_defense_zone(x: f64, b: f64, a: f64) -> bool {
    x >= b && x < a
}

pub fn in_reassembly_zone(x: f64, a: f64) -> bool {
    x >= a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbit_step_stays_on_the_circle_around_b() {
        let (_, x, y) = orbit_step(0.0, 0.3, 20.0, 5.0);
        let radius = ((x - 20.0).powi(2) + y.powi(2)).sqrt();
        assert!((radius - 5.0).abs() < 1e-9);
    }

    #[test]
    fn advance_step_never_overshoots_the_target() {
        let (x, y, _) = advance_step(0.0, 0.0, 1.0, 0.0, 10.0, 10.0);
        assert_eq!(x, 1.0);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn advance_step_moves_proportionally_when_far_from_target() {
        let (x, y, distance) = advance_step(0.0, 0.0, 100.0, 0.0, 10.0, 10.0);
        assert_eq!(distance, 100.0);
        assert_eq!(x, 10.0);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn arrival_threshold_matches_the_reference_tolerance() {
        assert!(has_arrived(1.9));
        assert!(!has_arrived(2.0));
    }

    #[test]
    fn defense_zone_is_half_open_b_inclusive_a_exclusive() {
        assert!(!in_defense_zone(19.9, 20.0, 50.0));
        assert!(in_defense_zone(20.0, 20.0, 50.0));
        assert!(in_defense_zone(49.9, 20.0, 50.0));
        assert!(!in_defense_zone(50.0, 20.0, 50.0));
    }

    #[test]
    fn reassembly_zone_starts_at_a_inclusive() {
        assert!(!in_reassembly_zone(49.9, 50.0));
        assert!(in_reassembly_zone(50.0, 50.0));
    }
}
