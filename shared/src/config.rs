use crate::error::AgroError;
use crate::AgroResult;
use std::collections::HashMap;
use std::path::Path;

/// Parsed and defaulted contents of a role's parameter file. Mirrors the
/// shape of a typed config struct with a `load()` entry point, but is
/// sourced from a `key=value` parameter file rather than the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParams {
    pub base_port: u16,
    pub num_targets: u32,
    pub num_swarms: u32,
    pub assembly_size: u32,
    pub w_hit_percent: u32,
    pub q_link_loss_percent: u32,
    pub z_recovery_rounds: u32,
    pub max_wait_reassembly_secs: u64,
    pub artillery_rate_secs: u64,
    pub b: f64,
    pub a: f64,
    pub c: f64,
    pub vx: f64,
    pub vy: f64,
    pub r: f64,
    pub theta_step: f64,
    pub random_seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            base_port: 40000,
            num_targets: 2,
            num_swarms: 3,
            assembly_size: 5,
            w_hit_percent: 30,
            q_link_loss_percent: 5,
            z_recovery_rounds: 5,
            max_wait_reassembly_secs: 30,
            artillery_rate_secs: 2,
            b: 20.0,
            a: 50.0,
            c: 100.0,
            vx: 10.0,
            vy: 10.0,
            r: 5.0,
            theta_step: 0.3,
            random_seed: 0,
        }
    }
}

impl SimParams {
    /// Fatal on a missing/unreadable file — matches the reference's
    /// `fopen`-fails-then-`exit(1)` behavior for center and drone.
    pub fn load(path: &Path) -> AgroResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AgroError::Config(format!("cannot read parameter file {}: {}", path.display(), e)))?;
        Ok(Self::from_contents(&contents))
    }

    /// Artillery alone tolerates a missing file, falling back to defaults.
    pub fn load_lenient(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_contents(&contents),
            Err(e) => {
                tracing::warn!("parameter file {} unreadable ({}), using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    fn from_contents(contents: &str) -> Self {
        let kv = parse_key_value_lines(contents);
        let default = Self::default();

        let get = |key: &str| kv.get(key).map(|s| s.as_str());
        let parse_or = |key: &str, fallback: u32| get(key).and_then(|s| s.parse().ok()).unwrap_or(fallback);
        let parse_or_u16 = |key: &str, fallback: u16| get(key).and_then(|s| s.parse().ok()).unwrap_or(fallback);
        let parse_or_u64 = |key: &str, fallback: u64| get(key).and_then(|s| s.parse().ok()).unwrap_or(fallback);
        let parse_or_f64 = |key: &str, fallback: f64| get(key).and_then(|s| s.parse().ok()).unwrap_or(fallback);

        let vx = parse_or_f64("VX", default.vx);
        // If VY was left at its default but VX was overridden, follow VX
        // (grounded on original_source/drone.c's startup fallback).
        let vy = match get("VY") {
            Some(raw) => raw.parse().unwrap_or(default.vy),
            None => vx,
        };

        Self {
            base_port: parse_or_u16("BASE_PORT", default.base_port),
            num_targets: parse_or("NUM_TARGETS", default.num_targets),
            num_swarms: parse_or("NUM_SWARMS", default.num_swarms),
            assembly_size: parse_or("ASSEMBLY_SIZE", default.assembly_size),
            w_hit_percent: parse_or("W", default.w_hit_percent),
            q_link_loss_percent: parse_or("Q", default.q_link_loss_percent),
            z_recovery_rounds: parse_or("Z", default.z_recovery_rounds),
            max_wait_reassembly_secs: parse_or_u64("MAX_WAIT_REASSEMBLY", default.max_wait_reassembly_secs),
            artillery_rate_secs: parse_or_u64("ARTILLERY_RATE", default.artillery_rate_secs),
            b: parse_or_f64("B", default.b),
            a: parse_or_f64("A", default.a),
            c: parse_or_f64("C", default.c),
            vx,
            vy,
            r: parse_or_f64("R", default.r),
            theta_step: parse_or_f64("THETA_STEP", default.theta_step),
            random_seed: parse_or_u64("RANDOM_SEED", default.random_seed),
        }
    }
}

/// `#`-comments and blank/short lines are skipped; malformed `key=value`
/// lines are skipped rather than rejected.
fn parse_key_value_lines(contents: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.len() < 3 || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_has_no_matching_keys() {
        let params = SimParams::from_contents("# just a comment\n");
        assert_eq!(params, SimParams::default());
    }

    #[test]
    fn parses_recognized_keys_and_skips_comments() {
        let contents = "\
# param file
BASE_PORT=50000
ASSEMBLY_SIZE=5
W=100
garbage line with no equals
B=10.0
A=20.0
";
        let params = SimParams::from_contents(contents);
        assert_eq!(params.base_port, 50000);
        assert_eq!(params.assembly_size, 5);
        assert_eq!(params.w_hit_percent, 100);
        assert_eq!(params.b, 10.0);
        assert_eq!(params.a, 20.0);
        assert_eq!(params.num_swarms, SimParams::default().num_swarms);
    }

    #[test]
    fn vy_follows_vx_when_only_vx_is_overridden() {
        let params = SimParams::from_contents("VX=25.0\n");
        assert_eq!(params.vx, 25.0);
        assert_eq!(params.vy, 25.0);
    }

    #[test]
    fn vy_keeps_its_own_override() {
        let params = SimParams::from_contents("VX=25.0\nVY=5.0\n");
        assert_eq!(params.vx, 25.0);
        assert_eq!(params.vy, 5.0);
    }

    #[test]
    fn load_lenient_falls_back_to_defaults_on_missing_file() {
        let params = SimParams::load_lenient(Path::new("/nonexistent/path/params.txt"));
        assert_eq!(params, SimParams::default());
    }

    #[test]
    fn load_is_fatal_on_missing_file() {
        assert!(SimParams::load(Path::new("/nonexistent/path/params.txt")).is_err());
    }
}
