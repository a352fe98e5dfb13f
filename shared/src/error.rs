use thiserror::Error;

/// Errors surfaced across the coordination core. Per-message protocol
/// violations are not represented here — those are tolerated silently
/// (logged at debug/warn) rather than propagated as `Err`.
#[derive(Error, Debug)]
pub enum AgroError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown error: {0}")]
    Other(#[from] anyhow::Error),
}
