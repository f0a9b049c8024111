use thiserror::Error;

/// Errors raised while building or configuring a simulation.
///
/// None of these are transient: they all point at a bad configuration or a
/// caller bug and are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GossipError {
    /// One entry per violated constraint.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    #[error("position ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("unknown network type {0:?} (expected \"small-world\" or \"scale-free\")")]
    UnknownNetworkType(String),
}
