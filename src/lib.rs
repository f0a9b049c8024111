//! Rumor spreading on a toroidal grid with a social-network overlay.
//!
//! Every agent is either uninformed, spreading, dormant or resistant. Spreaders
//! push the gossip to their grid neighbors and social contacts, uninformed
//! agents pull it from them, and spreaders lose interest after a few days.
//! See [`GossipModel`] for the step loop.

pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod metrics;
pub mod model;
pub mod network;
pub mod stats;

pub use config::Config;
pub use engine::{GossipModel, ModelPhase, SimulationSummary};
pub use error::GossipError;
pub use metrics::{MetricsCollector, MetricsSample};
pub use model::{Agent, AgentId, AgentSnapshot, BeliefState};
pub use network::{NetworkType, SocialNetworkBuilder};
