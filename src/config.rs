use crate::error::GossipError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, fs, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading. Every section and field
/// has a default, so a file only needs to list what it changes.
#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub transmission: TransmissionConfig,
    pub population: PopulationConfig,
    pub network: NetworkConfig,
    pub run: RunConfig,
}

/// Dimensions of the toroidal grid. One agent is placed on every cell.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionConfig {
    /// Probability that a spreader pushes the gossip to an uninformed grid neighbor.
    pub spread_probability: f64,
    /// Probability that an agent hearing the gossip starts spreading it.
    pub believe_probability: f64,
    /// Probability that a social contact actually mentions the gossip.
    pub global_spread_probability: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Fraction of agents created resistant.
    pub resistance_rate: f64,
    /// Number of agents seeded as spreaders at step 0.
    pub initial_spreaders: usize,

    /// Bounds (inclusive) of the number of days an agent keeps spreading.
    pub min_spread_days: u32,
    pub max_spread_days: u32,

    /// Bounds of the per-agent probability of talking to a social contact.
    pub min_communication_prob: f64,
    pub max_communication_prob: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Either `"small-world"` or `"scale-free"`.
    pub network_type: String,

    pub min_social_connections: usize,
    pub max_social_connections: usize,

    /// Lattice degree of the small-world ring.
    pub ring_degree: usize,
    /// Rewiring probability of the small-world ring.
    pub rewire_probability: f64,
    /// Edges attached by every new node of the scale-free graph.
    pub attachment_edges: usize,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub max_steps: usize,
    /// Base seed of the random number generator; drawn from the OS when absent.
    pub seed: Option<u64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
        }
    }
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            spread_probability: 0.2,
            believe_probability: 0.7,
            global_spread_probability: 0.15,
        }
    }
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            resistance_rate: 0.1,
            initial_spreaders: 5,
            min_spread_days: 2,
            max_spread_days: 6,
            min_communication_prob: 0.1,
            max_communication_prob: 0.4,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_type: "small-world".to_string(),
            min_social_connections: 3,
            max_social_connections: 15,
            ring_degree: 6,
            rewire_probability: 0.1,
            attachment_edges: 3,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: 30,
            seed: None,
        }
    }
}

impl Config {
    /// Small configuration for quick runs and tests.
    pub fn small_test() -> Self {
        let mut cfg = Self::default();
        cfg.grid.width = 20;
        cfg.grid.height = 20;
        cfg.run.max_steps = 15;
        cfg.population.initial_spreaders = 2;
        cfg
    }

    /// Large configuration for detailed runs.
    pub fn large() -> Self {
        let mut cfg = Self::default();
        cfg.grid.width = 150;
        cfg.grid.height = 150;
        cfg.run.max_steps = 50;
        cfg.population.initial_spreaders = 10;
        cfg.population.resistance_rate = 0.1;
        cfg
    }

    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded.
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Write the [`Config`] to a TOML file.
    pub fn to_file<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(file, contents).with_context(|| format!("failed to write {file:?}"))?;
        Ok(())
    }

    /// Total number of agents, one per grid cell.
    pub fn n_agents(&self) -> usize {
        self.grid.width * self.grid.height
    }

    /// Check every constraint and report all violations at once.
    pub fn validate(&self) -> Result<(), GossipError> {
        let mut violations = Vec::new();

        if self.grid.width == 0 || self.grid.height == 0 {
            violations.push(format!(
                "grid dimensions must be positive, but are {}x{}",
                self.grid.width, self.grid.height
            ));
        }

        let tr = &self.transmission;
        check_prob(&mut violations, "spread probability", tr.spread_probability);
        check_prob(&mut violations, "believe probability", tr.believe_probability);
        check_prob(
            &mut violations,
            "global spread probability",
            tr.global_spread_probability,
        );

        let pop = &self.population;
        check_prob(&mut violations, "resistance rate", pop.resistance_rate);
        check_order(
            &mut violations,
            "spread days",
            pop.min_spread_days,
            pop.max_spread_days,
        );
        check_prob(
            &mut violations,
            "min communication probability",
            pop.min_communication_prob,
        );
        check_prob(
            &mut violations,
            "max communication probability",
            pop.max_communication_prob,
        );
        check_order(
            &mut violations,
            "communication probability",
            pop.min_communication_prob,
            pop.max_communication_prob,
        );

        let net = &self.network;
        check_order(
            &mut violations,
            "social connections",
            net.min_social_connections,
            net.max_social_connections,
        );
        if net.ring_degree < 2 {
            violations.push(format!(
                "ring degree must be at least 2, but is {}",
                net.ring_degree
            ));
        }
        check_prob(&mut violations, "rewire probability", net.rewire_probability);
        if net.attachment_edges < 1 {
            violations.push("attachment edges must be at least 1, but is 0".to_string());
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(GossipError::InvalidConfiguration(violations))
        }
    }
}

fn check_prob(violations: &mut Vec<String>, name: &str, prob: f64) {
    // Written so that NaN is rejected too.
    if !(0.0..=1.0).contains(&prob) {
        violations.push(format!("{name} must be in the range 0.0..=1.0, but is {prob:?}"));
    }
}

fn check_order<T: PartialOrd + Display>(violations: &mut Vec<String>, name: &str, min: T, max: T) {
    if min > max {
        violations.push(format!(
            "min {name} must not exceed max {name}, but {min} > {max}"
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
        assert_eq!(Config::small_test().validate(), Ok(()));
        assert_eq!(Config::large().validate(), Ok(()));
    }

    #[test]
    fn all_violations_are_reported() {
        let mut cfg = Config::default();
        cfg.grid.width = 0;
        cfg.transmission.believe_probability = 1.5;
        cfg.population.min_spread_days = 5;
        cfg.population.max_spread_days = 2;
        cfg.network.min_social_connections = 20;

        let Err(GossipError::InvalidConfiguration(violations)) = cfg.validate() else {
            panic!("config should be rejected");
        };
        assert_eq!(violations.len(), 4);
        assert!(violations.iter().any(|v| v.contains("grid dimensions")));
        assert!(violations.iter().any(|v| v.contains("believe probability")));
        assert!(violations.iter().any(|v| v.contains("spread days")));
        assert!(violations.iter().any(|v| v.contains("social connections")));
    }

    #[test]
    fn nan_probability_is_rejected() {
        let mut cfg = Config::default();
        cfg.transmission.spread_probability = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let cfg: Config = toml::from_str(
            "[grid]\nwidth = 12\n\n[network]\nnetwork_type = \"scale-free\"\n",
        )
        .expect("failed to parse config");
        assert_eq!(cfg.grid.width, 12);
        assert_eq!(cfg.grid.height, 100);
        assert_eq!(cfg.network.network_type, "scale-free");
        assert_eq!(cfg.network.attachment_edges, 3);
        assert_eq!(cfg.run.seed, None);
    }

    #[test]
    fn written_presets_load_back() {
        let dir = std::env::temp_dir().join(format!("gossip-sim-config-{}", std::process::id()));
        fs::create_dir_all(&dir).expect("failed to create dir");
        let file = dir.join("config.toml");

        let mut cfg = Config::large();
        cfg.run.seed = Some(77);
        cfg.to_file(&file).expect("failed to write config");
        assert_eq!(Config::from_file(&file).expect("failed to read config"), cfg);

        fs::remove_dir_all(&dir).ok();
    }
}
