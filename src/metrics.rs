use crate::model::{Agent, BeliefState, tally};
use serde::{Deserialize, Serialize};

/// Population counts per state at the end of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSample {
    pub step: usize,
    /// Indexed by [`BeliefState::index`].
    pub counts: [usize; 4],
}

impl MetricsSample {
    pub fn count(&self, state: BeliefState) -> usize {
        self.counts[state.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Agents that have heard and believed the gossip at some point.
    pub fn informed(&self) -> usize {
        self.count(BeliefState::Spreading) + self.count(BeliefState::Dormant)
    }

    /// Informed agents as a fraction of the non-resistant population.
    pub fn informed_fraction(&self) -> f64 {
        let susceptible = self.total() - self.count(BeliefState::Resistant);
        if susceptible == 0 {
            return 0.0;
        }
        self.informed() as f64 / susceptible as f64
    }
}

/// Append-only time series of [`MetricsSample`], one per step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsCollector {
    samples: Vec<MetricsSample>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: usize, agt_vec: &[Agent]) {
        let sample = MetricsSample {
            step,
            counts: tally(agt_vec),
        };
        log::debug!("{sample:?}");
        self.samples.push(sample);
    }

    pub fn series(&self) -> &[MetricsSample] {
        &self.samples
    }

    pub fn latest(&self) -> Option<&MetricsSample> {
        self.samples.last()
    }

    /// First sample with the largest number of spreaders.
    pub fn peak_spreading(&self) -> Option<&MetricsSample> {
        self.samples.iter().reduce(|best, sample| {
            if sample.count(BeliefState::Spreading) > best.count(BeliefState::Spreading) {
                sample
            } else {
                best
            }
        })
    }
}
