use crate::config::Config;
use crate::error::GossipError;
use crate::grid::SpatialGrid;
use crate::metrics::MetricsCollector;
use crate::model::{Agent, AgentId, AgentSnapshot, BeliefState, roll, tally};
use crate::network::SocialNetworkBuilder;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::Uniform;
use serde::{Deserialize, Serialize};

/// Chance of hearing the gossip per spreading grid neighbor.
const LOCAL_HEARING_STEP: f64 = 0.2;
/// Upper bound of the local hearing chance, whatever the number of spreaders.
const LOCAL_HEARING_CAP: f64 = 0.8;

/// Lifecycle of a [`GossipModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelPhase {
    Initializing,
    Running,
    Stopped,
}

/// Aggregate view of the model at the current step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub step: usize,
    pub total_agents: usize,
    /// Indexed by [`BeliefState::index`].
    pub counts: [usize; 4],
    /// Informed agents over the non-resistant population, in percent.
    pub informed_percentage: f64,
    pub is_running: bool,
}

/// Gossip simulation model.
///
/// Owns the configuration, grid, population and random number generator,
/// and advances the population one step at a time.
pub struct GossipModel {
    cfg: Config,
    grid: SpatialGrid,
    agt_vec: Vec<Agent>,
    rng: ChaCha12Rng,

    /// Activation order, reshuffled every step.
    order: Vec<AgentId>,

    step: usize,
    phase: ModelPhase,
    metrics: MetricsCollector,
}

impl GossipModel {
    /// Create a model seeded from `seed`.
    pub fn from_seed(cfg: Config, seed: u64) -> Result<Self, GossipError> {
        Self::new(cfg, ChaCha12Rng::seed_from_u64(seed))
    }

    /// Validate the configuration, build the population and its social
    /// network, and seed the initial spreaders.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the network type is unknown.
    pub fn new(cfg: Config, rng: ChaCha12Rng) -> Result<Self, GossipError> {
        cfg.validate()?;
        let builder = SocialNetworkBuilder::from_config(&cfg.network)?;

        let n_agt = cfg.n_agents();
        let mut model = Self {
            grid: SpatialGrid::new(cfg.grid.width, cfg.grid.height)?,
            agt_vec: Vec::with_capacity(n_agt),
            rng,
            order: (0..n_agt).collect(),
            step: 0,
            phase: ModelPhase::Initializing,
            metrics: MetricsCollector::new(),
            cfg,
        };

        model.create_agents()?;
        builder.build(&mut model.agt_vec, &mut model.rng);
        model.seed_spreaders();

        model.metrics.record(0, &model.agt_vec);

        model.phase = if model.cfg.run.max_steps > 0 {
            ModelPhase::Running
        } else {
            ModelPhase::Stopped
        };

        log::info!(
            "created {}x{} model with {} agents ({} resistant, {} spreading)",
            model.grid.width(),
            model.grid.height(),
            n_agt,
            model.count_by_state(BeliefState::Resistant),
            model.count_by_state(BeliefState::Spreading)
        );

        Ok(model)
    }

    /// Advance the simulation by one step. Does nothing once stopped.
    pub fn step(&mut self) {
        if self.phase != ModelPhase::Running {
            log::debug!("model is stopped, ignoring step");
            return;
        }

        self.step += 1;

        // Randomized activation: later agents see changes made by earlier ones.
        self.order.shuffle(&mut self.rng);
        for i_order in 0..self.order.len() {
            let id = self.order[i_order];
            self.act(id);
        }

        self.metrics.record(self.step, &self.agt_vec);

        if self.should_stop() {
            self.phase = ModelPhase::Stopped;
            log::info!(
                "stopped at step {} with {} informed agents",
                self.step,
                self.count_by_state(BeliefState::Spreading)
                    + self.count_by_state(BeliefState::Dormant)
            );
        }
    }

    /// Step until the model stops.
    pub fn run_to_completion(&mut self) {
        while self.is_running() {
            self.step();
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == ModelPhase::Running
    }

    pub fn phase(&self) -> ModelPhase {
        self.phase
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agt_vec
    }

    pub fn grid(&self) -> &SpatialGrid {
        &self.grid
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn agent_snapshot(&self) -> Vec<AgentSnapshot> {
        self.agt_vec.iter().map(Agent::snapshot).collect()
    }

    pub fn count_by_state(&self, state: BeliefState) -> usize {
        self.agt_vec.iter().filter(|agt| agt.state() == state).count()
    }

    pub fn summary(&self) -> SimulationSummary {
        let counts = tally(&self.agt_vec);
        let informed = counts[BeliefState::Spreading.index()] + counts[BeliefState::Dormant.index()];
        let susceptible = self.agt_vec.len() - counts[BeliefState::Resistant.index()];
        SimulationSummary {
            step: self.step,
            total_agents: self.agt_vec.len(),
            counts,
            informed_percentage: if susceptible > 0 {
                100.0 * informed as f64 / susceptible as f64
            } else {
                0.0
            },
            is_running: self.is_running(),
        }
    }

    fn create_agents(&mut self) -> Result<(), GossipError> {
        let pop = &self.cfg.population;
        let days_dist = Uniform::new_inclusive(pop.min_spread_days, pop.max_spread_days)
            .map_err(|e| GossipError::InvalidConfiguration(vec![format!("spread days: {e}")]))?;
        let comm_dist = Uniform::new_inclusive(pop.min_communication_prob, pop.max_communication_prob)
            .map_err(|e| {
                GossipError::InvalidConfiguration(vec![format!("communication probability: {e}")])
            })?;

        for x in 0..self.cfg.grid.width {
            for y in 0..self.cfg.grid.height {
                let id = self.agt_vec.len();
                let resistant = roll(&mut self.rng, pop.resistance_rate);
                let max_spread_days = days_dist.sample(&mut self.rng);
                let communication_probability = comm_dist.sample(&mut self.rng);
                self.agt_vec.push(Agent::new(
                    id,
                    (x, y),
                    resistant,
                    max_spread_days,
                    communication_probability,
                ));
                self.grid.place(id, x, y)?;
            }
        }

        Ok(())
    }

    fn seed_spreaders(&mut self) {
        let candidates: Vec<AgentId> = self
            .agt_vec
            .iter()
            .filter(|agt| agt.state() != BeliefState::Resistant)
            .map(Agent::id)
            .collect();
        if candidates.is_empty() {
            log::warn!("no non-resistant agents available for initial spreading");
            return;
        }

        let n_spreaders = self.cfg.population.initial_spreaders.min(candidates.len());
        let chosen: Vec<AgentId> = candidates
            .choose_multiple(&mut self.rng, n_spreaders)
            .copied()
            .collect();
        for id in chosen {
            self.agt_vec[id].start_spreading();
        }
    }

    /// Perform one agent's turn, dispatching on its state at the start of the turn.
    fn act(&mut self, id: AgentId) {
        match self.agt_vec[id].state() {
            BeliefState::Spreading => self.spread_gossip(id),
            BeliefState::Uninformed => self.listen_for_gossip(id),
            BeliefState::Dormant | BeliefState::Resistant => {}
        }
    }

    fn spread_gossip(&mut self, id: AgentId) {
        let tr = &self.cfg.transmission;

        // Local push to uninformed grid neighbors.
        let (x, y) = self.agt_vec[id].position();
        for nbr in self.grid.neighbors_of(x, y) {
            if self.agt_vec[nbr].state().can_receive() && roll(&mut self.rng, tr.spread_probability)
            {
                self.agt_vec[nbr].hear_gossip(tr.believe_probability, &mut self.rng);
            }
        }

        // Global push: talk to the contact first, then mention the gossip.
        let comm_prob = self.agt_vec[id].communication_probability();
        for i_nbr in 0..self.agt_vec[id].social_neighbors().len() {
            let nbr = self.agt_vec[id].social_neighbors()[i_nbr];
            if !self.agt_vec[nbr].state().can_receive() {
                continue;
            }
            if roll(&mut self.rng, comm_prob)
                && roll(&mut self.rng, tr.global_spread_probability)
            {
                self.agt_vec[nbr].hear_gossip(tr.believe_probability, &mut self.rng);
            }
        }

        // Counted after the pushes, so the last day still spreads.
        self.agt_vec[id].advance_spreading_day();
    }

    fn listen_for_gossip(&mut self, id: AgentId) {
        let tr = &self.cfg.transmission;

        // Local pull: one roll against the aggregate chance.
        let (x, y) = self.agt_vec[id].position();
        let n_spreading = self
            .grid
            .neighbors_of(x, y)
            .into_iter()
            .filter(|&nbr| self.agt_vec[nbr].state().can_spread())
            .count();
        if n_spreading > 0 {
            let chance = (LOCAL_HEARING_STEP * n_spreading as f64).min(LOCAL_HEARING_CAP);
            if roll(&mut self.rng, chance) {
                self.agt_vec[id].hear_gossip(tr.believe_probability, &mut self.rng);
            }
        }

        // Global pull: at most one hearing per step from social contacts.
        let spreaders: Vec<AgentId> = self.agt_vec[id]
            .social_neighbors()
            .iter()
            .copied()
            .filter(|&nbr| self.agt_vec[nbr].state().can_spread())
            .collect();
        for nbr in spreaders {
            let comm_prob = self.agt_vec[nbr].communication_probability();
            if roll(&mut self.rng, comm_prob)
                && roll(&mut self.rng, tr.global_spread_probability)
            {
                self.agt_vec[id].hear_gossip(tr.believe_probability, &mut self.rng);
                break;
            }
        }
    }

    fn should_stop(&self) -> bool {
        self.count_by_state(BeliefState::Spreading) == 0 || self.step >= self.cfg.run.max_steps
    }
}
