use rand::Rng;
use serde::{Deserialize, Serialize};

/// Index of an agent in the population, stable for the whole simulation.
pub type AgentId = usize;

/// Belief state of an agent with respect to the gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BeliefState {
    /// Has not heard (or not believed) the gossip yet.
    Uninformed,
    /// Actively passes the gossip on.
    Spreading,
    /// Lost interest. Never spreads or listens again.
    Dormant,
    /// Immune from creation on.
    Resistant,
}

impl BeliefState {
    pub const ALL: [BeliefState; 4] = [
        BeliefState::Uninformed,
        BeliefState::Spreading,
        BeliefState::Dormant,
        BeliefState::Resistant,
    ];

    /// Position of the state in [`BeliefState::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn can_spread(self) -> bool {
        matches!(self, BeliefState::Spreading)
    }

    pub fn can_receive(self) -> bool {
        matches!(self, BeliefState::Uninformed)
    }
}

/// Agent of the simulation.
///
/// Per-agent traits (`max_spread_days`, `communication_probability`) are
/// drawn once at creation. Social neighbors are referenced by [`AgentId`].
#[derive(Debug, Clone)]
pub struct Agent {
    id: AgentId,
    position: (usize, usize),
    state: BeliefState,

    spreading_duration: u32,
    max_spread_days: u32,

    communication_probability: f64,

    social_neighbors: Vec<AgentId>,
}

/// Read-only view of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub id: AgentId,
    pub position: (usize, usize),
    pub state: BeliefState,
    pub spreading_duration: u32,
    pub max_spread_days: u32,
    pub social_connections: usize,
    pub communication_probability: f64,
}

impl Agent {
    /// Create a new agent, uninformed unless `resistant`.
    pub fn new(
        id: AgentId,
        position: (usize, usize),
        resistant: bool,
        max_spread_days: u32,
        communication_probability: f64,
    ) -> Self {
        let state = if resistant {
            BeliefState::Resistant
        } else {
            BeliefState::Uninformed
        };
        Self {
            id,
            position,
            state,
            spreading_duration: 0,
            max_spread_days,
            communication_probability,
            social_neighbors: Vec::new(),
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn position(&self) -> (usize, usize) {
        self.position
    }

    pub fn state(&self) -> BeliefState {
        self.state
    }

    pub fn spreading_duration(&self) -> u32 {
        self.spreading_duration
    }

    pub fn max_spread_days(&self) -> u32 {
        self.max_spread_days
    }

    pub fn communication_probability(&self) -> f64 {
        self.communication_probability
    }

    pub fn social_neighbors(&self) -> &[AgentId] {
        &self.social_neighbors
    }

    pub(crate) fn set_social_neighbors(&mut self, social_neighbors: Vec<AgentId>) {
        self.social_neighbors = social_neighbors;
    }

    /// Force an uninformed agent into the spreading state (initial seeding).
    pub(crate) fn start_spreading(&mut self) {
        if self.state.can_receive() {
            self.state = BeliefState::Spreading;
            self.spreading_duration = 0;
        }
    }

    /// Hear the gossip and, with probability `believe_probability`, start spreading it.
    ///
    /// Only uninformed agents are affected; no random number is drawn otherwise.
    /// Returns whether the agent started spreading.
    pub fn hear_gossip<R: Rng + ?Sized>(&mut self, believe_probability: f64, rng: &mut R) -> bool {
        if !self.state.can_receive() {
            return false;
        }
        if roll(rng, believe_probability) {
            self.state = BeliefState::Spreading;
            self.spreading_duration = 0;
            return true;
        }
        false
    }

    /// Count one more day of spreading and go dormant once the limit is reached.
    pub(crate) fn advance_spreading_day(&mut self) {
        self.spreading_duration += 1;
        if self.spreading_duration >= self.max_spread_days {
            self.state = BeliefState::Dormant;
        }
    }

    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            position: self.position,
            state: self.state,
            spreading_duration: self.spreading_duration,
            max_spread_days: self.max_spread_days,
            social_connections: self.social_neighbors.len(),
            communication_probability: self.communication_probability,
        }
    }
}

/// Draw uniformly from `[0, 1)` and succeed if the draw is below `prob`.
pub fn roll<R: Rng + ?Sized>(rng: &mut R, prob: f64) -> bool {
    rng.random::<f64>() < prob
}

/// Number of agents in each state, indexed by [`BeliefState::index`].
pub fn tally(agt_vec: &[Agent]) -> [usize; 4] {
    let mut counts = [0; 4];
    for agt in agt_vec {
        counts[agt.state().index()] += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn predicates_gate_contact() {
        let spreading: Vec<_> = BeliefState::ALL.iter().map(|s| s.can_spread()).collect();
        let receiving: Vec<_> = BeliefState::ALL.iter().map(|s| s.can_receive()).collect();
        assert_eq!(spreading, [false, true, false, false]);
        assert_eq!(receiving, [true, false, false, false]);
    }

    #[test]
    fn resistant_agent_ignores_gossip() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut agt = Agent::new(0, (0, 0), true, 3, 0.5);
        assert!(!agt.hear_gossip(1.0, &mut rng));
        agt.start_spreading();
        assert_eq!(agt.state(), BeliefState::Resistant);
    }

    #[test]
    fn spreader_goes_dormant_after_its_last_day() {
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let mut agt = Agent::new(0, (0, 0), false, 2, 0.5);
        assert!(agt.hear_gossip(1.0, &mut rng));
        agt.advance_spreading_day();
        assert_eq!(agt.state(), BeliefState::Spreading);
        agt.advance_spreading_day();
        assert_eq!(agt.state(), BeliefState::Dormant);
        assert_eq!(agt.spreading_duration(), 2);

        // Dormant agents cannot be converted back.
        assert!(!agt.hear_gossip(1.0, &mut rng));
        assert_eq!(agt.state(), BeliefState::Dormant);
    }

    #[test]
    fn zero_belief_never_converts() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut agt = Agent::new(0, (0, 0), false, 2, 0.5);
        for _ in 0..100 {
            assert!(!agt.hear_gossip(0.0, &mut rng));
        }
        assert_eq!(agt.state(), BeliefState::Uninformed);
    }

    #[test]
    fn tally_counts_every_agent() {
        let mut agt_vec: Vec<_> = (0..5)
            .map(|id| Agent::new(id, (id, 0), id == 4, 2, 0.1))
            .collect();
        agt_vec[0].start_spreading();
        assert_eq!(tally(&agt_vec), [3, 1, 0, 1]);
    }
}
