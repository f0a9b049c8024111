use crate::config::NetworkConfig;
use crate::error::GossipError;
use crate::model::{Agent, BeliefState};
use crate::stats::Accumulator;
use petgraph::{
    algo::{connected_components, dijkstra},
    graph::{NodeIndex, UnGraph},
    visit::{Bfs, EdgeRef},
};
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::{cmp::Reverse, collections::BTreeSet, fmt, str::FromStr};

/// Topology of the social overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    /// Watts–Strogatz rewired ring lattice.
    SmallWorld,
    /// Barabási–Albert preferential attachment.
    ScaleFree,
}

impl FromStr for NetworkType {
    type Err = GossipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small-world" => Ok(NetworkType::SmallWorld),
            "scale-free" => Ok(NetworkType::ScaleFree),
            _ => Err(GossipError::UnknownNetworkType(s.to_string())),
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::SmallWorld => f.write_str("small-world"),
            NetworkType::ScaleFree => f.write_str("scale-free"),
        }
    }
}

/// Largest component size for which path lengths are computed.
pub const PATH_METRICS_MAX_NODES: usize = 2_000;

/// Undirected simple graph over node indices `0..n`.
///
/// Node `i` of the graph is the agent with id `i`.
#[derive(Debug, Clone)]
pub struct SocialGraph {
    graph: UnGraph<(), ()>,
}

impl SocialGraph {
    pub fn new(n: usize) -> Self {
        let mut graph = UnGraph::with_capacity(n, 0);
        for _ in 0..n {
            graph.add_node(());
        }
        Self { graph }
    }

    pub fn complete(n: usize) -> Self {
        let mut graph = Self::new(n);
        for u in 0..n {
            for v in u + 1..n {
                graph.add_edge(u, v);
            }
        }
        graph
    }

    /// Rebuild the graph stored in the agents' neighbor lists.
    pub fn from_agents(agt_vec: &[Agent]) -> Self {
        let mut graph = Self::new(agt_vec.len());
        for agt in agt_vec {
            for &other in agt.social_neighbors() {
                graph.add_edge(agt.id(), other);
            }
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Add the edge `u - v`. Self-loops and parallel edges are ignored.
    pub fn add_edge(&mut self, u: usize, v: usize) {
        if u == v {
            return;
        }
        self.graph.update_edge(NodeIndex::new(u), NodeIndex::new(v), ());
    }

    pub fn remove_edge(&mut self, u: usize, v: usize) {
        if let Some(edge) = self.graph.find_edge(NodeIndex::new(u), NodeIndex::new(v)) {
            self.graph.remove_edge(edge);
        }
    }

    pub fn has_edge(&self, u: usize, v: usize) -> bool {
        self.graph.contains_edge(NodeIndex::new(u), NodeIndex::new(v))
    }

    pub fn degree(&self, u: usize) -> usize {
        self.graph.neighbors(NodeIndex::new(u)).count()
    }

    /// Neighbors of `u` in ascending order.
    pub fn neighbors(&self, u: usize) -> Vec<usize> {
        let mut nbrs: Vec<usize> = self
            .graph
            .neighbors(NodeIndex::new(u))
            .map(|nx| nx.index())
            .collect();
        nbrs.sort_unstable();
        nbrs
    }

    pub fn num_edges(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every edge as `(u, v)` with `u < v`, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                let (a, b) = (e.source().index(), e.target().index());
                (a.min(b), a.max(b))
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Watts–Strogatz small-world graph.
    ///
    /// Every node is joined to its `k / 2` nearest ring neighbors on each side,
    /// then each lattice edge `(u, u + j)` is moved, with probability `p`, to a
    /// uniformly chosen node not yet adjacent to `u`.
    pub fn watts_strogatz<R: Rng + ?Sized>(n: usize, k: usize, p: f64, rng: &mut R) -> Self {
        if k >= n {
            return Self::complete(n);
        }

        let mut graph = Self::new(n);
        let half_k = k / 2;
        for j in 1..=half_k {
            for u in 0..n {
                graph.add_edge(u, (u + j) % n);
            }
        }

        for j in 1..=half_k {
            for u in 0..n {
                let v = (u + j) % n;
                if rng.random::<f64>() >= p {
                    continue;
                }
                // Nowhere left to rewire to.
                if graph.degree(u) >= n - 1 {
                    continue;
                }
                let mut w = rng.random_range(0..n);
                while w == u || graph.has_edge(u, w) {
                    w = rng.random_range(0..n);
                }
                graph.remove_edge(u, v);
                graph.add_edge(u, w);
            }
        }

        graph
    }

    /// Barabási–Albert scale-free graph.
    ///
    /// Growth starts from a star over the first `m + 1` nodes; every further
    /// node attaches `m` edges to distinct targets picked with probability
    /// proportional to their degree.
    pub fn barabasi_albert<R: Rng + ?Sized>(n: usize, m: usize, rng: &mut R) -> Self {
        if m == 0 || m >= n {
            return Self::complete(n);
        }

        let mut graph = Self::new(n);
        for leaf in 1..=m {
            graph.add_edge(0, leaf);
        }

        // Each node appears once per incident edge.
        let mut repeated_nodes: Vec<usize> = Vec::with_capacity(2 * m * n);
        for node in 0..=m {
            repeated_nodes.extend(std::iter::repeat_n(node, graph.degree(node)));
        }

        for source in m + 1..n {
            let mut targets = BTreeSet::new();
            while targets.len() < m {
                if let Some(&target) = repeated_nodes.choose(rng) {
                    targets.insert(target);
                }
            }
            for &target in &targets {
                graph.add_edge(source, target);
            }
            repeated_nodes.extend(targets.iter().copied());
            repeated_nodes.extend(std::iter::repeat_n(source, m));
        }

        graph
    }

    pub fn num_components(&self) -> usize {
        connected_components(&self.graph)
    }

    /// Nodes of every connected component, largest component first.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut seen = vec![false; self.len()];
        let mut components = Vec::new();
        for start in self.graph.node_indices() {
            if seen[start.index()] {
                continue;
            }
            let mut component = Vec::new();
            let mut bfs = Bfs::new(&self.graph, start);
            while let Some(nx) = bfs.next(&self.graph) {
                seen[nx.index()] = true;
                component.push(nx.index());
            }
            components.push(component);
        }
        components.sort_by_key(|c| Reverse(c.len()));
        components
    }

    /// Sizes of the connected components, largest first.
    pub fn component_sizes(&self) -> Vec<usize> {
        self.components().iter().map(Vec::len).collect()
    }

    /// Mean shortest path length and diameter within one connected component.
    ///
    /// The mean is taken over ordered pairs of distinct nodes. A component
    /// with fewer than two nodes gives `(0.0, 0)`.
    pub fn path_metrics(&self, component: &[usize]) -> (f64, usize) {
        let n = component.len();
        if n < 2 {
            return (0.0, 0);
        }
        let mut total = 0;
        let mut diameter = 0;
        for &source in component {
            let dist = dijkstra(&self.graph, NodeIndex::new(source), None, |_| 1_usize);
            for &d in dist.values() {
                total += d;
                diameter = diameter.max(d);
            }
        }
        (total as f64 / (n * (n - 1)) as f64, diameter)
    }

    /// Average local clustering coefficient. Nodes of degree below 2 count as 0.
    pub fn clustering_coefficient(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut sum = 0.0;
        for u in 0..self.len() {
            let nbrs = self.neighbors(u);
            let deg = nbrs.len();
            if deg < 2 {
                continue;
            }
            let mut links = 0;
            for (i, &a) in nbrs.iter().enumerate() {
                links += nbrs[i + 1..].iter().filter(|&&b| self.has_edge(a, b)).count();
            }
            sum += 2.0 * links as f64 / (deg * (deg - 1)) as f64;
        }
        sum / self.len() as f64
    }
}

/// Summary of connection counts over non-resistant agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub total_agents: usize,
    pub avg_connections: f64,
    pub min_connections: usize,
    pub max_connections: usize,
    pub std_connections: f64,
}

/// Structural properties of the whole social graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkStructure {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub density: f64,
    pub num_components: usize,
    pub largest_component_size: usize,
    pub is_connected: bool,
    /// Over the largest component; `None` when it exceeds [`PATH_METRICS_MAX_NODES`].
    pub average_path_length: Option<f64>,
    pub diameter: Option<usize>,
    pub clustering_coefficient: f64,
}

/// Generates the social overlay and hands each agent its neighbor list.
#[derive(Debug, Clone, PartialEq)]
pub struct SocialNetworkBuilder {
    network_type: NetworkType,
    ring_degree: usize,
    rewire_probability: f64,
    attachment_edges: usize,
}

impl SocialNetworkBuilder {
    pub fn new(network_type: NetworkType) -> Self {
        let defaults = NetworkConfig::default();
        Self {
            network_type,
            ring_degree: defaults.ring_degree,
            rewire_probability: defaults.rewire_probability,
            attachment_edges: defaults.attachment_edges,
        }
    }

    /// # Errors
    /// Returns [`GossipError::UnknownNetworkType`] if the selector is not supported.
    pub fn from_config(cfg: &NetworkConfig) -> Result<Self, GossipError> {
        Ok(Self {
            network_type: cfg.network_type.parse()?,
            ring_degree: cfg.ring_degree,
            rewire_probability: cfg.rewire_probability,
            attachment_edges: cfg.attachment_edges,
        })
    }

    pub fn network_type(&self) -> NetworkType {
        self.network_type
    }

    /// Generate a graph over `n` nodes.
    pub fn generate<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> SocialGraph {
        match self.network_type {
            NetworkType::SmallWorld => {
                SocialGraph::watts_strogatz(n, self.ring_degree, self.rewire_probability, rng)
            }
            NetworkType::ScaleFree => SocialGraph::barabasi_albert(n, self.attachment_edges, rng),
        }
    }

    /// Generate a graph over the population and assign node `i` to the agent at index `i`.
    pub fn build<R: Rng + ?Sized>(&self, agt_vec: &mut [Agent], rng: &mut R) {
        let graph = self.generate(agt_vec.len(), rng);
        for (i_agt, agt) in agt_vec.iter_mut().enumerate() {
            agt.set_social_neighbors(graph.neighbors(i_agt));
        }
        log::info!(
            "built {} network with {} nodes and {} edges",
            self.network_type,
            graph.len(),
            graph.num_edges()
        );
    }

    /// Connection-count statistics, ignoring resistant agents.
    pub fn network_statistics(agt_vec: &[Agent]) -> NetworkStatistics {
        let mut acc = Accumulator::new();
        for agt in agt_vec {
            if agt.state() != BeliefState::Resistant {
                acc.add(agt.social_neighbors().len() as f64);
            }
        }
        let report = acc.report();
        NetworkStatistics {
            total_agents: agt_vec.len(),
            avg_connections: report.mean,
            min_connections: report.min as usize,
            max_connections: report.max as usize,
            std_connections: report.std_dev,
        }
    }

    pub fn network_structure(agt_vec: &[Agent]) -> NetworkStructure {
        let graph = SocialGraph::from_agents(agt_vec);
        let num_nodes = graph.len();
        let num_edges = graph.num_edges();
        let density = if num_nodes > 1 {
            2.0 * num_edges as f64 / (num_nodes * (num_nodes - 1)) as f64
        } else {
            0.0
        };
        let components = graph.components();
        let largest = components.first().map_or(&[][..], Vec::as_slice);
        let (average_path_length, diameter) = if largest.len() <= PATH_METRICS_MAX_NODES {
            let (avg, diameter) = graph.path_metrics(largest);
            (Some(avg), Some(diameter))
        } else {
            log::debug!("skipping path metrics over {} nodes", largest.len());
            (None, None)
        };
        NetworkStructure {
            num_nodes,
            num_edges,
            density,
            num_components: graph.num_components(),
            largest_component_size: largest.len(),
            is_connected: components.len() == 1,
            average_path_length,
            diameter,
            clustering_coefficient: graph.clustering_coefficient(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    fn assert_simple_and_symmetric(graph: &SocialGraph) {
        for u in 0..graph.len() {
            for v in graph.neighbors(u) {
                assert_ne!(u, v, "self-loop at {u}");
                assert!(graph.has_edge(v, u), "edge {u}-{v} is not symmetric");
            }
        }
    }

    #[test]
    fn unknown_network_type_is_rejected() {
        assert_eq!(
            "random".parse::<NetworkType>(),
            Err(GossipError::UnknownNetworkType("random".to_string()))
        );
        assert_eq!("scale-free".parse::<NetworkType>(), Ok(NetworkType::ScaleFree));
    }

    #[test]
    fn small_world_keeps_average_degree() {
        let mut rng = ChaCha12Rng::seed_from_u64(42);
        let graph = SocialGraph::watts_strogatz(50, 6, 0.1, &mut rng);
        assert_simple_and_symmetric(&graph);
        assert_eq!(graph.num_edges(), 150);
        let avg = (0..50).map(|u| graph.degree(u)).sum::<usize>() as f64 / 50.0;
        assert!((avg - 6.0).abs() < 1e-12);
    }

    #[test]
    fn unrewired_ring_is_a_lattice() {
        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let graph = SocialGraph::watts_strogatz(10, 4, 0.0, &mut rng);
        assert_eq!(graph.neighbors(0), vec![1, 2, 8, 9]);
        assert!((0..10).all(|u| graph.degree(u) == 4));
        assert_eq!(graph.component_sizes(), vec![10]);
    }

    #[test]
    fn scale_free_attaches_m_edges_per_node() {
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let graph = SocialGraph::barabasi_albert(200, 3, &mut rng);
        assert_simple_and_symmetric(&graph);
        // Star of m edges, then m edges for every further node.
        assert_eq!(graph.num_edges(), 3 + 3 * (200 - 4));
        assert!((4..200).all(|u| graph.degree(u) >= 3));
        assert_eq!(graph.component_sizes(), vec![200]);
    }

    #[test]
    fn tiny_populations_get_complete_graphs() {
        let mut rng = ChaCha12Rng::seed_from_u64(5);
        let complete_4 = SocialGraph::complete(4).edges();
        assert_eq!(complete_4.len(), 6);
        assert_eq!(SocialGraph::watts_strogatz(4, 6, 0.1, &mut rng).edges(), complete_4);
        assert_eq!(
            SocialGraph::barabasi_albert(3, 3, &mut rng).edges(),
            vec![(0, 1), (0, 2), (1, 2)]
        );
        assert_eq!(SocialGraph::watts_strogatz(1, 6, 0.1, &mut rng).num_edges(), 0);
    }

    #[test]
    fn clustering_of_triangle_and_path() {
        let triangle = SocialGraph::complete(3);
        assert!((triangle.clustering_coefficient() - 1.0).abs() < 1e-12);

        let mut path = SocialGraph::new(3);
        path.add_edge(0, 1);
        path.add_edge(1, 2);
        assert_eq!(path.clustering_coefficient(), 0.0);
    }

    #[test]
    fn neighbors_are_sorted_after_rewiring() {
        let mut rng = ChaCha12Rng::seed_from_u64(17);
        let graph = SocialGraph::watts_strogatz(40, 6, 0.5, &mut rng);
        for u in 0..40 {
            let nbrs = graph.neighbors(u);
            assert!(nbrs.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(nbrs.len(), graph.degree(u));
        }
    }

    #[test]
    fn same_seed_gives_same_graph() {
        let build = |seed| {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            SocialGraph::barabasi_albert(60, 2, &mut rng).edges()
        };
        assert_eq!(build(8), build(8));
    }

    #[test]
    fn path_metrics_of_path_and_ring() {
        let mut path = SocialGraph::new(4);
        for u in 0..3 {
            path.add_edge(u, u + 1);
        }
        let (avg, diameter) = path.path_metrics(&[0, 1, 2, 3]);
        assert!((avg - 10.0 / 6.0).abs() < 1e-12);
        assert_eq!(diameter, 3);

        let mut rng = ChaCha12Rng::seed_from_u64(0);
        let ring = SocialGraph::watts_strogatz(6, 2, 0.0, &mut rng);
        let (avg, diameter) = ring.path_metrics(&ring.components()[0]);
        assert!((avg - 1.8).abs() < 1e-12);
        assert_eq!(diameter, 3);

        assert_eq!(SocialGraph::new(1).path_metrics(&[0]), (0.0, 0));
    }

    #[test]
    fn structure_reports_the_largest_component() {
        // Path 0-1-2 plus the isolated edge 3-4.
        let mut agt_vec: Vec<_> = (0..5)
            .map(|id| Agent::new(id, (id, 0), false, 2, 0.1))
            .collect();
        agt_vec[0].set_social_neighbors(vec![1]);
        agt_vec[1].set_social_neighbors(vec![0, 2]);
        agt_vec[2].set_social_neighbors(vec![1]);
        agt_vec[3].set_social_neighbors(vec![4]);
        agt_vec[4].set_social_neighbors(vec![3]);

        let structure = SocialNetworkBuilder::network_structure(&agt_vec);
        assert_eq!(structure.num_components, 2);
        assert_eq!(structure.largest_component_size, 3);
        assert!(!structure.is_connected);
        assert_eq!(structure.diameter, Some(2));
        let avg = structure.average_path_length.expect("component is small");
        assert!((avg - 8.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn statistics_skip_resistant_agents() {
        let mut agt_vec: Vec<_> = (0..4)
            .map(|id| Agent::new(id, (id, 0), id == 3, 2, 0.1))
            .collect();
        agt_vec[0].set_social_neighbors(vec![1, 2, 3]);
        agt_vec[1].set_social_neighbors(vec![0]);
        agt_vec[2].set_social_neighbors(vec![0]);
        agt_vec[3].set_social_neighbors(vec![0]);

        let stats = SocialNetworkBuilder::network_statistics(&agt_vec);
        assert_eq!(stats.total_agents, 4);
        assert_eq!(stats.min_connections, 1);
        assert_eq!(stats.max_connections, 3);
        assert!((stats.avg_connections - 5.0 / 3.0).abs() < 1e-12);

        let structure = SocialNetworkBuilder::network_structure(&agt_vec);
        assert_eq!(structure.num_edges, 3);
        assert_eq!(structure.num_components, 1);
        assert!(structure.is_connected);
        assert_eq!(structure.diameter, Some(2));
        assert!((structure.density - 0.5).abs() < 1e-12);
    }

    #[test]
    fn build_assigns_symmetric_neighbor_lists() {
        let mut rng = ChaCha12Rng::seed_from_u64(9);
        let mut agt_vec: Vec<_> = (0..30)
            .map(|id| Agent::new(id, (id, 0), false, 2, 0.1))
            .collect();
        let builder = SocialNetworkBuilder::new(NetworkType::ScaleFree);
        builder.build(&mut agt_vec, &mut rng);
        for agt in &agt_vec {
            for &other in agt.social_neighbors() {
                assert_ne!(other, agt.id());
                assert!(agt_vec[other].social_neighbors().contains(&agt.id()));
            }
        }
    }
}
