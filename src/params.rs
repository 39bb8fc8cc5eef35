//! Validated protocol parameters.
//!
//! [`ProtocolParameters::new`] turns the raw [`ProtocolSettings`] into an immutable parameter set.
//! All configuration mistakes are reported here, before any party or round exists.

use std::{collections::BTreeSet, str::FromStr};

use derive_more::Display;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use crate::{entanglement::BellVariant, settings::ProtocolSettings};

/// The smallest number of parties: one Distributor and one Semi-Quantum party.
pub const MIN_PARTIES: usize = 2;

/// Error raised for malformed protocol parameters.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("at least {} parties are required, got {}", MIN_PARTIES, .0)]
    TooFewParties(usize),
    #[error("invalid protocol settings: {0}")]
    Structure(#[from] ValidationErrors),
    #[error("unknown signal mode {0:?}")]
    UnknownSignalMode(String),
    #[error("unknown physical medium {0:?}")]
    UnknownMedium(String),
    #[error("unknown preparing basis {0:?}")]
    UnknownBasis(String),
    #[error("the set of preparing bases is empty")]
    EmptyBasisSet,
    #[error("unknown entanglement type {0:?}")]
    UnknownEntanglement(String),
    #[error("unknown Bell state variant {0:?}")]
    UnknownBellVariant(String),
    #[error("unknown eavesdropping strategy {0:?}")]
    UnknownStrategy(String),
    #[error("topology edge {edge} names node {node} but there are only {num_parties} parties")]
    UnknownNode {
        edge: usize,
        node: usize,
        num_parties: usize,
    },
    #[error("a shared channel walk needs {expected} edges, got {given}")]
    WalkLength { expected: usize, given: usize },
    #[error("the shared channel walk must start at the Distributor, it starts at {0}")]
    WalkNotAnchored(usize),
    #[error("the shared channel walk is not closed: it starts at {first} but ends at {last}")]
    OpenWalk { first: usize, last: usize },
    #[error("dedicated channels need {expected} edges (forward/back pairs), got {given}")]
    LinkCount { expected: usize, given: usize },
    #[error("edges {} and {} do not form a forward/back pair", 2 * .0, 2 * .0 + 1)]
    InconsistentLink(usize),
    #[error("{expected} distances are required (one per forward/back pair), got {given}")]
    DistanceCount { expected: usize, given: usize },
    #[error("distance {index} must be a positive finite number")]
    InvalidDistance { index: usize },
}

/// The physical carrier of the quantum signal.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum SignalMode {
    #[display(fmt = "single-photon")]
    SinglePhoton,
    #[display(fmt = "discrete-variable")]
    DiscreteVariable,
    #[display(fmt = "continuous-variable")]
    ContinuousVariable,
}

impl FromStr for SignalMode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single-photon" => Ok(SignalMode::SinglePhoton),
            "discrete-variable" => Ok(SignalMode::DiscreteVariable),
            "continuous-variable" => Ok(SignalMode::ContinuousVariable),
            _ => Err(ConfigurationError::UnknownSignalMode(s.to_string())),
        }
    }
}

/// The medium the quantum channels run through.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum PhysicalMedium {
    #[display(fmt = "fiber")]
    Fiber,
    #[display(fmt = "satellite")]
    Satellite,
}

impl FromStr for PhysicalMedium {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fiber" => Ok(PhysicalMedium::Fiber),
            "satellite" => Ok(PhysicalMedium::Satellite),
            _ => Err(ConfigurationError::UnknownMedium(s.to_string())),
        }
    }
}

/// A preparing basis.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord)]
pub enum Basis {
    #[display(fmt = "X")]
    X,
    #[display(fmt = "Y")]
    Y,
    #[display(fmt = "Z")]
    Z,
}

impl FromStr for Basis {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "X" => Ok(Basis::X),
            "Y" => Ok(Basis::Y),
            "Z" => Ok(Basis::Z),
            _ => Err(ConfigurationError::UnknownBasis(s.to_string())),
        }
    }
}

/// The configured family of the multipartite state.
///
/// Every family can be configured; whether it can be prepared for a given party count is decided
/// by [`EntanglementSpec`](crate::entanglement::EntanglementSpec).
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum EntanglementType {
    #[display(fmt = "Bell")]
    Bell,
    #[display(fmt = "GHZ")]
    Ghz,
    #[display(fmt = "W")]
    W,
    #[display(fmt = "Dicke")]
    Dicke,
    #[display(fmt = "Resource")]
    Resource,
    #[display(fmt = "Graph")]
    Graph,
    #[display(fmt = "Cluster")]
    Cluster,
}

impl FromStr for EntanglementType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bell" | "epr" => Ok(EntanglementType::Bell),
            "ghz" => Ok(EntanglementType::Ghz),
            "w" => Ok(EntanglementType::W),
            "dicke" => Ok(EntanglementType::Dicke),
            "resource" => Ok(EntanglementType::Resource),
            "graph" => Ok(EntanglementType::Graph),
            "cluster" => Ok(EntanglementType::Cluster),
            _ => Err(ConfigurationError::UnknownEntanglement(s.to_string())),
        }
    }
}

/// How CTRL rounds detect tampering.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum EavesdroppingStrategy {
    #[display(fmt = "invert-and-measure")]
    InvertAndMeasure,
    #[display(fmt = "swap-test")]
    SwapTest,
    #[display(fmt = "statistical-test")]
    StatisticalTest,
}

impl FromStr for EavesdroppingStrategy {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "invert-and-measure" => Ok(EavesdroppingStrategy::InvertAndMeasure),
            "swap-test" => Ok(EavesdroppingStrategy::SwapTest),
            "statistical-test" => Ok(EavesdroppingStrategy::StatisticalTest),
            _ => Err(ConfigurationError::UnknownStrategy(s.to_string())),
        }
    }
}

/// A directed hop between two parties, identified by party id (`0` is the Distributor).
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
#[display(fmt = "{} -> {}", from, to)]
pub struct Edge {
    pub from: usize,
    pub to: usize,
}

impl From<[usize; 2]> for Edge {
    fn from([from, to]: [usize; 2]) -> Self {
        Self { from, to }
    }
}

/// A dedicated channel: a forward edge, its back edge and the channel length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Link {
    pub forward: Edge,
    pub back: Edge,
    pub distance: f64,
}

/// How the quantum channels connect the parties.
#[derive(Clone, Debug, PartialEq)]
pub enum Topology {
    /// A single channel shared by all parties, used along a closed walk that starts and ends at
    /// the Distributor.
    SharedChannel { walk: Vec<Edge> },
    /// One channel per Semi-Quantum party.
    Dedicated { links: Vec<Link> },
}

impl Topology {
    fn shared(edges: Vec<Edge>, num_parties: usize) -> Result<Self, ConfigurationError> {
        if edges.len() != num_parties {
            return Err(ConfigurationError::WalkLength {
                expected: num_parties,
                given: edges.len(),
            });
        }
        // the length check above guarantees at least two edges
        let first = edges[0].from;
        let last = edges[edges.len() - 1].to;
        if first != last {
            return Err(ConfigurationError::OpenWalk { first, last });
        }
        if first != 0 {
            return Err(ConfigurationError::WalkNotAnchored(first));
        }
        Ok(Topology::SharedChannel { walk: edges })
    }

    fn dedicated(
        edges: Vec<Edge>,
        distances: &[f64],
        num_parties: usize,
    ) -> Result<Self, ConfigurationError> {
        let pairs = num_parties - 1;
        if edges.len() != 2 * pairs {
            return Err(ConfigurationError::LinkCount {
                expected: 2 * pairs,
                given: edges.len(),
            });
        }
        if distances.len() != pairs {
            return Err(ConfigurationError::DistanceCount {
                expected: pairs,
                given: distances.len(),
            });
        }
        edges
            .chunks(2)
            .zip(distances)
            .enumerate()
            .map(|(index, (pair, &distance))| {
                let (forward, back) = (pair[0], pair[1]);
                if forward.to != back.from || forward.from != back.to {
                    return Err(ConfigurationError::InconsistentLink(index));
                }
                if !(distance.is_finite() && distance > 0.) {
                    return Err(ConfigurationError::InvalidDistance { index });
                }
                Ok(Link {
                    forward,
                    back,
                    distance,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|links| Topology::Dedicated { links })
    }

    /// The edges in the order in which the channel carries them.
    pub fn edges(&self) -> Vec<Edge> {
        match self {
            Topology::SharedChannel { walk } => walk.clone(),
            Topology::Dedicated { links } => links
                .iter()
                .flat_map(|link| vec![link.forward, link.back])
                .collect(),
        }
    }

    pub fn is_shared(&self) -> bool {
        matches!(self, Topology::SharedChannel { .. })
    }
}

/// The validated, immutable protocol parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtocolParameters {
    num_parties: usize,
    num_rounds: usize,
    num_quantum_channels: usize,
    num_classical_channels: usize,
    signal_mode: SignalMode,
    physical_medium: PhysicalMedium,
    preparing_bases: Vec<Basis>,
    entanglement_type: EntanglementType,
    bell_variant: Option<BellVariant>,
    graph_edges: Vec<(usize, usize)>,
    eavesdropping_strategy: EavesdroppingStrategy,
    topology: Topology,
}

impl ProtocolParameters {
    /// Validates the raw protocol settings.
    ///
    /// # Errors
    /// Fails with a [`ConfigurationError`] naming the first violated constraint.
    pub fn new(settings: &ProtocolSettings) -> Result<Self, ConfigurationError> {
        let num_parties = settings.num_parties;
        if num_parties < MIN_PARTIES {
            return Err(ConfigurationError::TooFewParties(num_parties));
        }
        settings.validate()?;

        let signal_mode: SignalMode = settings.signal_mode.parse()?;
        let physical_medium: PhysicalMedium = settings.physical_medium.parse()?;
        let eavesdropping_strategy: EavesdroppingStrategy =
            settings.eavesdropping_strategy.parse()?;
        let entanglement_type: EntanglementType = settings.entanglement.parse()?;
        let bell_variant = settings
            .bell_variant
            .as_deref()
            .map(str::parse::<BellVariant>)
            .transpose()?;

        let preparing_bases = settings
            .preparing_bases
            .iter()
            .map(|basis| basis.parse())
            .collect::<Result<BTreeSet<Basis>, _>>()?;
        if preparing_bases.is_empty() {
            return Err(ConfigurationError::EmptyBasisSet);
        }

        let edges: Vec<Edge> = settings.topology.iter().copied().map(Edge::from).collect();
        for (index, edge) in edges.iter().enumerate() {
            if let Some(&node) = [edge.from, edge.to].iter().find(|&&n| n >= num_parties) {
                return Err(ConfigurationError::UnknownNode {
                    edge: index,
                    node,
                    num_parties,
                });
            }
        }
        let topology = if settings.num_quantum_channels == 1 {
            Topology::shared(edges, num_parties)?
        } else {
            Topology::dedicated(edges, &settings.distances, num_parties)?
        };

        Ok(Self {
            num_parties,
            num_rounds: settings.num_rounds,
            num_quantum_channels: settings.num_quantum_channels,
            num_classical_channels: settings.num_classical_channels,
            signal_mode,
            physical_medium,
            preparing_bases: preparing_bases.into_iter().collect(),
            entanglement_type,
            bell_variant,
            graph_edges: settings.graph_edges.iter().map(|&[u, v]| (u, v)).collect(),
            eavesdropping_strategy,
            topology,
        })
    }

    pub fn num_parties(&self) -> usize {
        self.num_parties
    }

    pub fn num_rounds(&self) -> usize {
        self.num_rounds
    }

    pub fn num_quantum_channels(&self) -> usize {
        self.num_quantum_channels
    }

    pub fn num_classical_channels(&self) -> usize {
        self.num_classical_channels
    }

    pub fn signal_mode(&self) -> SignalMode {
        self.signal_mode
    }

    pub fn physical_medium(&self) -> PhysicalMedium {
        self.physical_medium
    }

    /// The deduplicated preparing bases, in `X`, `Y`, `Z` order.
    pub fn preparing_bases(&self) -> &[Basis] {
        &self.preparing_bases
    }

    pub fn entanglement_type(&self) -> EntanglementType {
        self.entanglement_type
    }

    pub fn bell_variant(&self) -> Option<BellVariant> {
        self.bell_variant
    }

    pub fn graph_edges(&self) -> &[(usize, usize)] {
        &self.graph_edges
    }

    pub fn eavesdropping_strategy(&self) -> EavesdroppingStrategy {
        self.eavesdropping_strategy
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The expected fraction of CTRL rounds, `(1 / |bases|)^(N - 1)`.
    pub fn reflect_probability(&self) -> f64 {
        (1. / self.preparing_bases.len() as f64).powi(self.num_parties as i32 - 1)
    }

    /// The number of CTRL rounds a pre-shared key carries, `ceil(reflect_probability * rounds)`.
    ///
    /// Computed on integers as `ceil(rounds / |bases|^(N - 1))` to stay exact.
    pub fn ctrl_rounds(&self) -> usize {
        let exponent = (self.num_parties - 1) as u32;
        match self.preparing_bases.len().checked_pow(exponent) {
            Some(denominator) => (self.num_rounds + denominator - 1) / denominator,
            // the denominator exceeds any round count
            None => usize::from(self.num_rounds > 0),
        }
    }
}
