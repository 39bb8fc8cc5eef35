//! Multipartite entanglement preparation.
//!
//! Every supported state is described by a gate sequence over logical vertices `0..n`, where
//! vertex `0` is the Distributor and vertex `p` the Semi-Quantum party `p`. Preparing the state
//! maps the vertices onto concrete qubits; undoing it replays the inverse gates in reverse order,
//! so that an undisturbed state returns to `|0...0>` with certainty.

use std::str::FromStr;

use derive_more::Display;
use thiserror::Error;

use crate::{
    error::ProtocolError,
    params::{ConfigurationError, EntanglementType, ProtocolParameters},
    quantum::{Circuit, Gate},
};

/// The four maximally entangled two-qubit states.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum BellVariant {
    #[display(fmt = "phi+")]
    PhiPlus,
    #[display(fmt = "phi-")]
    PhiMinus,
    #[display(fmt = "psi+")]
    PsiPlus,
    #[display(fmt = "psi-")]
    PsiMinus,
}

impl FromStr for BellVariant {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "phi+" | "phi-plus" => Ok(BellVariant::PhiPlus),
            "phi-" | "phi-minus" => Ok(BellVariant::PhiMinus),
            "psi+" | "psi-plus" => Ok(BellVariant::PsiPlus),
            "psi-" | "psi-minus" => Ok(BellVariant::PsiMinus),
            _ => Err(ConfigurationError::UnknownBellVariant(s.to_string())),
        }
    }
}

/// Error raised when the configured state can't be prepared for the configured parties.
#[derive(Debug, Error, PartialEq)]
pub enum UnsupportedEntanglementError {
    #[error("{0} states are not supported")]
    NotImplemented(EntanglementType),
    #[error("Bell states need exactly 2 parties, got {0}")]
    BellPartyCount(usize),
    #[error("a Bell state needs a variant")]
    MissingBellVariant,
    #[error("{kind} states need at least {required} parties, got {given}")]
    TooFewParties {
        kind: EntanglementType,
        required: usize,
        given: usize,
    },
    #[error("{0} states need an edge list")]
    MissingEdges(EntanglementType),
    #[error("edge ({from}, {to}) is invalid for {num_parties} parties")]
    InvalidEdge {
        from: usize,
        to: usize,
        num_parties: usize,
    },
}

/// A preparable multipartite state.
#[derive(Clone, Debug, PartialEq)]
pub enum EntanglementSpec {
    Bell(BellVariant),
    Ghz,
    W,
    Resource(Vec<(usize, usize)>),
    Graph(Vec<(usize, usize)>),
}

impl EntanglementSpec {
    /// Selects the state configured by `params`.
    ///
    /// # Errors
    /// Fails if the state family is not implemented or doesn't fit the number of parties.
    pub fn from_parameters(
        params: &ProtocolParameters,
    ) -> Result<Self, UnsupportedEntanglementError> {
        let spec = match params.entanglement_type() {
            EntanglementType::Bell => EntanglementSpec::Bell(
                params
                    .bell_variant()
                    .ok_or(UnsupportedEntanglementError::MissingBellVariant)?,
            ),
            EntanglementType::Ghz => EntanglementSpec::Ghz,
            EntanglementType::W => EntanglementSpec::W,
            EntanglementType::Resource => EntanglementSpec::Resource(params.graph_edges().to_vec()),
            EntanglementType::Graph => EntanglementSpec::Graph(params.graph_edges().to_vec()),
            unsupported => return Err(UnsupportedEntanglementError::NotImplemented(unsupported)),
        };
        spec.check(params.num_parties())?;
        Ok(spec)
    }

    pub fn entanglement_type(&self) -> EntanglementType {
        match self {
            EntanglementSpec::Bell(_) => EntanglementType::Bell,
            EntanglementSpec::Ghz => EntanglementType::Ghz,
            EntanglementSpec::W => EntanglementType::W,
            EntanglementSpec::Resource(_) => EntanglementType::Resource,
            EntanglementSpec::Graph(_) => EntanglementType::Graph,
        }
    }

    /// Checks that the state can be spread over `num_parties` parties.
    pub fn check(&self, num_parties: usize) -> Result<(), UnsupportedEntanglementError> {
        let kind = self.entanglement_type();
        match self {
            EntanglementSpec::Bell(_) if num_parties != 2 => {
                Err(UnsupportedEntanglementError::BellPartyCount(num_parties))
            }
            EntanglementSpec::Ghz | EntanglementSpec::W if num_parties < 3 => {
                Err(UnsupportedEntanglementError::TooFewParties {
                    kind,
                    required: 3,
                    given: num_parties,
                })
            }
            EntanglementSpec::Resource(edges) | EntanglementSpec::Graph(edges) => {
                if num_parties < 2 {
                    return Err(UnsupportedEntanglementError::TooFewParties {
                        kind,
                        required: 2,
                        given: num_parties,
                    });
                }
                if edges.is_empty() {
                    return Err(UnsupportedEntanglementError::MissingEdges(kind));
                }
                match edges
                    .iter()
                    .find(|&&(from, to)| from == to || from >= num_parties || to >= num_parties)
                {
                    Some(&(from, to)) => Err(UnsupportedEntanglementError::InvalidEdge {
                        from,
                        to,
                        num_parties,
                    }),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }

    /// Prepares the state on `qubits`, vertex `i` on `qubits[i]`.
    pub fn prepare(&self, circuit: &mut Circuit, qubits: &[usize]) -> Result<(), ProtocolError> {
        self.check(qubits.len())?;
        for (gate, vertices) in self.gates(qubits.len()) {
            circuit.apply(gate, &map(&vertices, qubits))?;
        }
        Ok(())
    }

    /// Undoes the preparation on `qubits` and measures each of them into the classical bit of the
    /// same index.
    pub fn invert_and_measure(
        &self,
        circuit: &mut Circuit,
        qubits: &[usize],
    ) -> Result<(), ProtocolError> {
        self.check(qubits.len())?;
        for (gate, vertices) in self.gates(qubits.len()).into_iter().rev() {
            circuit.apply(gate.inverse(), &map(&vertices, qubits))?;
        }
        for &qubit in qubits {
            circuit.measure(qubit, qubit)?;
        }
        Ok(())
    }

    fn gates(&self, n: usize) -> Vec<(Gate, Vec<usize>)> {
        match self {
            EntanglementSpec::Bell(variant) => {
                let mut gates = vec![(Gate::H, vec![0])];
                match variant {
                    BellVariant::PhiPlus => {}
                    BellVariant::PhiMinus => gates.push((Gate::Z, vec![0])),
                    BellVariant::PsiPlus => gates.push((Gate::X, vec![1])),
                    BellVariant::PsiMinus => {
                        gates.push((Gate::Z, vec![0]));
                        gates.push((Gate::X, vec![1]));
                    }
                }
                gates.push((Gate::Cx, vec![0, 1]));
                gates
            }
            EntanglementSpec::Ghz => std::iter::once((Gate::H, vec![0]))
                .chain((1..n).map(|i| (Gate::Cx, vec![0, i])))
                .collect(),
            EntanglementSpec::W => {
                // moves the single excitation down the chain, leaving amplitude 1/sqrt(n) behind
                let mut gates = vec![(Gate::X, vec![0])];
                for i in 0..n - 1 {
                    let theta = 2. * (1. / (n - i) as f64).sqrt().acos();
                    gates.push((Gate::Cry(theta), vec![i, i + 1]));
                    gates.push((Gate::Cx, vec![i + 1, i]));
                }
                gates
            }
            EntanglementSpec::Resource(edges) | EntanglementSpec::Graph(edges) => (0..n)
                .map(|i| (Gate::H, vec![i]))
                .chain(edges.iter().map(|&(u, v)| (Gate::Cz, vec![u, v])))
                .collect(),
        }
    }
}

fn map(vertices: &[usize], qubits: &[usize]) -> Vec<usize> {
    vertices.iter().map(|&v| qubits[v]).collect()
}
