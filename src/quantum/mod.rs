//! The quantum execution engine interface.
//!
//! The round-execution engine never manipulates amplitudes itself. It builds a [`Circuit`] with
//! the register operations (`allocate`, `apply`, `measure`, `reset`, `barrier`) and hands it to a
//! [`QuantumBackend`] for shot-based execution. The backend reports the outcome as a map from
//! bitstrings to frequencies, where every bitstring is written most-significant bit first, i.e.
//! the character at position `0` is the classical bit with the highest index.
//!
//! A seeded [`StatevectorSimulator`] is bundled so that the protocol can be executed end to end.

pub mod circuit;
pub mod simulator;

use std::collections::BTreeMap;

use thiserror::Error;

pub use self::{
    circuit::{Circuit, Gate, Instruction},
    simulator::StatevectorSimulator,
};

/// The outcome of a shot-based execution: bitstring (MSB first) to number of occurrences.
pub type Counts = BTreeMap<String, u32>;

/// Error raised while building or executing a circuit.
#[derive(Debug, Error, PartialEq)]
pub enum BackendError {
    #[error("qubit {qubit} is out of range for a register of {num_qubits} qubits")]
    QubitOutOfRange { qubit: usize, num_qubits: usize },
    #[error("classical bit {bit} is out of range for a register of {num_bits} bits")]
    BitOutOfRange { bit: usize, num_bits: usize },
    #[error("gate {gate} acts on {expected} qubit(s) but {given} were given")]
    Arity {
        gate: Gate,
        expected: usize,
        given: usize,
    },
    #[error("qubit {0} is used more than once by the same gate")]
    RepeatedQubit(usize),
    #[error("the register needs {requested} qubits but the backend supports at most {max}")]
    TooManyQubits { requested: usize, max: usize },
    #[error("at least one shot must be requested")]
    NoShots,
    #[error("the backend returned no outcome")]
    EmptyResult,
    #[error("malformed bitstring {0:?}")]
    MalformedBitstring(String),
}

/// A shot-based executor of [`Circuit`]s.
pub trait QuantumBackend {
    /// Executes `circuit` `shots` times and returns how often each outcome occurred.
    ///
    /// The bitstrings of the returned [`Counts`] are ordered most-significant bit first.
    fn run(&mut self, circuit: &Circuit, shots: u32) -> Result<Counts, BackendError>;
}

/// Executes `circuit` exactly once and returns its classical register, least-significant bit
/// first (i.e. index `i` of the returned vector is classical bit `i`).
pub fn run_single_shot<B>(backend: &mut B, circuit: &Circuit) -> Result<Vec<bool>, BackendError>
where
    B: QuantumBackend + ?Sized,
{
    let counts = backend.run(circuit, 1)?;
    let (bitstring, _) = counts
        .into_iter()
        .find(|(_, frequency)| *frequency > 0)
        .ok_or(BackendError::EmptyResult)?;
    parse_bitstring(&bitstring, circuit.num_bits())
}

/// Parses a most-significant-bit-first bitstring into bits indexed by classical bit position.
pub fn parse_bitstring(bitstring: &str, num_bits: usize) -> Result<Vec<bool>, BackendError> {
    if bitstring.len() != num_bits {
        return Err(BackendError::MalformedBitstring(bitstring.to_string()));
    }
    bitstring
        .chars()
        .rev()
        .map(|c| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            _ => Err(BackendError::MalformedBitstring(bitstring.to_string())),
        })
        .collect()
}
