//! Circuit construction.

use std::{collections::BTreeSet, fmt};

use derive_more::Display;

use super::BackendError;

/// The gates understood by every backend.
///
/// Controlled gates take the control qubit first and the target qubit second.
#[derive(Clone, Copy, Debug, Display, PartialEq)]
pub enum Gate {
    #[display(fmt = "id")]
    I,
    #[display(fmt = "x")]
    X,
    #[display(fmt = "z")]
    Z,
    #[display(fmt = "h")]
    H,
    #[display(fmt = "ry({})", _0)]
    Ry(f64),
    #[display(fmt = "cx")]
    Cx,
    #[display(fmt = "cz")]
    Cz,
    #[display(fmt = "cry({})", _0)]
    Cry(f64),
    #[display(fmt = "swap")]
    Swap,
}

impl Gate {
    /// The number of qubits the gate acts on.
    pub fn arity(&self) -> usize {
        match self {
            Gate::I | Gate::X | Gate::Z | Gate::H | Gate::Ry(_) => 1,
            Gate::Cx | Gate::Cz | Gate::Cry(_) | Gate::Swap => 2,
        }
    }

    /// The gate undoing this one.
    pub fn inverse(&self) -> Gate {
        match *self {
            Gate::Ry(theta) => Gate::Ry(-theta),
            Gate::Cry(theta) => Gate::Cry(-theta),
            gate => gate,
        }
    }
}

/// A single operation of a [`Circuit`].
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// A unitary gate applied to the given qubits.
    Gate { gate: Gate, qubits: Vec<usize> },
    /// A computational basis measurement of `qubit` stored into the classical `bit`.
    Measure { qubit: usize, bit: usize },
    /// Puts `qubit` back into `|0>`.
    Reset { qubit: usize },
    /// A scheduling fence over the whole register.
    Barrier,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Gate { gate, qubits } => {
                let qubits: Vec<String> = qubits.iter().map(|q| format!("q[{}]", q)).collect();
                write!(f, "{} {};", gate, qubits.join(", "))
            }
            Instruction::Measure { qubit, bit } => write!(f, "measure q[{}] -> c[{}];", qubit, bit),
            Instruction::Reset { qubit } => write!(f, "reset q[{}];", qubit),
            Instruction::Barrier => write!(f, "barrier q;"),
        }
    }
}

/// A quantum register together with the ordered list of operations applied to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Circuit {
    num_qubits: usize,
    num_bits: usize,
    instructions: Vec<Instruction>,
}

impl Circuit {
    /// Allocates a register of `num_qubits` qubits in `|0>` and `num_bits` classical bits.
    pub fn allocate(num_qubits: usize, num_bits: usize) -> Self {
        Self {
            num_qubits,
            num_bits,
            instructions: Vec::new(),
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Applies `gate` to `qubits`.
    ///
    /// # Errors
    /// Fails if the number of qubits does not match the gate, if a qubit is out of range or if a
    /// qubit is given twice.
    pub fn apply(&mut self, gate: Gate, qubits: &[usize]) -> Result<(), BackendError> {
        if qubits.len() != gate.arity() {
            return Err(BackendError::Arity {
                gate,
                expected: gate.arity(),
                given: qubits.len(),
            });
        }
        let mut seen = BTreeSet::new();
        for &qubit in qubits {
            self.check_qubit(qubit)?;
            if !seen.insert(qubit) {
                return Err(BackendError::RepeatedQubit(qubit));
            }
        }
        self.instructions.push(Instruction::Gate {
            gate,
            qubits: qubits.to_vec(),
        });
        Ok(())
    }

    /// Measures `qubit` in the computational basis into the classical `bit`.
    pub fn measure(&mut self, qubit: usize, bit: usize) -> Result<(), BackendError> {
        self.check_qubit(qubit)?;
        if bit >= self.num_bits {
            return Err(BackendError::BitOutOfRange {
                bit,
                num_bits: self.num_bits,
            });
        }
        self.instructions.push(Instruction::Measure { qubit, bit });
        Ok(())
    }

    /// Resets `qubit` to `|0>`.
    pub fn reset(&mut self, qubit: usize) -> Result<(), BackendError> {
        self.check_qubit(qubit)?;
        self.instructions.push(Instruction::Reset { qubit });
        Ok(())
    }

    /// Adds a barrier over the whole register.
    pub fn barrier(&mut self) {
        self.instructions.push(Instruction::Barrier);
    }

    /// The qubits measured since their last reset, in ascending order.
    pub fn measured_qubits(&self) -> Vec<usize> {
        let mut measured = BTreeSet::new();
        for instruction in &self.instructions {
            match instruction {
                Instruction::Measure { qubit, .. } => {
                    measured.insert(*qubit);
                }
                Instruction::Reset { qubit } => {
                    measured.remove(qubit);
                }
                _ => {}
            }
        }
        measured.into_iter().collect()
    }

    fn check_qubit(&self, qubit: usize) -> Result<(), BackendError> {
        if qubit < self.num_qubits {
            Ok(())
        } else {
            Err(BackendError::QubitOutOfRange {
                qubit,
                num_qubits: self.num_qubits,
            })
        }
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "qubit[{}] q;", self.num_qubits)?;
        writeln!(f, "bit[{}] c;", self.num_bits)?;
        for instruction in &self.instructions {
            writeln!(f, "{}", instruction)?;
        }
        Ok(())
    }
}
