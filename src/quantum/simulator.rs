//! A dense statevector simulator.
//!
//! Qubit `q` corresponds to bit `q` of the basis state index. Mid-circuit measurements collapse
//! the state by sampling from the seeded [`ChaCha20Rng`], so two simulators created with the same
//! seed produce identical outcomes for identical circuits.

use std::f64::consts::FRAC_1_SQRT_2;

use num::complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use super::{BackendError, Circuit, Counts, Gate, Instruction, QuantumBackend};

/// The default upper bound on the register size.
pub const DEFAULT_MAX_QUBITS: usize = 20;

type Matrix = [[Complex64; 2]; 2];

/// A shot-based statevector simulator.
#[derive(Debug, Clone)]
pub struct StatevectorSimulator {
    prng: ChaCha20Rng,
    max_qubits: usize,
}

impl StatevectorSimulator {
    /// Creates a simulator whose measurement outcomes are drawn from a PRNG seeded with `seed`.
    pub fn seeded(seed: u64, max_qubits: usize) -> Self {
        Self {
            prng: ChaCha20Rng::seed_from_u64(seed),
            max_qubits,
        }
    }

    /// Creates a simulator seeded from the operating system.
    pub fn from_entropy(max_qubits: usize) -> Self {
        Self {
            prng: ChaCha20Rng::from_entropy(),
            max_qubits,
        }
    }

    pub fn max_qubits(&self) -> usize {
        self.max_qubits
    }

    fn run_shot(&mut self, circuit: &Circuit) -> String {
        let mut state = Statevector::zeroed(circuit.num_qubits());
        let mut register = vec![false; circuit.num_bits()];
        for instruction in circuit.instructions() {
            match instruction {
                Instruction::Gate { gate, qubits } => state.apply(*gate, qubits),
                Instruction::Measure { qubit, bit } => {
                    register[*bit] = state.measure(*qubit, &mut self.prng);
                }
                Instruction::Reset { qubit } => {
                    if state.measure(*qubit, &mut self.prng) {
                        state.apply_single(*qubit, &matrix(Gate::X));
                    }
                }
                Instruction::Barrier => {}
            }
        }
        register
            .iter()
            .rev()
            .map(|bit| if *bit { '1' } else { '0' })
            .collect()
    }
}

impl QuantumBackend for StatevectorSimulator {
    fn run(&mut self, circuit: &Circuit, shots: u32) -> Result<Counts, BackendError> {
        if shots == 0 {
            return Err(BackendError::NoShots);
        }
        if circuit.num_qubits() > self.max_qubits {
            return Err(BackendError::TooManyQubits {
                requested: circuit.num_qubits(),
                max: self.max_qubits,
            });
        }
        debug!(
            "simulating {} instructions on {} qubits for {} shot(s)",
            circuit.instructions().len(),
            circuit.num_qubits(),
            shots,
        );
        let mut counts = Counts::new();
        for _ in 0..shots {
            *counts.entry(self.run_shot(circuit)).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

struct Statevector {
    amplitudes: Vec<Complex64>,
}

impl Statevector {
    fn zeroed(num_qubits: usize) -> Self {
        let mut amplitudes = vec![Complex64::new(0., 0.); 1 << num_qubits];
        amplitudes[0] = Complex64::new(1., 0.);
        Self { amplitudes }
    }

    fn apply(&mut self, gate: Gate, qubits: &[usize]) {
        match gate {
            Gate::Swap => self.swap(qubits[0], qubits[1]),
            Gate::Cx => self.apply_controlled(qubits[0], qubits[1], &matrix(Gate::X)),
            Gate::Cz => self.apply_controlled(qubits[0], qubits[1], &matrix(Gate::Z)),
            Gate::Cry(theta) => {
                self.apply_controlled(qubits[0], qubits[1], &matrix(Gate::Ry(theta)))
            }
            single => self.apply_single(qubits[0], &matrix(single)),
        }
    }

    fn apply_single(&mut self, target: usize, m: &Matrix) {
        self.apply_masked(target, 0, m);
    }

    fn apply_controlled(&mut self, control: usize, target: usize, m: &Matrix) {
        self.apply_masked(target, 1 << control, m);
    }

    // applies `m` to `target` on every basis state where all bits of `control_mask` are set
    fn apply_masked(&mut self, target: usize, control_mask: usize, m: &Matrix) {
        let target_bit = 1 << target;
        for i in 0..self.amplitudes.len() {
            if i & target_bit != 0 || i & control_mask != control_mask {
                continue;
            }
            let j = i | target_bit;
            let (a0, a1) = (self.amplitudes[i], self.amplitudes[j]);
            self.amplitudes[i] = m[0][0] * a0 + m[0][1] * a1;
            self.amplitudes[j] = m[1][0] * a0 + m[1][1] * a1;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        let (bit_a, bit_b) = (1 << a, 1 << b);
        for i in 0..self.amplitudes.len() {
            if i & bit_a != 0 && i & bit_b == 0 {
                self.amplitudes.swap(i, i ^ bit_a ^ bit_b);
            }
        }
    }

    fn measure(&mut self, qubit: usize, prng: &mut ChaCha20Rng) -> bool {
        let bit = 1 << qubit;
        let p_one: f64 = self
            .amplitudes
            .iter()
            .enumerate()
            .filter(|(i, _)| i & bit != 0)
            .map(|(_, a)| a.norm_sqr())
            .sum();
        let outcome = prng.gen::<f64>() < p_one;
        let norm = if outcome { p_one } else { 1. - p_one }.sqrt();
        for (i, amplitude) in self.amplitudes.iter_mut().enumerate() {
            if (i & bit != 0) == outcome {
                *amplitude /= norm;
            } else {
                *amplitude = Complex64::new(0., 0.);
            }
        }
        outcome
    }
}

fn matrix(gate: Gate) -> Matrix {
    let zero = Complex64::new(0., 0.);
    let one = Complex64::new(1., 0.);
    let h = Complex64::new(FRAC_1_SQRT_2, 0.);
    match gate {
        Gate::X => [[zero, one], [one, zero]],
        Gate::Z => [[one, zero], [zero, -one]],
        Gate::H => [[h, h], [h, -h]],
        Gate::Ry(theta) => {
            let (sin, cos) = (theta / 2.).sin_cos();
            [
                [Complex64::new(cos, 0.), Complex64::new(-sin, 0.)],
                [Complex64::new(sin, 0.), Complex64::new(cos, 0.)],
            ]
        }
        // `I`, two-qubit gates never reach this point
        _ => [[one, zero], [zero, one]],
    }
}
