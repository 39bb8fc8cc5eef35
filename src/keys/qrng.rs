//! True random bits drawn from a quantum backend.
//!
//! Each bit is the measurement of a fresh qubit in `|+>`.

use tracing::debug;

use crate::quantum::{run_single_shot, BackendError, Circuit, Gate, QuantumBackend};

/// The number of qubits measured per backend execution.
const BATCH_SIZE: usize = 8;

/// Draws `count` random bits from `backend`.
pub fn random_bits<B>(backend: &mut B, count: usize) -> Result<Vec<bool>, BackendError>
where
    B: QuantumBackend + ?Sized,
{
    debug!("drawing {} random bits from the backend", count);
    let mut bits = Vec::with_capacity(count);
    while bits.len() < count {
        let batch = BATCH_SIZE.min(count - bits.len());
        let mut circuit = Circuit::allocate(batch, batch);
        for qubit in 0..batch {
            circuit.apply(Gate::H, &[qubit])?;
            circuit.measure(qubit, qubit)?;
        }
        bits.extend(run_single_shot(backend, &circuit)?);
    }
    Ok(bits)
}

/// Draws a 32 byte seed from `backend`.
pub fn random_seed<B>(backend: &mut B) -> Result<[u8; 32], BackendError>
where
    B: QuantumBackend + ?Sized,
{
    let bits = random_bits(backend, 256)?;
    let mut seed = [0_u8; 32];
    for (byte, chunk) in seed.iter_mut().zip(bits.chunks(8)) {
        *byte = chunk
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &bit)| acc | (u8::from(bit) << i));
    }
    Ok(seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::{Counts, StatevectorSimulator};

    #[test]
    fn test_random_bits() {
        let mut backend = StatevectorSimulator::seeded(1, 8);
        let bits = random_bits(&mut backend, 203).unwrap();
        assert_eq!(bits.len(), 203);
        let ones = bits.iter().filter(|&&b| b).count();
        assert!(ones > 50 && ones < 153);
    }

    struct AllOnes;

    impl QuantumBackend for AllOnes {
        fn run(&mut self, circuit: &Circuit, _shots: u32) -> Result<Counts, BackendError> {
            let mut counts = Counts::new();
            counts.insert("1".repeat(circuit.num_bits()), 1);
            Ok(counts)
        }
    }

    #[test]
    fn test_random_seed_packs_bits() {
        assert_eq!(random_seed(&mut AllOnes).unwrap(), [0xff; 32]);
        let a = random_seed(&mut StatevectorSimulator::seeded(9, 8)).unwrap();
        let b = random_seed(&mut StatevectorSimulator::seeded(9, 8)).unwrap();
        assert_eq!(a, b);
    }
}
