//! Bipartite pre-shared keys.
//!
//! Every bit of a key pre-commits the type of one round: [`CTRL_VALUE`] marks a CTRL round and
//! [`SIFT_VALUE`] a SIFT round. All keys of a protocol instance are generated from the same bit
//! pattern, so that every pair (Distributor, Semi-Quantum party) agrees on the type of every round.

pub mod qrng;

use chrono::{DateTime, Utc};
use rand::{seq::index, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{params::ProtocolParameters, party::Identity};

/// The key bit of a SIFT round.
pub const SIFT_VALUE: bool = false;
/// The key bit of a CTRL round.
pub const CTRL_VALUE: bool = true;

/// A secret bit string shared by the Distributor and one Semi-Quantum party, one bit per round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BipartitePreSharedKey {
    owner_uuid_1: Uuid,
    owner_uuid_2: Uuid,
    owner_name_1: String,
    owner_name_2: String,
    key_bits: Vec<bool>,
    created_at: DateTime<Utc>,
}

impl BipartitePreSharedKey {
    /// Creates a key owned by `first` and `second`. Owner names are stored lower-cased.
    pub fn new(first: &Identity, second: &Identity, key_bits: Vec<bool>) -> Self {
        Self {
            owner_uuid_1: first.uuid(),
            owner_uuid_2: second.uuid(),
            owner_name_1: first.name().to_lowercase(),
            owner_name_2: second.name().to_lowercase(),
            key_bits,
            created_at: Utc::now(),
        }
    }

    pub fn owners(&self) -> (Uuid, Uuid) {
        (self.owner_uuid_1, self.owner_uuid_2)
    }

    pub fn owner_names(&self) -> (&str, &str) {
        (&self.owner_name_1, &self.owner_name_2)
    }

    /// Whether `uuid` is one of the two owners.
    pub fn is_owned_by(&self, uuid: Uuid) -> bool {
        self.owner_uuid_1 == uuid || self.owner_uuid_2 == uuid
    }

    /// Whether both keys are held by the same pair of owners, in any order.
    pub fn same_owners(&self, other: &Self) -> bool {
        other.is_owned_by(self.owner_uuid_1) && other.is_owned_by(self.owner_uuid_2)
    }

    pub fn bits(&self) -> &[bool] {
        &self.key_bits
    }

    /// The bit of round `round`, if the key covers it.
    pub fn bit(&self, round: usize) -> Option<bool> {
        self.key_bits.get(round).copied()
    }

    pub fn len(&self) -> usize {
        self.key_bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_bits.is_empty()
    }

    /// The number of CTRL rounds the key commits to.
    pub fn hamming_weight(&self) -> usize {
        self.key_bits.iter().filter(|&&bit| bit == CTRL_VALUE).count()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A generator of pre-shared keys.
///
/// Employs the `ChaCha20` stream cipher as a PRNG.
#[derive(Debug, Clone)]
pub struct KeyGenerator {
    prng: ChaCha20Rng,
}

impl KeyGenerator {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            prng: ChaCha20Rng::from_seed(seed),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            prng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// Draws a pattern of `num_rounds` bits holding exactly `ctrl_rounds` CTRL bits at uniformly
    /// chosen positions.
    ///
    /// # Panics
    /// Panics if `ctrl_rounds > num_rounds`.
    pub fn generate_pattern(&mut self, num_rounds: usize, ctrl_rounds: usize) -> Vec<bool> {
        let mut pattern = vec![SIFT_VALUE; num_rounds];
        for round in index::sample(&mut self.prng, num_rounds, ctrl_rounds) {
            pattern[round] = CTRL_VALUE;
        }
        pattern
    }

    /// Generates one key per Semi-Quantum party, each shared with the Distributor.
    ///
    /// All keys carry the same pattern with `params.ctrl_rounds()` CTRL bits.
    pub fn generate_keys(
        &mut self,
        params: &ProtocolParameters,
        distributor: &Identity,
        parties: &[Identity],
    ) -> Vec<BipartitePreSharedKey> {
        let pattern = self.generate_pattern(params.num_rounds(), params.ctrl_rounds());
        parties
            .iter()
            .map(|party| BipartitePreSharedKey::new(distributor, party, pattern.clone()))
            .collect()
    }
}
