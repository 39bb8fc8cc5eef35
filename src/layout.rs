//! The qubit index layout of a protocol round.
//!
//! For `N` parties the working register holds `3N - 2` qubits laid out as one Distributor slot
//! followed by three blocks of `N - 1` slots:
//!
//! | indices          | meaning                                                  |
//! |------------------|----------------------------------------------------------|
//! | `0`              | the Distributor's own qubit                              |
//! | `1 ..= N-1`      | Distributor-side channel legs, one per Semi-Quantum party |
//! | `N ..= 2N-2`     | channel-to-party legs                                    |
//! | `2N-1 ..= 3N-3`  | Semi-Quantum party slots                                 |
//!
//! Semi-Quantum parties are numbered `1 ..= N-1`; party `p` owns the slot `2N + p - 2`. The
//! classical register has one bit per qubit and qubit `i` is always measured into bit `i`.
//! Nothing outside of this module computes a qubit index.

use std::ops::RangeInclusive;

/// The index arithmetic for a round with a fixed number of parties.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelLayout {
    num_parties: usize,
}

impl ChannelLayout {
    /// Creates the layout for `num_parties` parties (Distributor included).
    ///
    /// The party count is validated by the protocol parameters, at least two parties are
    /// expected.
    pub fn new(num_parties: usize) -> Self {
        debug_assert!(num_parties >= 2, "a layout needs at least two parties");
        Self { num_parties }
    }

    /// The number of parties, Distributor included.
    pub fn num_parties(&self) -> usize {
        self.num_parties
    }

    /// The size of the quantum register.
    pub fn num_qubits(&self) -> usize {
        3 * self.num_parties - 2
    }

    /// The size of the classical register.
    pub fn num_bits(&self) -> usize {
        self.num_qubits()
    }

    /// The ids of the Semi-Quantum parties.
    pub fn semi_quantum_parties(&self) -> RangeInclusive<usize> {
        1..=self.num_parties - 1
    }

    /// Whether `party` is the id of a Semi-Quantum party.
    pub fn is_semi_quantum_party(&self, party: usize) -> bool {
        self.semi_quantum_parties().contains(&party)
    }

    /// The Distributor's own qubit.
    pub fn distributor_slot(&self) -> usize {
        0
    }

    /// The Distributor-side leg of the channel towards `party`.
    pub fn distributor_leg(&self, party: usize) -> usize {
        debug_assert!(self.is_semi_quantum_party(party));
        party
    }

    /// The party-side leg of the channel towards `party`.
    pub fn channel_leg(&self, party: usize) -> usize {
        debug_assert!(self.is_semi_quantum_party(party));
        self.num_parties - 1 + party
    }

    /// The slot owned by `party`.
    pub fn party_slot(&self, party: usize) -> usize {
        debug_assert!(self.is_semi_quantum_party(party));
        2 * self.num_parties + party - 2
    }

    /// The qubits carrying the multipartite state while it is held by the Distributor: its own
    /// slot followed by one Distributor leg per party, in party order.
    pub fn entangled_qubits(&self) -> Vec<usize> {
        std::iter::once(self.distributor_slot())
            .chain(self.semi_quantum_parties().map(|p| self.distributor_leg(p)))
            .collect()
    }

    /// The qubits holding the round result after measurement: the Distributor slot followed by
    /// every party slot, in party order.
    pub fn result_qubits(&self) -> Vec<usize> {
        std::iter::once(self.distributor_slot())
            .chain(self.semi_quantum_parties().map(|p| self.party_slot(p)))
            .collect()
    }
}
