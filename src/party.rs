//! Party entities and their role-checked operations.
//!
//! The Distributor owns the round: it prepares the entanglement, sends the qubits out, executes
//! the working circuit and checks for eavesdropping. A Semi-Quantum party only acts on its own
//! slot, where it either measures or reflects the qubit it received. Every operation checks the
//! role of the caller before touching the round.

use std::collections::HashSet;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::{
    entanglement::EntanglementSpec,
    error::{ProtocolError, StateMachineError},
    keys::BipartitePreSharedKey,
    layout::ChannelLayout,
    quantum::{run_single_shot, Gate, QuantumBackend},
    round::{transport, Detection, EavesdroppingDetector, ProtocolRound, RoundOutcome, RoundType},
};

/// The id of the Distributor.
pub const DISTRIBUTOR_ID: usize = 0;

/// The identity of a protocol participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    uuid: Uuid,
    name: String,
}

impl Identity {
    /// Creates an identity with a random UUID.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_uuid(Uuid::new_v4(), name)
    }

    pub fn with_uuid(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Role {
    #[display(fmt = "Distributor")]
    Distributor,
    #[display(fmt = "Semi-Quantum")]
    SemiQuantum,
}

/// Error raised when a party invokes an operation its role doesn't permit.
#[derive(Debug, Error, PartialEq)]
#[error("{role} party {party} is not allowed to {operation}")]
pub struct RoleViolationError {
    pub party: usize,
    pub role: Role,
    pub operation: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
enum KeyRing {
    Distributor(Vec<BipartitePreSharedKey>),
    SemiQuantum(BipartitePreSharedKey),
}

/// A participant of the protocol.
#[derive(Clone, Debug, PartialEq)]
pub struct PartyEntity {
    id: usize,
    identity: Identity,
    keys: KeyRing,
}

impl PartyEntity {
    /// Creates a party entity.
    ///
    /// The Distributor has id `0` and holds one key per Semi-Quantum party. A Semi-Quantum party
    /// has a non-zero id and holds exactly one key. Every key must be owned by `identity`.
    ///
    /// # Errors
    /// Fails if the key set doesn't match the role.
    pub fn new(
        id: usize,
        identity: Identity,
        role: Role,
        mut keys: Vec<BipartitePreSharedKey>,
    ) -> Result<Self, StateMachineError> {
        if keys.iter().any(|key| !key.is_owned_by(identity.uuid())) {
            return Err(StateMachineError::UnexpectedKey { party: id });
        }
        let keys = match role {
            Role::Distributor => {
                if id != DISTRIBUTOR_ID || keys.is_empty() {
                    return Err(StateMachineError::KeyRoleMismatch { party: id });
                }
                for (i, key) in keys.iter().enumerate() {
                    if keys[..i].iter().any(|other| other.same_owners(key)) {
                        return Err(StateMachineError::DuplicateKey);
                    }
                }
                KeyRing::Distributor(keys)
            }
            Role::SemiQuantum => {
                if id == DISTRIBUTOR_ID || keys.len() != 1 {
                    return Err(StateMachineError::KeyRoleMismatch { party: id });
                }
                KeyRing::SemiQuantum(keys.remove(0))
            }
        };
        Ok(Self { id, identity, keys })
    }

    /// Wires the Distributor and the Semi-Quantum parties to their keys.
    ///
    /// `parties[i]` becomes the Semi-Quantum party `i + 1`. The Distributor comes first in the
    /// returned list.
    pub fn assemble(
        distributor: Identity,
        parties: Vec<Identity>,
        keys: &[BipartitePreSharedKey],
    ) -> Result<Vec<Self>, StateMachineError> {
        let mut entities = Vec::with_capacity(parties.len() + 1);
        let mut distributor_keys = Vec::with_capacity(parties.len());
        for (i, party) in parties.into_iter().enumerate() {
            let id = i + 1;
            let key = keys
                .iter()
                .find(|key| key.is_owned_by(party.uuid()) && key.is_owned_by(distributor.uuid()))
                .ok_or(StateMachineError::KeyRoleMismatch { party: id })?;
            distributor_keys.push(key.clone());
            entities.push(Self::new(id, party, Role::SemiQuantum, vec![key.clone()])?);
        }
        entities.insert(
            0,
            Self::new(DISTRIBUTOR_ID, distributor, Role::Distributor, distributor_keys)?,
        );
        Ok(entities)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn role(&self) -> Role {
        match self.keys {
            KeyRing::Distributor(_) => Role::Distributor,
            KeyRing::SemiQuantum(_) => Role::SemiQuantum,
        }
    }

    /// The keys held by the party.
    pub fn keys(&self) -> &[BipartitePreSharedKey] {
        match &self.keys {
            KeyRing::Distributor(keys) => keys,
            KeyRing::SemiQuantum(key) => std::slice::from_ref(key),
        }
    }

    /// The Distributor's key shared with `uuid`.
    pub fn key_for(&self, uuid: Uuid) -> Option<&BipartitePreSharedKey> {
        self.keys().iter().find(|key| key.is_owned_by(uuid))
    }

    /// Derives the type of round `round` from the party's own keys.
    ///
    /// # Errors
    /// Fails if the keys don't cover the round or, for the Distributor, if its keys disagree.
    pub fn round_type(&self, round: usize) -> Result<RoundType, StateMachineError> {
        let mut bits = self.keys().iter().map(|key| {
            key.bit(round).ok_or(StateMachineError::RoundOutOfRange {
                round,
                len: key.len(),
            })
        });
        let first = bits
            .next()
            .unwrap_or(Err(StateMachineError::KeyRoleMismatch { party: self.id }))?;
        for bit in bits {
            if bit? != first {
                return Err(StateMachineError::KeyDisagreement { round });
            }
        }
        Ok(RoundType::from_key_bit(first))
    }

    fn require(&self, role: Role, operation: &'static str) -> Result<(), RoleViolationError> {
        if self.role() == role {
            Ok(())
        } else {
            Err(RoleViolationError {
                party: self.id,
                role: self.role(),
                operation,
            })
        }
    }

    /// Checks the type tag of `round` against the party's own key bit for the round.
    fn check_keyed_type(&self, round: &ProtocolRound) -> Result<(), StateMachineError> {
        let index = round.index();
        if self.round_type(index)? == round.round_type() {
            Ok(())
        } else {
            Err(StateMachineError::KeyDisagreement { round: index })
        }
    }

    fn layout(&self) -> ChannelLayout {
        ChannelLayout::new(self.keys().len() + 1)
    }

    /// Opens round `index` by preparing `spec` on the Distributor slot and the Distributor legs.
    pub fn prepare_entanglement(
        &self,
        index: usize,
        spec: &EntanglementSpec,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::Distributor, "prepare entanglement")?;
        let layout = self.layout();
        let mut round = ProtocolRound::new(index, self.round_type(index)?, layout);
        spec.prepare(round.circuit_mut(), &layout.entangled_qubits())?;
        round.circuit_mut().barrier();
        debug!("prepared {} entanglement for round {}", spec.entanglement_type(), index);
        Ok(round)
    }

    pub fn send_to_parties(&self, mut round: ProtocolRound) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::Distributor, "send to parties")?;
        transport::send_to_parties(&mut round)?;
        Ok(round)
    }

    pub fn receive_from_distributor(
        &self,
        mut round: ProtocolRound,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::SemiQuantum, "receive from the Distributor")?;
        transport::receive_at_party(&mut round, self.id)?;
        Ok(round)
    }

    /// Measures the party's slot in the Z basis in a SIFT round, reflects it in a CTRL round.
    pub fn measure_or_reflect(
        &self,
        mut round: ProtocolRound,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::SemiQuantum, "measure or reflect")?;
        self.check_keyed_type(&round)?;
        let slot = round.layout().party_slot(self.id);
        match round.round_type() {
            RoundType::Sift => round.circuit_mut().measure(slot, slot)?,
            RoundType::Ctrl => round.circuit_mut().apply(Gate::I, &[slot])?,
        }
        Ok(round)
    }

    /// Executes the working circuit of a SIFT round and records one bit per party.
    ///
    /// The Distributor measures its own slot before the execution. The backend is invoked at
    /// most once per round.
    pub fn execute_sift_round<B>(
        &self,
        mut round: ProtocolRound,
        backend: &mut B,
    ) -> Result<ProtocolRound, ProtocolError>
    where
        B: QuantumBackend + ?Sized,
    {
        self.require(Role::Distributor, "execute a SIFT round")?;
        self.check_keyed_type(&round)?;
        round.expect_type(RoundType::Sift)?;
        round.mark_executed()?;
        let layout = *round.layout();
        let slot = layout.distributor_slot();
        round.circuit_mut().measure(slot, slot)?;

        let register = run_single_shot(backend, round.circuit())?;
        let bits: Vec<bool> = layout
            .result_qubits()
            .into_iter()
            .map(|qubit| register[qubit])
            .collect();
        debug!("round {} measured {:?}", round.index(), bits);
        round.set_outcome(RoundOutcome::Sift(bits));
        Ok(round)
    }

    /// Resets every measured qubit of an executed SIFT round.
    pub fn reset_for_resend(
        &self,
        mut round: ProtocolRound,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::Distributor, "reset for resend")?;
        if round.sift_bits().is_none() {
            return Err(StateMachineError::NoResults {
                round: round.index(),
            }
            .into());
        }
        for qubit in round.circuit().measured_qubits() {
            round.circuit_mut().reset(qubit)?;
        }
        Ok(round)
    }

    /// Re-prepares the party's measured bit as a basis state on its own slot.
    pub fn prepare_resend(&self, mut round: ProtocolRound) -> Result<ProtocolRound, ProtocolError> {
        let layout = *round.layout();
        let (position, slot) = match self.role() {
            Role::Distributor => (0, layout.distributor_slot()),
            Role::SemiQuantum => {
                if !layout.is_semi_quantum_party(self.id) {
                    return Err(StateMachineError::UnknownParty(self.id).into());
                }
                (self.id, layout.party_slot(self.id))
            }
        };
        let bit = round
            .sift_bits()
            .map(|bits| bits[position])
            .ok_or(StateMachineError::NoResults {
                round: round.index(),
            })?;
        if bit {
            round.circuit_mut().apply(Gate::X, &[slot])?;
        }
        Ok(round)
    }

    pub fn send_back(&self, mut round: ProtocolRound) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::SemiQuantum, "send back")?;
        transport::send_back(&mut round, self.id)?;
        Ok(round)
    }

    pub fn receive_from_parties(
        &self,
        mut round: ProtocolRound,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::Distributor, "receive from parties")?;
        transport::receive_back(&mut round)?;
        Ok(round)
    }

    /// Undoes the preparation of `spec` on the returned qubits and measures them.
    pub fn invert_and_measure(
        &self,
        mut round: ProtocolRound,
        spec: &EntanglementSpec,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::Distributor, "invert and measure")?;
        round.expect_type(RoundType::Ctrl)?;
        let qubits = round.layout().entangled_qubits();
        spec.invert_and_measure(round.circuit_mut(), &qubits)?;
        Ok(round)
    }

    /// Executes the working circuit of an inverted CTRL round.
    ///
    /// The round is clean iff every returned qubit was measured as `0`. The backend is invoked at
    /// most once per round.
    pub fn execute_ctrl_round<B>(
        &self,
        mut round: ProtocolRound,
        backend: &mut B,
    ) -> Result<ProtocolRound, ProtocolError>
    where
        B: QuantumBackend + ?Sized,
    {
        self.require(Role::Distributor, "execute a CTRL round")?;
        self.check_keyed_type(&round)?;
        round.expect_type(RoundType::Ctrl)?;
        round.mark_executed()?;
        let register = run_single_shot(backend, round.circuit())?;
        let detection = if round
            .layout()
            .entangled_qubits()
            .into_iter()
            .all(|qubit| !register[qubit])
        {
            Detection::Clean
        } else {
            Detection::Eavesdropped
        };
        round.set_outcome(RoundOutcome::Ctrl(detection));
        Ok(round)
    }

    /// Hands a returned CTRL round to an external detector and records its verdict.
    pub fn detect_with(
        &self,
        mut round: ProtocolRound,
        detector: &mut dyn EavesdroppingDetector,
    ) -> Result<ProtocolRound, ProtocolError> {
        self.require(Role::Distributor, "run an eavesdropping detector")?;
        self.check_keyed_type(&round)?;
        round.expect_type(RoundType::Ctrl)?;
        round.mark_executed()?;
        let detection = detector.detect(&round)?;
        round.set_outcome(RoundOutcome::Ctrl(detection));
        Ok(round)
    }
}

/// Checks that party ids are unique.
pub(crate) fn unique_ids(parties: &[PartyEntity]) -> Result<(), StateMachineError> {
    let mut seen = HashSet::new();
    for party in parties {
        if !seen.insert(party.id()) {
            return Err(StateMachineError::DuplicatePartyId(party.id()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantum::StatevectorSimulator;

    fn parties(bits: Vec<bool>, num_parties: usize) -> Vec<PartyEntity> {
        let distributor = Identity::new("Distributor");
        let others: Vec<Identity> = (1..num_parties)
            .map(|p| Identity::new(format!("party-{}", p)))
            .collect();
        let keys: Vec<BipartitePreSharedKey> = others
            .iter()
            .map(|party| BipartitePreSharedKey::new(&distributor, party, bits.clone()))
            .collect();
        PartyEntity::assemble(distributor, others, &keys).unwrap()
    }

    fn backend() -> StatevectorSimulator {
        StatevectorSimulator::seeded(17, 16)
    }

    #[test]
    fn test_assemble() {
        let entities = parties(vec![true, false], 3);
        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].role(), Role::Distributor);
        assert_eq!(entities[0].keys().len(), 2);
        assert_eq!(entities[2].id(), 2);
        assert_eq!(entities[2].role(), Role::SemiQuantum);
        let key = entities[0].key_for(entities[2].identity().uuid()).unwrap();
        assert_eq!(key, &entities[2].keys()[0]);
    }

    #[test]
    fn test_role_must_match_keys() {
        let entities = parties(vec![true], 3);
        let distributor = &entities[0];
        assert_eq!(
            PartyEntity::new(
                0,
                distributor.identity().clone(),
                Role::SemiQuantum,
                distributor.keys().to_vec()
            ),
            Err(StateMachineError::KeyRoleMismatch { party: 0 })
        );
        assert_eq!(
            PartyEntity::new(
                1,
                entities[1].identity().clone(),
                Role::Distributor,
                entities[1].keys().to_vec()
            ),
            Err(StateMachineError::KeyRoleMismatch { party: 1 })
        );
        assert_eq!(
            PartyEntity::new(
                1,
                entities[1].identity().clone(),
                Role::SemiQuantum,
                entities[2].keys().to_vec()
            ),
            Err(StateMachineError::UnexpectedKey { party: 1 })
        );
        let twice = vec![distributor.keys()[0].clone(), distributor.keys()[0].clone()];
        assert_eq!(
            PartyEntity::new(0, distributor.identity().clone(), Role::Distributor, twice),
            Err(StateMachineError::DuplicateKey)
        );
    }

    #[test]
    fn test_key_bits_agree() {
        let entities = parties(vec![true, false, false, true, false], 4);
        for round in 0..5 {
            let expected = entities[0].round_type(round).unwrap();
            for party in &entities[1..] {
                let own = party.keys()[0].bit(round).unwrap();
                let distributor_view = entities[0]
                    .key_for(party.identity().uuid())
                    .and_then(|key| key.bit(round))
                    .unwrap();
                assert_eq!(own, distributor_view);
                assert_eq!(party.round_type(round).unwrap(), expected);
            }
        }
        assert_eq!(
            entities[0].round_type(5),
            Err(StateMachineError::RoundOutOfRange { round: 5, len: 5 })
        );
    }

    #[test]
    fn test_distributor_detects_disagreeing_keys() {
        let distributor = Identity::new("d");
        let a = Identity::new("a");
        let b = Identity::new("b");
        let keys = vec![
            BipartitePreSharedKey::new(&distributor, &a, vec![true, false]),
            BipartitePreSharedKey::new(&distributor, &b, vec![true, true]),
        ];
        let entities = PartyEntity::assemble(distributor, vec![a, b], &keys).unwrap();
        assert_eq!(entities[0].round_type(0), Ok(RoundType::Ctrl));
        assert_eq!(
            entities[0].round_type(1),
            Err(StateMachineError::KeyDisagreement { round: 1 })
        );
    }

    #[test]
    fn test_operations_check_the_role() {
        let entities = parties(vec![false], 3);
        let (distributor, party) = (&entities[0], &entities[1]);

        let err = party
            .prepare_entanglement(0, &EntanglementSpec::Ghz)
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Role(RoleViolationError {
                party: 1,
                role: Role::SemiQuantum,
                ..
            })
        ));

        let round = distributor
            .prepare_entanglement(0, &EntanglementSpec::Ghz)
            .unwrap();
        assert!(matches!(
            distributor.measure_or_reflect(round.clone()),
            Err(ProtocolError::Role(_))
        ));
        assert!(matches!(
            distributor.send_back(round.clone()),
            Err(ProtocolError::Role(_))
        ));
        assert!(matches!(
            party.send_to_parties(round.clone()),
            Err(ProtocolError::Role(_))
        ));
        assert!(matches!(
            party.execute_sift_round(round.clone(), &mut backend()),
            Err(ProtocolError::Role(_))
        ));
        assert!(matches!(
            party.receive_from_parties(round),
            Err(ProtocolError::Role(_))
        ));
    }

    fn run_sift(entities: &[PartyEntity], spec: &EntanglementSpec) -> ProtocolRound {
        let distributor = &entities[0];
        let mut round = distributor.prepare_entanglement(0, spec).unwrap();
        round = distributor.send_to_parties(round).unwrap();
        for party in &entities[1..] {
            round = party.receive_from_distributor(round).unwrap();
            round = party.measure_or_reflect(round).unwrap();
        }
        distributor
            .execute_sift_round(round, &mut backend())
            .unwrap()
    }

    #[test]
    fn test_sift_round_executes_at_most_once() {
        let entities = parties(vec![false], 3);
        let round = run_sift(&entities, &EntanglementSpec::Ghz);
        assert!(round.is_executed());
        let bits = round.sift_bits().unwrap().to_vec();
        assert_eq!(bits.len(), 3);
        assert!(bits.iter().all(|&b| b == bits[0]));

        let err = entities[0]
            .execute_sift_round(round, &mut backend())
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::StateMachine(StateMachineError::AlreadyExecuted { round: 0 })
        ));
    }

    #[test]
    fn test_sift_round_resend() {
        let entities = parties(vec![false], 3);
        let distributor = &entities[0];
        let mut round = run_sift(&entities, &EntanglementSpec::Ghz);
        let bits = round.sift_bits().unwrap().to_vec();
        round = distributor.reset_for_resend(round).unwrap();
        round = distributor.prepare_resend(round).unwrap();
        for party in &entities[1..] {
            round = party.prepare_resend(round).unwrap();
            round = party.send_back(round).unwrap();
        }
        round = distributor.receive_from_parties(round).unwrap();

        // the resent bits arrive on the Distributor legs
        let mut circuit = round.circuit().clone();
        for qubit in 0..3 {
            circuit.measure(qubit, qubit).unwrap();
        }
        let counts = backend().run(&circuit, 4).unwrap();
        let expected: String = if bits[0] { "111" } else { "000" }.to_string();
        assert!(counts.keys().all(|k| k.ends_with(&expected)));
    }

    #[test]
    fn test_ctrl_round_is_clean_without_adversary() {
        let entities = parties(vec![true], 3);
        let distributor = &entities[0];
        let spec = EntanglementSpec::Ghz;
        let mut round = distributor.prepare_entanglement(0, &spec).unwrap();
        assert!(matches!(
            distributor.execute_sift_round(round.clone(), &mut backend()),
            Err(ProtocolError::StateMachine(StateMachineError::WrongRoundType { .. }))
        ));
        round = distributor.send_to_parties(round).unwrap();
        for party in &entities[1..] {
            round = party.receive_from_distributor(round).unwrap();
            round = party.measure_or_reflect(round).unwrap();
            round = party.send_back(round).unwrap();
        }
        round = distributor.receive_from_parties(round).unwrap();
        round = distributor.invert_and_measure(round, &spec).unwrap();
        round = distributor
            .execute_ctrl_round(round, &mut backend())
            .unwrap();
        assert_eq!(round.detection(), Some(Detection::Clean));
        assert!(matches!(
            distributor.execute_ctrl_round(round, &mut backend()),
            Err(ProtocolError::StateMachine(StateMachineError::AlreadyExecuted { .. }))
        ));
    }

    #[test]
    fn test_execution_follows_the_distributor_key() {
        // round 0 is CTRL and round 1 is SIFT for every key
        let entities = parties(vec![true, false], 3);
        let distributor = &entities[0];
        let layout = ChannelLayout::new(3);

        let forged = ProtocolRound::new(0, RoundType::Sift, layout);
        assert!(matches!(
            distributor.execute_sift_round(forged, &mut backend()),
            Err(ProtocolError::StateMachine(StateMachineError::KeyDisagreement { round: 0 }))
        ));

        let forged = ProtocolRound::new(1, RoundType::Ctrl, layout);
        assert!(matches!(
            distributor.execute_ctrl_round(forged.clone(), &mut backend()),
            Err(ProtocolError::StateMachine(StateMachineError::KeyDisagreement { round: 1 }))
        ));
        let mut detector = crate::round::detection::MockEavesdroppingDetector::new();
        detector.expect_detect().never();
        assert!(matches!(
            distributor.detect_with(forged, &mut detector),
            Err(ProtocolError::StateMachine(StateMachineError::KeyDisagreement { round: 1 }))
        ));

        let beyond = ProtocolRound::new(2, RoundType::Sift, layout);
        assert!(matches!(
            distributor.execute_sift_round(beyond, &mut backend()),
            Err(ProtocolError::StateMachine(StateMachineError::RoundOutOfRange {
                round: 2,
                len: 2
            }))
        ));
    }

    #[test]
    fn test_resend_needs_results() {
        let entities = parties(vec![false], 2);
        let round = entities[0]
            .prepare_entanglement(0, &EntanglementSpec::Graph(vec![(0, 1)]))
            .unwrap();
        assert!(matches!(
            entities[0].reset_for_resend(round.clone()),
            Err(ProtocolError::StateMachine(StateMachineError::NoResults { round: 0 }))
        ));
        assert!(matches!(
            entities[1].prepare_resend(round),
            Err(ProtocolError::StateMachine(StateMachineError::NoResults { round: 0 }))
        ));
    }

    #[test]
    fn test_unique_ids() {
        let mut entities = parties(vec![false], 3);
        assert!(unique_ids(&entities).is_ok());
        entities.push(entities[1].clone());
        assert_eq!(
            unique_ids(&entities),
            Err(StateMachineError::DuplicatePartyId(1))
        );
    }
}
