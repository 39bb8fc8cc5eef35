//! Sequencing of a single round.

use tracing::{debug, info, info_span, warn};

use crate::{
    entanglement::EntanglementSpec,
    error::{ProtocolError, StateMachineError},
    params::{EavesdroppingStrategy, Topology},
    party::PartyEntity,
    quantum::QuantumBackend,
    round::{ChannelAdversary, Detection, EavesdroppingDetector, ProtocolRound, RoundType},
};

/// Drives rounds through the Distributor and the Semi-Quantum parties.
pub struct RoundExecutor<'a, B: ?Sized> {
    pub(crate) distributor: &'a PartyEntity,
    pub(crate) parties: &'a [PartyEntity],
    pub(crate) spec: &'a EntanglementSpec,
    pub(crate) topology: &'a Topology,
    pub(crate) strategy: EavesdroppingStrategy,
    pub(crate) backend: &'a mut B,
    pub(crate) detector: Option<&'a mut Box<dyn EavesdroppingDetector>>,
    pub(crate) adversary: ChannelAdversary,
}

impl<'a, B> RoundExecutor<'a, B>
where
    B: QuantumBackend + ?Sized,
{
    /// Executes round `index` from entanglement preparation to transport back.
    pub fn execute(&mut self, index: usize) -> Result<ProtocolRound, ProtocolError> {
        let span = info_span!("round", index);
        let _enter = span.enter();

        let distributor = self.distributor;
        let round_type = distributor.round_type(index)?;
        debug!("starting {} round", round_type);

        let mut round = distributor.prepare_entanglement(index, self.spec)?;
        round.assign_time_slots(self.topology);
        round = distributor.send_to_parties(round)?;
        self.adversary.intercept(&mut round)?;
        for party in self.parties {
            round = party.receive_from_distributor(round)?;
            round = party.measure_or_reflect(round)?;
        }

        match round_type {
            RoundType::Sift => self.finish_sift(round),
            RoundType::Ctrl => self.finish_ctrl(round),
        }
    }

    fn finish_sift(&mut self, mut round: ProtocolRound) -> Result<ProtocolRound, ProtocolError> {
        let distributor = self.distributor;
        round = distributor.execute_sift_round(round, &mut *self.backend)?;
        round = distributor.reset_for_resend(round)?;
        round = distributor.prepare_resend(round)?;
        for party in self.parties {
            round = party.prepare_resend(round)?;
            round = party.send_back(round)?;
        }
        round = distributor.receive_from_parties(round)?;

        if let Some(bits) = round.sift_bits() {
            if bits.iter().any(|&bit| bit != bits[0]) {
                warn!("parties measured disagreeing bits {:?}", bits);
            } else {
                info!("sifted bit {}", u8::from(bits[0]));
            }
        }
        Ok(round)
    }

    fn finish_ctrl(&mut self, mut round: ProtocolRound) -> Result<ProtocolRound, ProtocolError> {
        let distributor = self.distributor;
        for party in self.parties {
            round = party.send_back(round)?;
        }
        round = distributor.receive_from_parties(round)?;

        round = match self.strategy {
            EavesdroppingStrategy::InvertAndMeasure => {
                round = distributor.invert_and_measure(round, self.spec)?;
                distributor.execute_ctrl_round(round, &mut *self.backend)?
            }
            strategy => {
                let detector = self
                    .detector
                    .as_deref_mut()
                    .ok_or(StateMachineError::MissingDetector(strategy))?;
                distributor.detect_with(round, &mut **detector)?
            }
        };

        match round.detection() {
            Some(Detection::Eavesdropped) => warn!("eavesdropping detected"),
            _ => info!("no eavesdropping detected"),
        }
        Ok(round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        keys::BipartitePreSharedKey,
        params::Edge,
        party::Identity,
        quantum::StatevectorSimulator,
        round::detection::MockEavesdroppingDetector,
    };

    fn entities(bits: Vec<bool>, num_parties: usize) -> Vec<PartyEntity> {
        let distributor = Identity::new("distributor");
        let others: Vec<Identity> = (1..num_parties)
            .map(|p| Identity::new(format!("party-{}", p)))
            .collect();
        let keys: Vec<BipartitePreSharedKey> = others
            .iter()
            .map(|party| BipartitePreSharedKey::new(&distributor, party, bits.clone()))
            .collect();
        PartyEntity::assemble(distributor, others, &keys).unwrap()
    }

    fn walk(num_parties: usize) -> Topology {
        Topology::SharedChannel {
            walk: (0..num_parties)
                .map(|i| Edge {
                    from: i,
                    to: (i + 1) % num_parties,
                })
                .collect(),
        }
    }

    #[test]
    fn test_sift_and_ctrl_rounds() {
        let parties = entities(vec![false, true], 3);
        let topology = walk(3);
        let mut backend = StatevectorSimulator::seeded(21, 16);
        let mut executor = RoundExecutor {
            distributor: &parties[0],
            parties: &parties[1..],
            spec: &EntanglementSpec::Ghz,
            topology: &topology,
            strategy: EavesdroppingStrategy::InvertAndMeasure,
            backend: &mut backend,
            detector: None,
            adversary: ChannelAdversary::None,
        };

        let sift = executor.execute(0).unwrap();
        assert_eq!(sift.round_type(), RoundType::Sift);
        let bits = sift.sift_bits().unwrap();
        assert_eq!(bits.len(), 3);
        assert!(bits.iter().all(|&b| b == bits[0]));
        assert_eq!(sift.time_slots().len(), 3);

        let ctrl = executor.execute(1).unwrap();
        assert_eq!(ctrl.round_type(), RoundType::Ctrl);
        assert_eq!(ctrl.detection(), Some(Detection::Clean));
        assert!(ctrl.is_executed());
    }

    #[test]
    fn test_external_detector() {
        let parties = entities(vec![true], 3);
        let topology = walk(3);
        let mut backend = StatevectorSimulator::seeded(0, 16);

        let mut mock = MockEavesdroppingDetector::new();
        mock.expect_detect()
            .times(1)
            .returning(|round| {
                assert_eq!(round.index(), 0);
                Ok(Detection::Eavesdropped)
            });
        let mut detector: Box<dyn EavesdroppingDetector> = Box::new(mock);

        let mut executor = RoundExecutor {
            distributor: &parties[0],
            parties: &parties[1..],
            spec: &EntanglementSpec::Ghz,
            topology: &topology,
            strategy: EavesdroppingStrategy::SwapTest,
            backend: &mut backend,
            detector: Some(&mut detector),
            adversary: ChannelAdversary::None,
        };
        let round = executor.execute(0).unwrap();
        assert_eq!(round.detection(), Some(Detection::Eavesdropped));
    }

    #[test]
    fn test_missing_detector() {
        let parties = entities(vec![true], 3);
        let topology = walk(3);
        let mut backend = StatevectorSimulator::seeded(0, 16);
        let mut executor = RoundExecutor {
            distributor: &parties[0],
            parties: &parties[1..],
            spec: &EntanglementSpec::Ghz,
            topology: &topology,
            strategy: EavesdroppingStrategy::StatisticalTest,
            backend: &mut backend,
            detector: None,
            adversary: ChannelAdversary::None,
        };
        assert!(matches!(
            executor.execute(0),
            Err(ProtocolError::StateMachine(StateMachineError::MissingDetector(
                EavesdroppingStrategy::StatisticalTest
            )))
        ));
    }
}
