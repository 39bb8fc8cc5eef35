//! Protocol rounds.
//!
//! A [`ProtocolRound`] is created by the Distributor at the start of a round and then moved
//! through the party entities, each of them appending its operations to the working circuit.
//! The round records the at most one execution of its circuit on the backend.

pub mod detection;
pub mod executor;
pub mod transport;

use derive_more::Display;

use crate::{
    error::StateMachineError,
    keys::CTRL_VALUE,
    layout::ChannelLayout,
    params::{Edge, Topology},
    quantum::Circuit,
};

pub use self::{
    detection::{ChannelAdversary, EavesdroppingDetector},
    executor::RoundExecutor,
};

/// The type of a round, fixed by the pre-shared key bit of the round.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, Hash)]
pub enum RoundType {
    /// The parties measure and resend, the round contributes a key bit.
    #[display(fmt = "SIFT")]
    Sift,
    /// The parties reflect, the round checks for eavesdropping.
    #[display(fmt = "CTRL")]
    Ctrl,
}

impl RoundType {
    pub fn from_key_bit(bit: bool) -> Self {
        if bit == CTRL_VALUE {
            RoundType::Ctrl
        } else {
            RoundType::Sift
        }
    }
}

/// The verdict of an eavesdropping check.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum Detection {
    #[display(fmt = "clean")]
    Clean,
    #[display(fmt = "eavesdropped")]
    Eavesdropped,
}

/// The result of an executed round.
#[derive(Clone, Debug, PartialEq)]
pub enum RoundOutcome {
    /// One bit per party, index `0` is the Distributor.
    Sift(Vec<bool>),
    Ctrl(Detection),
}

/// A time slot during which `owner` holds the single shared channel to send along `edge`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSlot {
    pub slot: usize,
    pub owner: usize,
    pub edge: Edge,
}

/// A single round of the protocol.
#[derive(Clone, Debug)]
pub struct ProtocolRound {
    index: usize,
    round_type: RoundType,
    layout: ChannelLayout,
    circuit: Circuit,
    outcome: Option<RoundOutcome>,
    time_slots: Vec<TimeSlot>,
    executed: bool,
}

impl ProtocolRound {
    /// Creates round `index` with a fresh working register sized for `layout`.
    pub fn new(index: usize, round_type: RoundType, layout: ChannelLayout) -> Self {
        Self {
            index,
            round_type,
            layout,
            circuit: Circuit::allocate(layout.num_qubits(), layout.num_bits()),
            outcome: None,
            time_slots: Vec::new(),
            executed: false,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn round_type(&self) -> RoundType {
        self.round_type
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn circuit(&self) -> &Circuit {
        &self.circuit
    }

    pub(crate) fn circuit_mut(&mut self) -> &mut Circuit {
        &mut self.circuit
    }

    pub fn outcome(&self) -> Option<&RoundOutcome> {
        self.outcome.as_ref()
    }

    /// The bits of an executed SIFT round.
    pub fn sift_bits(&self) -> Option<&[bool]> {
        match &self.outcome {
            Some(RoundOutcome::Sift(bits)) => Some(bits),
            _ => None,
        }
    }

    /// The verdict of an executed CTRL round.
    pub fn detection(&self) -> Option<Detection> {
        match self.outcome {
            Some(RoundOutcome::Ctrl(detection)) => Some(detection),
            _ => None,
        }
    }

    pub fn time_slots(&self) -> &[TimeSlot] {
        &self.time_slots
    }

    /// Schedules the single shared channel: one slot per walk edge, in walk order.
    ///
    /// Dedicated channels need no schedule and leave the round untouched.
    pub fn assign_time_slots(&mut self, topology: &Topology) {
        if let Topology::SharedChannel { walk } = topology {
            self.time_slots = walk
                .iter()
                .enumerate()
                .map(|(slot, &edge)| TimeSlot {
                    slot,
                    owner: edge.from,
                    edge,
                })
                .collect();
        }
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Claims the single backend execution of the round.
    ///
    /// # Errors
    /// Fails if the round has already been executed.
    pub(crate) fn mark_executed(&mut self) -> Result<(), StateMachineError> {
        if self.executed {
            return Err(StateMachineError::AlreadyExecuted { round: self.index });
        }
        self.executed = true;
        Ok(())
    }

    pub(crate) fn set_outcome(&mut self, outcome: RoundOutcome) {
        self.outcome = Some(outcome);
    }

    pub(crate) fn expect_type(&self, expected: RoundType) -> Result<(), StateMachineError> {
        if self.round_type == expected {
            Ok(())
        } else {
            Err(StateMachineError::WrongRoundType {
                round: self.index,
                expected,
                found: self.round_type,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SIFT_VALUE;

    #[test]
    fn test_round_type_from_key_bit() {
        assert_eq!(RoundType::from_key_bit(CTRL_VALUE), RoundType::Ctrl);
        assert_eq!(RoundType::from_key_bit(SIFT_VALUE), RoundType::Sift);
        assert_eq!(RoundType::Sift.to_string(), "SIFT");
        assert_eq!(RoundType::Ctrl.to_string(), "CTRL");
    }

    #[test]
    fn test_new_round_allocates_the_register() {
        let round = ProtocolRound::new(4, RoundType::Sift, ChannelLayout::new(3));
        assert_eq!(round.index(), 4);
        assert_eq!(round.circuit().num_qubits(), 7);
        assert_eq!(round.circuit().num_bits(), 7);
        assert!(round.outcome().is_none());
        assert!(!round.is_executed());
    }

    #[test]
    fn test_mark_executed_only_once() {
        let mut round = ProtocolRound::new(2, RoundType::Ctrl, ChannelLayout::new(2));
        assert!(round.mark_executed().is_ok());
        assert_eq!(
            round.mark_executed(),
            Err(StateMachineError::AlreadyExecuted { round: 2 })
        );
    }

    #[test]
    fn test_time_slots_follow_the_walk() {
        let walk = vec![
            Edge { from: 0, to: 2 },
            Edge { from: 2, to: 1 },
            Edge { from: 1, to: 0 },
        ];
        let mut round = ProtocolRound::new(0, RoundType::Sift, ChannelLayout::new(3));
        round.assign_time_slots(&Topology::SharedChannel { walk });
        let owners: Vec<usize> = round.time_slots().iter().map(|s| s.owner).collect();
        assert_eq!(owners, vec![0, 2, 1]);
        assert_eq!(round.time_slots()[1].slot, 1);

        let mut round = ProtocolRound::new(0, RoundType::Sift, ChannelLayout::new(3));
        round.assign_time_slots(&Topology::Dedicated { links: Vec::new() });
        assert!(round.time_slots().is_empty());
    }

    #[test]
    fn test_outcome_accessors() {
        let mut round = ProtocolRound::new(0, RoundType::Sift, ChannelLayout::new(2));
        round.set_outcome(RoundOutcome::Sift(vec![true, true]));
        assert_eq!(round.sift_bits(), Some(&[true, true][..]));
        assert_eq!(round.detection(), None);
        assert!(round.expect_type(RoundType::Sift).is_ok());
        assert_eq!(
            round.expect_type(RoundType::Ctrl),
            Err(StateMachineError::WrongRoundType {
                round: 0,
                expected: RoundType::Ctrl,
                found: RoundType::Sift
            })
        );
    }
}
