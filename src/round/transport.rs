//! Qubit transport over the swap network.
//!
//! Qubits never get copied. Moving a qubit between two locations of the [`ChannelLayout`] swaps
//! the two register slots, followed by a barrier over the whole register.
//!
//! [`ChannelLayout`]: crate::layout::ChannelLayout

use crate::{
    error::{ProtocolError, StateMachineError},
    quantum::Gate,
    round::ProtocolRound,
};

/// Moves every Distributor leg onto its channel.
pub fn send_to_parties(round: &mut ProtocolRound) -> Result<(), ProtocolError> {
    let layout = *round.layout();
    let circuit = round.circuit_mut();
    for party in layout.semi_quantum_parties() {
        circuit.apply(
            Gate::Swap,
            &[layout.distributor_leg(party), layout.channel_leg(party)],
        )?;
    }
    circuit.barrier();
    Ok(())
}

/// Moves the qubit in flight towards `party` into its slot.
pub fn receive_at_party(round: &mut ProtocolRound, party: usize) -> Result<(), ProtocolError> {
    let layout = *round.layout();
    check_party(round, party)?;
    let circuit = round.circuit_mut();
    circuit.apply(Gate::Swap, &[layout.channel_leg(party), layout.party_slot(party)])?;
    circuit.barrier();
    Ok(())
}

/// Moves the qubit held by `party` back onto its channel.
pub fn send_back(round: &mut ProtocolRound, party: usize) -> Result<(), ProtocolError> {
    let layout = *round.layout();
    check_party(round, party)?;
    let circuit = round.circuit_mut();
    circuit.apply(Gate::Swap, &[layout.party_slot(party), layout.channel_leg(party)])?;
    circuit.barrier();
    Ok(())
}

/// Moves every channel back onto its Distributor leg.
pub fn receive_back(round: &mut ProtocolRound) -> Result<(), ProtocolError> {
    let layout = *round.layout();
    let circuit = round.circuit_mut();
    for party in layout.semi_quantum_parties().rev() {
        circuit.apply(
            Gate::Swap,
            &[layout.channel_leg(party), layout.distributor_leg(party)],
        )?;
    }
    circuit.barrier();
    Ok(())
}

fn check_party(round: &ProtocolRound, party: usize) -> Result<(), StateMachineError> {
    if round.layout().is_semi_quantum_party(party) {
        Ok(())
    } else {
        Err(StateMachineError::UnknownParty(party))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::ChannelLayout,
        quantum::{Instruction, QuantumBackend, StatevectorSimulator},
        round::RoundType,
    };

    // replays the swaps of the round on labelled slots
    fn locations(round: &ProtocolRound) -> Vec<usize> {
        let mut slots: Vec<usize> = (0..round.circuit().num_qubits()).collect();
        for instruction in round.circuit().instructions() {
            if let Instruction::Gate {
                gate: Gate::Swap,
                qubits,
            } = instruction
            {
                slots.swap(qubits[0], qubits[1]);
            }
        }
        slots
    }

    #[test]
    fn test_send_and_receive_reach_the_party_slot() {
        let mut round = ProtocolRound::new(0, RoundType::Sift, ChannelLayout::new(3));
        send_to_parties(&mut round).unwrap();
        receive_at_party(&mut round, 1).unwrap();
        receive_at_party(&mut round, 2).unwrap();
        let slots = locations(&round);
        // the label of Distributor leg `p` now sits in the slot of party `p`
        assert_eq!(slots[5], 1);
        assert_eq!(slots[6], 2);
        assert_eq!(slots[0], 0);
    }

    #[test]
    fn test_round_trip_restores_every_location() {
        for n in 2..6 {
            let layout = ChannelLayout::new(n);
            let mut round = ProtocolRound::new(0, RoundType::Ctrl, layout);
            send_to_parties(&mut round).unwrap();
            for party in layout.semi_quantum_parties() {
                receive_at_party(&mut round, party).unwrap();
                round
                    .circuit_mut()
                    .apply(Gate::H, &[layout.party_slot(party)])
                    .unwrap();
                send_back(&mut round, party).unwrap();
            }
            receive_back(&mut round).unwrap();
            assert_eq!(locations(&round), (0..layout.num_qubits()).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_round_trip_moves_the_state() {
        let layout = ChannelLayout::new(3);
        let mut round = ProtocolRound::new(0, RoundType::Ctrl, layout);
        round.circuit_mut().apply(Gate::X, &[2]).unwrap();
        send_to_parties(&mut round).unwrap();
        receive_at_party(&mut round, 2).unwrap();
        send_back(&mut round, 2).unwrap();
        receive_back(&mut round).unwrap();
        for q in 0..layout.num_qubits() {
            round.circuit_mut().measure(q, q).unwrap();
        }
        let counts = StatevectorSimulator::seeded(0, 10)
            .run(round.circuit(), 1)
            .unwrap();
        assert_eq!(counts.get("0000100"), Some(&1));
    }

    #[test]
    fn test_unknown_party() {
        let mut round = ProtocolRound::new(0, RoundType::Sift, ChannelLayout::new(3));
        assert!(matches!(
            receive_at_party(&mut round, 0),
            Err(ProtocolError::StateMachine(StateMachineError::UnknownParty(0)))
        ));
        assert!(matches!(
            send_back(&mut round, 3),
            Err(ProtocolError::StateMachine(StateMachineError::UnknownParty(3)))
        ));
    }
}
