//! Eavesdropping detection and channel tampering.

use serde::Deserialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::{
    error::ProtocolError,
    round::{Detection, ProtocolRound},
};

/// A pluggable eavesdropping check for CTRL rounds.
///
/// The invert-and-measure check is built into the Distributor. The SWAP-test and the statistical
/// test strategies are provided by implementors of this trait.
#[cfg_attr(test, automock)]
pub trait EavesdroppingDetector {
    /// Inspects a CTRL round whose qubits have been transported back to the Distributor.
    fn detect(&mut self, round: &ProtocolRound) -> Result<Detection, ProtocolError>;
}

/// An adversary sitting on the quantum channels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelAdversary {
    /// The channels are left alone.
    None,
    /// Every qubit in flight is measured in the Z basis and the outcome is resent.
    InterceptResend,
}

impl Default for ChannelAdversary {
    fn default() -> Self {
        ChannelAdversary::None
    }
}

impl ChannelAdversary {
    /// Tampers with the qubits currently on the channel legs.
    pub fn intercept(&self, round: &mut ProtocolRound) -> Result<(), ProtocolError> {
        if let ChannelAdversary::InterceptResend = self {
            debug!("intercepting the channels of round {}", round.index());
            let layout = *round.layout();
            for party in layout.semi_quantum_parties() {
                let leg = layout.channel_leg(party);
                round.circuit_mut().measure(leg, leg)?;
            }
        }
        Ok(())
    }
}
