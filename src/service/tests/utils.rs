use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::{
    keys::BipartitePreSharedKey,
    party::Identity,
    quantum::StatevectorSimulator,
    settings::ProtocolSettings,
};

pub fn enable_logging() {
    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(true)
        .try_init();
}

/// GHZ over a closed single-channel walk, checked by invert-and-measure.
pub fn protocol_settings(num_parties: usize, num_rounds: usize) -> ProtocolSettings {
    ProtocolSettings {
        num_parties,
        num_rounds,
        num_quantum_channels: 1,
        num_classical_channels: 1,
        signal_mode: "single-photon".to_string(),
        physical_medium: "fiber".to_string(),
        preparing_bases: vec!["Z".to_string(), "X".to_string()],
        entanglement: "ghz".to_string(),
        bell_variant: None,
        graph_edges: Vec::new(),
        eavesdropping_strategy: "invert-and-measure".to_string(),
        topology: (0..num_parties)
            .map(|i| [i, (i + 1) % num_parties])
            .collect(),
        distances: Vec::new(),
    }
}

pub fn identities(num_parties: usize) -> (Identity, Vec<Identity>) {
    let distributor = Identity::new("Distributor");
    let parties = (1..num_parties)
        .map(|p| Identity::new(format!("Party-{}", p)))
        .collect();
    (distributor, parties)
}

/// One key per party, all carrying `bits`.
pub fn keys(
    distributor: &Identity,
    parties: &[Identity],
    bits: &[bool],
) -> Vec<BipartitePreSharedKey> {
    parties
        .iter()
        .map(|party| BipartitePreSharedKey::new(distributor, party, bits.to_vec()))
        .collect()
}

pub fn backend(seed: u64) -> StatevectorSimulator {
    StatevectorSimulator::seeded(seed, 16)
}
