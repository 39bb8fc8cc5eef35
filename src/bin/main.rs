use std::{path::PathBuf, process};

use anyhow::Context;
use structopt::StructOpt;
use tracing::{error, info, warn};
use tracing_subscriber::*;

use sqcka::{
    keys::{qrng, KeyGenerator},
    params::ProtocolParameters,
    party::{Identity, PartyEntity},
    quantum::StatevectorSimulator,
    service::{ExecutorService, ProtocolReport},
    settings::{BackendSettings, KeySettings, ProtocolSettings, Settings},
};

#[derive(Debug, StructOpt)]
#[structopt(name = "SQCKA executor")]
struct Opt {
    /// Path of the configuration file
    #[structopt(short, parse(from_os_str))]
    config_path: PathBuf,
}

fn main() {
    let opt = Opt::from_args();

    let settings = Settings::new(opt.config_path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });
    let Settings {
        protocol: protocol_settings,
        keys: key_settings,
        backend: backend_settings,
        log: log_settings,
    } = settings;

    let _fmt_subscriber = FmtSubscriber::builder()
        .with_env_filter(log_settings.filter)
        .with_ansi(true)
        .init();

    match run(protocol_settings, key_settings, backend_settings) {
        Ok(report) => print_report(&report),
        Err(err) => {
            error!("protocol execution failed: {:#}", err);
            process::exit(1);
        }
    }
}

fn run(
    protocol_settings: ProtocolSettings,
    key_settings: KeySettings,
    backend_settings: BackendSettings,
) -> anyhow::Result<ProtocolReport> {
    let mut simulator = match backend_settings.seed {
        Some(seed) => StatevectorSimulator::seeded(seed, backend_settings.max_qubits),
        None => StatevectorSimulator::from_entropy(backend_settings.max_qubits),
    };

    let parameters =
        ProtocolParameters::new(&protocol_settings).context("invalid protocol settings")?;
    let mut generator = match key_settings.seed {
        Some(seed) => KeyGenerator::seeded(seed),
        None => {
            info!("drawing the key generator seed from the backend");
            KeyGenerator::from_seed(qrng::random_seed(&mut simulator)?)
        }
    };

    let distributor = Identity::new(key_settings.distributor);
    let parties: Vec<Identity> = key_settings.parties.into_iter().map(Identity::new).collect();
    let keys = generator.generate_keys(&parameters, &distributor, &parties);
    let entities = PartyEntity::assemble(distributor, parties, &keys)?;

    let mut service = ExecutorService::new(simulator).with_adversary(backend_settings.adversary);
    service.configure_parameters(&protocol_settings)?;
    for key in keys {
        service.add_bipartite_pre_shared_key(key)?;
    }
    service.mark_keys_initialized()?;
    service.set_party_entities(entities)?;
    service.initialise_protocol()?;
    let report = service.start_protocol()?;
    Ok(report)
}

fn print_report(report: &ProtocolReport) {
    let key: String = report
        .conference_key
        .iter()
        .map(|&bit| if bit { '1' } else { '0' })
        .collect();
    info!(
        "{} SIFT rounds, {} CTRL rounds",
        report.sift_rounds().count(),
        report.ctrl_rounds().count(),
    );
    if report.disagreements > 0 {
        warn!("{} SIFT rounds disagreed", report.disagreements);
    }
    if report.eavesdropping_detected {
        warn!("eavesdropping detected, the conference key must be discarded");
    }
    println!("{}", key);
}
