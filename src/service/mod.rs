//! The executor service.
//!
//! The service is a small state machine. In the [`Configuring`] phase it collects the protocol
//! parameters, the pre-shared keys and the party entities. [`ExecutorService::initialise_protocol`]
//! consumes this bookkeeping and moves the service into the [`Initialized`] phase, which only keeps
//! what the round loop needs. [`ExecutorService::start_protocol`] then runs every round in index
//! order and leaves the service [`Finished`](ServicePhase::Finished).

#[cfg(test)]
mod tests;

use std::mem;

use derive_more::From;
use tracing::{debug, error_span, info, warn};

use crate::{
    entanglement::EntanglementSpec,
    error::{ProtocolError, StateMachineError},
    keys::BipartitePreSharedKey,
    params::{EavesdroppingStrategy, ProtocolParameters},
    party::{unique_ids, PartyEntity, Role, DISTRIBUTOR_ID},
    quantum::QuantumBackend,
    round::{ChannelAdversary, Detection, EavesdroppingDetector, ProtocolRound, RoundExecutor},
    settings::ProtocolSettings,
};

/// The bookkeeping collected before the protocol is initialized.
#[derive(Debug, Default)]
pub struct Configuring {
    parameters: Option<ProtocolParameters>,
    keys: Vec<BipartitePreSharedKey>,
    keys_initialized: bool,
    parties: Option<Vec<PartyEntity>>,
}

impl Configuring {
    /// Checks that every piece of the configuration is present and selects the entanglement.
    fn ready(&self, has_detector: bool) -> Result<EntanglementSpec, ProtocolError> {
        let parameters = self
            .parameters
            .as_ref()
            .ok_or(StateMachineError::NotReady("protocol parameters"))?;
        if !self.keys_initialized {
            return Err(StateMachineError::NotReady("pre-shared keys").into());
        }
        if self.parties.is_none() {
            return Err(StateMachineError::PartiesNotSet.into());
        }
        let spec = EntanglementSpec::from_parameters(parameters)?;
        let strategy = parameters.eavesdropping_strategy();
        if strategy != EavesdroppingStrategy::InvertAndMeasure && !has_detector {
            return Err(StateMachineError::MissingDetector(strategy).into());
        }
        Ok(spec)
    }

    /// Drops the bookkeeping that the round loop doesn't need.
    fn initialize(self, has_detector: bool) -> Result<Initialized, (Self, ProtocolError)> {
        let spec = match self.ready(has_detector) {
            Ok(spec) => spec,
            Err(error) => return Err((self, error)),
        };
        match self {
            Configuring {
                parameters: Some(parameters),
                parties: Some(mut parties),
                ..
            } => {
                parties.sort_by_key(PartyEntity::id);
                let distributor = parties.remove(0);
                Ok(Initialized {
                    parameters,
                    spec,
                    distributor,
                    parties,
                })
            }
            configuring => Err((configuring, StateMachineError::PartiesNotSet.into())),
        }
    }
}

/// What survives the initialization.
#[derive(Debug)]
pub struct Initialized {
    parameters: ProtocolParameters,
    spec: EntanglementSpec,
    distributor: PartyEntity,
    parties: Vec<PartyEntity>,
}

/// The phases of the service.
#[derive(Debug, From)]
pub enum ServicePhase {
    Configuring(Configuring),
    Initialized(Initialized),
    Finished,
}

impl Default for ServicePhase {
    fn default() -> Self {
        ServicePhase::Configuring(Configuring::default())
    }
}

/// The state shared by all phases.
pub struct Shared<B> {
    backend: B,
    detector: Option<Box<dyn EavesdroppingDetector>>,
    adversary: ChannelAdversary,
}

/// The outcome of a complete protocol run.
#[derive(Debug)]
pub struct ProtocolReport {
    /// Every round, in index order.
    pub rounds: Vec<ProtocolRound>,
    /// The Distributor bit of every SIFT round.
    pub conference_key: Vec<bool>,
    /// The number of SIFT rounds whose bits were not all equal.
    pub disagreements: usize,
    /// Whether any CTRL round flagged eavesdropping.
    pub eavesdropping_detected: bool,
}

impl ProtocolReport {
    fn new(rounds: Vec<ProtocolRound>) -> Self {
        let mut conference_key = Vec::new();
        let mut disagreements = 0;
        let mut eavesdropping_detected = false;
        for round in &rounds {
            if let Some(bits) = round.sift_bits() {
                conference_key.push(bits[0]);
                if bits.iter().any(|&bit| bit != bits[0]) {
                    disagreements += 1;
                }
            }
            if round.detection() == Some(Detection::Eavesdropped) {
                eavesdropping_detected = true;
            }
        }
        Self {
            rounds,
            conference_key,
            disagreements,
            eavesdropping_detected,
        }
    }

    pub fn sift_rounds(&self) -> impl Iterator<Item = &ProtocolRound> {
        self.rounds.iter().filter(|round| round.sift_bits().is_some())
    }

    pub fn ctrl_rounds(&self) -> impl Iterator<Item = &ProtocolRound> {
        self.rounds.iter().filter(|round| round.detection().is_some())
    }
}

/// Orchestrates a protocol instance on a quantum backend.
pub struct ExecutorService<B> {
    phase: ServicePhase,
    shared: Shared<B>,
}

impl<B> ExecutorService<B>
where
    B: QuantumBackend,
{
    pub fn new(backend: B) -> Self {
        Self {
            phase: ServicePhase::default(),
            shared: Shared {
                backend,
                detector: None,
                adversary: ChannelAdversary::None,
            },
        }
    }

    /// Injects the detector used by the SWAP-test and statistical-test strategies.
    pub fn with_detector(mut self, detector: Box<dyn EavesdroppingDetector>) -> Self {
        self.shared.detector = Some(detector);
        self
    }

    /// Attaches an adversary to the quantum channels.
    pub fn with_adversary(mut self, adversary: ChannelAdversary) -> Self {
        self.shared.adversary = adversary;
        self
    }

    pub fn phase(&self) -> &ServicePhase {
        &self.phase
    }

    pub fn backend(&self) -> &B {
        &self.shared.backend
    }

    fn configuring(&mut self) -> Result<&mut Configuring, StateMachineError> {
        match &mut self.phase {
            ServicePhase::Configuring(configuring) => Ok(configuring),
            _ => Err(StateMachineError::AlreadyInitialized),
        }
    }

    /// Validates and stores the protocol parameters.
    pub fn configure_parameters(&mut self, settings: &ProtocolSettings) -> Result<(), ProtocolError> {
        let configuring = self.configuring()?;
        if !configuring.keys.is_empty() {
            return Err(StateMachineError::ParametersLocked.into());
        }
        let parameters = ProtocolParameters::new(settings)?;
        info!(
            "configured {} parties, {} rounds, {} entanglement",
            parameters.num_parties(),
            parameters.num_rounds(),
            parameters.entanglement_type(),
        );
        configuring.parameters = Some(parameters);
        Ok(())
    }

    /// Registers the key shared by the Distributor and one Semi-Quantum party.
    pub fn add_bipartite_pre_shared_key(
        &mut self,
        key: BipartitePreSharedKey,
    ) -> Result<(), StateMachineError> {
        let configuring = self.configuring()?;
        let parameters = configuring
            .parameters
            .as_ref()
            .ok_or(StateMachineError::ParametersNotConfigured)?;
        if configuring.keys_initialized {
            return Err(StateMachineError::KeysAlreadyInitialized);
        }
        let max = parameters.num_parties() - 1;
        if configuring.keys.len() >= max {
            return Err(StateMachineError::TooManyKeys { max });
        }
        if key.len() != parameters.num_rounds() {
            return Err(StateMachineError::KeyLengthMismatch {
                expected: parameters.num_rounds(),
                given: key.len(),
            });
        }
        if configuring.keys.iter().any(|other| other.same_owners(&key)) {
            return Err(StateMachineError::DuplicateKey);
        }
        debug!("added pre-shared key of {:?}", key.owner_names());
        configuring.keys.push(key);
        Ok(())
    }

    /// Closes the key registration. Exactly one key per Semi-Quantum party is required.
    pub fn mark_keys_initialized(&mut self) -> Result<(), StateMachineError> {
        let configuring = self.configuring()?;
        let parameters = configuring
            .parameters
            .as_ref()
            .ok_or(StateMachineError::ParametersNotConfigured)?;
        let expected = parameters.num_parties() - 1;
        if configuring.keys.len() != expected {
            return Err(StateMachineError::KeyCountMismatch {
                expected,
                given: configuring.keys.len(),
            });
        }
        configuring.keys_initialized = true;
        Ok(())
    }

    /// Sets the Distributor and the Semi-Quantum parties.
    ///
    /// # Errors
    /// Fails if the parties don't match the registered keys.
    pub fn set_party_entities(&mut self, parties: Vec<PartyEntity>) -> Result<(), StateMachineError> {
        let configuring = self.configuring()?;
        if !configuring.keys_initialized {
            return Err(StateMachineError::KeysNotInitialized);
        }
        let num_parties = configuring
            .parameters
            .as_ref()
            .map(ProtocolParameters::num_parties)
            .ok_or(StateMachineError::ParametersNotConfigured)?;
        if parties.len() != num_parties {
            return Err(StateMachineError::PartyCountMismatch {
                expected: num_parties,
                given: parties.len(),
            });
        }
        unique_ids(&parties)?;
        if !parties
            .iter()
            .any(|party| party.id() == DISTRIBUTOR_ID && party.role() == Role::Distributor)
        {
            return Err(StateMachineError::DistributorMissing);
        }
        for party in &parties {
            if party.id() >= num_parties {
                return Err(StateMachineError::UnknownParty(party.id()));
            }
            if party.role() == Role::Distributor && party.keys().len() != configuring.keys.len() {
                return Err(StateMachineError::KeyRoleMismatch { party: party.id() });
            }
            if party
                .keys()
                .iter()
                .any(|key| !configuring.keys.contains(key))
            {
                return Err(StateMachineError::UnexpectedKey { party: party.id() });
            }
        }
        configuring.parties = Some(parties);
        Ok(())
    }

    /// Moves the service into the initialized phase.
    ///
    /// # Errors
    /// Fails if the service is already initialized, if any piece of the configuration is missing
    /// or if the configured entanglement can't be prepared. The configuration is kept on failure.
    pub fn initialise_protocol(&mut self) -> Result<(), ProtocolError> {
        let configuring = match mem::take(&mut self.phase) {
            ServicePhase::Configuring(configuring) => configuring,
            phase => {
                self.phase = phase;
                return Err(StateMachineError::AlreadyInitialized.into());
            }
        };
        match configuring.initialize(self.shared.detector.is_some()) {
            Ok(initialized) => {
                info!("protocol initialized");
                self.phase = initialized.into();
                Ok(())
            }
            Err((configuring, error)) => {
                self.phase = configuring.into();
                Err(error)
            }
        }
    }

    /// Runs every round in index order.
    ///
    /// The service is finished afterwards, whether the run succeeded or not.
    pub fn start_protocol(&mut self) -> Result<ProtocolReport, ProtocolError> {
        let initialized = match mem::replace(&mut self.phase, ServicePhase::Finished) {
            ServicePhase::Initialized(initialized) => initialized,
            ServicePhase::Finished => return Err(StateMachineError::ProtocolFinished.into()),
            configuring => {
                self.phase = configuring;
                return Err(StateMachineError::NotInitialized.into());
            }
        };
        let Initialized {
            parameters,
            spec,
            distributor,
            parties,
        } = initialized;

        let span = error_span!("protocol", parties = parameters.num_parties());
        let _enter = span.enter();

        let mut executor = RoundExecutor {
            distributor: &distributor,
            parties: &parties,
            spec: &spec,
            topology: parameters.topology(),
            strategy: parameters.eavesdropping_strategy(),
            backend: &mut self.shared.backend,
            detector: self.shared.detector.as_mut(),
            adversary: self.shared.adversary,
        };
        let rounds = (0..parameters.num_rounds())
            .map(|index| executor.execute(index))
            .collect::<Result<Vec<_>, _>>()?;

        let report = ProtocolReport::new(rounds);
        if report.eavesdropping_detected {
            warn!("eavesdropping was detected, the conference key must be discarded");
        }
        info!(
            "protocol finished with a conference key of {} bits",
            report.conference_key.len()
        );
        Ok(report)
    }
}
