//! The error taxonomy of the round-execution engine.

use thiserror::Error;

use crate::{
    entanglement::UnsupportedEntanglementError,
    params::{ConfigurationError, EavesdroppingStrategy},
    party::RoleViolationError,
    quantum::BackendError,
    round::RoundType,
};

/// Error raised when an operation is invoked in the wrong lifecycle state.
#[derive(Debug, Error, PartialEq)]
pub enum StateMachineError {
    #[error("the protocol has already been initialized")]
    AlreadyInitialized,
    #[error("the protocol has not been initialized yet")]
    NotInitialized,
    #[error("the protocol has already been executed")]
    ProtocolFinished,
    #[error("the protocol parameters have not been configured")]
    ParametersNotConfigured,
    #[error("the protocol parameters can't be changed once keys have been added")]
    ParametersLocked,
    #[error("at most {max} pre-shared keys can be added")]
    TooManyKeys { max: usize },
    #[error("a pre-shared key must hold {expected} bits, got {given}")]
    KeyLengthMismatch { expected: usize, given: usize },
    #[error("a pre-shared key for the same owners has already been added")]
    DuplicateKey,
    #[error("the pre-shared keys have already been marked as initialized")]
    KeysAlreadyInitialized,
    #[error("the pre-shared keys have not been marked as initialized")]
    KeysNotInitialized,
    #[error("{expected} pre-shared keys are required, got {given}")]
    KeyCountMismatch { expected: usize, given: usize },
    #[error("the party entities have not been set")]
    PartiesNotSet,
    #[error("{expected} party entities are required, got {given}")]
    PartyCountMismatch { expected: usize, given: usize },
    #[error("no Distributor with id 0 among the party entities")]
    DistributorMissing,
    #[error("party id {0} is used more than once")]
    DuplicatePartyId(usize),
    #[error("party {0} is not a Semi-Quantum party of this protocol")]
    UnknownParty(usize),
    #[error("party {party} holds a key that is not registered or not its own")]
    UnexpectedKey { party: usize },
    #[error("the keys held by party {party} don't match its role")]
    KeyRoleMismatch { party: usize },
    #[error("the pre-shared keys disagree on the type of round {round}")]
    KeyDisagreement { round: usize },
    #[error("round {round} is out of range for keys of {len} bits")]
    RoundOutOfRange { round: usize, len: usize },
    #[error("round {round} has already been executed")]
    AlreadyExecuted { round: usize },
    #[error("round {round} is a {found} round, expected a {expected} round")]
    WrongRoundType {
        round: usize,
        expected: RoundType,
        found: RoundType,
    },
    #[error("round {round} carries no measurement results")]
    NoResults { round: usize },
    #[error("the {0} strategy requires an eavesdropping detector")]
    MissingDetector(EavesdroppingStrategy),
    #[error("the protocol is not ready: {0} missing")]
    NotReady(&'static str),
}

/// The top-level error of the crate.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("role violation: {0}")]
    Role(#[from] RoleViolationError),
    #[error("unsupported entanglement: {0}")]
    Entanglement(#[from] UnsupportedEntanglementError),
    #[error("state machine error: {0}")]
    StateMachine(#[from] StateMachineError),
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}
