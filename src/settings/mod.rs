//! Loading and validation of settings.
//!
//! Values defined in the configuration file can be overridden by environment variables. An example
//! configuration file can be found in the `configs/` directory located in the repository root.

#[cfg(test)]
mod tests;

use std::{fmt, path::Path};

use config::{Config, ConfigError, Environment};
use serde::{
    de::{self, Deserializer, Visitor},
    Deserialize,
};
use thiserror::Error;
use tracing_subscriber::filter::EnvFilter;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{quantum::simulator::DEFAULT_MAX_QUBITS, round::ChannelAdversary};

#[derive(Error, Debug)]
/// An error related to loading and validation of settings.
pub enum SettingsError {
    #[error("configuration loading failed: {0}")]
    Loading(#[from] ConfigError),
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

#[derive(Debug, Validate, Deserialize)]
#[validate(schema(function = "validate_settings"))]
/// The combined settings.
///
/// Each section in the configuration file corresponds to the identically named settings field.
pub struct Settings {
    #[validate]
    pub protocol: ProtocolSettings,
    pub keys: KeySettings,
    pub backend: BackendSettings,
    pub log: LoggingSettings,
}

impl Settings {
    /// Loads and validates the settings via a configuration file.
    ///
    /// # Errors
    /// Fails when the loading of the configuration file or its validation failed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let settings: Settings = Self::load(path)?;
        settings.validate()?;
        Ok(settings)
    }

    fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Config::new();
        config.merge(config::File::from(path.as_ref()))?;
        config.merge(Environment::with_prefix("sqcka").separator("__"))?;
        config.try_into()
    }

    /// Checks that every Semi-Quantum party is named.
    fn validate_party_names(&self) -> Result<(), ValidationError> {
        if self.keys.parties.len() == self.protocol.num_parties.saturating_sub(1) {
            Ok(())
        } else {
            Err(ValidationError::new("one name per semi-quantum party required"))
        }
    }
}

/// A wrapper for validate derive.
fn validate_settings(s: &Settings) -> Result<(), ValidationError> {
    s.validate_party_names()
}

#[derive(Debug, Validate, Deserialize, Clone)]
/// The protocol settings.
///
/// The names are parsed and cross-checked by
/// [`ProtocolParameters::new`](crate::params::ProtocolParameters::new).
pub struct ProtocolSettings {
    /// The number of parties, the Distributor included.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [protocol]
    /// num_parties = 3
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// SQCKA_PROTOCOL__NUM_PARTIES=3
    /// ```
    pub num_parties: usize,
    /// The number of rounds. Every pre-shared key carries one bit per round.
    #[validate(range(min = 1))]
    pub num_rounds: usize,
    /// The number of quantum channels. A single channel is shared along a closed walk, more
    /// channels are dedicated to one Semi-Quantum party each.
    #[validate(range(min = 1))]
    pub num_quantum_channels: usize,
    #[validate(range(min = 1))]
    pub num_classical_channels: usize,
    /// One of `single-photon`, `discrete-variable` or `continuous-variable`.
    pub signal_mode: String,
    /// One of `fiber` or `satellite`.
    pub physical_medium: String,
    /// A non-empty subset of `X`, `Y` and `Z`.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [protocol]
    /// preparing_bases = ["Z", "X"]
    /// ```
    pub preparing_bases: Vec<String>,
    /// One of `bell`, `ghz`, `w`, `dicke`, `resource`, `graph` or `cluster`.
    pub entanglement: String,
    /// The Bell state variant (`phi+`, `phi-`, `psi+` or `psi-`), required for Bell states.
    #[serde(default)]
    pub bell_variant: Option<String>,
    /// The edges between party ids of a graph or resource state.
    #[serde(default)]
    pub graph_edges: Vec<[usize; 2]>,
    /// One of `invert-and-measure`, `swap-test` or `statistical-test`.
    pub eavesdropping_strategy: String,
    /// The directed edges `[from, to]` between party ids, where `0` is the Distributor.
    ///
    /// With a single quantum channel the edges form a closed walk from the Distributor back to
    /// the Distributor. With dedicated channels they come in forward/back pairs.
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [protocol]
    /// topology = [[0, 1], [1, 2], [2, 0]]
    /// ```
    pub topology: Vec<[usize; 2]>,
    /// The length of every dedicated channel, one per forward/back pair.
    #[serde(default)]
    pub distances: Vec<f64>,
}

#[derive(Debug, Deserialize, Clone)]
/// Identities and pre-shared key generation.
pub struct KeySettings {
    /// The name of the Distributor.
    pub distributor: String,
    /// The names of the Semi-Quantum parties, in party id order.
    pub parties: Vec<String>,
    /// The seed of the key generator. Drawn from the backend when missing.
    ///
    /// # Examples
    ///
    /// **Environment variable**
    /// ```text
    /// SQCKA_KEYS__SEED=42
    /// ```
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
/// The bundled simulator backend.
pub struct BackendSettings {
    /// The seed of the measurement sampling. Drawn from the operating system when missing.
    #[serde(default)]
    pub seed: Option<u64>,
    /// The largest register the simulator accepts.
    #[serde(default = "default_max_qubits")]
    pub max_qubits: usize,
    /// An adversary attached to the quantum channels: `none` or `intercept-resend`.
    #[serde(default)]
    pub adversary: ChannelAdversary,
}

fn default_max_qubits() -> usize {
    DEFAULT_MAX_QUBITS
}

#[derive(Debug, Deserialize)]
/// Logging settings.
pub struct LoggingSettings {
    /// A comma-separated list of logging directives. More information about logging directives
    /// can be found [here].
    ///
    /// # Examples
    ///
    /// **TOML**
    /// ```text
    /// [log]
    /// filter = "info"
    /// ```
    ///
    /// **Environment variable**
    /// ```text
    /// SQCKA_LOG__FILTER=info
    /// ```
    ///
    /// [here]: https://docs.rs/tracing-subscriber/0.2.15/tracing_subscriber/filter/struct.EnvFilter.html#directives
    #[serde(deserialize_with = "deserialize_env_filter")]
    pub filter: EnvFilter,
}

fn deserialize_env_filter<'de, D>(deserializer: D) -> Result<EnvFilter, D::Error>
where
    D: Deserializer<'de>,
{
    struct EnvFilterVisitor;

    impl<'de> Visitor<'de> for EnvFilterVisitor {
        type Value = EnvFilter;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            write!(formatter, "a valid tracing filter directive")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            EnvFilter::try_new(value)
                .map_err(|_| de::Error::invalid_value(serde::de::Unexpected::Str(value), &self))
        }
    }

    deserializer.deserialize_str(EnvFilterVisitor)
}
