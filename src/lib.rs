//! `sqcka` executes the rounds of a Semi-Quantum Conference Key Agreement.
//!
//! A Distributor with full quantum capabilities prepares a multi-party entangled state, sends one
//! leg to each Semi-Quantum party and collects the legs again afterwards. The Semi-Quantum parties
//! can only measure in the computational basis or reflect a qubit untouched. Which of the two they
//! do in a given round is decided by the bit of the key they pre-share with the Distributor:
//!
//! - **SIFT** rounds measure every leg and contribute one bit to the conference key.
//! - **CTRL** rounds reflect every leg back to the Distributor, who checks the returned state for
//!   traces of an eavesdropper.
//!
//! The [`service::ExecutorService`] takes the protocol from its configuration to the final
//! [`service::ProtocolReport`]. Circuits are executed by a [`quantum::QuantumBackend`], for which
//! a seeded [`quantum::StatevectorSimulator`] is bundled.

pub mod entanglement;
pub mod error;
pub mod keys;
pub mod layout;
pub mod params;
pub mod party;
pub mod quantum;
pub mod round;
pub mod service;
pub mod settings;
