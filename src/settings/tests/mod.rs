use super::*;
use crate::params::{ProtocolParameters, Topology};

#[test]
fn test_settings_new() {
    let settings = Settings::new("configs/config.toml").unwrap();
    assert_eq!(settings.protocol.num_parties, 3);
    assert_eq!(settings.keys.parties, vec!["Bob", "Charlie"]);
    assert_eq!(settings.keys.seed, Some(42));
    assert_eq!(settings.backend.adversary, ChannelAdversary::None);
    assert!(Settings::new("").is_err());
}

#[test]
fn test_protocol_settings_are_valid_parameters() {
    let settings = Settings::new("configs/config.toml").unwrap();
    let params = ProtocolParameters::new(&settings.protocol).unwrap();
    assert_eq!(params.num_rounds(), 16);
    assert!(matches!(params.topology(), Topology::SharedChannel { .. }));
    assert_eq!(params.ctrl_rounds(), 4);
}

#[test]
fn test_validate_party_names() {
    let mut settings = Settings::new("configs/config.toml").unwrap();
    assert!(settings.validate_party_names().is_ok());
    settings.keys.parties.pop();
    assert!(settings.validate_party_names().is_err());
    assert!(settings.validate().is_err());
}

#[test]
fn test_validate_counts() {
    let mut settings = Settings::new("configs/config.toml").unwrap();
    settings.protocol.num_rounds = 0;
    assert!(settings.validate().is_err());

    let mut settings = Settings::new("configs/config.toml").unwrap();
    settings.protocol.num_quantum_channels = 0;
    assert!(settings.protocol.validate().is_err());
}

#[test]
fn test_backend_defaults() {
    let backend: BackendSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(backend.seed, None);
    assert_eq!(backend.max_qubits, DEFAULT_MAX_QUBITS);
    assert_eq!(backend.adversary, ChannelAdversary::None);

    let backend: BackendSettings =
        serde_json::from_str(r#"{"seed": 3, "adversary": "intercept-resend"}"#).unwrap();
    assert_eq!(backend.seed, Some(3));
    assert_eq!(backend.adversary, ChannelAdversary::InterceptResend);
}

#[test]
fn test_log_filter() {
    assert!(serde_json::from_str::<LoggingSettings>(r#"{"filter": "sqcka=debug"}"#).is_ok());
    assert!(serde_json::from_str::<LoggingSettings>(r#"{"filter": "[[="}"#).is_err());
}
