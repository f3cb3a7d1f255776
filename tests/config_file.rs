//! Patch files as the CLI loads them.

use pg_ir::{AlgorithmId, EnvelopeShape, SynthConfig};

#[test]
fn partial_patch_keeps_defaults() {
    let text = r#"
        algorithm = "serial-pair-grain"
        envelope = "hann"
        master_note = 60

        [grain]
        period = 800
    "#;
    let config: SynthConfig = toml::from_str(text).unwrap();

    assert_eq!(config.algorithm, AlgorithmId::SerialPairGrain);
    assert_eq!(config.envelope, EnvelopeShape::Hann);
    assert_eq!(config.master_note, 60);
    assert_eq!(config.grain.period, 800);
    assert_eq!(config.grain.duration, 150);
    assert_eq!(config.sample_rate, SynthConfig::DEFAULT_SAMPLE_RATE);
    assert_eq!(config.block_len, SynthConfig::DEFAULT_BLOCK_LEN);
    assert!(config.validate().is_ok());
}

#[test]
fn unknown_algorithm_is_rejected() {
    assert!(toml::from_str::<SynthConfig>(r#"algorithm = "seven-chain""#).is_err());
}
