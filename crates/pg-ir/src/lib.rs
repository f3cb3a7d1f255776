//! Core data types for the phasegrain synthesizer.
//!
//! This crate holds everything the engine consumes but never mutates on the
//! audio thread: the construction-time configuration, the algorithm wiring
//! tables, and the error taxonomy shared by the engine, the controller and
//! the CLI.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod algorithm;
mod config;
mod error;
mod frequency_mode;

pub use algorithm::{
    Algorithm, AlgorithmBuilder, AlgorithmId, GeneratorCount, NodeRef, ParseAlgorithmError,
    MAX_INPUTS,
};
pub use config::{
    check_note, EnvelopeShape, GrainBounds, GrainSettings, OperatorDefaults, SynthConfig,
    MAX_GRAINS_PER_GENERATOR, MAX_LOCK_RATIO, NOTE_COUNT,
};
pub use error::{ConfigError, ParamError, RangeError};
pub use frequency_mode::FrequencyMode;
