//! Error types shared across the synthesizer crates.

use core::fmt;

use crate::algorithm::{AlgorithmId, NodeRef};

/// Construction-time failure. No engine is built when one of these is returned.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// Sample rate must be positive.
    ZeroSampleRate,
    /// Block length must be positive.
    ZeroBlockLength,
    /// Operator/generator counts don't match what the algorithm requires.
    CountMismatch {
        algorithm: AlgorithmId,
        operators: usize,
        generators: usize,
    },
    /// A connection names a node index that doesn't exist.
    UnknownNode(NodeRef),
    /// Execution order is not a permutation of all operators.
    InvalidOrder,
    /// An operator runs before one of the operators that modulate it.
    OrderViolation { operator: usize, input: usize },
    /// A grain generator has no source operator.
    MissingSource { generator: usize },
    /// A grain generator samples an operator that owns no delay line.
    UntappedSource { generator: usize, operator: usize },
    /// A node never reaches the output sink.
    Disconnected(NodeRef),
    /// A node has more inputs than the wiring table can hold.
    TooManyInputs(NodeRef),
    /// The delay line can't hold the worst-case grain request or a whole block.
    DelayTooShort { required: usize, capacity: usize },
    /// More grains requested per generator than the fixed pool allows.
    TooManyGrains { requested: usize, limit: usize },
    /// A default or bound is outside its permitted range.
    OutOfBounds { param: &'static str },
    /// A shared control surface was sized for a different configuration.
    ControlsMismatch,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroSampleRate => write!(f, "sample rate must be positive"),
            ConfigError::ZeroBlockLength => write!(f, "block length must be positive"),
            ConfigError::CountMismatch {
                algorithm,
                operators,
                generators,
            } => write!(
                f,
                "algorithm {} cannot run with {} operators and {} generators",
                algorithm, operators, generators
            ),
            ConfigError::UnknownNode(node) => write!(f, "connection names unknown node {}", node),
            ConfigError::InvalidOrder => {
                write!(f, "execution order must list every operator exactly once")
            }
            ConfigError::OrderViolation { operator, input } => write!(
                f,
                "operator {} runs before its modulator, operator {}",
                operator, input
            ),
            ConfigError::MissingSource { generator } => {
                write!(f, "grain generator {} has no source operator", generator)
            }
            ConfigError::UntappedSource {
                generator,
                operator,
            } => write!(
                f,
                "grain generator {} samples operator {}, which has no delay line",
                generator, operator
            ),
            ConfigError::Disconnected(node) => {
                write!(f, "{} is not connected to the output", node)
            }
            ConfigError::TooManyInputs(node) => write!(f, "{} has too many inputs", node),
            ConfigError::DelayTooShort { required, capacity } => write!(
                f,
                "delay line of {} samples is shorter than the required {}",
                capacity, required
            ),
            ConfigError::TooManyGrains { requested, limit } => write!(
                f,
                "{} grains per generator requested, limit is {}",
                requested, limit
            ),
            ConfigError::OutOfBounds { param } => write!(f, "{} is out of bounds", param),
            ConfigError::ControlsMismatch => {
                write!(f, "control surface does not match the configuration")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// An index or segment request outside the valid range.
///
/// These are programming defects: bounds are enforced at construction and by
/// the control setters so the audio thread never produces one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeError {
    /// Note index outside `0..128`.
    Note(i32),
    /// Delay-line segment reaching past the oldest stored sample.
    Segment {
        lag: usize,
        duration: usize,
        capacity: usize,
    },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::Note(note) => write!(f, "note index {} outside 0..128", note),
            RangeError::Segment {
                lag,
                duration,
                capacity,
            } => write!(
                f,
                "segment of {} samples at lag {} exceeds delay capacity {}",
                duration, lag, capacity
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RangeError {}

/// A rejected parameter write from the control layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamError {
    UnknownOperator(usize),
    UnknownGenerator(usize),
    OutOfBounds {
        param: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
    /// Amplitude must be a finite value in `0..=1`.
    InvalidAmplitude,
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::UnknownOperator(op) => write!(f, "no operator {}", op),
            ParamError::UnknownGenerator(gen) => write!(f, "no grain generator {}", gen),
            ParamError::OutOfBounds {
                param,
                value,
                min,
                max,
            } => write!(f, "{} = {} outside {}..={}", param, value, min, max),
            ParamError::InvalidAmplitude => write!(f, "amplitude must be within 0..=1"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParamError {}
