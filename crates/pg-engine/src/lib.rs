//! Real-time synthesis engine for phasegrain.
//!
//! A fixed network of phase-modulated operators and grain generators, wired
//! by a [`pg_ir::Algorithm`] and rendered one block at a time by
//! [`Engine::synthesize`]. Parameters arrive through a shared
//! [`ControlSurface`] and are picked up at block boundaries.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod controls;
mod delay_line;
mod engine;
mod envelope;
mod frequency;
mod generator;
mod grain;
mod node;
mod operator;
mod output;

pub use controls::{AtomicF32, ControlSurface};
pub use delay_line::DelayLine;
pub use engine::Engine;
pub use envelope::Window;
pub use frequency::{note_to_hz, FrequencyTable};
pub use generator::GrainGenerator;
pub use grain::{Grain, GrainState};
pub use node::{NodeOutputs, ProcessInput, Pull, SignalNode};
pub use operator::{wrap_phase, Operator};
pub use output::OutputSink;
