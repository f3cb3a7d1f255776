//! Audio output backends for phasegrain.

mod cpal_backend;
mod resample;
mod traits;

pub use cpal_backend::CpalOutput;
pub use resample::Resampler;
pub use traits::{AudioError, AudioOutput};
