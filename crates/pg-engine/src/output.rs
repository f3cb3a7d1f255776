//! Terminal node: the engine's block buffer.

use alloc::vec;
use alloc::vec::Vec;

use crate::node::{ProcessInput, SignalNode};

/// Writes its summed input into the block returned by `synthesize()`.
#[derive(Clone, Debug)]
pub struct OutputSink {
    block: Vec<f32>,
}

impl OutputSink {
    pub fn new(block_len: usize) -> Self {
        Self {
            block: vec![0.0; block_len],
        }
    }
}

impl SignalNode for OutputSink {
    fn process(&mut self, input: &ProcessInput<'_>) {
        let n = self.block.len().min(input.signal.len());
        self.block[..n].copy_from_slice(&input.signal[..n]);
        self.block[n..].fill(0.0);
    }

    fn output(&self) -> &[f32] {
        &self.block
    }
}
