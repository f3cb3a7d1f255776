//! The signal node contract and input gathering.
//!
//! Nodes live in typed arenas owned by the engine and address each other by
//! [`NodeRef`]. Each node's input strategy ([`Pull`]) is resolved once when the
//! engine is built so the block loop never inspects connection counts.

use arrayvec::ArrayVec;
use pg_ir::{NodeRef, MAX_INPUTS};

use crate::delay_line::DelayLine;
use crate::generator::GrainGenerator;
use crate::operator::Operator;

/// What a node sees when it processes a block.
pub struct ProcessInput<'a> {
    /// Summed upstream output for this block.
    pub signal: &'a [f32],
    /// The delay line a grain generator samples from.
    pub history: Option<&'a DelayLine>,
}

/// A block-processing node.
pub trait SignalNode {
    /// Compute this block's output.
    fn process(&mut self, input: &ProcessInput<'_>);

    /// Output of the most recent block.
    fn output(&self) -> &[f32];

    /// Append the current output to the node's delay line, if it owns one.
    fn tap(&mut self) {}

    /// Process, then tap.
    fn run(&mut self, input: &ProcessInput<'_>) {
        self.process(input);
        self.tap();
    }
}

/// Read-only view of every node's current output.
pub struct NodeOutputs<'a> {
    pub operators: &'a [Operator],
    pub generators: &'a [GrainGenerator],
}

impl NodeOutputs<'_> {
    pub fn get(&self, node: NodeRef) -> &[f32] {
        match node {
            NodeRef::Operator(i) => self.operators[i].output(),
            NodeRef::Generator(i) => self.generators[i].output(),
            NodeRef::Output => &[],
        }
    }
}

/// How a node combines its upstream outputs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pull {
    /// No inputs: silence.
    Silence,
    /// One input: copied as is.
    Copy(NodeRef),
    /// Several inputs: elementwise sum.
    Sum(ArrayVec<NodeRef, MAX_INPUTS>),
}

impl Pull {
    pub fn resolve(inputs: &[NodeRef]) -> Self {
        match inputs {
            [] => Pull::Silence,
            [one] => Pull::Copy(*one),
            many => Pull::Sum(many.iter().copied().collect()),
        }
    }

    /// Write this block's input into `dst`.
    pub fn gather(&self, nodes: &NodeOutputs<'_>, dst: &mut [f32]) {
        match self {
            Pull::Silence => dst.fill(0.0),
            Pull::Copy(node) => copy_into(dst, nodes.get(*node)),
            Pull::Sum(inputs) => {
                let mut iter = inputs.iter();
                match iter.next() {
                    Some(first) => copy_into(dst, nodes.get(*first)),
                    None => dst.fill(0.0),
                }
                for node in iter {
                    for (d, s) in dst.iter_mut().zip(nodes.get(*node)) {
                        *d += s;
                    }
                }
            }
        }
    }
}

fn copy_into(dst: &mut [f32], src: &[f32]) {
    let n = dst.len().min(src.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(0.0);
}
