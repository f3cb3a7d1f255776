//! Algorithm wiring tables.
//!
//! An [`Algorithm`] says which operators modulate which, which operators own
//! a delay line, which operator each grain generator samples, what feeds the
//! output sink, and the order operators run in. It is built once, validated
//! once, and never changes while the engine runs.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayVec;
use core::fmt;
use core::str::FromStr;

use crate::error::ConfigError;

/// Maximum number of upstream connections into a single node.
pub const MAX_INPUTS: usize = 16;

/// A node in the engine's arena, addressed by kind and index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Operator(usize),
    Generator(usize),
    /// The output sink. Valid only as a destination.
    Output,
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Operator(i) => write!(f, "operator {}", i),
            NodeRef::Generator(i) => write!(f, "grain generator {}", i),
            NodeRef::Output => write!(f, "output"),
        }
    }
}

/// How many grain generators an algorithm accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GeneratorCount {
    Exactly(usize),
    AtLeast(usize),
}

impl GeneratorCount {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            GeneratorCount::Exactly(n) => count == n,
            GeneratorCount::AtLeast(n) => count >= n,
        }
    }
}

/// Built-in wiring presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum AlgorithmId {
    /// op0 → op1 → out. op1 keeps a delay line.
    SerialPair,
    /// op0 → op1 → grains → out.
    #[default]
    SerialPairGrain,
    /// op0 → op1, every generator samples op1, all generators → out.
    SerialPairGrainBank,
    /// Three independent modulator/carrier pairs summed at the output.
    ThreePairs,
    /// op5 → op4 → … → op0 → out.
    SixChain,
    /// The six-operator chain with op0 granulated and mixed in with the dry signal.
    SixChainGrain,
}

impl AlgorithmId {
    pub const ALL: [AlgorithmId; 6] = [
        AlgorithmId::SerialPair,
        AlgorithmId::SerialPairGrain,
        AlgorithmId::SerialPairGrainBank,
        AlgorithmId::ThreePairs,
        AlgorithmId::SixChain,
        AlgorithmId::SixChainGrain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmId::SerialPair => "serial-pair",
            AlgorithmId::SerialPairGrain => "serial-pair-grain",
            AlgorithmId::SerialPairGrainBank => "serial-pair-grain-bank",
            AlgorithmId::ThreePairs => "three-pairs",
            AlgorithmId::SixChain => "six-chain",
            AlgorithmId::SixChainGrain => "six-chain-grain",
        }
    }

    /// Number of operators the preset wires.
    pub fn operator_count(self) -> usize {
        match self {
            AlgorithmId::SerialPair
            | AlgorithmId::SerialPairGrain
            | AlgorithmId::SerialPairGrainBank => 2,
            AlgorithmId::ThreePairs | AlgorithmId::SixChain | AlgorithmId::SixChainGrain => 6,
        }
    }

    pub fn generator_count(self) -> GeneratorCount {
        match self {
            AlgorithmId::SerialPair | AlgorithmId::ThreePairs | AlgorithmId::SixChain => {
                GeneratorCount::Exactly(0)
            }
            AlgorithmId::SerialPairGrain | AlgorithmId::SixChainGrain => {
                GeneratorCount::Exactly(1)
            }
            AlgorithmId::SerialPairGrainBank => GeneratorCount::AtLeast(1),
        }
    }

    /// Smallest operator/generator counts the preset accepts.
    pub fn default_counts(self) -> (usize, usize) {
        let generators = match self.generator_count() {
            GeneratorCount::Exactly(n) | GeneratorCount::AtLeast(n) => n,
        };
        (self.operator_count(), generators)
    }

    /// Build and validate the preset for the given node counts.
    pub fn build(self, operators: usize, generators: usize) -> Result<Algorithm, ConfigError> {
        if operators != self.operator_count() || !self.generator_count().accepts(generators) {
            return Err(ConfigError::CountMismatch {
                algorithm: self,
                operators,
                generators,
            });
        }

        let builder = AlgorithmBuilder::new(operators, generators);
        let builder = match self {
            AlgorithmId::SerialPair => builder
                .modulate(0, 1)
                .tap(1)
                .to_output(NodeRef::Operator(1))
                .order([0, 1]),
            AlgorithmId::SerialPairGrain => builder
                .modulate(0, 1)
                .tap(1)
                .granulate(1, 0)
                .to_output(NodeRef::Generator(0))
                .order([0, 1]),
            AlgorithmId::SerialPairGrainBank => {
                let mut b = builder.modulate(0, 1).tap(1).order([0, 1]);
                for gen in 0..generators {
                    b = b.granulate(1, gen).to_output(NodeRef::Generator(gen));
                }
                b
            }
            AlgorithmId::ThreePairs => builder
                .modulate(0, 1)
                .modulate(2, 3)
                .modulate(4, 5)
                .to_output(NodeRef::Operator(1))
                .to_output(NodeRef::Operator(3))
                .to_output(NodeRef::Operator(5))
                .order([0, 2, 4, 1, 3, 5]),
            AlgorithmId::SixChain => six_chain(builder).to_output(NodeRef::Operator(0)),
            AlgorithmId::SixChainGrain => six_chain(builder)
                .tap(0)
                .granulate(0, 0)
                .to_output(NodeRef::Operator(0))
                .to_output(NodeRef::Generator(0)),
        };
        builder.build()
    }
}

fn six_chain(builder: AlgorithmBuilder) -> AlgorithmBuilder {
    let mut b = builder;
    for op in 0..5 {
        b = b.modulate(op + 1, op);
    }
    b.order([5, 4, 3, 2, 1, 0])
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when a string names no algorithm preset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParseAlgorithmError;

impl fmt::Display for ParseAlgorithmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("unknown algorithm, expected one of:")?;
        for id in AlgorithmId::ALL {
            write!(f, " {}", id.name())?;
        }
        Ok(())
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseAlgorithmError {}

impl FromStr for AlgorithmId {
    type Err = ParseAlgorithmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AlgorithmId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or(ParseAlgorithmError)
    }
}

/// A validated wiring table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Algorithm {
    operator_inputs: Vec<ArrayVec<usize, MAX_INPUTS>>,
    generator_sources: Vec<usize>,
    output_inputs: ArrayVec<NodeRef, MAX_INPUTS>,
    taps: Vec<bool>,
    order: Vec<usize>,
}

impl Algorithm {
    pub fn builder(operators: usize, generators: usize) -> AlgorithmBuilder {
        AlgorithmBuilder::new(operators, generators)
    }

    pub fn operator_count(&self) -> usize {
        self.operator_inputs.len()
    }

    pub fn generator_count(&self) -> usize {
        self.generator_sources.len()
    }

    /// Operators whose output modulates `op`'s phase.
    pub fn operator_inputs(&self, op: usize) -> &[usize] {
        &self.operator_inputs[op]
    }

    /// The operator whose delay line `gen` samples.
    pub fn generator_source(&self, gen: usize) -> usize {
        self.generator_sources[gen]
    }

    /// Nodes summed into the output sink.
    pub fn output_inputs(&self) -> &[NodeRef] {
        &self.output_inputs
    }

    /// Whether `op` owns a delay line.
    pub fn is_tapped(&self, op: usize) -> bool {
        self.taps[op]
    }

    /// Operator execution order; every operator runs after its modulators.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Direct inputs of any node, as node references.
    pub fn inputs_of(&self, node: NodeRef) -> ArrayVec<NodeRef, MAX_INPUTS> {
        match node {
            NodeRef::Operator(op) => self.operator_inputs[op]
                .iter()
                .map(|&i| NodeRef::Operator(i))
                .collect(),
            NodeRef::Generator(gen) => {
                let mut inputs = ArrayVec::new();
                inputs.push(NodeRef::Operator(self.generator_sources[gen]));
                inputs
            }
            NodeRef::Output => self.output_inputs.clone(),
        }
    }
}

/// Declarative construction of an [`Algorithm`]. Nothing is checked until
/// [`AlgorithmBuilder::build`].
#[derive(Clone, Debug)]
pub struct AlgorithmBuilder {
    operators: usize,
    generators: usize,
    modulations: Vec<(usize, usize)>,
    taps: Vec<usize>,
    sources: Vec<(usize, usize)>,
    outputs: Vec<NodeRef>,
    order: Option<Vec<usize>>,
}

impl AlgorithmBuilder {
    pub fn new(operators: usize, generators: usize) -> Self {
        Self {
            operators,
            generators,
            modulations: Vec::new(),
            taps: Vec::new(),
            sources: Vec::new(),
            outputs: Vec::new(),
            order: None,
        }
    }

    /// Feed operator `from`'s output into operator `to`'s phase.
    pub fn modulate(mut self, from: usize, to: usize) -> Self {
        self.modulations.push((from, to));
        self
    }

    /// Give operator `op` a delay line.
    pub fn tap(mut self, op: usize) -> Self {
        self.taps.push(op);
        self
    }

    /// Make generator `gen` sample operator `op`'s delay line.
    pub fn granulate(mut self, op: usize, gen: usize) -> Self {
        self.sources.push((op, gen));
        self
    }

    /// Sum `node` into the output sink.
    pub fn to_output(mut self, node: NodeRef) -> Self {
        self.outputs.push(node);
        self
    }

    /// Operator execution order. Defaults to index order.
    pub fn order(mut self, order: impl IntoIterator<Item = usize>) -> Self {
        self.order = Some(order.into_iter().collect());
        self
    }

    pub fn build(self) -> Result<Algorithm, ConfigError> {
        let ops = self.operators;
        let gens = self.generators;
        let check_op = |op: usize| {
            if op < ops {
                Ok(op)
            } else {
                Err(ConfigError::UnknownNode(NodeRef::Operator(op)))
            }
        };

        let mut operator_inputs: Vec<ArrayVec<usize, MAX_INPUTS>> = vec![ArrayVec::new(); ops];
        for &(from, to) in &self.modulations {
            check_op(from)?;
            check_op(to)?;
            operator_inputs[to]
                .try_push(from)
                .map_err(|_| ConfigError::TooManyInputs(NodeRef::Operator(to)))?;
        }

        let mut taps = vec![false; ops];
        for &op in &self.taps {
            taps[check_op(op)?] = true;
        }

        let mut sources: Vec<Option<usize>> = vec![None; gens];
        for &(op, gen) in &self.sources {
            check_op(op)?;
            if gen >= gens {
                return Err(ConfigError::UnknownNode(NodeRef::Generator(gen)));
            }
            sources[gen] = Some(op);
        }

        let mut output_inputs = ArrayVec::new();
        for &node in &self.outputs {
            match node {
                NodeRef::Operator(op) => {
                    check_op(op)?;
                }
                NodeRef::Generator(gen) if gen >= gens => {
                    return Err(ConfigError::UnknownNode(node));
                }
                NodeRef::Generator(_) => {}
                NodeRef::Output => return Err(ConfigError::UnknownNode(node)),
            }
            output_inputs
                .try_push(node)
                .map_err(|_| ConfigError::TooManyInputs(NodeRef::Output))?;
        }

        let order = self.order.unwrap_or_else(|| (0..ops).collect());
        let position = order_positions(&order, ops)?;
        for (op, inputs) in operator_inputs.iter().enumerate() {
            for &input in inputs {
                if position[input] >= position[op] {
                    return Err(ConfigError::OrderViolation {
                        operator: op,
                        input,
                    });
                }
            }
        }

        let mut generator_sources = Vec::with_capacity(gens);
        for (gen, source) in sources.into_iter().enumerate() {
            let op = source.ok_or(ConfigError::MissingSource { generator: gen })?;
            if !taps[op] {
                return Err(ConfigError::UntappedSource {
                    generator: gen,
                    operator: op,
                });
            }
            generator_sources.push(op);
        }

        let algorithm = Algorithm {
            operator_inputs,
            generator_sources,
            output_inputs,
            taps,
            order,
        };
        check_connected(&algorithm)?;
        Ok(algorithm)
    }
}

/// Map each operator to its slot in `order`, rejecting anything that isn't a
/// permutation of `0..ops`.
fn order_positions(order: &[usize], ops: usize) -> Result<Vec<usize>, ConfigError> {
    if order.len() != ops {
        return Err(ConfigError::InvalidOrder);
    }
    let mut position = vec![usize::MAX; ops];
    for (slot, &op) in order.iter().enumerate() {
        if op >= ops || position[op] != usize::MAX {
            return Err(ConfigError::InvalidOrder);
        }
        position[op] = slot;
    }
    Ok(position)
}

/// Every operator and generator must reach the output sink, directly or
/// through the nodes it feeds.
fn check_connected(algorithm: &Algorithm) -> Result<(), ConfigError> {
    let ops = algorithm.operator_count();
    let gens = algorithm.generator_count();
    let mut op_reaches = vec![false; ops];
    let mut gen_reaches = vec![false; gens];

    for node in algorithm.output_inputs() {
        match *node {
            NodeRef::Operator(op) => op_reaches[op] = true,
            NodeRef::Generator(gen) => gen_reaches[gen] = true,
            NodeRef::Output => {}
        }
    }

    // Propagate backwards until nothing changes; each pass settles at least one node.
    loop {
        let mut changed = false;
        for gen in 0..gens {
            let source = algorithm.generator_source(gen);
            if gen_reaches[gen] && !op_reaches[source] {
                op_reaches[source] = true;
                changed = true;
            }
        }
        for op in 0..ops {
            if !op_reaches[op] {
                continue;
            }
            for &input in algorithm.operator_inputs(op) {
                if !op_reaches[input] {
                    op_reaches[input] = true;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    if let Some(op) = op_reaches.iter().position(|r| !r) {
        return Err(ConfigError::Disconnected(NodeRef::Operator(op)));
    }
    if let Some(gen) = gen_reaches.iter().position(|r| !r) {
        return Err(ConfigError::Disconnected(NodeRef::Generator(gen)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_preset_builds_with_default_counts() {
        for id in AlgorithmId::ALL {
            let (ops, gens) = id.default_counts();
            let algorithm = id.build(ops, gens).unwrap();
            assert_eq!(algorithm.operator_count(), ops, "{}", id);
            assert_eq!(algorithm.generator_count(), gens, "{}", id);
        }
    }

    #[test]
    fn serial_pair_grain_wiring() {
        let a = AlgorithmId::SerialPairGrain.build(2, 1).unwrap();
        assert_eq!(a.operator_inputs(1), &[0]);
        assert!(a.operator_inputs(0).is_empty());
        assert!(a.is_tapped(1));
        assert!(!a.is_tapped(0));
        assert_eq!(a.generator_source(0), 1);
        assert_eq!(a.output_inputs(), &[NodeRef::Generator(0)]);
        assert_eq!(a.order(), &[0, 1]);
    }

    #[test]
    fn three_pairs_runs_modulators_first() {
        let a = AlgorithmId::ThreePairs.build(6, 0).unwrap();
        assert_eq!(a.order(), &[0, 2, 4, 1, 3, 5]);
        assert_eq!(
            a.output_inputs(),
            &[
                NodeRef::Operator(1),
                NodeRef::Operator(3),
                NodeRef::Operator(5)
            ]
        );
    }

    #[test]
    fn six_chain_grain_taps_first_operator() {
        let a = AlgorithmId::SixChainGrain.build(6, 1).unwrap();
        assert!(a.is_tapped(0));
        assert_eq!(a.generator_source(0), 0);
        assert_eq!(a.operator_inputs(0), &[1]);
        assert_eq!(a.order(), &[5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn grain_bank_feeds_every_generator() {
        let a = AlgorithmId::SerialPairGrainBank.build(2, 3).unwrap();
        assert_eq!(a.output_inputs().len(), 3);
        for gen in 0..3 {
            assert_eq!(a.generator_source(gen), 1);
        }
    }

    #[test]
    fn count_mismatch_rejected() {
        assert_eq!(
            AlgorithmId::SerialPairGrain.build(6, 1),
            Err(ConfigError::CountMismatch {
                algorithm: AlgorithmId::SerialPairGrain,
                operators: 6,
                generators: 1,
            })
        );
        assert!(AlgorithmId::SerialPairGrainBank.build(2, 0).is_err());
    }

    #[test]
    fn disconnected_operator_rejected() {
        let result = Algorithm::builder(3, 0)
            .modulate(0, 1)
            .to_output(NodeRef::Operator(1))
            .build();
        assert_eq!(result, Err(ConfigError::Disconnected(NodeRef::Operator(2))));
    }

    #[test]
    fn disconnected_generator_rejected() {
        let result = Algorithm::builder(1, 1)
            .tap(0)
            .granulate(0, 0)
            .to_output(NodeRef::Operator(0))
            .build();
        assert_eq!(
            result,
            Err(ConfigError::Disconnected(NodeRef::Generator(0)))
        );
    }

    #[test]
    fn generator_path_counts_as_connected() {
        let result = Algorithm::builder(2, 1)
            .modulate(0, 1)
            .tap(1)
            .granulate(1, 0)
            .to_output(NodeRef::Generator(0))
            .build();
        assert!(result.is_ok());
    }

    #[test]
    fn modulator_after_carrier_rejected() {
        let result = Algorithm::builder(2, 0)
            .modulate(0, 1)
            .to_output(NodeRef::Operator(1))
            .order([1, 0])
            .build();
        assert_eq!(
            result,
            Err(ConfigError::OrderViolation {
                operator: 1,
                input: 0
            })
        );
    }

    #[test]
    fn self_modulation_rejected() {
        let result = Algorithm::builder(1, 0)
            .modulate(0, 0)
            .to_output(NodeRef::Operator(0))
            .build();
        assert!(matches!(result, Err(ConfigError::OrderViolation { .. })));
    }

    #[test]
    fn untapped_source_rejected() {
        let result = Algorithm::builder(1, 1)
            .granulate(0, 0)
            .to_output(NodeRef::Generator(0))
            .build();
        assert_eq!(
            result,
            Err(ConfigError::UntappedSource {
                generator: 0,
                operator: 0
            })
        );
    }

    #[test]
    fn duplicate_order_entry_rejected() {
        let result = Algorithm::builder(2, 0)
            .to_output(NodeRef::Operator(0))
            .to_output(NodeRef::Operator(1))
            .order([0, 0])
            .build();
        assert_eq!(result, Err(ConfigError::InvalidOrder));
    }

    #[test]
    fn unknown_node_rejected() {
        let result = Algorithm::builder(2, 0)
            .modulate(0, 7)
            .to_output(NodeRef::Operator(1))
            .build();
        assert_eq!(result, Err(ConfigError::UnknownNode(NodeRef::Operator(7))));
    }

    #[test]
    fn parses_preset_names() {
        assert_eq!("six-chain".parse(), Ok(AlgorithmId::SixChain));
        assert_eq!("Serial-Pair".parse(), Ok(AlgorithmId::SerialPair));
        assert_eq!("nope".parse::<AlgorithmId>(), Err(ParseAlgorithmError));
    }

    #[test]
    fn inputs_of_output_lists_sinks() {
        let a = AlgorithmId::SixChainGrain.build(6, 1).unwrap();
        let inputs = a.inputs_of(NodeRef::Output);
        assert_eq!(
            inputs.as_slice(),
            &[NodeRef::Operator(0), NodeRef::Generator(0)]
        );
        assert_eq!(
            a.inputs_of(NodeRef::Generator(0)).as_slice(),
            &[NodeRef::Operator(0)]
        );
    }
}
