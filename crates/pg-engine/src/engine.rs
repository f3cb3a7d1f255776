//! The synth engine: owns every node and runs one block per call.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use pg_ir::{Algorithm, ConfigError, NodeRef, SynthConfig};
use tracing::{debug, info};

use crate::controls::ControlSurface;
use crate::frequency::FrequencyTable;
use crate::generator::GrainGenerator;
use crate::node::{NodeOutputs, ProcessInput, Pull, SignalNode};
use crate::operator::Operator;
use crate::output::OutputSink;

/// A fixed network of operators and grain generators.
///
/// All buffers are allocated at construction. [`Engine::synthesize`] does no
/// allocation, locking or I/O and is safe to call from an audio callback.
pub struct Engine {
    config: SynthConfig,
    algorithm: Algorithm,
    table: FrequencyTable,
    operators: Vec<Operator>,
    generators: Vec<GrainGenerator>,
    output: OutputSink,
    /// Input strategy per operator, resolved from the wiring table.
    operator_pulls: Vec<Pull>,
    output_pull: Pull,
    /// Gather target, separate from node outputs to avoid borrow conflicts.
    scratch: Vec<f32>,
    controls: Arc<ControlSurface>,
    seen_generation: u64,
    blocks: u64,
}

impl Engine {
    /// Build the configured preset algorithm.
    pub fn new(config: SynthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let algorithm = config.algorithm.build(config.operators, config.generators)?;
        Self::with_algorithm(config, algorithm)
    }

    /// Build with a custom wiring table.
    pub fn with_algorithm(config: SynthConfig, algorithm: Algorithm) -> Result<Self, ConfigError> {
        let controls = Arc::new(ControlSurface::new(&config));
        Self::with_controls(config, algorithm, controls)
    }

    /// Build around an existing control surface, e.g. one a UI thread already holds.
    pub fn with_controls(
        config: SynthConfig,
        algorithm: Algorithm,
        controls: Arc<ControlSurface>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if algorithm.operator_count() != config.operators
            || algorithm.generator_count() != config.generators
        {
            return Err(ConfigError::CountMismatch {
                algorithm: config.algorithm,
                operators: config.operators,
                generators: config.generators,
            });
        }
        if !controls.matches(&config) {
            return Err(ConfigError::ControlsMismatch);
        }

        let block_len = config.block_len;
        let operators = (0..config.operators)
            .map(|op| {
                let operator = Operator::new(block_len);
                if algorithm.is_tapped(op) {
                    operator.with_delay_line(config.delay_len)
                } else {
                    operator
                }
            })
            .collect();
        let generators = (0..config.generators)
            .map(|gen| {
                GrainGenerator::new(
                    block_len,
                    config.max_grains,
                    config.bounds.max_duration as usize,
                    config.grain,
                    config.envelope,
                    config.seed.wrapping_add(gen as u64),
                )
            })
            .collect();
        let operator_pulls = (0..config.operators)
            .map(|op| Pull::resolve(&algorithm.inputs_of(NodeRef::Operator(op))))
            .collect();
        let output_pull = Pull::resolve(algorithm.output_inputs());

        info!(
            sample_rate = config.sample_rate,
            block_len,
            algorithm = %config.algorithm,
            operators = config.operators,
            generators = config.generators,
            "engine built"
        );
        for op in 0..config.operators {
            debug!(
                operator = op,
                inputs = ?algorithm.operator_inputs(op),
                tapped = algorithm.is_tapped(op),
                "operator wiring"
            );
        }
        for gen in 0..config.generators {
            debug!(
                generator = gen,
                source = algorithm.generator_source(gen),
                "generator wiring"
            );
        }
        debug!(order = ?algorithm.order(), output = ?algorithm.output_inputs(), "execution order");

        let mut engine = Self {
            table: FrequencyTable::new(config.sample_rate),
            operators,
            generators,
            output: OutputSink::new(block_len),
            operator_pulls,
            output_pull,
            scratch: vec![0.0; block_len],
            seen_generation: controls.generation(),
            controls,
            algorithm,
            config,
            blocks: 0,
        };
        engine.sync_controls();
        Ok(engine)
    }

    /// Shared handle for parameter writes from other threads.
    pub fn controls(&self) -> Arc<ControlSurface> {
        Arc::clone(&self.controls)
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn algorithm(&self) -> &Algorithm {
        &self.algorithm
    }

    pub fn frequency_table(&self) -> &FrequencyTable {
        &self.table
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn block_len(&self) -> usize {
        self.config.block_len
    }

    /// Blocks synthesized since construction.
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks
    }

    pub fn operator(&self, op: usize) -> Option<&Operator> {
        self.operators.get(op)
    }

    pub fn generator(&self, gen: usize) -> Option<&GrainGenerator> {
        self.generators.get(gen)
    }

    /// Current-block output of any node.
    pub fn node_output(&self, node: NodeRef) -> &[f32] {
        match node {
            NodeRef::Operator(op) if op < self.operators.len() => self.operators[op].output(),
            NodeRef::Generator(gen) if gen < self.generators.len() => {
                self.generators[gen].output()
            }
            NodeRef::Output => self.output.output(),
            _ => &[],
        }
    }

    /// Render one block: operators in algorithm order, then generators, then
    /// the output sink.
    pub fn synthesize(&mut self) -> &[f32] {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render_block());
        #[cfg(not(feature = "alloc_check"))]
        self.render_block();
        self.output.output()
    }

    fn render_block(&mut self) {
        let generation = self.controls.generation();
        if generation != self.seen_generation {
            self.seen_generation = generation;
            self.sync_controls();
        }

        for &op in self.algorithm.order() {
            let nodes = NodeOutputs {
                operators: &self.operators,
                generators: &self.generators,
            };
            self.operator_pulls[op].gather(&nodes, &mut self.scratch);
            self.operators[op].run(&ProcessInput {
                signal: &self.scratch,
                history: None,
            });
        }

        for (gen, generator) in self.generators.iter_mut().enumerate() {
            let source = self.algorithm.generator_source(gen);
            generator.run(&ProcessInput {
                signal: &[],
                history: self.operators[source].delay_line(),
            });
        }

        let nodes = NodeOutputs {
            operators: &self.operators,
            generators: &self.generators,
        };
        self.output_pull.gather(&nodes, &mut self.scratch);
        self.output.run(&ProcessInput {
            signal: &self.scratch,
            history: None,
        });
        self.blocks += 1;
    }

    /// Re-resolve node state from the control surface.
    fn sync_controls(&mut self) {
        let master = self.controls.master_note();
        for (op, operator) in self.operators.iter_mut().enumerate() {
            if let Ok(mode) = self.controls.operator_mode(op) {
                operator.set_increment(self.table.increment(mode.note(master)));
            }
            if let Ok(amplitude) = self.controls.operator_amplitude(op) {
                operator.set_amplitude(amplitude);
            }
        }
        for (gen, generator) in self.generators.iter_mut().enumerate() {
            if let Ok(settings) = self.controls.grain_settings(gen) {
                generator.apply(settings);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_ir::{AlgorithmId, FrequencyMode};

    fn audible(algorithm: AlgorithmId) -> SynthConfig {
        let mut config = SynthConfig::for_algorithm(algorithm);
        config.operator.amplitude = 0.5;
        config
    }

    #[test]
    fn block_has_configured_length() {
        let mut engine = Engine::new(audible(AlgorithmId::SerialPair)).unwrap();
        assert_eq!(engine.synthesize().len(), 50);
        assert_eq!(engine.blocks_rendered(), 1);
    }

    #[test]
    fn invalid_config_builds_nothing() {
        let config = SynthConfig {
            sample_rate: 0,
            ..SynthConfig::default()
        };
        assert_eq!(Engine::new(config).err(), Some(ConfigError::ZeroSampleRate));
    }

    #[test]
    fn count_mismatch_rejected() {
        let config = SynthConfig {
            operators: 6,
            ..SynthConfig::default()
        };
        assert!(matches!(
            Engine::new(config),
            Err(ConfigError::CountMismatch { operators: 6, .. })
        ));
    }

    #[test]
    fn custom_algorithm_must_match_counts() {
        let algorithm = AlgorithmId::SixChain.build(6, 0).unwrap();
        assert!(matches!(
            Engine::with_algorithm(SynthConfig::default(), algorithm),
            Err(ConfigError::CountMismatch { .. })
        ));
    }

    #[test]
    fn foreign_controls_rejected() {
        let config = SynthConfig::default();
        let other = SynthConfig::for_algorithm(AlgorithmId::SixChain);
        let controls = Arc::new(ControlSurface::new(&other));
        let algorithm = config.algorithm.build(2, 1).unwrap();
        assert_eq!(
            Engine::with_controls(config, algorithm, controls).err(),
            Some(ConfigError::ControlsMismatch)
        );
    }

    #[test]
    fn parameter_changes_apply_at_next_block() {
        let mut engine = Engine::new(SynthConfig::for_algorithm(AlgorithmId::SerialPair)).unwrap();
        assert!(engine.synthesize().iter().all(|&s| s == 0.0));

        let controls = engine.controls();
        controls.set_operator_amplitude(1, 1.0).unwrap();
        assert!(engine.synthesize().iter().any(|&s| s != 0.0));
    }

    #[test]
    fn master_note_moves_locked_operators() {
        let mut engine = Engine::new(audible(AlgorithmId::SerialPair)).unwrap();
        let controls = engine.controls();
        controls
            .set_operator_mode(1, FrequencyMode::Locked(1))
            .unwrap();
        controls.set_master_note(40).unwrap();
        engine.synthesize();
        let expected = engine.frequency_table().increment(52);
        assert_eq!(engine.operator(1).unwrap().increment(), expected);

        controls.set_master_note(50).unwrap();
        engine.synthesize();
        let expected = engine.frequency_table().increment(62);
        assert_eq!(engine.operator(1).unwrap().increment(), expected);
        // Absolute operators ignore the master note.
        assert_eq!(
            engine.operator(0).unwrap().increment(),
            engine.frequency_table().increment(68)
        );
    }

    #[test]
    fn output_is_sum_of_declared_inputs() {
        let mut engine = Engine::new(audible(AlgorithmId::ThreePairs)).unwrap();
        for _ in 0..5 {
            let out = engine.synthesize().to_vec();
            for (i, &sample) in out.iter().enumerate() {
                let sum: f32 = [1, 3, 5]
                    .iter()
                    .map(|&op| engine.node_output(NodeRef::Operator(op))[i])
                    .sum();
                assert!((sample - sum).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn grain_engine_eventually_sounds() {
        let mut engine = Engine::new(audible(AlgorithmId::SerialPairGrain)).unwrap();
        let mut heard = false;
        for _ in 0..20 {
            heard |= engine.synthesize().iter().any(|&s| s != 0.0);
        }
        assert!(heard);
        assert!(engine.generator(0).unwrap().births() > 0);
    }
}
