//! The training loop.

use crate::supplier::DataSupplier;
use gradnet_core::{Graph, GraphError, Optimizer};
use log::{debug, info};

/// Knobs for [`Trainer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    /// Scale applied to every gradient step.
    pub learning_rate: f32,
    /// Stage updates during a batch and fold them in at its end, instead of
    /// moving the live weights on every iteration.
    pub deferred_updates: bool,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            learning_rate: 0.1,
            deferred_updates: true,
        }
    }
}

/// What a training run did, returned by [`Trainer::run`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainReport {
    pub iterations: usize,
    /// Mean pre-update cost over the whole run.
    pub mean_cost: f32,
    /// Pre-update cost of the last iteration.
    pub final_cost: f32,
}

/// Drives a finalized graph through repeated training iterations.
///
/// Each iteration takes one sample from the supplier, distributes its inputs
/// over the graph's input nodes, runs the evaluate and accumulate passes and
/// lets the optimizer adjust the weights. With
/// [`deferred_updates`](TrainerConfig::deferred_updates) set, updates inside
/// a batch go to the staging buffers and are folded in when the supplier
/// reports the batch ended, so evaluations within the batch all see the same
/// weights.
pub struct Trainer<'g, S, O> {
    graph: &'g mut Graph,
    supplier: S,
    optimizer: O,
    config: TrainerConfig,
}

impl<'g, S: DataSupplier, O: Optimizer> Trainer<'g, S, O> {
    /// A trainer with the default configuration.
    pub fn new(graph: &'g mut Graph, supplier: S, optimizer: O) -> Self {
        Self::with_config(graph, supplier, optimizer, TrainerConfig::default())
    }

    pub fn with_config(
        graph: &'g mut Graph,
        supplier: S,
        optimizer: O,
        config: TrainerConfig,
    ) -> Self {
        Trainer {
            graph,
            supplier,
            optimizer,
            config,
        }
    }

    /// The graph being trained.
    pub fn graph(&self) -> &Graph {
        self.graph
    }

    /// Runs one sample through all passes and returns its pre-update cost.
    pub fn step(&mut self, iteration: usize) -> Result<f32, GraphError> {
        let sample = self.supplier.get(iteration)?;

        let nodes = self.graph.inputs().to_vec();
        let mut expected = 0;
        for &node in &nodes {
            expected += self.graph.node_len(node)?;
        }
        if sample.inputs.len() != expected {
            return Err(GraphError::InputLength {
                expected,
                actual: sample.inputs.len(),
            });
        }
        let mut offset = 0;
        for node in nodes {
            let len = self.graph.node_len(node)?;
            self.graph.set_input(node, &sample.inputs[offset..offset + len])?;
            offset += len;
        }

        self.graph.evaluate()?;
        let cost = self.graph.cost(sample.targets)?;
        self.graph.accumulate_gradients(sample.targets)?;

        let batch_done = self.supplier.batch_ended(iteration);
        let defer = self.config.deferred_updates && !batch_done;
        self.graph
            .adjust_weights(&mut self.optimizer, self.config.learning_rate, defer)?;
        if batch_done {
            self.graph.commit_weights()?;
        }
        Ok(cost)
    }

    /// Runs `iterations` steps and reports the costs seen along the way.
    ///
    /// # Panics
    ///
    /// Panics if `iterations` is zero.
    pub fn run(&mut self, iterations: usize) -> Result<TrainReport, GraphError> {
        assert!(iterations > 0, "a training run needs at least one iteration");
        let mut total = 0.0;
        let mut last = 0.0;
        let mut window = 0.0;
        let mut window_len = 0;
        for iteration in 0..iterations {
            last = self.step(iteration)?;
            total += last;
            window += last;
            window_len += 1;
            if self.supplier.batch_ended(iteration) {
                debug!(
                    "iteration {}: batch of {} done, mean cost {}",
                    iteration,
                    window_len,
                    window / window_len as f32
                );
                window = 0.0;
                window_len = 0;
            }
        }
        let report = TrainReport {
            iterations,
            mean_cost: total / iterations as f32,
            final_cost: last,
        };
        info!(
            "trained {} iterations: mean cost {}, final cost {}",
            report.iterations, report.mean_cost, report.final_cost
        );
        Ok(report)
    }
}
