//! Fixed-topology feedforward controller.
//!
//! Inputs are the normalized sensor distances followed by the normalized
//! vehicle speed. Two ReLU hidden layers feed a `tanh` output pair that is
//! scaled into `(dθ, dSpeed)`. There are no bias terms.
//!
//! Genome layout: the three weight matrices concatenated layer by layer
//! (input→hidden1, hidden1→hidden2, hidden2→output), each row-major with
//! one row per source neuron.

use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use super::evolution::{Genome, GeneticError};
use crate::schema::SimulationConfig;

/// Controller output width: heading delta and speed delta.
pub const OUTPUT_SIZE: usize = 2;
/// Number of hidden layers.
pub const HIDDEN_LAYERS: usize = 2;

/// Layer widths of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub inputs: usize,
    pub hidden: [usize; HIDDEN_LAYERS],
    pub outputs: usize,
}

impl Topology {
    pub fn new(inputs: usize, hidden_width: usize) -> Self {
        Self {
            inputs,
            hidden: [hidden_width; HIDDEN_LAYERS],
            outputs: OUTPUT_SIZE,
        }
    }

    /// Topology implied by a simulation config: one input per sensor plus speed.
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self::new(config.input_size(), config.network.hidden_width)
    }

    /// `(rows, cols)` of each weight matrix, in genome order.
    pub fn layer_shapes(&self) -> [(usize, usize); HIDDEN_LAYERS + 1] {
        let [h1, h2] = self.hidden;
        [(self.inputs, h1), (h1, h2), (h2, self.outputs)]
    }

    /// Total number of weights, i.e. the genome length.
    pub fn genome_len(&self) -> usize {
        self.layer_shapes().iter().map(|(r, c)| r * c).sum()
    }
}

/// Scale applied to the `tanh` outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputScale {
    pub max_turn_angle: f64,
    pub max_speed_delta: f64,
}

impl OutputScale {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            max_turn_angle: config.vehicle.max_turn_angle,
            max_speed_delta: config.vehicle.max_speed_delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Layer {
    rows: usize,
    cols: usize,
    weights: Vec<f64>,
}

impl Layer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.cols];
        if self.cols == 0 {
            return out;
        }
        for (row, &x) in self.weights.chunks_exact(self.cols).zip(input) {
            if x == 0.0 {
                continue;
            }
            for (o, &w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        out
    }
}

/// Neural controller mapping sensor inputs to steering commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuralController {
    topology: Topology,
    scale: OutputScale,
    layers: Vec<Layer>,
}

impl NeuralController {
    /// Weights drawn from `N(0, init_std)`.
    pub fn random<R: Rng + ?Sized>(
        topology: Topology,
        scale: OutputScale,
        init_std: f64,
        rng: &mut R,
    ) -> Self {
        let genome: Genome = (0..topology.genome_len())
            .map(|_| rng.sample::<f64, _>(StandardNormal) * init_std)
            .collect();
        Self::build(topology, scale, &genome)
    }

    /// All weights zero; outputs are always `(0, 0)`.
    pub fn zeroed(topology: Topology, scale: OutputScale) -> Self {
        Self::build(topology, scale, &vec![0.0; topology.genome_len()])
    }

    /// Rebuild a controller from a flat genome.
    pub fn from_genome(
        topology: Topology,
        scale: OutputScale,
        genome: &[f64],
    ) -> Result<Self, GeneticError> {
        check_len(topology.genome_len(), genome.len())?;
        Ok(Self::build(topology, scale, genome))
    }

    fn build(topology: Topology, scale: OutputScale, genome: &[f64]) -> Self {
        let mut offset = 0;
        let layers = topology
            .layer_shapes()
            .into_iter()
            .map(|(rows, cols)| {
                let weights = genome[offset..offset + rows * cols].to_vec();
                offset += rows * cols;
                Layer {
                    rows,
                    cols,
                    weights,
                }
            })
            .collect();
        Self {
            topology,
            scale,
            layers,
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Flatten weights in genome order.
    pub fn to_genome(&self) -> Genome {
        self.layers
            .iter()
            .flat_map(|l| l.weights.iter().copied())
            .collect()
    }

    /// Overwrite all weights in place.
    pub fn set_genome(&mut self, genome: &[f64]) -> Result<(), GeneticError> {
        check_len(self.topology.genome_len(), genome.len())?;
        let mut offset = 0;
        for layer in &mut self.layers {
            let n = layer.rows * layer.cols;
            layer.weights.copy_from_slice(&genome[offset..offset + n]);
            offset += n;
        }
        Ok(())
    }

    /// Forward pass. Missing inputs count as zero, extra inputs are ignored.
    pub fn predict(&self, inputs: &[f64]) -> (f64, f64) {
        let (last, hidden) = match self.layers.split_last() {
            Some(split) => split,
            None => return (0.0, 0.0),
        };

        let mut activation: Vec<f64> = inputs.to_vec();
        activation.resize(self.topology.inputs, 0.0);
        for layer in hidden {
            activation = layer.forward(&activation);
            for a in &mut activation {
                *a = a.max(0.0);
            }
        }
        let out = last.forward(&activation);
        let squash = |i: usize| out.get(i).map_or(0.0, |v| v.tanh());

        (
            squash(0) * self.scale.max_turn_angle,
            squash(1) * self.scale.max_speed_delta,
        )
    }
}

fn check_len(expected: usize, actual: usize) -> Result<(), GeneticError> {
    if expected == actual {
        Ok(())
    } else {
        Err(GeneticError::GenomeLength { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SCALE: OutputScale = OutputScale {
        max_turn_angle: 0.2,
        max_speed_delta: 0.5,
    };

    #[test]
    fn test_genome_len_matches_layers() {
        let topology = Topology::new(6, 10);
        assert_eq!(topology.genome_len(), 6 * 10 + 10 * 10 + 10 * 2);
        assert_eq!(topology.outputs, OUTPUT_SIZE);
    }

    #[test]
    fn test_zero_weights_produce_zero_output() {
        let net = NeuralController::zeroed(Topology::new(6, 10), SCALE);
        let (d_theta, d_speed) = net.predict(&[1.0; 6]);
        assert_eq!(d_theta, 0.0);
        assert_eq!(d_speed, 0.0);
    }

    #[test]
    fn test_outputs_bounded_by_scale() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = NeuralController::random(Topology::new(4, 8), SCALE, 5.0, &mut rng);
        for i in 0..20 {
            let x = i as f64 * 0.1;
            let (d_theta, d_speed) = net.predict(&[x, 1.0 - x, x * 2.0, -x]);
            assert!(d_theta.abs() <= SCALE.max_turn_angle);
            assert!(d_speed.abs() <= SCALE.max_speed_delta);
        }
    }

    #[test]
    fn test_known_forward_pass() {
        // 1 input, hidden widths 1, every weight 1: out = tanh(x) for x >= 0
        let topology = Topology::new(1, 1);
        let net = NeuralController::from_genome(topology, SCALE, &[1.0, 1.0, 1.0, -1.0]).unwrap();
        let (d_theta, d_speed) = net.predict(&[0.5]);
        assert!((d_theta - 0.5f64.tanh() * 0.2).abs() < 1e-12);
        assert!((d_speed + 0.5f64.tanh() * 0.5).abs() < 1e-12);

        // ReLU clips negative hidden activations
        let (d_theta, d_speed) = net.predict(&[-0.5]);
        assert_eq!((d_theta, d_speed), (0.0, 0.0));
    }

    #[test]
    fn test_genome_length_mismatch() {
        let topology = Topology::new(3, 4);
        let err = NeuralController::from_genome(topology, SCALE, &[0.0; 5]).unwrap_err();
        assert_eq!(
            err,
            GeneticError::GenomeLength {
                expected: topology.genome_len(),
                actual: 5
            }
        );

        let mut net = NeuralController::zeroed(topology, SCALE);
        assert!(net.set_genome(&[1.0; 3]).is_err());
        assert!(net.to_genome().iter().all(|&w| w == 0.0));
    }

    #[test]
    fn test_set_genome_in_place() {
        let topology = Topology::new(2, 3);
        let mut net = NeuralController::zeroed(topology, SCALE);
        let genome: Genome = (0..topology.genome_len()).map(|i| i as f64).collect();
        net.set_genome(&genome).unwrap();
        assert_eq!(net.to_genome(), genome);
    }

    proptest! {
        #[test]
        fn prop_genome_round_trip(seed in any::<u64>(), inputs in 1usize..8, hidden in 1usize..12) {
            let mut rng = StdRng::seed_from_u64(seed);
            let net = NeuralController::random(Topology::new(inputs, hidden), SCALE, 0.5, &mut rng);
            let genome = net.to_genome();
            let rebuilt = NeuralController::from_genome(net.topology(), SCALE, &genome).unwrap();
            prop_assert_eq!(&rebuilt, &net);
            prop_assert_eq!(rebuilt.to_genome(), genome);
        }
    }
}
