//! Per-agent reward network and forward propagation.

use ndarray::{Array1, Array2};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// A single affine layer in the reward network
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

impl Serialize for Layer {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let shape = self.weights.shape();
        let weights_data: Vec<f32> = self.weights.iter().copied().collect();
        let biases_data: Vec<f32> = self.biases.iter().copied().collect();

        let mut state = serializer.serialize_struct("Layer", 3)?;
        state.serialize_field("shape", &[shape[0], shape[1]])?;
        state.serialize_field("weights", &weights_data)?;
        state.serialize_field("biases", &biases_data)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for Layer {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct LayerData {
            shape: [usize; 2],
            weights: Vec<f32>,
            biases: Vec<f32>,
        }

        let data = LayerData::deserialize(deserializer)?;
        if data.biases.len() != data.shape[1] {
            return Err(serde::de::Error::custom(format!(
                "bias length {} does not match layer output {}",
                data.biases.len(),
                data.shape[1]
            )));
        }
        let weights = Array2::from_shape_vec((data.shape[0], data.shape[1]), data.weights)
            .map_err(serde::de::Error::custom)?;
        let biases = Array1::from_vec(data.biases);

        Ok(Layer { weights, biases })
    }
}

/// Multi-layer perceptron mapping an input vector to a scalar reward
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardNet {
    /// Number of inputs
    pub input_dim: usize,
    /// Network layers, the last one has a single output
    pub layers: Vec<Layer>,
}

impl RewardNet {
    /// Create a network with `n_layers` layers, hidden width `hidden_dim`,
    /// weights drawn i.i.d. from `init` and zero biases.
    pub fn new_random<R: Rng + ?Sized>(
        input_dim: usize,
        n_layers: usize,
        hidden_dim: usize,
        init: &Normal<f32>,
        rng: &mut R,
    ) -> Self {
        let mut layers = Vec::with_capacity(n_layers);
        let mut in_dim = input_dim;
        for i in 0..n_layers {
            let out_dim = if i == n_layers - 1 { 1 } else { hidden_dim };
            let weights = Array2::from_shape_fn((in_dim, out_dim), |_| init.sample(&mut *rng));
            let biases = Array1::zeros(out_dim);
            layers.push(Layer { weights, biases });
            in_dim = out_dim;
        }

        Self { input_dim, layers }
    }

    /// Network with every weight and bias set to zero
    pub fn zeros(input_dim: usize, n_layers: usize, hidden_dim: usize) -> Self {
        let mut layers = Vec::with_capacity(n_layers);
        let mut in_dim = input_dim;
        for i in 0..n_layers {
            let out_dim = if i == n_layers - 1 { 1 } else { hidden_dim };
            layers.push(Layer {
                weights: Array2::zeros((in_dim, out_dim)),
                biases: Array1::zeros(out_dim),
            });
            in_dim = out_dim;
        }
        Self { input_dim, layers }
    }

    /// Forward pass with ReLU between layers and a linear output
    pub fn forward(&self, inputs: &[f32]) -> f32 {
        debug_assert_eq!(inputs.len(), self.input_dim);

        let mut activation = Array1::from_vec(inputs.to_vec());
        let last = self.layers.len().saturating_sub(1);

        for (i, layer) in self.layers.iter().enumerate() {
            activation = activation.dot(&layer.weights) + &layer.biases;
            if i < last {
                activation.mapv_inplace(|x| x.max(0.0));
            }
        }

        activation.first().copied().unwrap_or(0.0)
    }

    #[inline]
    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    /// Get total number of parameters (weights + biases)
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.biases.len())
            .sum()
    }

    /// Check if network is valid (no NaN/Inf)
    pub fn is_valid(&self) -> bool {
        self.layers.iter().all(|layer| {
            layer.weights.iter().all(|w| w.is_finite())
                && layer.biases.iter().all(|b| b.is_finite())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn normal(mean: f32, stddev: f32) -> Normal<f32> {
        Normal::new(mean, stddev).unwrap()
    }

    #[test]
    fn test_layer_shapes() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let net = RewardNet::new_random(11, 3, 8, &normal(0.0, 1.0), &mut rng);

        assert_eq!(net.n_layers(), 3);
        assert_eq!(net.layers[0].weights.shape(), &[11, 8]);
        assert_eq!(net.layers[1].weights.shape(), &[8, 8]);
        assert_eq!(net.layers[2].weights.shape(), &[8, 1]);
        assert_eq!(net.layers[2].biases.len(), 1);
        assert_eq!(net.parameter_count(), 11 * 8 + 8 + 8 * 8 + 8 + 8 + 1);
    }

    #[test]
    fn test_single_layer_maps_to_scalar() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let net = RewardNet::new_random(4, 1, 0, &normal(0.0, 1.0), &mut rng);
        assert_eq!(net.layers[0].weights.shape(), &[4, 1]);
    }

    #[test]
    fn test_biases_start_at_zero() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let net = RewardNet::new_random(6, 2, 5, &normal(0.5, 0.2), &mut rng);
        assert!(net.layers.iter().all(|l| l.biases.iter().all(|&b| b == 0.0)));
        assert!(net.is_valid());
    }

    #[test]
    fn test_zero_network_returns_final_bias() {
        let net = RewardNet::zeros(7, 3, 4);
        assert_eq!(net.forward(&[0.3, -1.0, 2.0, 0.0, 5.0, 1.0, 1.0]), 0.0);

        let mut net = RewardNet::zeros(3, 2, 4);
        net.layers[1].biases[0] = 0.75;
        assert_eq!(net.forward(&[1.0, 2.0, 3.0]), 0.75);
    }

    #[test]
    fn test_relu_on_hidden_layers_only() {
        let mut net = RewardNet::zeros(1, 2, 1);
        net.layers[0].weights[[0, 0]] = 1.0;
        net.layers[1].weights[[0, 0]] = -2.0;

        // Hidden activation clamps negative input to zero
        assert_eq!(net.forward(&[-3.0]), 0.0);
        // Output layer stays linear
        assert_eq!(net.forward(&[3.0]), -6.0);
    }

    #[test]
    fn test_seeded_init_is_reproducible() {
        let init = normal(0.0, 1.0);
        let a = RewardNet::new_random(5, 2, 3, &init, &mut ChaCha8Rng::seed_from_u64(9));
        let b = RewardNet::new_random(5, 2, 3, &init, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_serialization() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let net = RewardNet::new_random(6, 2, 3, &normal(0.0, 1.0), &mut rng);
        let serialized = bincode::serialize(&net).unwrap();
        let deserialized: RewardNet = bincode::deserialize(&serialized).unwrap();

        assert_eq!(net, deserialized);
    }
}
