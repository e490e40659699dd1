use crate::data::batch::Predictions;
use crate::data::encoding;
use crate::model::ModelConfig;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig1d};
use burn::prelude::*;
use burn::tensor::activation::{relu, sigmoid};

/// Multi-task network over padded sequence batches.
///
/// A shared convolutional trunk feeds two per-position signal heads and a
/// bilinear pairing head. The exact trunk is not load-bearing; the contract
/// is the tensor interface: sequences in, one padded tensor per modality
/// out, consumed only by `Batch::integrate_prediction`.
#[derive(Module, Debug)]
pub struct RnaProbeModel<B: Backend> {
    /// One-hot to embedding projection
    embed: Linear<B>,
    /// Shared convolutional trunk
    conv1: Conv1d<B>,
    conv2: Conv1d<B>,
    /// Per-position reactivity heads
    dms_head: Linear<B>,
    shape_head: Linear<B>,
    /// Pairing projection; scores are the scaled inner products
    pairing_proj: Linear<B>,
    /// Dropout layer
    dropout: Dropout,
}

impl<B: Backend> RnaProbeModel<B> {
    /// Forward pass over a padded sequence batch of shape `[batch, len]`.
    ///
    /// Signals come out in `[0, 1]` with shape `[batch, len]`; the pairing
    /// probabilities are a symmetric `[batch, len, len]` tensor.
    pub fn forward(&self, sequences: Tensor<B, 2, Int>) -> Predictions<B> {
        let x = encoding::one_hot(sequences);
        let x = self.embed.forward(x);

        // conv trunk works channels-first
        let h = x.swap_dims(1, 2);
        let h = self.dropout.forward(relu(self.conv1.forward(h)));
        let h = self.dropout.forward(relu(self.conv2.forward(h)));
        let h = h.swap_dims(1, 2);

        let dms = sigmoid(self.dms_head.forward(h.clone()).squeeze::<2>(2));
        let shape = sigmoid(self.shape_head.forward(h.clone()).squeeze::<2>(2));

        let z = self.pairing_proj.forward(h);
        let [_, _, pairing_size] = z.dims();
        // z·zᵀ is symmetric, so the pairing matrix needs no symmetrization
        let scores = z
            .clone()
            .matmul(z.swap_dims(1, 2))
            .div_scalar((pairing_size as f64).sqrt());
        let structure = sigmoid(scores);

        Predictions {
            dms: Some(dms),
            shape: Some(shape),
            structure: Some(structure),
        }
    }
}

/// Initialize model from configuration
pub fn init_model<B: Backend>(config: &ModelConfig, device: &B::Device) -> RnaProbeModel<B> {
    let embed = LinearConfig::new(crate::data::NUM_TOKENS, config.embedding_size)
        .with_bias(true)
        .init(device);

    let conv1 = Conv1dConfig::new(config.embedding_size, config.hidden_size, config.kernel_size)
        .with_padding(PaddingConfig1d::Same)
        .init(device);

    let conv2 = Conv1dConfig::new(config.hidden_size, config.hidden_size, config.kernel_size)
        .with_padding(PaddingConfig1d::Same)
        .init(device);

    let dms_head = LinearConfig::new(config.hidden_size, 1).with_bias(true).init(device);
    let shape_head = LinearConfig::new(config.hidden_size, 1)
        .with_bias(true)
        .init(device);
    let pairing_proj = LinearConfig::new(config.hidden_size, config.pairing_size)
        .with_bias(true)
        .init(device);

    let dropout = DropoutConfig::new(config.dropout).init();

    RnaProbeModel {
        embed,
        conv1,
        conv2,
        dms_head,
        shape_head,
        pairing_proj,
        dropout,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let config = ModelConfig::small();
        let model = init_model::<TestBackend>(&config, &device);

        let sequences = Tensor::<TestBackend, 2, Int>::zeros([2, 9], &device);
        let predictions = model.forward(sequences);

        assert_eq!(predictions.dms.unwrap().dims(), [2, 9]);
        assert_eq!(predictions.shape.unwrap().dims(), [2, 9]);
        assert_eq!(predictions.structure.unwrap().dims(), [2, 9, 9]);
    }

    #[test]
    fn test_signal_outputs_in_unit_interval() {
        let device = Default::default();
        let config = ModelConfig::small();
        let model = init_model::<TestBackend>(&config, &device);

        let sequences = Tensor::<TestBackend, 2, Int>::ones([1, 6], &device);
        let predictions = model.forward(sequences);
        let dms: Vec<f32> = predictions.dms.unwrap().into_data().iter::<f32>().collect();
        assert!(dms.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_pairing_output_is_symmetric() {
        let device = Default::default();
        let config = ModelConfig::small();
        let model = init_model::<TestBackend>(&config, &device);

        let sequences = Tensor::<TestBackend, 2, Int>::ones([1, 5], &device);
        let structure = model.forward(sequences).structure.unwrap();
        let host: Vec<f32> = structure.into_data().iter::<f32>().collect();
        for i in 0..5 {
            for j in 0..5 {
                let a = host[i * 5 + j];
                let b = host[j * 5 + i];
                assert!((a - b).abs() < 1e-6);
            }
        }
    }
}
