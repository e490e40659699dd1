pub mod architecture;
pub mod checkpoint;
pub mod loss;

use burn::prelude::*;

/// Model configuration
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Base embedding dimension
    #[config(default = "64")]
    pub embedding_size: usize,

    /// Convolutional channel count
    #[config(default = "128")]
    pub hidden_size: usize,

    /// Convolution kernel width
    #[config(default = "7")]
    pub kernel_size: usize,

    /// Projection dimension of the pairing head
    #[config(default = "32")]
    pub pairing_size: usize,

    /// Dropout rate
    #[config(default = "0.1")]
    pub dropout: f64,
}

impl ModelConfig {
    /// Smaller model for quick experiments and tests
    pub fn small() -> Self {
        Self::new()
            .with_embedding_size(16)
            .with_hidden_size(32)
            .with_kernel_size(5)
            .with_pairing_size(8)
            .with_dropout(0.1)
    }
}
