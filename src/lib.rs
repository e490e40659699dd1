//! # rnaprobe: multi-modal RNA chemical probing prediction
//!
//! rnaprobe trains neural models that predict per-base chemical probing
//! signals (DMS and SHAPE reactivity) and base-pairing structure for RNA
//! sequences of varying length, across datasets that each carry a different,
//! possibly incomplete, subset of the three data types per sequence.
//!
//! ## Features
//!
//! - Multi-modal variable-length batching with exact padding bookkeeping
//! - A shared UNKNOWN sentinel that never contaminates gradients or scores
//! - Masked evaluation metrics (F1, R², Pearson, mae)
//! - Count-weighted multi-task loss with optional quality weighting
//! - Round-tripping of predictions back onto per-sequence views for
//!   scoring and export
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use rnaprobe::data::loader::LoaderConfig;
//! use rnaprobe::data::preprocessing::{load_dataset, split_dataset, DatasetKind};
//! use rnaprobe::data::SplitConfig;
//! use rnaprobe::model::ModelConfig;
//! use rnaprobe::training::{trainer::Trainer, TrainingConfig};
//! use burn::backend::Autodiff;
//!
//! // Load and split data
//! let datapoints = load_dataset(
//!     "data.json",
//!     DatasetKind::Multimodal,
//!     &LoaderConfig::default(),
//! ).unwrap();
//! let dataset = split_dataset(datapoints, &SplitConfig::default());
//!
//! // Train model
//! let device = burn_ndarray::NdArrayDevice::default();
//! let trainer = Trainer::<Autodiff<rnaprobe::DefaultBackend>>::new(
//!     TrainingConfig::default(),
//!     ModelConfig::new(),
//!     device,
//! );
//! let result = trainer.train(&dataset).unwrap();
//! ```

pub mod cli;
pub mod data;
pub mod error;
pub mod metrics;
pub mod model;
pub mod predict;
pub mod training;
pub mod utils;

use burn_ndarray::NdArray;

/// Default backend type
pub type DefaultBackend = NdArray<f32>;

/// Re-export commonly used types
pub use data::batch::{Batch, Predictions};
pub use data::datapoint::{Datapoint, PairingData, SignalData};
pub use data::loader::DataLoader;
pub use data::{DataRecord, Dataset, Modality, Part, UKN};
pub use error::RnaProbeError;
pub use model::{architecture::RnaProbeModel, ModelConfig};
pub use training::{TrainingConfig, TrainingResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn info() -> String {
    format!(
        "{} v{} - RNA chemical probing prediction",
        NAME, VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_info() {
        let info_str = info();
        assert!(info_str.contains("rnaprobe"));
        assert!(info_str.contains(VERSION));
    }
}
