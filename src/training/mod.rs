pub mod callbacks;
pub mod scheduler;
pub mod trainer;

use serde::{Deserialize, Serialize};

use crate::model::checkpoint::ValMetrics;

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,
    /// Batch size
    pub batch_size: usize,
    /// Learning rate
    pub learning_rate: f64,
    /// Learning rate scheduler type (constant, exponential, cosine)
    pub lr_scheduler: String,
    /// Weight decay (L2 regularization)
    pub weight_decay: f32,
    /// Early stopping patience, in epochs (0 = disabled)
    pub early_stopping_patience: usize,
    /// Fixed padding length for every batch (None = pad to batch max)
    pub zero_padding_to: Option<usize>,
    /// Weight residuals by per-sample quality scores
    pub use_quality: bool,
    /// Random seed
    pub seed: u64,
    /// Checkpoint frequency, in epochs (best epochs are always saved)
    pub checkpoint_frequency: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: 32,
            learning_rate: 0.001,
            lr_scheduler: "exponential".to_string(),
            weight_decay: 0.0001,
            early_stopping_patience: 15,
            zero_padding_to: None,
            use_quality: true,
            seed: 2026,
            checkpoint_frequency: 5,
        }
    }
}

impl TrainingConfig {
    /// Configuration for quick testing
    pub fn quick_test() -> Self {
        Self {
            epochs: 3,
            batch_size: 8,
            learning_rate: 0.01,
            early_stopping_patience: 0,
            ..Default::default()
        }
    }
}

/// Training state
#[derive(Debug, Clone)]
pub struct TrainingState {
    /// Current epoch
    pub epoch: usize,
    /// Current global step
    pub global_step: usize,
    /// Best validation loss so far (lower is better)
    pub best_loss: f64,
    /// Number of epochs without improvement
    pub epochs_without_improvement: usize,
    /// Training loss history
    pub train_loss_history: Vec<f64>,
    /// Validation loss history
    pub val_loss_history: Vec<f64>,
    /// Learning rate history
    pub lr_history: Vec<f64>,
}

impl TrainingState {
    pub fn new() -> Self {
        Self {
            epoch: 0,
            global_step: 0,
            best_loss: f64::INFINITY,
            epochs_without_improvement: 0,
            train_loss_history: Vec::new(),
            val_loss_history: Vec::new(),
            lr_history: Vec::new(),
        }
    }

    /// Record one epoch; returns true when the validation loss improved.
    pub fn update_epoch(&mut self, train_loss: f64, val_loss: f64, lr: f64) -> bool {
        self.epoch += 1;
        self.train_loss_history.push(train_loss);
        self.val_loss_history.push(val_loss);
        self.lr_history.push(lr);

        if val_loss < self.best_loss {
            self.best_loss = val_loss;
            self.epochs_without_improvement = 0;
            true
        } else {
            self.epochs_without_improvement += 1;
            false
        }
    }

    /// Check if training should stop early
    pub fn should_stop_early(&self, patience: usize) -> bool {
        patience > 0 && self.epochs_without_improvement >= patience
    }
}

impl Default for TrainingState {
    fn default() -> Self {
        Self::new()
    }
}

/// Training result
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// Final training state
    pub state: TrainingState,
    /// Path to the best model checkpoint, if checkpointing was enabled
    pub best_checkpoint: Option<std::path::PathBuf>,
    /// Validation metrics of the final epoch
    pub final_metrics: ValMetrics,
    /// Training duration in seconds
    pub duration_secs: f64,
}
