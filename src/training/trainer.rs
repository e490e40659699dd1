use crate::data::batch::Batch;
use crate::data::datapoint::Datapoint;
use crate::data::{Dataset, Modality};
use crate::model::architecture::{init_model, RnaProbeModel};
use crate::model::checkpoint::{CheckpointManager, CheckpointMetadata, ValMetrics};
use crate::model::loss::MultiTaskLoss;
use crate::model::ModelConfig;
use crate::training::callbacks::MetricAccumulator;
use crate::training::scheduler::LearningRateScheduler;
use crate::training::{TrainingConfig, TrainingResult, TrainingState};
use anyhow::{Context, Result};
use burn::module::AutodiffModule;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::ElementConversion;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::Instant;
use tracing::{debug, info};

/// Trainer for the multi-task probing model
pub struct Trainer<B: AutodiffBackend> {
    /// Training configuration
    config: TrainingConfig,
    /// Model configuration
    model_config: ModelConfig,
    /// Device
    device: B::Device,
    /// Checkpoint manager
    checkpoint_manager: Option<CheckpointManager>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Create new trainer
    pub fn new(config: TrainingConfig, model_config: ModelConfig, device: B::Device) -> Self {
        Self {
            config,
            model_config,
            device,
            checkpoint_manager: None,
        }
    }

    /// Set checkpoint directory
    pub fn with_checkpoint_dir<P: AsRef<std::path::Path>>(
        mut self,
        checkpoint_dir: P,
    ) -> Result<Self> {
        self.checkpoint_manager = Some(CheckpointManager::new(checkpoint_dir)?);
        Ok(self)
    }

    /// Train a model on the dataset's train split, validating per epoch.
    pub fn train(&self, dataset: &Dataset) -> Result<TrainingResult> {
        anyhow::ensure!(!dataset.train.is_empty(), "training set is empty");
        info!(
            "Starting training: {} train / {} val datapoints, {} epochs",
            dataset.train.len(),
            dataset.val.len(),
            self.config.epochs
        );

        let start_time = Instant::now();
        let mut state = TrainingState::new();

        let mut model = init_model::<B>(&self.model_config, &self.device);
        let mut optim = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay)))
            .init();
        let scheduler = LearningRateScheduler::from_name(
            &self.config.lr_scheduler,
            self.config.learning_rate,
            self.config.epochs,
        );
        let loss_fn = MultiTaskLoss::new(self.config.use_quality);

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut best_checkpoint = None;
        let mut final_metrics = ValMetrics::default();

        let progress = ProgressBar::new(self.config.epochs as u64);
        progress.set_style(
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
                .context("invalid progress template")?,
        );

        for epoch in 0..self.config.epochs {
            let lr = scheduler.get_lr(epoch);

            let mut order: Vec<usize> = (0..dataset.train.len()).collect();
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            let mut num_batches = 0usize;
            for chunk in order.chunks(self.config.batch_size) {
                let members: Vec<Datapoint> =
                    chunk.iter().map(|&i| dataset.train[i].clone()).collect();
                let batch = Batch::from_datapoints(
                    &members,
                    &Modality::ALL,
                    self.config.zero_padding_to,
                )?;

                let predictions = model.forward(batch.sequence_tensor::<B>(&self.device));
                let loss = loss_fn.forward(&batch, &predictions, &self.device);
                epoch_loss += loss.clone().into_scalar().elem::<f64>();
                num_batches += 1;
                state.global_step += 1;

                let grads = GradientsParams::from_grads(loss.backward(), &model);
                model = optim.step(lr, model, grads);
            }
            let train_loss = epoch_loss / num_batches.max(1) as f64;

            let (val_loss, val_metrics) = if dataset.val.is_empty() {
                // no validation split: monitor the training loss instead
                (
                    train_loss,
                    ValMetrics {
                        loss: train_loss,
                        ..Default::default()
                    },
                )
            } else {
                evaluate_model(
                    &model.valid(),
                    &dataset.val,
                    self.config.batch_size,
                    self.config.zero_padding_to,
                    self.config.use_quality,
                    &self.device,
                )?
            };
            final_metrics = val_metrics;

            let improved = state.update_epoch(train_loss, val_loss, lr);
            debug!(
                "epoch {}: train_loss={:.5} val_loss={:.5} lr={:.2e}",
                epoch + 1,
                train_loss,
                val_loss,
                lr
            );
            progress.set_message(format!("loss {train_loss:.4} | val {val_loss:.4}"));
            progress.inc(1);

            if let Some(manager) = &self.checkpoint_manager {
                let periodic = self.config.checkpoint_frequency > 0
                    && (epoch + 1) % self.config.checkpoint_frequency == 0;
                if improved || periodic {
                    let metadata = CheckpointMetadata::new(
                        epoch + 1,
                        final_metrics.clone(),
                        self.model_config.clone(),
                    );
                    let path = manager.save_checkpoint(&model.valid(), &metadata)?;
                    if improved {
                        best_checkpoint = Some(path);
                    }
                }
            }

            if state.should_stop_early(self.config.early_stopping_patience) {
                info!(
                    "Early stopping at epoch {} (no improvement for {} epochs)",
                    epoch + 1,
                    state.epochs_without_improvement
                );
                break;
            }
        }
        progress.finish_and_clear();

        info!(
            "Training finished: best val loss {:.5} after {} epochs",
            state.best_loss, state.epoch
        );

        Ok(TrainingResult {
            state,
            best_checkpoint,
            final_metrics,
            duration_secs: start_time.elapsed().as_secs_f64(),
        })
    }
}

/// Run the model over datapoints and report loss plus masked metric means.
pub fn evaluate_model<B: Backend>(
    model: &RnaProbeModel<B>,
    datapoints: &[Datapoint],
    batch_size: usize,
    pad_to: Option<usize>,
    use_quality: bool,
    device: &B::Device,
) -> Result<(f64, ValMetrics)> {
    let loss_fn = MultiTaskLoss::new(use_quality);
    let mut total_loss = 0.0;
    let mut num_batches = 0usize;
    let mut accumulator = MetricAccumulator::new();

    for chunk in datapoints.chunks(batch_size.max(1)) {
        let mut batch = Batch::from_datapoints(chunk, &Modality::ALL, pad_to)?;
        let predictions = model.forward(batch.sequence_tensor::<B>(device));
        total_loss += loss_fn
            .forward(&batch, &predictions, device)
            .into_scalar()
            .elem::<f64>();
        num_batches += 1;

        batch.integrate_prediction(predictions)?;
        for mut dp in batch.to_datapoints()? {
            let pack = dp.compute_error_metrics_pack();
            accumulator.accumulate(pack);
        }
    }

    let loss = total_loss / num_batches.max(1) as f64;
    let metrics = ValMetrics {
        loss,
        dms_mae: accumulator.reference_mean(Modality::Dms),
        shape_mae: accumulator.reference_mean(Modality::Shape),
        structure_f1: accumulator.reference_mean(Modality::Structure),
    };
    Ok((loss, metrics))
}
