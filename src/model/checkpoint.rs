use burn::prelude::*;
use burn::record::{CompactRecorder, Recorder};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::model::architecture::{init_model, RnaProbeModel};
use crate::model::ModelConfig;

/// Validation metrics stored alongside a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValMetrics {
    /// Multi-task validation loss
    pub loss: f64,
    /// Mean DMS mae over validation datapoints (None = no signal)
    pub dms_mae: Option<f64>,
    /// Mean SHAPE mae over validation datapoints
    pub shape_mae: Option<f64>,
    /// Mean structure F1 over validation datapoints
    pub structure_f1: Option<f64>,
}

/// Checkpoint metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMetadata {
    /// Crate version that wrote the checkpoint
    pub version: String,
    /// Training epoch
    pub epoch: usize,
    /// Validation metrics at save time
    pub val_metrics: ValMetrics,
    /// Model configuration, needed to rebuild the network before loading
    pub model_config: ModelConfig,
    /// Unix timestamp (seconds)
    pub timestamp: u64,
}

impl CheckpointMetadata {
    pub fn new(epoch: usize, val_metrics: ValMetrics, model_config: ModelConfig) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            epoch,
            val_metrics,
            model_config,
            timestamp,
        }
    }
}

/// Checkpoint manager for saving and loading model weights
pub struct CheckpointManager {
    /// Directory to save checkpoints
    checkpoint_dir: PathBuf,
    /// Maximum number of checkpoints to keep
    max_checkpoints: usize,
}

impl CheckpointManager {
    /// Create new checkpoint manager
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();
        fs::create_dir_all(&checkpoint_dir).context("Failed to create checkpoint directory")?;

        Ok(Self {
            checkpoint_dir,
            max_checkpoints: 5,
        })
    }

    /// Set maximum number of checkpoints to keep
    pub fn with_max_checkpoints(mut self, max: usize) -> Self {
        self.max_checkpoints = max;
        self
    }

    /// Save model weights plus a JSON metadata side-file.
    pub fn save_checkpoint<B: Backend>(
        &self,
        model: &RnaProbeModel<B>,
        metadata: &CheckpointMetadata,
    ) -> Result<PathBuf> {
        let checkpoint_name = format!("checkpoint_epoch_{}.mpk", metadata.epoch);
        let checkpoint_path = self.checkpoint_dir.join(&checkpoint_name);

        let record = model.clone().into_record();
        CompactRecorder::new()
            .record(record, checkpoint_path.clone())
            .context("Failed to save model checkpoint")?;

        let metadata_path = checkpoint_path.with_extension("json");
        let metadata_json =
            serde_json::to_string_pretty(metadata).context("Failed to serialize metadata")?;
        fs::write(&metadata_path, metadata_json).context("Failed to write metadata file")?;

        info!("Saved checkpoint: {:?}", checkpoint_path);

        self.cleanup_old_checkpoints()?;

        Ok(checkpoint_path)
    }

    /// Remove the oldest checkpoints beyond the retention limit.
    fn cleanup_old_checkpoints(&self) -> Result<()> {
        let mut checkpoints: Vec<(usize, PathBuf)> = fs::read_dir(&self.checkpoint_dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                let epoch = epoch_from_path(&path)?;
                Some((epoch, path))
            })
            .collect();

        checkpoints.sort_by_key(|(epoch, _)| *epoch);
        while checkpoints.len() > self.max_checkpoints {
            let (epoch, path) = checkpoints.remove(0);
            debug!("Removing old checkpoint for epoch {}", epoch);
            let _ = fs::remove_file(path.with_extension("json"));
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove old checkpoint {:?}", path))?;
        }
        Ok(())
    }
}

fn epoch_from_path(path: &Path) -> Option<usize> {
    if path.extension().and_then(|e| e.to_str()) != Some("mpk") {
        return None;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("checkpoint_epoch_"))
        .and_then(|s| s.parse().ok())
}

/// Read the metadata side-file of a checkpoint.
pub fn load_metadata<P: AsRef<Path>>(checkpoint_path: P) -> Result<CheckpointMetadata> {
    let metadata_path = checkpoint_path.as_ref().with_extension("json");
    let json = fs::read_to_string(&metadata_path)
        .with_context(|| format!("Failed to read metadata {:?}", metadata_path))?;
    serde_json::from_str(&json).context("Failed to parse checkpoint metadata")
}

/// Rebuild a model from a checkpoint and its metadata side-file.
pub fn load_model<B: Backend, P: AsRef<Path>>(
    checkpoint_path: P,
    device: &B::Device,
) -> Result<(RnaProbeModel<B>, CheckpointMetadata)> {
    let metadata = load_metadata(&checkpoint_path)?;
    let model = init_model::<B>(&metadata.model_config, device);
    let record = CompactRecorder::new()
        .load(checkpoint_path.as_ref().to_path_buf(), device)
        .context("Failed to load model checkpoint")?;
    Ok((model.load_record(record), metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let config = ModelConfig::small();
        let model = init_model::<TestBackend>(&config, &device);

        let manager = CheckpointManager::new(dir.path()).unwrap();
        let metadata = CheckpointMetadata::new(3, ValMetrics::default(), config);
        let path = manager.save_checkpoint(&model, &metadata).unwrap();
        assert!(path.exists());
        assert!(path.with_extension("json").exists());

        let (loaded, loaded_meta) = load_model::<TestBackend, _>(&path, &device).unwrap();
        assert_eq!(loaded_meta.epoch, 3);

        // the reloaded model must produce identical outputs
        let input = Tensor::<TestBackend, 2, Int>::ones([1, 4], &device);
        let a: Vec<f32> = model
            .forward(input.clone())
            .dms
            .unwrap()
            .into_data()
            .iter::<f32>()
            .collect();
        let b: Vec<f32> = loaded
            .forward(input)
            .dms
            .unwrap()
            .into_data()
            .iter::<f32>()
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_cleanup_keeps_most_recent() {
        let dir = tempdir().unwrap();
        let device = Default::default();
        let config = ModelConfig::small();
        let model = init_model::<TestBackend>(&config, &device);

        let manager = CheckpointManager::new(dir.path()).unwrap().with_max_checkpoints(2);
        for epoch in 1..=4 {
            let metadata = CheckpointMetadata::new(epoch, ValMetrics::default(), config.clone());
            manager.save_checkpoint(&model, &metadata).unwrap();
        }

        let remaining: Vec<usize> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| epoch_from_path(&e.unwrap().path()))
            .collect();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.contains(&3) && remaining.contains(&4));
    }

    #[test]
    fn test_epoch_from_path() {
        assert_eq!(
            epoch_from_path(Path::new("out/checkpoint_epoch_12.mpk")),
            Some(12)
        );
        assert_eq!(epoch_from_path(Path::new("out/checkpoint_epoch_12.json")), None);
        assert_eq!(epoch_from_path(Path::new("out/model.mpk")), None);
    }
}
