//! Prediction path: batching, post-processing and export.
//!
//! Post-processing is a contract of this path, applied after
//! `integrate_prediction` and before anything leaves the process: reactivity
//! predictions are clipped to `[0, 1]` and DMS predictions at G/U bases are
//! forced to [`VAL_GU`].

use crate::data::batch::{Batch, Predictions};
use crate::data::datapoint::{Datapoint, PairingData, SignalData};
use crate::data::{encoding, Modality, Part, UKN, VAL_GU};
use crate::model::architecture::RnaProbeModel;
use crate::model::checkpoint;
use anyhow::{Context, Result};
use burn::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Clip signals to the unit interval and force DMS at G/U bases.
pub fn postprocess<B: Backend>(
    sequences: &Tensor<B, 2, Int>,
    mut predictions: Predictions<B>,
) -> Predictions<B> {
    let gu_mask = (sequences.clone().equal_elem(encoding::code_g()).int()
        + sequences.clone().equal_elem(encoding::code_u()).int())
    .greater_elem(0);

    if let Some(dms) = predictions.dms.take() {
        predictions.dms = Some(dms.clamp(0.0, 1.0).mask_fill(gu_mask, VAL_GU));
    }
    if let Some(shape) = predictions.shape.take() {
        predictions.shape = Some(shape.clamp(0.0, 1.0));
    }
    predictions
}

/// Give a datapoint an all-UKN container for each requested modality it
/// lacks, so unlabeled records flow through collation and receive
/// predictions for the declared targets.
pub fn attach_prediction_targets(dp: Datapoint, targets: &[Modality]) -> Result<Datapoint> {
    let length = dp.length();
    let mut dp = dp;
    for &modality in targets {
        if dp.contains(modality, Part::True) {
            continue;
        }
        dp = match modality {
            Modality::Dms => dp.with_dms(SignalData::new(vec![UKN; length]))?,
            Modality::Shape => dp.with_shape(SignalData::new(vec![UKN; length]))?,
            Modality::Structure => {
                dp.with_structure(PairingData::new(vec![UKN; length * length]))?
            }
        };
    }
    Ok(dp)
}

/// Batched inference over datapoints
pub struct Predictor<B: Backend> {
    model: RnaProbeModel<B>,
    device: B::Device,
    batch_size: usize,
    pad_to: Option<usize>,
    postprocess: bool,
}

impl<B: Backend> Predictor<B> {
    /// Load a model from a checkpoint and its metadata side-file.
    pub fn from_checkpoint<P: AsRef<Path>>(path: P, device: B::Device) -> Result<Self> {
        let (model, metadata) = checkpoint::load_model::<B, _>(&path, &device)
            .with_context(|| format!("Failed to load model from {:?}", path.as_ref()))?;
        info!(
            "Loaded checkpoint from epoch {} (version {})",
            metadata.epoch, metadata.version
        );
        Ok(Self::from_model(model, device))
    }

    /// Wrap an in-memory model.
    pub fn from_model(model: RnaProbeModel<B>, device: B::Device) -> Self {
        Self {
            model,
            device,
            batch_size: 32,
            pad_to: None,
            postprocess: true,
        }
    }

    /// Set prediction batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fix the padding length of every prediction batch
    pub fn with_padding(mut self, pad_to: Option<usize>) -> Self {
        self.pad_to = pad_to;
        self
    }

    /// Disable export post-processing, e.g. to score raw model outputs
    pub fn with_postprocess(mut self, postprocess: bool) -> Self {
        self.postprocess = postprocess;
        self
    }

    /// Run the model over the datapoints and hand back per-datapoint views
    /// with post-processed predictions integrated.
    pub fn predict(&self, datapoints: &[Datapoint]) -> Result<Vec<Datapoint>> {
        let mut out = Vec::with_capacity(datapoints.len());
        for chunk in datapoints.chunks(self.batch_size) {
            let mut batch = Batch::from_datapoints(chunk, &Modality::ALL, self.pad_to)?;
            let sequences = batch.sequence_tensor::<B>(&self.device);
            let mut predictions = self.model.forward(sequences.clone());
            if self.postprocess {
                predictions = postprocess(&sequences, predictions);
            }
            batch.integrate_prediction(predictions)?;
            out.extend(batch.to_datapoints()?);
        }
        Ok(out)
    }
}

/// Per-reference signal predictions ready for export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalPrediction {
    /// Sequence id
    pub reference: String,
    /// Decoded nucleotide sequence
    pub sequence: String,
    /// Predicted DMS reactivities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dms: Option<Vec<f32>>,
    /// Predicted SHAPE reactivities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<f32>>,
}

/// Pull signal predictions off scored datapoints.
pub fn collect_signal_predictions(datapoints: &[Datapoint]) -> Result<Vec<SignalPrediction>> {
    datapoints
        .iter()
        .map(|dp| {
            Ok(SignalPrediction {
                reference: dp.reference().to_string(),
                sequence: encoding::decode(dp.sequence())?,
                dms: dp.get(Modality::Dms, Part::Pred).ok().map(|v| v.to_vec()),
                shape: dp.get(Modality::Shape, Part::Pred).ok().map(|v| v.to_vec()),
            })
        })
        .collect()
}

/// Write one row per position: `reference,position,base,dms,shape`.
pub fn save_predictions_to_csv<P: AsRef<Path>>(
    predictions: &[SignalPrediction],
    path: P,
) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())
        .with_context(|| format!("Failed to create {:?}", path.as_ref()))?;
    writer.write_record(["reference", "position", "base", "dms", "shape"])?;

    let cell = |values: &Option<Vec<f32>>, i: usize| {
        values
            .as_ref()
            .and_then(|v| v.get(i))
            .map(|v| format!("{v:.6}"))
            .unwrap_or_default()
    };

    for pred in predictions {
        for (i, base) in pred.sequence.chars().enumerate() {
            writer.write_record([
                pred.reference.clone(),
                i.to_string(),
                base.to_string(),
                cell(&pred.dms, i),
                cell(&pred.shape, i),
            ])?;
        }
    }
    writer.flush()?;
    info!("Wrote {} predictions to csv", predictions.len());
    Ok(())
}

/// Write predictions as a JSON array.
pub fn save_predictions_to_json<P: AsRef<Path>>(
    predictions: &[SignalPrediction],
    path: P,
) -> Result<()> {
    let json = serde_json::to_string_pretty(predictions)?;
    std::fs::write(path.as_ref(), json)
        .with_context(|| format!("Failed to write {:?}", path.as_ref()))?;
    info!("Wrote {} predictions to json", predictions.len());
    Ok(())
}

/// Prediction summary statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PredictionSummary {
    /// Total number of sequences
    pub total_sequences: usize,
    /// Sequences with a DMS prediction
    pub with_dms: usize,
    /// Sequences with a SHAPE prediction
    pub with_shape: usize,
    /// Mean predicted DMS reactivity
    pub mean_dms: Option<f64>,
    /// Mean predicted SHAPE reactivity
    pub mean_shape: Option<f64>,
}

impl PredictionSummary {
    /// Create summary from predictions
    pub fn from_predictions(predictions: &[SignalPrediction]) -> Self {
        let mean_of = |select: fn(&SignalPrediction) -> Option<&Vec<f32>>| {
            let values: Vec<f32> = predictions
                .iter()
                .filter_map(select)
                .flatten()
                .copied()
                .collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64)
            }
        };

        Self {
            total_sequences: predictions.len(),
            with_dms: predictions.iter().filter(|p| p.dms.is_some()).count(),
            with_shape: predictions.iter().filter(|p| p.shape.is_some()).count(),
            mean_dms: mean_of(|p| p.dms.as_ref()),
            mean_shape: mean_of(|p| p.shape.as_ref()),
        }
    }

    /// Print summary to stdout
    pub fn print(&self) {
        println!("\n=== Prediction Summary ===");
        println!("Total sequences: {}", self.total_sequences);
        println!("With DMS: {}", self.with_dms);
        println!("With SHAPE: {}", self.with_shape);
        if let Some(mean) = self.mean_dms {
            println!("Mean DMS reactivity: {:.4}", mean);
        }
        if let Some(mean) = self.mean_shape {
            println!("Mean SHAPE reactivity: {:.4}", mean);
        }
        println!("==========================\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batch::Predictions;
    use crate::model::architecture::init_model;
    use crate::model::ModelConfig;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;
    use tempfile::tempdir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_postprocess_clips_and_forces_gu() {
        let device = Default::default();
        // A G C U
        let sequences = Tensor::<TestBackend, 2, Int>::from_data(
            TensorData::new(vec![1i64, 3, 2, 4], [1, 4]),
            &device,
        );
        let raw = Predictions {
            dms: Some(Tensor::from_data(
                TensorData::new(vec![1.7f32, 0.8, -0.3, 0.6], [1, 4]),
                &device,
            )),
            shape: Some(Tensor::from_data(
                TensorData::new(vec![-1.0f32, 0.5, 2.0, 0.25], [1, 4]),
                &device,
            )),
            structure: None,
        };

        let out = postprocess(&sequences, raw);
        let dms: Vec<f32> = out.dms.unwrap().into_data().iter::<f32>().collect();
        assert_eq!(dms, vec![1.0, VAL_GU, 0.0, VAL_GU]);
        let shape: Vec<f32> = out.shape.unwrap().into_data().iter::<f32>().collect();
        assert_eq!(shape, vec![0.0, 0.5, 1.0, 0.25]);
    }

    #[test]
    fn test_attach_prediction_targets() {
        let dp = Datapoint::new("u1", "ACGU").unwrap();
        let dp =
            attach_prediction_targets(dp, &[Modality::Dms, Modality::Shape]).unwrap();
        assert_eq!(dp.data_types(), vec![Modality::Dms, Modality::Shape]);
        assert!(dp
            .get(Modality::Dms, Part::True)
            .unwrap()
            .iter()
            .all(|&v| v == UKN));
    }

    #[test]
    fn test_predictor_end_to_end_on_unlabeled_data() {
        let device = Default::default();
        let model = init_model::<TestBackend>(&ModelConfig::small(), &device);
        let predictor = Predictor::from_model(model, device).with_batch_size(2);

        let datapoints: Vec<Datapoint> = ["ACGU", "AACCGG", "AU"]
            .iter()
            .enumerate()
            .map(|(i, seq)| {
                attach_prediction_targets(
                    Datapoint::new(format!("p{i}"), seq).unwrap(),
                    &[Modality::Dms, Modality::Shape],
                )
                .unwrap()
            })
            .collect();

        let scored = predictor.predict(&datapoints).unwrap();
        assert_eq!(scored.len(), 3);
        for dp in &scored {
            let dms = dp.get(Modality::Dms, Part::Pred).unwrap();
            assert_eq!(dms.len(), dp.length());
            assert!(dms.iter().all(|&v| (0.0..=1.0).contains(&v)));
            // G/U bases forced to the fixed export constant
            for (&code, &value) in dp.sequence().iter().zip(dms) {
                if code == encoding::code_g() || code == encoding::code_u() {
                    assert_eq!(value, VAL_GU);
                }
            }
        }
    }

    #[test]
    fn test_csv_export() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let predictions = vec![SignalPrediction {
            reference: "r1".to_string(),
            sequence: "AC".to_string(),
            dms: Some(vec![0.25, 0.75]),
            shape: None,
        }];

        save_predictions_to_csv(&predictions, &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("reference,position,base,dms,shape"));
        assert!(content.contains("r1,0,A,0.250000,"));
        assert!(content.contains("r1,1,C,0.750000,"));
    }

    #[test]
    fn test_summary() {
        let predictions = vec![
            SignalPrediction {
                reference: "a".into(),
                sequence: "AC".into(),
                dms: Some(vec![0.2, 0.4]),
                shape: None,
            },
            SignalPrediction {
                reference: "b".into(),
                sequence: "A".into(),
                dms: None,
                shape: Some(vec![0.8]),
            },
        ];
        let summary = PredictionSummary::from_predictions(&predictions);
        assert_eq!(summary.total_sequences, 2);
        assert_eq!(summary.with_dms, 1);
        assert_eq!(summary.with_shape, 1);
        assert!((summary.mean_dms.unwrap() - 0.3).abs() < 1e-9);
        assert_eq!(summary.mean_shape, Some(0.8));
    }
}
