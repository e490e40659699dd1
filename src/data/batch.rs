//! Padded-tensor aggregation of datapoints for one training/eval step.
//!
//! A [`Batch`] owns host-side padded storage and materializes Burn tensors
//! at the model boundary. Positions past a member's own length, and entire
//! rows of members lacking a modality, hold [`UKN`]; the per-modality index
//! records which rows carry real data so aggregate losses and metrics only
//! ever see contributing samples.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::data::datapoint::{Datapoint, PairingData, SignalData};
use crate::data::{Modality, Part, PAD_TOKEN, UKN};
use crate::error::{Result, RnaProbeError};

/// Model outputs over the padded batch, one tensor per predicted modality.
///
/// Signals are `[batch, pad_len]`, structure is `[batch, pad_len, pad_len]`.
#[derive(Debug, Clone)]
pub struct Predictions<B: Backend> {
    pub dms: Option<Tensor<B, 2>>,
    pub shape: Option<Tensor<B, 2>>,
    pub structure: Option<Tensor<B, 3>>,
}

impl<B: Backend> Predictions<B> {
    pub fn new() -> Self {
        Self {
            dms: None,
            shape: None,
            structure: None,
        }
    }
}

impl<B: Backend> Default for Predictions<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Padded block for one signal modality. First dimension == batch length.
#[derive(Debug, Clone)]
struct SignalBlock {
    /// batch × pad_len, UKN where unknown, past-length or absent
    values: Vec<f32>,
    pred: Option<Vec<f32>>,
    error: Option<Vec<f32>>,
    /// per-row quality score, None where absent
    quality: Vec<Option<f32>>,
    /// rows that actually carry this modality
    index: Vec<usize>,
}

/// Padded block for the structure modality.
#[derive(Debug, Clone)]
struct PairingBlock {
    /// batch × pad_len × pad_len; only the `< length × < length` interior of
    /// contributing rows is {0, 1}, everything else is UKN
    values: Vec<f32>,
    pred: Option<Vec<f32>>,
    quality: Vec<Option<f32>>,
    index: Vec<usize>,
}

/// A collated set of datapoints, discarded after the step that built it.
#[derive(Debug, Clone)]
pub struct Batch {
    references: Vec<String>,
    lengths: Vec<usize>,
    pad_len: usize,
    /// batch × pad_len, PAD_TOKEN past each member's length
    sequence: Vec<i64>,
    dms: Option<SignalBlock>,
    shape: Option<SignalBlock>,
    structure: Option<PairingBlock>,
}

impl Batch {
    /// Collate datapoints into padded storage.
    ///
    /// `fields` selects which modalities to materialize; the sequence is
    /// always collated. `pad_to` fixes the padding target; `None` pads to
    /// the longest member. A fixed target below the natural maximum fails
    /// with `PaddingTooSmall`.
    pub fn from_datapoints(
        datapoints: &[Datapoint],
        fields: &[Modality],
        pad_to: Option<usize>,
    ) -> Result<Self> {
        let natural_max = datapoints.iter().map(|dp| dp.length()).max().unwrap_or(0);
        let pad_len = match pad_to {
            Some(requested) if requested < natural_max => {
                return Err(RnaProbeError::PaddingTooSmall {
                    requested,
                    required: natural_max,
                });
            }
            Some(requested) => requested,
            None => natural_max,
        };

        let mut sequence = vec![PAD_TOKEN; datapoints.len() * pad_len];
        for (row, dp) in datapoints.iter().enumerate() {
            sequence[row * pad_len..row * pad_len + dp.length()].copy_from_slice(dp.sequence());
        }

        let mut batch = Self {
            references: datapoints.iter().map(|dp| dp.reference().to_string()).collect(),
            lengths: datapoints.iter().map(|dp| dp.length()).collect(),
            pad_len,
            sequence,
            dms: None,
            shape: None,
            structure: None,
        };

        for &modality in fields {
            match modality {
                Modality::Dms => batch.dms = Self::collate_signal(datapoints, modality, pad_len),
                Modality::Shape => {
                    batch.shape = Self::collate_signal(datapoints, modality, pad_len)
                }
                Modality::Structure => {
                    batch.structure = Self::collate_pairing(datapoints, pad_len)
                }
            }
        }

        Ok(batch)
    }

    fn collate_signal(
        datapoints: &[Datapoint],
        modality: Modality,
        pad_len: usize,
    ) -> Option<SignalBlock> {
        let index: Vec<usize> = datapoints
            .iter()
            .enumerate()
            .filter(|(_, dp)| dp.contains(modality, Part::True))
            .map(|(row, _)| row)
            .collect();
        if index.is_empty() {
            return None;
        }

        let rows = datapoints.len();
        let mut values = vec![UKN; rows * pad_len];
        let mut quality = vec![None; rows];
        let has_error = datapoints.iter().any(|dp| dp.error(modality).is_some());
        let mut error = has_error.then(|| vec![UKN; rows * pad_len]);

        for (row, dp) in datapoints.iter().enumerate() {
            let Ok(truth) = dp.get(modality, Part::True) else {
                continue;
            };
            values[row * pad_len..row * pad_len + truth.len()].copy_from_slice(truth);
            quality[row] = dp.quality(modality);
            if let (Some(block), Some(err)) = (error.as_mut(), dp.error(modality)) {
                block[row * pad_len..row * pad_len + err.len()].copy_from_slice(err);
            }
        }

        Some(SignalBlock {
            values,
            pred: None,
            error,
            quality,
            index,
        })
    }

    fn collate_pairing(datapoints: &[Datapoint], pad_len: usize) -> Option<PairingBlock> {
        let index: Vec<usize> = datapoints
            .iter()
            .enumerate()
            .filter(|(_, dp)| dp.contains(Modality::Structure, Part::True))
            .map(|(row, _)| row)
            .collect();
        if index.is_empty() {
            return None;
        }

        let rows = datapoints.len();
        let plane = pad_len * pad_len;
        let mut values = vec![UKN; rows * plane];
        let mut quality = vec![None; rows];

        for (row, dp) in datapoints.iter().enumerate() {
            let Ok(matrix) = dp.get(Modality::Structure, Part::True) else {
                continue;
            };
            let length = dp.length();
            // re-embed the L×L matrix; the exterior stays UKN so padded-only
            // rows/cols never read as "unpaired everywhere"
            for i in 0..length {
                let src = &matrix[i * length..(i + 1) * length];
                let dst = row * plane + i * pad_len;
                values[dst..dst + length].copy_from_slice(src);
            }
            quality[row] = dp.quality(Modality::Structure);
        }

        Some(PairingBlock {
            values,
            pred: None,
            quality,
            index,
        })
    }

    /// Exact structural inverse of [`Batch::from_datapoints`]: re-slices
    /// every present modality (and its prediction, if integrated) back to
    /// each row's true length.
    pub fn to_datapoints(&self) -> Result<Vec<Datapoint>> {
        let mut out = Vec::with_capacity(self.len());
        for row in 0..self.len() {
            let length = self.lengths[row];
            let codes = self.sequence[row * self.pad_len..row * self.pad_len + length].to_vec();
            let mut dp = Datapoint::from_codes(self.references[row].clone(), codes);

            for (modality, block) in [(Modality::Dms, &self.dms), (Modality::Shape, &self.shape)] {
                let Some(block) = block else { continue };
                if !block.index.contains(&row) {
                    continue;
                }
                let start = row * self.pad_len;
                let mut data = SignalData::new(block.values[start..start + length].to_vec());
                if let Some(error) = &block.error {
                    let slice = &error[start..start + length];
                    if slice.iter().any(|&v| v != UKN) {
                        data = data.with_error(slice.to_vec())?;
                    }
                }
                if let Some(quality) = block.quality[row] {
                    data = data.with_quality(quality)?;
                }
                dp = match modality {
                    Modality::Dms => dp.with_dms(data)?,
                    _ => dp.with_shape(data)?,
                };
                if let Some(pred) = &block.pred {
                    dp.add_prediction(modality, pred[start..start + length].to_vec())?;
                }
            }

            if let Some(block) = &self.structure {
                if block.index.contains(&row) {
                    let interior = |flat: &[f32]| {
                        let plane = self.pad_len * self.pad_len;
                        let mut matrix = Vec::with_capacity(length * length);
                        for i in 0..length {
                            let start = row * plane + i * self.pad_len;
                            matrix.extend_from_slice(&flat[start..start + length]);
                        }
                        matrix
                    };
                    let mut data = PairingData::new(interior(&block.values));
                    if let Some(quality) = block.quality[row] {
                        data = data.with_quality(quality)?;
                    }
                    dp = dp.with_structure(data)?;
                    if let Some(pred) = &block.pred {
                        dp.add_prediction(Modality::Structure, interior(pred))?;
                    }
                }
            }

            out.push(dp);
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    pub fn pad_len(&self) -> usize {
        self.pad_len
    }

    pub fn reference(&self, row: usize) -> &str {
        &self.references[row]
    }

    pub fn length(&self, row: usize) -> usize {
        self.lengths[row]
    }

    fn signal_block(&self, modality: Modality) -> Option<&SignalBlock> {
        match modality {
            Modality::Dms => self.dms.as_ref(),
            Modality::Shape => self.shape.as_ref(),
            Modality::Structure => None,
        }
    }

    /// Whether at least one member carries this modality.
    pub fn contains(&self, modality: Modality) -> bool {
        self.count(modality) > 0
    }

    /// Number of contributing members; the multi-task loss weight.
    pub fn count(&self, modality: Modality) -> usize {
        self.index(modality).len()
    }

    /// Rows (in batch order) that carry this modality.
    pub fn index(&self, modality: Modality) -> &[usize] {
        match modality {
            Modality::Dms | Modality::Shape => self
                .signal_block(modality)
                .map(|b| b.index.as_slice())
                .unwrap_or(&[]),
            Modality::Structure => self
                .structure
                .as_ref()
                .map(|b| b.index.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Flat padded view of one modality, whole block or a single row.
    pub fn get(&self, modality: Modality, part: Part, row: Option<usize>) -> Result<&[f32]> {
        let missing = || RnaProbeError::UnknownModality(modality);
        let (flat, stride) = match modality {
            Modality::Dms | Modality::Shape => {
                let block = self.signal_block(modality).ok_or_else(missing)?;
                let flat = match part {
                    Part::True => &block.values,
                    Part::Pred => block.pred.as_ref().ok_or_else(missing)?,
                };
                (flat, self.pad_len)
            }
            Modality::Structure => {
                let block = self.structure.as_ref().ok_or_else(missing)?;
                let flat = match part {
                    Part::True => &block.values,
                    Part::Pred => block.pred.as_ref().ok_or_else(missing)?,
                };
                (flat, self.pad_len * self.pad_len)
            }
        };
        match row {
            Some(row) => Ok(&flat[row * stride..(row + 1) * stride]),
            None => Ok(flat.as_slice()),
        }
    }

    /// The padded sequence tensor, model input. Shape `[batch, pad_len]`.
    pub fn sequence_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2, Int> {
        Tensor::from_data(
            TensorData::new(self.sequence.clone(), [self.len(), self.pad_len]),
            device,
        )
    }

    fn gather_signal_rows(&self, flat: &[f32], index: &[usize]) -> Vec<f32> {
        let mut out = Vec::with_capacity(index.len() * self.pad_len);
        for &row in index {
            out.extend_from_slice(&flat[row * self.pad_len..(row + 1) * self.pad_len]);
        }
        out
    }

    fn gather_pairing_rows(&self, flat: &[f32], index: &[usize]) -> Vec<f32> {
        let plane = self.pad_len * self.pad_len;
        let mut out = Vec::with_capacity(index.len() * plane);
        for &row in index {
            out.extend_from_slice(&flat[row * plane..(row + 1) * plane]);
        }
        out
    }

    /// True values of a signal modality, restricted to its contributing
    /// rows. Shape `[count, pad_len]`.
    pub fn signal_true<B: Backend>(
        &self,
        modality: Modality,
        device: &B::Device,
    ) -> Result<Tensor<B, 2>> {
        let block = self
            .signal_block(modality)
            .ok_or(RnaProbeError::UnknownModality(modality))?;
        let rows = self.gather_signal_rows(&block.values, &block.index);
        Ok(Tensor::from_data(
            TensorData::new(rows, [block.index.len(), self.pad_len]),
            device,
        ))
    }

    /// `(pred, true)` tensors of a signal modality restricted to its
    /// contributing rows, for direct metric/loss consumption.
    pub fn signal_pairs<B: Backend>(
        &self,
        modality: Modality,
        device: &B::Device,
    ) -> Result<(Tensor<B, 2>, Tensor<B, 2>)> {
        let block = self
            .signal_block(modality)
            .ok_or(RnaProbeError::UnknownModality(modality))?;
        let pred = block
            .pred
            .as_ref()
            .ok_or(RnaProbeError::UnknownModality(modality))?;
        let shape = [block.index.len(), self.pad_len];
        let pred_rows = self.gather_signal_rows(pred, &block.index);
        let true_rows = self.gather_signal_rows(&block.values, &block.index);
        Ok((
            Tensor::from_data(TensorData::new(pred_rows, shape), device),
            Tensor::from_data(TensorData::new(true_rows, shape), device),
        ))
    }

    /// True pairing matrices restricted to contributing rows.
    /// Shape `[count, pad_len, pad_len]`.
    pub fn pairing_true<B: Backend>(&self, device: &B::Device) -> Result<Tensor<B, 3>> {
        let block = self
            .structure
            .as_ref()
            .ok_or(RnaProbeError::UnknownModality(Modality::Structure))?;
        let rows = self.gather_pairing_rows(&block.values, &block.index);
        Ok(Tensor::from_data(
            TensorData::new(rows, [block.index.len(), self.pad_len, self.pad_len]),
            device,
        ))
    }

    /// `(pred, true)` pairing matrices restricted to contributing rows.
    pub fn pairing_pairs<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<(Tensor<B, 3>, Tensor<B, 3>)> {
        let block = self
            .structure
            .as_ref()
            .ok_or(RnaProbeError::UnknownModality(Modality::Structure))?;
        let pred = block
            .pred
            .as_ref()
            .ok_or(RnaProbeError::UnknownModality(Modality::Structure))?;
        let shape = [block.index.len(), self.pad_len, self.pad_len];
        let pred_rows = self.gather_pairing_rows(pred, &block.index);
        let true_rows = self.gather_pairing_rows(&block.values, &block.index);
        Ok((
            Tensor::from_data(TensorData::new(pred_rows, shape), device),
            Tensor::from_data(TensorData::new(true_rows, shape), device),
        ))
    }

    /// Per-element quality weights aligned with [`Batch::signal_pairs`].
    /// Rows without a quality annotation weigh 1.0.
    pub fn signal_quality_weights<B: Backend>(
        &self,
        modality: Modality,
        device: &B::Device,
    ) -> Result<Tensor<B, 2>> {
        let block = self
            .signal_block(modality)
            .ok_or(RnaProbeError::UnknownModality(modality))?;
        let mut weights = Vec::with_capacity(block.index.len() * self.pad_len);
        for &row in &block.index {
            weights.extend(std::iter::repeat(block.quality[row].unwrap_or(1.0)).take(self.pad_len));
        }
        Ok(Tensor::from_data(
            TensorData::new(weights, [block.index.len(), self.pad_len]),
            device,
        ))
    }

    /// Per-row quality weights aligned with [`Batch::pairing_pairs`],
    /// broadcastable over each matrix. Shape `[count, 1, 1]`.
    pub fn structure_quality_weights<B: Backend>(&self, device: &B::Device) -> Result<Tensor<B, 3>> {
        let block = self
            .structure
            .as_ref()
            .ok_or(RnaProbeError::UnknownModality(Modality::Structure))?;
        let weights: Vec<f32> = block
            .index
            .iter()
            .map(|&row| block.quality[row].unwrap_or(1.0))
            .collect();
        Ok(Tensor::from_data(
            TensorData::new(weights, [block.index.len(), 1, 1]),
            device,
        ))
    }

    /// Row indices of a modality as an Int tensor, for selecting the
    /// contributing rows out of a padded model output.
    pub fn index_tensor<B: Backend>(
        &self,
        modality: Modality,
        device: &B::Device,
    ) -> Tensor<B, 1, Int> {
        let index: Vec<i64> = self.index(modality).iter().map(|&i| i as i64).collect();
        let len = index.len();
        Tensor::from_data(TensorData::new(index, [len]), device)
    }

    /// Write model outputs into the per-modality prediction blocks.
    ///
    /// Only modalities present in the batch receive anything; the rest of
    /// the predictions are ignored. Tensors must cover the whole padded
    /// batch.
    pub fn integrate_prediction<B: Backend>(&mut self, predictions: Predictions<B>) -> Result<()> {
        let (rows, pad_len) = (self.len(), self.pad_len);

        let signal_host = |modality: Modality, tensor: Tensor<B, 2>| -> Result<Vec<f32>> {
            let dims = tensor.dims();
            if dims != [rows, pad_len] {
                return Err(RnaProbeError::ShapeMismatch {
                    modality,
                    expected: rows * pad_len,
                    got: dims[0] * dims[1],
                });
            }
            Ok(tensor.into_data().iter::<f32>().collect())
        };

        if let Some(tensor) = predictions.dms {
            let host = signal_host(Modality::Dms, tensor)?;
            if let Some(block) = self.dms.as_mut() {
                block.pred = Some(host);
            }
        }
        if let Some(tensor) = predictions.shape {
            let host = signal_host(Modality::Shape, tensor)?;
            if let Some(block) = self.shape.as_mut() {
                block.pred = Some(host);
            }
        }
        if let Some(tensor) = predictions.structure {
            let dims = tensor.dims();
            if dims != [rows, pad_len, pad_len] {
                return Err(RnaProbeError::ShapeMismatch {
                    modality: Modality::Structure,
                    expected: rows * pad_len * pad_len,
                    got: dims.iter().product(),
                });
            }
            if let Some(block) = self.structure.as_mut() {
                block.pred = Some(tensor.into_data().iter::<f32>().collect());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::encoding;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn dp_a() -> Datapoint {
        // G at position 1 carries UKN by construction
        Datapoint::new("A", "AGCAA")
            .unwrap()
            .with_dms(SignalData::new(vec![0.1, UKN, 0.3, 0.0, 0.9]))
            .unwrap()
    }

    fn dp_b() -> Datapoint {
        Datapoint::new("B", "ACG")
            .unwrap()
            .with_shape(
                SignalData::new(vec![0.2, 0.4, 0.6])
                    .with_quality(0.5)
                    .unwrap(),
            )
            .unwrap()
    }

    fn dp_s() -> Datapoint {
        Datapoint::new("S", "ACGU")
            .unwrap()
            .with_structure(PairingData::from_pairs(&[[0, 3]], 4).unwrap())
            .unwrap()
    }

    #[test]
    fn test_concrete_collation_scenario() {
        let dps = vec![dp_a(), dp_b()];
        let batch = Batch::from_datapoints(
            &dps,
            &[Modality::Dms, Modality::Shape],
            Some(5),
        )
        .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.pad_len(), 5);
        assert_eq!(batch.index(Modality::Dms), &[0]);
        assert_eq!(batch.index(Modality::Shape), &[1]);

        // B's dms row is entirely UKN; A's shape row is entirely UKN
        let dms_row_b = batch.get(Modality::Dms, Part::True, Some(1)).unwrap();
        assert!(dms_row_b.iter().all(|&v| v == UKN));
        let shape_row_a = batch.get(Modality::Shape, Part::True, Some(0)).unwrap();
        assert!(shape_row_a.iter().all(|&v| v == UKN));
    }

    #[test]
    fn test_padding_invariant() {
        let dps = vec![dp_a(), dp_b()];
        let batch = Batch::from_datapoints(&dps, &Modality::ALL, None).unwrap();

        // every position past B's length is UKN in the shape block
        let shape_row_b = batch.get(Modality::Shape, Part::True, Some(1)).unwrap();
        assert!(shape_row_b[3..].iter().all(|&v| v == UKN));
        // and PAD_TOKEN in the sequence
        let seq: Vec<i64> = batch
            .sequence_tensor::<TestBackend>(&Default::default())
            .into_data()
            .iter::<i64>()
            .collect();
        assert_eq!(seq[5 + 3], PAD_TOKEN);
        assert_eq!(seq[5 + 4], PAD_TOKEN);
    }

    #[test]
    fn test_padding_too_small() {
        let dps = vec![dp_a()];
        let err = Batch::from_datapoints(&dps, &[Modality::Dms], Some(3)).unwrap_err();
        assert!(matches!(
            err,
            RnaProbeError::PaddingTooSmall {
                requested: 3,
                required: 5
            }
        ));
    }

    #[test]
    fn test_round_trip_reproduces_datapoints() {
        let dps = vec![dp_a(), dp_b(), dp_s()];
        let batch = Batch::from_datapoints(&dps, &Modality::ALL, Some(8)).unwrap();
        let recovered = batch.to_datapoints().unwrap();

        assert_eq!(recovered.len(), dps.len());
        for (original, restored) in dps.iter().zip(&recovered) {
            assert_eq!(original.reference(), restored.reference());
            assert_eq!(original.sequence(), restored.sequence());
            assert_eq!(original.data_types(), restored.data_types());
            for modality in original.data_types() {
                assert_eq!(
                    original.get(modality, Part::True).unwrap(),
                    restored.get(modality, Part::True).unwrap()
                );
            }
        }
        // quality survives the round trip
        assert_eq!(recovered[1].quality(Modality::Shape), Some(0.5));
    }

    #[test]
    fn test_structure_padding_keeps_exterior_unknown() {
        let batch = Batch::from_datapoints(&[dp_s()], &[Modality::Structure], Some(6)).unwrap();
        let matrix = batch.get(Modality::Structure, Part::True, Some(0)).unwrap();
        // interior cell (0, 3) is paired, exterior col 5 is UKN
        assert_eq!(matrix[3], 1.0);
        assert_eq!(matrix[5], UKN);
        assert_eq!(matrix[5 * 6 + 5], UKN);
    }

    #[test]
    fn test_count_and_contains() {
        let dps = vec![dp_a(), dp_b(), dp_a()];
        let batch = Batch::from_datapoints(&dps, &Modality::ALL, None).unwrap();
        assert_eq!(batch.count(Modality::Dms), 2);
        assert_eq!(batch.count(Modality::Shape), 1);
        assert_eq!(batch.count(Modality::Structure), 0);
        assert!(batch.contains(Modality::Dms));
        assert!(!batch.contains(Modality::Structure));
    }

    #[test]
    fn test_integrate_prediction_and_pairs() {
        let device = Default::default();
        let dps = vec![dp_a(), dp_b()];
        let mut batch =
            Batch::from_datapoints(&dps, &[Modality::Dms, Modality::Shape], None).unwrap();

        let mut predictions = Predictions::<TestBackend>::new();
        predictions.dms = Some(Tensor::full([2, 5], 0.25, &device));
        predictions.shape = Some(Tensor::full([2, 5], 0.75, &device));
        batch.integrate_prediction(predictions).unwrap();

        let (pred, truth) = batch.signal_pairs::<TestBackend>(Modality::Dms, &device).unwrap();
        assert_eq!(pred.dims(), [1, 5]);
        assert_eq!(pred.dims(), truth.dims());
        let pred_host: Vec<f32> = pred.into_data().iter::<f32>().collect();
        assert!(pred_host.iter().all(|&v| v == 0.25));

        // predictions flow back to the per-datapoint view
        let recovered = batch.to_datapoints().unwrap();
        assert_eq!(
            recovered[0].get(Modality::Dms, Part::Pred).unwrap(),
            &[0.25; 5]
        );
        assert!(!recovered[0].contains(Modality::Shape, Part::Pred));
    }

    #[test]
    fn test_integrate_prediction_shape_mismatch() {
        let device = Default::default();
        let mut batch = Batch::from_datapoints(&[dp_a()], &[Modality::Dms], None).unwrap();
        let mut predictions = Predictions::<TestBackend>::new();
        predictions.dms = Some(Tensor::zeros([1, 3], &device));
        assert!(batch.integrate_prediction(predictions).is_err());
    }

    #[test]
    fn test_quality_weights_shapes() {
        let device = Default::default();
        let dps = vec![dp_a(), dp_b()];
        let batch = Batch::from_datapoints(&dps, &Modality::ALL, None).unwrap();

        let weights = batch
            .signal_quality_weights::<TestBackend>(Modality::Shape, &device)
            .unwrap();
        assert_eq!(weights.dims(), [1, 5]);
        let host: Vec<f32> = weights.into_data().iter::<f32>().collect();
        assert!(host.iter().all(|&w| w == 0.5));

        // dms rows have no quality annotation: weight 1.0
        let weights = batch
            .signal_quality_weights::<TestBackend>(Modality::Dms, &device)
            .unwrap();
        let host: Vec<f32> = weights.into_data().iter::<f32>().collect();
        assert!(host.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_structure_pairs_round_trip_pairs() {
        let device = Default::default();
        let mut batch =
            Batch::from_datapoints(&[dp_s()], &[Modality::Structure], Some(5)).unwrap();
        let mut predictions = Predictions::<TestBackend>::new();
        predictions.structure = Some(Tensor::zeros([1, 5, 5], &device));
        batch.integrate_prediction(predictions).unwrap();

        let recovered = batch.to_datapoints().unwrap();
        let truth = recovered[0].get(Modality::Structure, Part::True).unwrap();
        assert_eq!(encoding::matrix_to_pairs(truth, 4), vec![[0, 3]]);
    }
}
