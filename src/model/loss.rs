use burn::prelude::*;
use tracing::debug;

use crate::data::batch::{Batch, Predictions};
use crate::data::{Modality, Part, UKN};

/// Clamp bound keeping the cross-entropy logarithms finite.
const BCE_EPS: f32 = 1e-7;

/// Count-weighted multi-task loss.
///
/// Per modality present in the batch: a masked per-element loss (MSE for the
/// reactivity signals, binary cross-entropy for the pairing matrices),
/// optionally reweighted by per-sample quality scores. Modalities are then
/// combined as `Σ count(m)·loss(m) / Σ count(m)`, which keeps the scale of
/// the total stable as the modality mix varies between batches. An absent
/// modality contributes to neither numerator nor denominator.
#[derive(Clone, Debug)]
pub struct MultiTaskLoss {
    /// Weight residuals by the per-sample quality score
    use_quality: bool,
}

impl MultiTaskLoss {
    pub fn new(use_quality: bool) -> Self {
        Self { use_quality }
    }

    /// Combined loss over the modalities the batch carries.
    ///
    /// Takes the live model output so gradients flow through the returned
    /// scalar; the batch contributes the truth, masks and weights.
    pub fn forward<B: Backend>(
        &self,
        batch: &Batch,
        predictions: &Predictions<B>,
        device: &B::Device,
    ) -> Tensor<B, 1> {
        let mut total = Tensor::<B, 1>::zeros([1], device);
        let mut weight_sum = 0.0f32;

        for modality in [Modality::Dms, Modality::Shape] {
            let pred = match modality {
                Modality::Dms => predictions.dms.clone(),
                _ => predictions.shape.clone(),
            };
            let Some(pred) = pred else { continue };
            if !batch.contains(modality) || masked_element_count(batch, modality) == 0 {
                continue;
            }
            let count = batch.count(modality) as f32;
            let loss = self.signal_loss(batch, modality, pred, device);
            total = total + loss.mul_scalar(count);
            weight_sum += count;
        }

        if let Some(pred) = predictions.structure.clone() {
            if batch.contains(Modality::Structure)
                && masked_element_count(batch, Modality::Structure) > 0
            {
                let count = batch.count(Modality::Structure) as f32;
                let loss = self.structure_loss(batch, pred, device);
                total = total + loss.mul_scalar(count);
                weight_sum += count;
            }
        }

        if weight_sum == 0.0 {
            debug!("batch carries no supervised modality; loss is zero");
            return total;
        }
        total.div_scalar(weight_sum)
    }

    /// Masked mean-squared error over one signal modality's index rows.
    fn signal_loss<B: Backend>(
        &self,
        batch: &Batch,
        modality: Modality,
        pred: Tensor<B, 2>,
        device: &B::Device,
    ) -> Tensor<B, 1> {
        let index = batch.index_tensor::<B>(modality, device);
        let pred = pred.select(0, index);
        let truth = batch
            .signal_true::<B>(modality, device)
            .unwrap_or_else(|_| unreachable!("caller checked contains()"));

        let mask = truth.clone().not_equal_elem(UKN).float();
        let count = mask.clone().sum();

        let mut residuals = (pred - truth).powf_scalar(2.0) * mask;
        if self.use_quality {
            let weights = batch
                .signal_quality_weights::<B>(modality, device)
                .unwrap_or_else(|_| unreachable!("caller checked contains()"));
            residuals = residuals * weights;
        }
        residuals.sum() / count
    }

    /// Masked binary cross-entropy over the pairing matrices.
    fn structure_loss<B: Backend>(
        &self,
        batch: &Batch,
        pred: Tensor<B, 3>,
        device: &B::Device,
    ) -> Tensor<B, 1> {
        let index = batch.index_tensor::<B>(Modality::Structure, device);
        let pred = pred.select(0, index);
        let truth = batch
            .pairing_true::<B>(device)
            .unwrap_or_else(|_| unreachable!("caller checked contains()"));

        let mask = truth.clone().not_equal_elem(UKN).float();
        let count = mask.clone().sum();

        let p = pred.clamp(BCE_EPS, 1.0 - BCE_EPS);
        let bce = (truth.clone() * p.clone().log()
            + truth.neg().add_scalar(1.0) * p.neg().add_scalar(1.0).log())
        .neg();

        let mut weighted = bce * mask;
        if self.use_quality {
            let dims = weighted.dims();
            let weights = batch
                .structure_quality_weights::<B>(device)
                .unwrap_or_else(|_| unreachable!("caller checked contains()"));
            weighted = weighted * weights.expand(dims);
        }
        weighted.sum() / count
    }
}

impl Default for MultiTaskLoss {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Number of non-UKN positions across the modality's contributing rows.
fn masked_element_count(batch: &Batch, modality: Modality) -> usize {
    let Ok(flat) = batch.get(modality, Part::True, None) else {
        return 0;
    };
    flat.iter().filter(|&&v| v != UKN).count()
}
