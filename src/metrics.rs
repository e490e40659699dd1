//! Masked evaluation metrics.
//!
//! Every metric filters positions where the true value equals [`UKN`] before
//! reducing, and returns `None` when no position survives the mask. A `None`
//! score is a defined "no signal" result, not an error; aggregating callers
//! must skip it rather than count it as zero.

use crate::data::{Modality, UKN};

/// Default probability threshold for binarizing pairing predictions.
pub const F1_THRESHOLD: f64 = 0.5;

/// Keep only positions with known ground truth.
fn masked(pred: &[f32], truth: &[f32]) -> Option<(Vec<f64>, Vec<f64>)> {
    debug_assert_eq!(pred.len(), truth.len());
    let mut p = Vec::new();
    let mut t = Vec::new();
    for (&pi, &ti) in pred.iter().zip(truth) {
        if ti != UKN {
            p.push(pi as f64);
            t.push(ti as f64);
        }
    }
    if t.is_empty() {
        None
    } else {
        Some((p, t))
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// F1 score of a binarized pairing matrix.
///
/// When neither prediction nor truth contains a positive, the structure is
/// correctly predicted as fully unpaired and the score is 1.0 by convention.
pub fn f1(pred: &[f32], truth: &[f32], threshold: f64) -> Option<f64> {
    let (pred, truth) = masked(pred, truth)?;
    let pred: Vec<f64> = pred
        .iter()
        .map(|&v| if v > threshold { 1.0 } else { 0.0 })
        .collect();

    let sum_pair: f64 = pred.iter().sum::<f64>() + truth.iter().sum::<f64>();
    if sum_pair == 0.0 {
        return Some(1.0);
    }
    let overlap: f64 = pred.iter().zip(&truth).map(|(p, t)| p * t).sum();
    Some(2.0 * overlap / sum_pair)
}

/// Coefficient of determination.
pub fn r2(pred: &[f32], truth: &[f32]) -> Option<f64> {
    let (pred, truth) = masked(pred, truth)?;
    let t_mean = mean(&truth);
    let ss_res: f64 = pred.iter().zip(&truth).map(|(p, t)| (t - p) * (t - p)).sum();
    let ss_tot: f64 = truth.iter().map(|t| (t - t_mean) * (t - t_mean)).sum();
    Some(1.0 - ss_res / ss_tot)
}

/// Pearson correlation coefficient.
pub fn pearson(pred: &[f32], truth: &[f32]) -> Option<f64> {
    let (pred, truth) = masked(pred, truth)?;
    let p_mean = mean(&pred);
    let t_mean = mean(&truth);
    let n = pred.len() as f64;

    let cov: f64 = pred
        .iter()
        .zip(&truth)
        .map(|(p, t)| (p - p_mean) * (t - t_mean))
        .sum::<f64>()
        / n;
    let p_var = pred.iter().map(|p| (p - p_mean) * (p - p_mean)).sum::<f64>() / n;
    let t_var = truth.iter().map(|t| (t - t_mean) * (t - t_mean)).sum::<f64>() / n;

    Some(cov / (p_var.sqrt() * t_var.sqrt()))
}

/// Mean absolute error.
pub fn mae(pred: &[f32], truth: &[f32]) -> Option<f64> {
    let (pred, truth) = masked(pred, truth)?;
    Some(mean(
        &pred
            .iter()
            .zip(&truth)
            .map(|(p, t)| (t - p).abs())
            .collect::<Vec<_>>(),
    ))
}

/// The registered metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    F1,
    R2,
    Pearson,
    Mae,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::F1 => "f1",
            Metric::R2 => "r2",
            Metric::Pearson => "pearson",
            Metric::Mae => "mae",
        }
    }

    pub fn eval(&self, pred: &[f32], truth: &[f32]) -> Option<f64> {
        match self {
            Metric::F1 => f1(pred, truth, F1_THRESHOLD),
            Metric::R2 => r2(pred, truth),
            Metric::Pearson => pearson(pred, truth),
            Metric::Mae => mae(pred, truth),
        }
    }
}

/// Metrics evaluated for a modality.
pub fn metrics_for(modality: Modality) -> &'static [Metric] {
    match modality {
        Modality::Dms | Modality::Shape => &[Metric::R2, Metric::Pearson, Metric::Mae],
        Modality::Structure => &[Metric::F1],
    }
}

/// The metric used to rank and select models for a modality.
pub fn reference_metric(modality: Modality) -> Metric {
    match modality {
        Modality::Dms | Modality::Shape => Metric::Mae,
        Modality::Structure => Metric::F1,
    }
}

/// +1.0 if a larger reference metric is better, -1.0 if smaller is better.
pub fn reference_metric_sign(modality: Modality) -> f64 {
    match reference_metric(modality) {
        Metric::Mae => -1.0,
        _ => 1.0,
    }
}

/// Mean of the scores that carry a signal, `None` if none do.
pub fn mean_ignoring_missing(scores: &[Option<f64>]) -> Option<f64> {
    let valid: Vec<f64> = scores.iter().filter_map(|s| *s).collect();
    if valid.is_empty() {
        None
    } else {
        Some(mean(&valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_unknown_gives_no_signal() {
        let truth = vec![UKN, UKN, UKN];
        let pred = vec![0.1, 0.2, 0.3];
        assert_eq!(mae(&pred, &truth), None);
        assert_eq!(r2(&pred, &truth), None);
        assert_eq!(pearson(&pred, &truth), None);
        assert_eq!(f1(&pred, &truth, F1_THRESHOLD), None);
    }

    #[test]
    fn test_masking_is_idempotent() {
        // Metrics on a superset with extra all-UKN positions must equal
        // metrics on the subset with those positions removed.
        let truth_small = vec![0.2f32, 0.6, 0.9];
        let pred_small = vec![0.3f32, 0.5, 0.8];
        let truth_big = vec![0.2f32, UKN, 0.6, 0.9, UKN];
        let pred_big = vec![0.3f32, 0.99, 0.5, 0.8, 0.01];

        assert_eq!(mae(&pred_small, &truth_small), mae(&pred_big, &truth_big));
        assert_eq!(r2(&pred_small, &truth_small), r2(&pred_big, &truth_big));
        assert_eq!(
            pearson(&pred_small, &truth_small),
            pearson(&pred_big, &truth_big)
        );
    }

    #[test]
    fn test_f1_empty_case_is_one() {
        let truth = vec![0.0f32; 9];
        let pred = vec![0.1f32; 9]; // below threshold, so no predicted pair
        assert_eq!(f1(&pred, &truth, F1_THRESHOLD), Some(1.0));
    }

    #[test]
    fn test_f1_counts_overlap() {
        let truth = vec![1.0f32, 0.0, 1.0, 0.0];
        let pred = vec![0.9f32, 0.8, 0.2, 0.1];
        // one true positive, two predicted positives, two actual positives
        let score = f1(&pred, &truth, F1_THRESHOLD).unwrap();
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_r2_perfect_prediction() {
        let truth = vec![0.1f32, 0.5, 0.9];
        let score = r2(&truth, &truth).unwrap();
        assert!((score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_pearson_perfect_anticorrelation() {
        let truth = vec![0.0f32, 0.5, 1.0];
        let pred = vec![1.0f32, 0.5, 0.0];
        let score = pearson(&pred, &truth).unwrap();
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mae_simple() {
        let truth = vec![0.0f32, 1.0];
        let pred = vec![0.5f32, 0.5];
        assert_eq!(mae(&pred, &truth), Some(0.5));
    }

    #[test]
    fn test_registry() {
        assert!(metrics_for(Modality::Structure).contains(&Metric::F1));
        assert!(!metrics_for(Modality::Dms).contains(&Metric::F1));
        assert_eq!(reference_metric(Modality::Dms), Metric::Mae);
        assert_eq!(reference_metric_sign(Modality::Dms), -1.0);
        assert_eq!(reference_metric_sign(Modality::Structure), 1.0);
    }

    #[test]
    fn test_mean_ignoring_missing() {
        assert_eq!(
            mean_ignoring_missing(&[Some(1.0), None, Some(3.0)]),
            Some(2.0)
        );
        assert_eq!(mean_ignoring_missing(&[None, None]), None);
    }
}
