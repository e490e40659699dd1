//! Per-step score accumulators.
//!
//! Validation and test reporting collect per-datapoint scores into explicit
//! accumulator objects owned by the step that fills them, instead of ambient
//! mutable state shared across lifecycle hooks.

use std::collections::BTreeMap;

use crate::data::datapoint::MetricsPack;
use crate::data::Modality;
use crate::metrics;

/// Collects per-datapoint metric packs and reports masked means.
#[derive(Debug, Default)]
pub struct MetricAccumulator {
    /// modality -> metric name -> per-sample scores (None = no signal)
    scores: BTreeMap<Modality, BTreeMap<&'static str, Vec<Option<f64>>>>,
}

impl MetricAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one datapoint's metric pack into the running scores.
    pub fn accumulate(&mut self, pack: &MetricsPack) {
        for (&modality, metric_scores) in pack {
            let slot = self.scores.entry(modality).or_default();
            for (&name, &score) in metric_scores {
                slot.entry(name).or_default().push(score);
            }
        }
    }

    /// Mean of every metric, excluding no-signal samples from the average.
    pub fn means(&self) -> BTreeMap<Modality, BTreeMap<&'static str, Option<f64>>> {
        self.scores
            .iter()
            .map(|(&modality, metric_scores)| {
                let means = metric_scores
                    .iter()
                    .map(|(&name, scores)| (name, metrics::mean_ignoring_missing(scores)))
                    .collect();
                (modality, means)
            })
            .collect()
    }

    /// Mean of one modality's reference metric.
    pub fn reference_mean(&self, modality: Modality) -> Option<f64> {
        let name = metrics::reference_metric(modality).name();
        self.scores
            .get(&modality)
            .and_then(|metric_scores| metric_scores.get(name))
            .and_then(|scores| metrics::mean_ignoring_missing(scores))
    }

    /// Number of accumulated samples for a modality's reference metric.
    pub fn sample_count(&self, modality: Modality) -> usize {
        let name = metrics::reference_metric(modality).name();
        self.scores
            .get(&modality)
            .and_then(|metric_scores| metric_scores.get(name))
            .map(|scores| scores.iter().filter(|s| s.is_some()).count())
            .unwrap_or(0)
    }
}

/// Keeps the n best and n worst references by a modality's reference metric.
///
/// "Better" follows the metric's improvement direction, so mae ranks
/// ascending and f1 descending.
#[derive(Debug)]
pub struct BestWorstTracker {
    modality: Modality,
    n: usize,
    entries: Vec<(String, f64)>,
}

impl BestWorstTracker {
    pub fn new(modality: Modality, n: usize) -> Self {
        Self {
            modality,
            n,
            entries: Vec::new(),
        }
    }

    pub fn modality(&self) -> Modality {
        self.modality
    }

    /// Record one scored datapoint. No-signal datapoints are not ranked.
    pub fn record(&mut self, reference: &str, score: Option<f64>) {
        if let Some(score) = score {
            self.entries.push((reference.to_string(), score));
        }
    }

    fn sorted(&self) -> Vec<(String, f64)> {
        let sign = metrics::reference_metric_sign(self.modality);
        let mut entries = self.entries.clone();
        // best first
        entries.sort_by(|a, b| {
            (sign * b.1)
                .partial_cmp(&(sign * a.1))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        entries
    }

    /// The n best-scoring references.
    pub fn best(&self) -> Vec<(String, f64)> {
        let mut sorted = self.sorted();
        sorted.truncate(self.n);
        sorted
    }

    /// The n worst-scoring references.
    pub fn worst(&self) -> Vec<(String, f64)> {
        let sorted = self.sorted();
        let skip = sorted.len().saturating_sub(self.n);
        sorted.into_iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
