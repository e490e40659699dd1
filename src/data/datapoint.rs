//! Per-sequence annotation containers.

use std::collections::BTreeMap;

use crate::data::{encoding, Modality, Part, UKN};
use crate::error::{Result, RnaProbeError};
use crate::metrics;

/// Per-sample metric scores: modality -> metric name -> score.
///
/// `None` means the metric had no non-UKN position to score.
pub type MetricsPack = BTreeMap<Modality, BTreeMap<&'static str, Option<f64>>>;

/// One per-base signal modality (`dms` or `shape`) of one sequence.
///
/// `values` holds the ground truth with [`UKN`] where no measurement exists;
/// `pred` stays empty until a prediction is integrated and, once set, always
/// matches the shape of `values`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalData {
    values: Vec<f32>,
    pred: Option<Vec<f32>>,
    error: Option<Vec<f32>>,
    quality: Option<f32>,
}

impl SignalData {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            pred: None,
            error: None,
            quality: None,
        }
    }

    pub fn with_error(mut self, error: Vec<f32>) -> Result<Self> {
        if error.len() != self.values.len() {
            return Err(RnaProbeError::consistency(
                "<signal>",
                format!(
                    "error array has {} elements, values have {}",
                    error.len(),
                    self.values.len()
                ),
            ));
        }
        self.error = Some(error);
        Ok(self)
    }

    pub fn with_quality(mut self, quality: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&quality) {
            return Err(RnaProbeError::consistency(
                "<signal>",
                format!("quality score {quality} is outside [0, 1]"),
            ));
        }
        self.quality = Some(quality);
        Ok(self)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn pred(&self) -> Option<&[f32]> {
        self.pred.as_deref()
    }

    pub fn error(&self) -> Option<&[f32]> {
        self.error.as_deref()
    }

    pub fn quality(&self) -> Option<f32> {
        self.quality
    }
}

/// The pairing-structure modality of one sequence, stored as a row-major
/// L×L matrix with a `{0, 1}` interior.
#[derive(Debug, Clone, PartialEq)]
pub struct PairingData {
    matrix: Vec<f32>,
    pred: Option<Vec<f32>>,
    quality: Option<f32>,
}

impl PairingData {
    pub fn new(matrix: Vec<f32>) -> Self {
        Self {
            matrix,
            pred: None,
            quality: None,
        }
    }

    /// Build from a base-pair list for a sequence of the given length.
    pub fn from_pairs(base_pairs: &[[usize; 2]], length: usize) -> Result<Self> {
        let matrix = encoding::pairs_to_matrix(base_pairs, length, length, UKN)?;
        Ok(Self::new(matrix))
    }

    pub fn with_quality(mut self, quality: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&quality) {
            return Err(RnaProbeError::consistency(
                "<structure>",
                format!("quality score {quality} is outside [0, 1]"),
            ));
        }
        self.quality = Some(quality);
        Ok(self)
    }

    pub fn matrix(&self) -> &[f32] {
        &self.matrix
    }

    pub fn pred(&self) -> Option<&[f32]> {
        self.pred.as_deref()
    }

    pub fn quality(&self) -> Option<f32> {
        self.quality
    }
}

/// One sequence with whichever of the three modalities are available.
///
/// `reference`, `sequence` and the true values are immutable after
/// construction; only predictions and the metrics pack are attached later.
#[derive(Debug, Clone)]
pub struct Datapoint {
    reference: String,
    sequence: Vec<i64>,
    dms: Option<SignalData>,
    shape: Option<SignalData>,
    structure: Option<PairingData>,
    metrics: Option<MetricsPack>,
}

impl Datapoint {
    pub fn new(reference: impl Into<String>, sequence: &str) -> Result<Self> {
        Ok(Self::from_codes(reference, encoding::encode(sequence)?))
    }

    /// Build from already-encoded integer codes (e.g. a batch row).
    pub fn from_codes(reference: impl Into<String>, sequence: Vec<i64>) -> Self {
        Self {
            reference: reference.into(),
            sequence,
            dms: None,
            shape: None,
            structure: None,
            metrics: None,
        }
    }

    /// Attach the DMS modality.
    ///
    /// G and U bases cannot produce a DMS signal; a non-UKN value there is
    /// corrupt input and is rejected, never repaired.
    pub fn with_dms(mut self, data: SignalData) -> Result<Self> {
        self.check_signal_len(Modality::Dms, data.values.len())?;
        let (g, u) = (encoding::code_g(), encoding::code_u());
        for (position, (&code, &value)) in self.sequence.iter().zip(&data.values).enumerate() {
            if (code == g || code == u) && value != UKN {
                return Err(RnaProbeError::consistency(
                    &self.reference,
                    format!("dms value {value} at G/U base (position {position}) is not UKN"),
                ));
            }
        }
        self.dms = Some(data);
        Ok(self)
    }

    pub fn with_shape(mut self, data: SignalData) -> Result<Self> {
        self.check_signal_len(Modality::Shape, data.values.len())?;
        self.shape = Some(data);
        Ok(self)
    }

    pub fn with_structure(mut self, data: PairingData) -> Result<Self> {
        let expected = self.length() * self.length();
        if data.matrix.len() != expected {
            return Err(RnaProbeError::ShapeMismatch {
                modality: Modality::Structure,
                expected,
                got: data.matrix.len(),
            });
        }
        self.structure = Some(data);
        Ok(self)
    }

    fn check_signal_len(&self, modality: Modality, got: usize) -> Result<()> {
        if got != self.length() {
            return Err(RnaProbeError::ShapeMismatch {
                modality,
                expected: self.length(),
                got,
            });
        }
        Ok(())
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn sequence(&self) -> &[i64] {
        &self.sequence
    }

    pub fn length(&self) -> usize {
        self.sequence.len()
    }

    /// The subset of modalities actually present, derived on demand.
    pub fn data_types(&self) -> Vec<Modality> {
        Modality::ALL
            .into_iter()
            .filter(|&m| self.contains(m, Part::True))
            .collect()
    }

    pub fn dms(&self) -> Option<&SignalData> {
        self.dms.as_ref()
    }

    pub fn shape(&self) -> Option<&SignalData> {
        self.shape.as_ref()
    }

    pub fn structure(&self) -> Option<&PairingData> {
        self.structure.as_ref()
    }

    /// Flat view of one modality's values: length L for signals, L² for
    /// structure. Fails with `UnknownModality` when the container (or the
    /// requested part) is absent.
    pub fn get(&self, modality: Modality, part: Part) -> Result<&[f32]> {
        let missing = || RnaProbeError::UnknownModality(modality);
        match (modality, part) {
            (Modality::Dms, Part::True) => Ok(self.dms.as_ref().ok_or_else(missing)?.values()),
            (Modality::Dms, Part::Pred) => {
                self.dms.as_ref().and_then(|d| d.pred()).ok_or_else(missing)
            }
            (Modality::Shape, Part::True) => Ok(self.shape.as_ref().ok_or_else(missing)?.values()),
            (Modality::Shape, Part::Pred) => self
                .shape
                .as_ref()
                .and_then(|d| d.pred())
                .ok_or_else(missing),
            (Modality::Structure, Part::True) => {
                Ok(self.structure.as_ref().ok_or_else(missing)?.matrix())
            }
            (Modality::Structure, Part::Pred) => self
                .structure
                .as_ref()
                .and_then(|d| d.pred())
                .ok_or_else(missing),
        }
    }

    /// Whether the modality is present and the requested part is non-null.
    pub fn contains(&self, modality: Modality, part: Part) -> bool {
        self.get(modality, part).is_ok()
    }

    pub fn error(&self, modality: Modality) -> Option<&[f32]> {
        match modality {
            Modality::Dms => self.dms.as_ref().and_then(|d| d.error()),
            Modality::Shape => self.shape.as_ref().and_then(|d| d.error()),
            Modality::Structure => None,
        }
    }

    pub fn quality(&self, modality: Modality) -> Option<f32> {
        match modality {
            Modality::Dms => self.dms.as_ref().and_then(|d| d.quality()),
            Modality::Shape => self.shape.as_ref().and_then(|d| d.quality()),
            Modality::Structure => self.structure.as_ref().and_then(|d| d.quality()),
        }
    }

    /// Expected flat prediction length for a modality.
    fn expected_len(&self, modality: Modality) -> usize {
        if modality.is_signal() {
            self.length()
        } else {
            self.length() * self.length()
        }
    }

    /// Attach a prediction to an already-present modality.
    pub fn add_prediction(&mut self, modality: Modality, values: Vec<f32>) -> Result<()> {
        if !self.contains(modality, Part::True) {
            return Err(RnaProbeError::UnknownModality(modality));
        }
        let expected = self.expected_len(modality);
        if values.len() != expected {
            return Err(RnaProbeError::ShapeMismatch {
                modality,
                expected,
                got: values.len(),
            });
        }
        match modality {
            Modality::Dms => self.dms.as_mut().map(|d| d.pred = Some(values)),
            Modality::Shape => self.shape.as_mut().map(|d| d.pred = Some(values)),
            Modality::Structure => self.structure.as_mut().map(|d| d.pred = Some(values)),
        };
        Ok(())
    }

    /// Evaluate every registered metric for each modality that has both a
    /// true value and a prediction, in single-sample mode. The pack is
    /// stored on the datapoint and returned.
    pub fn compute_error_metrics_pack(&mut self) -> &MetricsPack {
        let mut pack = MetricsPack::new();
        for modality in Modality::ALL {
            let (truth, pred) = match (self.get(modality, Part::True), self.get(modality, Part::Pred))
            {
                (Ok(truth), Ok(pred)) => (truth, pred),
                _ => continue,
            };
            let mut scores = BTreeMap::new();
            for metric in metrics::metrics_for(modality) {
                scores.insert(metric.name(), metric.eval(pred, truth));
            }
            pack.insert(modality, scores);
        }
        self.metrics.insert(pack)
    }

    pub fn metrics(&self) -> Option<&MetricsPack> {
        self.metrics.as_ref()
    }

    /// Score of the modality's reference metric, if computed and non-empty.
    pub fn read_reference_metric(&self, modality: Modality) -> Option<f64> {
        let name = metrics::reference_metric(modality).name();
        self.metrics
            .as_ref()
            .and_then(|pack| pack.get(&modality))
            .and_then(|scores| scores.get(name).copied().flatten())
    }
}
