pub mod batch;
pub mod datapoint;
pub mod encoding;
pub mod loader;
pub mod preprocessing;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel marking "no ground truth at this position".
///
/// Signals live in [0, 1] and pairing matrices in {0, 1}, so this value can
/// never collide with a legitimate measurement. Every metric and loss masks
/// it out before reducing.
pub const UKN: f32 = -1000.0;

/// Value that DMS predictions at G/U bases are forced to on the predict
/// path. G and U are chemically unable to produce a DMS signal.
pub const VAL_GU: f32 = 0.0;

/// Integer code used to pad sequences (the `X` symbol).
pub const PAD_TOKEN: i64 = 0;

/// Alphabet size including the padding symbol.
pub const NUM_TOKENS: usize = 5;

/// The three data types a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Dms,
    Shape,
    Structure,
}

impl Modality {
    pub const ALL: [Modality; 3] = [Modality::Dms, Modality::Shape, Modality::Structure];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Dms => "dms",
            Modality::Shape => "shape",
            Modality::Structure => "structure",
        }
    }

    /// Per-base signals are 1-D over the sequence; structure is an L×L matrix.
    pub fn is_signal(&self) -> bool {
        matches!(self, Modality::Dms | Modality::Shape)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dms" => Ok(Modality::Dms),
            "shape" => Ok(Modality::Shape),
            "structure" => Ok(Modality::Structure),
            other => Err(format!("unknown data type: {other}")),
        }
    }
}

/// Which side of a modality to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    True,
    Pred,
}

/// One raw record as it arrives from a dataset file.
///
/// A field holding `null` means "modality absent", not "present with unknown
/// value". `null` entries *inside* a signal array mark single positions with
/// no ground truth and become [`UKN`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataRecord {
    /// Unique sequence id
    pub reference: String,
    /// Nucleotide sequence
    pub sequence: String,

    /// Per-base DMS reactivity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dms: Option<Vec<Option<f32>>>,
    /// Per-base SHAPE reactivity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<Option<f32>>>,
    /// Base pairs of the secondary structure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structure: Option<Vec<[usize; 2]>>,

    /// Per-base measurement error of the DMS signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_dms: Option<Vec<Option<f32>>>,
    /// Per-base measurement error of the SHAPE signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_shape: Option<Vec<Option<f32>>>,

    /// Scalar quality score of the DMS measurement, in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_dms: Option<f32>,
    /// Scalar quality score of the SHAPE measurement, in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_shape: Option<f32>,
    /// Scalar quality score of the structure annotation, in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_structure: Option<f32>,
}

impl DataRecord {
    pub fn new(reference: impl Into<String>, sequence: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            sequence: sequence.into(),
            dms: None,
            shape: None,
            structure: None,
            error_dms: None,
            error_shape: None,
            quality_dms: None,
            quality_shape: None,
            quality_structure: None,
        }
    }

    /// Modalities this record actually carries.
    pub fn present_modalities(&self) -> Vec<Modality> {
        let mut out = Vec::new();
        if self.dms.is_some() {
            out.push(Modality::Dms);
        }
        if self.shape.is_some() {
            out.push(Modality::Shape);
        }
        if self.structure.is_some() {
            out.push(Modality::Structure);
        }
        out
    }
}

/// Dataset split configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitConfig {
    /// Training set ratio
    pub train_ratio: f32,
    /// Validation set ratio
    pub val_ratio: f32,
    /// Test set ratio
    pub test_ratio: f32,
    /// Random seed
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            val_ratio: 0.1,
            test_ratio: 0.1,
            seed: 2026,
        }
    }
}

/// Dataset container
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// Training datapoints
    pub train: Vec<datapoint::Datapoint>,
    /// Validation datapoints
    pub val: Vec<datapoint::Datapoint>,
    /// Test datapoints
    pub test: Vec<datapoint::Datapoint>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of datapoints across splits
    pub fn total_samples(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// Number of datapoints carrying a given modality, across splits
    pub fn count_modality(&self, modality: Modality) -> usize {
        let count = |data: &[datapoint::Datapoint]| {
            data.iter()
                .filter(|dp| dp.contains(modality, Part::True))
                .count()
        };
        count(&self.train) + count(&self.val) + count(&self.test)
    }

    /// Longest sequence across splits, 0 if empty
    pub fn max_sequence_length(&self) -> usize {
        self.train
            .iter()
            .chain(&self.val)
            .chain(&self.test)
            .map(|dp| dp.length())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_round_trip() {
        for m in Modality::ALL {
            assert_eq!(m.as_str().parse::<Modality>().unwrap(), m);
        }
        assert!("reactivity".parse::<Modality>().is_err());
    }

    #[test]
    fn test_record_present_modalities() {
        let mut record = DataRecord::new("ref1", "ACGU");
        assert!(record.present_modalities().is_empty());

        record.shape = Some(vec![Some(0.1), Some(0.2), None, Some(0.4)]);
        assert_eq!(record.present_modalities(), vec![Modality::Shape]);
    }

    #[test]
    fn test_sentinel_outside_legal_ranges() {
        // Signals are clipped to [0, 1] and pairing matrices hold {0, 1};
        // the sentinel must not be reachable from either range.
        assert!(UKN < 0.0);
        assert!(UKN != 0.0 && UKN != 1.0);
        assert!((0.0..=1.0).contains(&VAL_GU));
    }
}
