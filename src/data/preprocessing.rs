use crate::data::datapoint::{Datapoint, PairingData, SignalData};
use crate::data::loader::{DataLoader, LoaderConfig};
use crate::data::{DataRecord, Dataset, Modality, Part, SplitConfig, UKN};
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::Path;
use tracing::{info, warn};

/// Which kind of dataset the caller declares to be loading.
///
/// Single-modality kinds require every record to carry that modality;
/// `Multimodal` accepts any record with at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Dms,
    Shape,
    Structure,
    Multimodal,
}

impl DatasetKind {
    /// The modality every record must carry, if the kind pins one.
    pub fn required_modality(&self) -> Option<Modality> {
        match self {
            DatasetKind::Dms => Some(Modality::Dms),
            DatasetKind::Shape => Some(Modality::Shape),
            DatasetKind::Structure => Some(Modality::Structure),
            DatasetKind::Multimodal => None,
        }
    }
}

/// Map a raw signal array onto values, with missing entries becoming UKN.
fn signal_values(raw: &[Option<f32>]) -> Vec<f32> {
    raw.iter()
        .map(|v| match v {
            Some(x) if !x.is_nan() => *x,
            _ => UKN,
        })
        .collect()
}

/// Validate one record into a datapoint.
///
/// Consistency failures (length mismatches, DMS signal on a G/U base,
/// out-of-range pairs or quality scores) are fatal, never repaired.
pub fn convert_record(record: &DataRecord) -> Result<Datapoint> {
    let mut dp = Datapoint::new(&record.reference, &record.sequence)
        .with_context(|| format!("invalid sequence for {:?}", record.reference))?;
    let length = dp.length();

    if let Some(raw) = &record.dms {
        let mut data = SignalData::new(signal_values(raw));
        if let Some(error) = &record.error_dms {
            data = data.with_error(signal_values(error))?;
        }
        if let Some(quality) = record.quality_dms {
            data = data.with_quality(quality)?;
        }
        dp = dp.with_dms(data)?;
    }

    if let Some(raw) = &record.shape {
        let mut data = SignalData::new(signal_values(raw));
        if let Some(error) = &record.error_shape {
            data = data.with_error(signal_values(error))?;
        }
        if let Some(quality) = record.quality_shape {
            data = data.with_quality(quality)?;
        }
        dp = dp.with_shape(data)?;
    }

    if let Some(pairs) = &record.structure {
        let mut data = PairingData::from_pairs(pairs, length)
            .with_context(|| format!("invalid base pairs for {:?}", record.reference))?;
        if let Some(quality) = record.quality_structure {
            data = data.with_quality(quality)?;
        }
        dp = dp.with_structure(data)?;
    }

    Ok(dp)
}

/// Convert a slice of records, failing on the first inconsistent one.
pub fn convert_to_datapoints(records: &[DataRecord]) -> Result<Vec<Datapoint>> {
    records.iter().map(convert_record).collect()
}

/// Load a dataset file as the declared kind.
///
/// This is the explicit factory over the dataset variants: the caller names
/// what the file is supposed to contain, and a record missing the declared
/// modality is an error rather than a silent skip.
pub fn load_dataset<P: AsRef<Path>>(
    path: P,
    kind: DatasetKind,
    config: &LoaderConfig,
) -> Result<Vec<Datapoint>> {
    let records = DataLoader::with_config(config.clone()).load(path)?;
    let datapoints = convert_to_datapoints(&records)?;

    for dp in &datapoints {
        match kind.required_modality() {
            Some(required) => {
                if !dp.contains(required, Part::True) {
                    anyhow::bail!(
                        "record {:?} is missing the declared {} data",
                        dp.reference(),
                        required
                    );
                }
            }
            None => {
                if dp.data_types().is_empty() {
                    anyhow::bail!("record {:?} carries no data type at all", dp.reference());
                }
            }
        }
    }

    info!("Validated {} datapoints as {:?} data", datapoints.len(), kind);
    Ok(datapoints)
}

/// Shuffle and split datapoints into train/val/test sets.
pub fn split_dataset(mut datapoints: Vec<Datapoint>, config: &SplitConfig) -> Dataset {
    info!("Splitting dataset with seed {}", config.seed);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    datapoints.shuffle(&mut rng);

    let n = datapoints.len();
    let n_train = (n as f32 * config.train_ratio) as usize;
    let n_val = (n as f32 * config.val_ratio) as usize;
    if n_train + n_val > n {
        warn!("Split ratios exceed 1.0; test set will be empty");
    }

    let mut dataset = Dataset::new();
    for (i, dp) in datapoints.into_iter().enumerate() {
        if i < n_train {
            dataset.train.push(dp);
        } else if i < n_train + n_val {
            dataset.val.push(dp);
        } else {
            dataset.test.push(dp);
        }
    }

    info!(
        "Dataset split: train={}, val={}, test={}",
        dataset.train.len(),
        dataset.val.len(),
        dataset.test.len()
    );

    let log_distribution = |name: &str, data: &[Datapoint]| {
        let count = |m: Modality| data.iter().filter(|dp| dp.contains(m, Part::True)).count();
        info!(
            "{} distribution: dms={}, shape={}, structure={}",
            name,
            count(Modality::Dms),
            count(Modality::Shape),
            count(Modality::Structure)
        );
    };

    log_distribution("Train", &dataset.train);
    log_distribution("Val", &dataset.val);
    log_distribution("Test", &dataset.test);

    dataset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dms_record() -> DataRecord {
        let mut record = DataRecord::new("r1", "ACGU");
        // nulls inside the array become UKN; G/U positions must be null
        record.dms = Some(vec![Some(0.1), Some(0.2), None, None]);
        record.quality_dms = Some(0.8);
        record
    }

    #[test]
    fn test_convert_record_maps_nulls_to_ukn() {
        let dp = convert_record(&dms_record()).unwrap();
        assert_eq!(
            dp.get(Modality::Dms, Part::True).unwrap(),
            &[0.1, 0.2, UKN, UKN]
        );
        assert_eq!(dp.quality(Modality::Dms), Some(0.8));
    }

    #[test]
    fn test_convert_record_rejects_gu_signal() {
        let mut record = DataRecord::new("bad", "AG");
        record.dms = Some(vec![Some(0.1), Some(0.9)]);
        assert!(convert_record(&record).is_err());
    }

    #[test]
    fn test_convert_record_rejects_length_mismatch() {
        let mut record = DataRecord::new("bad", "ACGU");
        record.shape = Some(vec![Some(0.1), Some(0.2)]);
        assert!(convert_record(&record).is_err());
    }

    #[test]
    fn test_convert_record_builds_structure() {
        let mut record = DataRecord::new("s1", "ACGU");
        record.structure = Some(vec![[0, 3]]);
        let dp = convert_record(&record).unwrap();
        let matrix = dp.get(Modality::Structure, Part::True).unwrap();
        assert_eq!(matrix[3], 1.0);
        assert_eq!(matrix[3 * 4], 1.0);
    }

    #[test]
    fn test_dataset_kind_required_modality() {
        assert_eq!(DatasetKind::Dms.required_modality(), Some(Modality::Dms));
        assert_eq!(DatasetKind::Multimodal.required_modality(), None);
    }

    #[test]
    fn test_split_is_deterministic() {
        let datapoints: Vec<Datapoint> = (0..50)
            .map(|i| convert_record(&{
                let mut r = DataRecord::new(format!("r{i}"), "ACCA");
                r.shape = Some(vec![Some(0.1), Some(0.2), Some(0.3), Some(0.4)]);
                r
            })
            .unwrap())
            .collect();

        let config = SplitConfig {
            train_ratio: 0.8,
            val_ratio: 0.1,
            test_ratio: 0.1,
            seed: 7,
        };
        let a = split_dataset(datapoints.clone(), &config);
        let b = split_dataset(datapoints, &config);

        assert_eq!(a.train.len(), 40);
        assert_eq!(a.val.len(), 5);
        assert_eq!(a.test.len(), 5);
        let refs = |d: &Dataset| {
            d.train
                .iter()
                .map(|dp| dp.reference().to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(refs(&a), refs(&b));
    }
}
