use crate::data::DataRecord;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Json,
    GzippedJson,
}

impl FileFormat {
    /// Detect file format from path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path.extension().and_then(|e| e.to_str());
        let stem = path.file_stem().and_then(|s| s.to_str());

        match (ext, stem) {
            (Some("gz"), Some(stem)) => {
                if stem.ends_with(".json") || stem.ends_with(".jsonl") {
                    Ok(FileFormat::GzippedJson)
                } else {
                    Err(anyhow::anyhow!("Cannot determine format of gzipped file"))
                }
            }
            (Some("json"), _) | (Some("jsonl"), _) => Ok(FileFormat::Json),
            _ => Err(anyhow::anyhow!("Unsupported file format")),
        }
    }

    /// Check if format is gzipped
    pub fn is_gzipped(&self) -> bool {
        matches!(self, FileFormat::GzippedJson)
    }
}

/// Data loader configuration
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Maximum number of records to load (0 = unlimited)
    pub max_records: usize,
    /// Progress logging interval, in records
    pub log_every: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_records: 0,
            log_every: 10000,
        }
    }
}

/// Loader for sequence records stored one JSON object per line
pub struct DataLoader {
    config: LoaderConfig,
}

impl DataLoader {
    /// Create new data loader with default config
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Create new data loader with custom config
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load records from file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Vec<DataRecord>> {
        let path = path.as_ref();
        info!("Loading data from {:?}", path);

        let format = FileFormat::from_path(path)?;
        debug!("Detected file format: {:?}", format);

        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        let records = if format.is_gzipped() {
            self.parse_records(BufReader::new(GzDecoder::new(file)))?
        } else {
            self.parse_records(BufReader::new(file))?
        };

        info!("Loaded {} records", records.len());
        Ok(records)
    }

    /// Parse records from a reader, one JSON object per line
    fn parse_records<R: Read>(&self, reader: BufReader<R>) -> Result<Vec<DataRecord>> {
        let mut records = Vec::new();
        let mut skipped = 0usize;

        for (line_number, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read line")?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<DataRecord>(&line) {
                Ok(record) => {
                    records.push(normalize_record(record));

                    if self.config.max_records > 0 && records.len() >= self.config.max_records {
                        warn!("Reached maximum record limit: {}", self.config.max_records);
                        break;
                    }
                    if records.len() % self.config.log_every == 0 {
                        debug!("Loaded {} records...", records.len());
                    }
                }
                Err(e) => {
                    warn!("Failed to parse record at line {}: {}", line_number + 1, e);
                    skipped += 1;
                }
            }
        }

        if skipped > 0 {
            warn!("Skipped {} malformed records", skipped);
        }
        Ok(records)
    }
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse degenerate annotations: an array of only nulls, or a NaN quality
/// score, means the modality is absent, not present-with-unknown-values.
fn normalize_record(mut record: DataRecord) -> DataRecord {
    let all_null = |values: &Option<Vec<Option<f32>>>| {
        values
            .as_ref()
            .is_some_and(|v| v.iter().all(|x| x.is_none() || x.is_some_and(f32::is_nan)))
    };

    if all_null(&record.dms) {
        record.dms = None;
        record.error_dms = None;
    }
    if all_null(&record.shape) {
        record.shape = None;
        record.error_shape = None;
    }
    for quality in [
        &mut record.quality_dms,
        &mut record.quality_shape,
        &mut record.quality_structure,
    ] {
        if quality.is_some_and(f32::is_nan) {
            *quality = None;
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_file_format_detection() {
        assert_eq!(FileFormat::from_path("data.json").unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_path("data.jsonl").unwrap(), FileFormat::Json);
        assert_eq!(
            FileFormat::from_path("data.json.gz").unwrap(),
            FileFormat::GzippedJson
        );
        assert!(FileFormat::from_path("data.csv").is_err());
    }

    #[test]
    fn test_parse_simple_records() {
        let data = concat!(
            r#"{"reference": "r1", "sequence": "ACGU", "dms": [0.1, 0.2, null, null]}"#,
            "\n",
            r#"{"reference": "r2", "sequence": "AC", "shape": [0.5, 0.6], "quality_shape": 0.9}"#,
            "\n",
        );
        let loader = DataLoader::new();
        let records = loader
            .parse_records(BufReader::new(Cursor::new(data)))
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].reference, "r1");
        assert!(records[0].dms.is_some());
        assert!(records[0].shape.is_none());
        assert_eq!(records[1].quality_shape, Some(0.9));
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let data = concat!(
            r#"{"reference": "r1", "sequence": "AC"}"#,
            "\n",
            "not json at all\n",
            r#"{"reference": "r2", "sequence": "GU"}"#,
            "\n",
        );
        let loader = DataLoader::new();
        let records = loader
            .parse_records(BufReader::new(Cursor::new(data)))
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_max_records_limit() {
        let data = concat!(
            r#"{"reference": "r1", "sequence": "AC"}"#,
            "\n",
            r#"{"reference": "r2", "sequence": "GU"}"#,
            "\n",
        );
        let loader = DataLoader::with_config(LoaderConfig {
            max_records: 1,
            ..Default::default()
        });
        let records = loader
            .parse_records(BufReader::new(Cursor::new(data)))
            .unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_all_null_modality_is_absent() {
        let data = concat!(
            r#"{"reference": "r1", "sequence": "AC", "dms": [null, null], "quality_dms": 0.8}"#,
            "\n",
        );
        let loader = DataLoader::new();
        let records = loader
            .parse_records(BufReader::new(Cursor::new(data)))
            .unwrap();
        assert!(records[0].dms.is_none());
    }
}
