use thiserror::Error;

use crate::data::Modality;

/// Domain errors for the data model.
///
/// These are all fatal: they signal inconsistent input data or a caller bug,
/// never a condition to recover from. Application-level failures (IO, CLI)
/// use `anyhow` at the boundary instead.
#[derive(Error, Debug)]
pub enum RnaProbeError {
    #[error("unknown symbol {symbol:?} at position {position} in sequence")]
    UnknownSymbol { symbol: char, position: usize },

    #[error("integer code {code} is outside the nucleotide alphabet")]
    UnknownCode { code: i64 },

    #[error("data consistency error for {reference:?}: {message}")]
    DataConsistency { reference: String, message: String },

    #[error("datapoint does not contain data type {0}")]
    UnknownModality(Modality),

    #[error("padding length {requested} is smaller than the longest sequence in the batch ({required})")]
    PaddingTooSmall { requested: usize, required: usize },

    #[error("{modality} value has {got} elements, expected {expected}")]
    ShapeMismatch {
        modality: Modality,
        expected: usize,
        got: usize,
    },
}

impl RnaProbeError {
    /// Shorthand for a consistency failure tied to one datapoint.
    pub fn consistency(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataConsistency {
            reference: reference.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RnaProbeError>;
