//! Nucleotide sequence codec and pairing-matrix conversions.

use burn::prelude::*;

use crate::data::{NUM_TOKENS, UKN};
use crate::error::{Result, RnaProbeError};

/// Symbol table, index = integer code. `X` doubles as the padding symbol.
const INT_TO_SEQ: [char; NUM_TOKENS] = ['X', 'A', 'C', 'G', 'U'];

/// Integer code of a base, if the symbol is in the alphabet.
///
/// `T` is accepted as an alias of `U` so DNA-alphabet FASTA sources encode
/// without a rewrite pass; lowercase is accepted everywhere.
fn symbol_to_code(symbol: char) -> Option<i64> {
    match symbol.to_ascii_uppercase() {
        'X' => Some(0),
        'A' => Some(1),
        'C' => Some(2),
        'G' => Some(3),
        'U' | 'T' => Some(4),
        _ => None,
    }
}

/// Encode a nucleotide string into integer codes.
pub fn encode(sequence: &str) -> Result<Vec<i64>> {
    sequence
        .chars()
        .enumerate()
        .map(|(position, symbol)| {
            symbol_to_code(symbol).ok_or(RnaProbeError::UnknownSymbol { symbol, position })
        })
        .collect()
}

/// Decode integer codes back into a nucleotide string.
///
/// Total over anything produced by [`encode`]; an out-of-range code is a
/// caller bug and fails loudly.
pub fn decode(codes: &[i64]) -> Result<String> {
    codes
        .iter()
        .map(|&code| {
            usize::try_from(code)
                .ok()
                .and_then(|c| INT_TO_SEQ.get(c))
                .copied()
                .ok_or(RnaProbeError::UnknownCode { code })
        })
        .collect()
}

/// Code of the G base, for the DMS G/U rules.
pub fn code_g() -> i64 {
    3
}

/// Code of the U base, for the DMS G/U rules.
pub fn code_u() -> i64 {
    4
}

/// One-hot encode a batch of integer-coded sequences.
///
/// Input shape `[batch, len]`, output `[batch, len, NUM_TOKENS]`.
pub fn one_hot<B: Backend>(sequences: Tensor<B, 2, Int>) -> Tensor<B, 3> {
    let planes: Vec<Tensor<B, 2>> = (0..NUM_TOKENS)
        .map(|class| sequences.clone().equal_elem(class as i64).float())
        .collect();
    Tensor::stack(planes, 2)
}

/// Build a padded pairing matrix from a base-pair list.
///
/// Returns a `pad_to × pad_to` row-major matrix filled with `pad_value`,
/// with the `[0, length)²` interior zeroed and both `(i, j)` and `(j, i)`
/// set to 1 for each pair. An empty pair list yields an all-zero interior.
pub fn pairs_to_matrix(
    base_pairs: &[[usize; 2]],
    length: usize,
    pad_to: usize,
    pad_value: f32,
) -> Result<Vec<f32>> {
    if pad_to < length {
        return Err(RnaProbeError::PaddingTooSmall {
            requested: pad_to,
            required: length,
        });
    }

    let mut matrix = vec![pad_value; pad_to * pad_to];
    for row in 0..length {
        for col in 0..length {
            matrix[row * pad_to + col] = 0.0;
        }
    }

    for &[i, j] in base_pairs {
        if i >= length || j >= length {
            return Err(RnaProbeError::consistency(
                "<base pairs>",
                format!("pair ({i}, {j}) is out of range for length {length}"),
            ));
        }
        matrix[i * pad_to + j] = 1.0;
        matrix[j * pad_to + i] = 1.0;
    }

    Ok(matrix)
}

/// Extract the base-pair list from a square pairing matrix.
///
/// Scans a working copy in row-major order; each cell holding the paired
/// marker emits its pair once and clears the symmetric counterpart. UKN
/// padding and unpaired cells are skipped.
pub fn matrix_to_pairs(matrix: &[f32], dim: usize) -> Vec<[usize; 2]> {
    debug_assert_eq!(matrix.len(), dim * dim);
    let mut scratch = matrix.to_vec();
    let mut pairs = Vec::new();
    for i in 0..dim {
        for j in 0..dim {
            if scratch[i * dim + j] == 1.0 {
                pairs.push([i, j]);
                scratch[j * dim + i] = 0.0;
            }
        }
    }
    pairs
}
