//! Cosine math used by the in-memory engine and by ingestion checks.

use std::error::Error;
use std::fmt;

use wide::f32x8;

const LANES: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub enum VectorError {
    DimensionMismatch { left: usize, right: usize },
    EmptyVector,
    /// Cosine is undefined when either side has (near) zero length.
    ZeroNorm,
    NonFinite { index: usize, value: f32 },
}

impl fmt::Display for VectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DimensionMismatch { left, right } => {
                write!(f, "dimension mismatch: left={left}, right={right}")
            }
            Self::EmptyVector => write!(f, "vector is empty"),
            Self::ZeroNorm => write!(f, "cosine similarity undefined for zero-norm vector"),
            Self::NonFinite { index, value } => {
                write!(f, "non-finite value at index {index}: {value}")
            }
        }
    }
}

impl Error for VectorError {}

/// Returns the index and value of the first NaN or infinite component.
pub fn first_non_finite(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .find(|(_, value)| !value.is_finite())
}

/// Cosine similarity in `[-1, 1]` with full validation.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f32, VectorError> {
    if left.is_empty() || right.is_empty() {
        return Err(VectorError::EmptyVector);
    }
    if left.len() != right.len() {
        return Err(VectorError::DimensionMismatch {
            left: left.len(),
            right: right.len(),
        });
    }
    for values in [left, right] {
        if let Some((index, value)) = first_non_finite(values) {
            return Err(VectorError::NonFinite { index, value });
        }
    }

    let query = CosineQuery::new(left);
    query.similarity(right).ok_or(VectorError::ZeroNorm)
}

/// `1 - cosine_similarity`: `0.0` for identical directions, `2.0` for
/// opposite ones.
pub fn cosine_distance(left: &[f32], right: &[f32]) -> Result<f32, VectorError> {
    cosine_similarity(left, right).map(|similarity| 1.0 - similarity)
}

/// A query vector packed into SIMD lanes once and compared against many
/// candidates of the same length.
#[derive(Debug, Clone)]
pub struct CosineQuery {
    lanes: Vec<f32x8>,
    tail: Vec<f32>,
    norm: f32,
}

impl CosineQuery {
    pub fn new(query: &[f32]) -> Self {
        let mut chunks = query.chunks_exact(LANES);
        let lanes: Vec<f32x8> = chunks.by_ref().map(pack).collect();
        let tail = chunks.remainder().to_vec();

        let mut squares = f32x8::ZERO;
        for lane in &lanes {
            squares += *lane * *lane;
        }
        let tail_squares: f32 = tail.iter().map(|value| value * value).sum();
        let norm = (squares.reduce_add() + tail_squares).sqrt();

        Self { lanes, tail, norm }
    }

    pub fn len(&self) -> usize {
        self.lanes.len() * LANES + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cosine similarity against a candidate of the same length; `None` when
    /// either norm is at most `f32::EPSILON`.
    pub fn similarity(&self, candidate: &[f32]) -> Option<f32> {
        debug_assert_eq!(candidate.len(), self.len());
        let split = self.lanes.len() * LANES;

        let mut dot = f32x8::ZERO;
        let mut squares = f32x8::ZERO;
        for (lane, chunk) in self.lanes.iter().zip(candidate[..split].chunks_exact(LANES)) {
            let other = pack(chunk);
            dot += *lane * other;
            squares += other * other;
        }

        let mut dot_tail = 0.0f32;
        let mut squares_tail = 0.0f32;
        for (left, right) in self.tail.iter().zip(&candidate[split..]) {
            dot_tail += left * right;
            squares_tail += right * right;
        }

        let candidate_norm = (squares.reduce_add() + squares_tail).sqrt();
        if self.norm <= f32::EPSILON || candidate_norm <= f32::EPSILON {
            return None;
        }
        Some((dot.reduce_add() + dot_tail) / (self.norm * candidate_norm))
    }

    /// Distance used for ranking. Zero-norm pairs rank as orthogonal (`1.0`).
    pub fn distance(&self, candidate: &[f32]) -> f32 {
        self.similarity(candidate)
            .map(|similarity| 1.0 - similarity)
            .unwrap_or(1.0)
    }
}

fn pack(values: &[f32]) -> f32x8 {
    f32x8::from([
        values[0], values[1], values[2], values[3], values[4], values[5], values[6], values[7],
    ])
}
