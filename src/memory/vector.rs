//! Vector math over fixed-length embeddings.
//!
//! Stored embeddings are unit length, so cosine similarity at query time is a
//! plain dot product once the query vector is normalized too.

use crate::error::{MemoryError, Result};

/// Tolerance used when checking that a vector is unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-3;

/// Euclidean (L2) norm.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Divide `v` by its Euclidean norm.
///
/// Fails with [`MemoryError::Validation`] for an empty vector, a zero vector,
/// or any non-finite component.
pub fn normalize(v: &[f32]) -> Result<Vec<f32>> {
    if v.is_empty() {
        return Err(MemoryError::Validation("embedding is empty".into()));
    }
    if v.iter().any(|x| !x.is_finite()) {
        return Err(MemoryError::Validation(
            "embedding contains non-finite values".into(),
        ));
    }
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return Err(MemoryError::Validation(
            "embedding has zero norm and cannot be normalized".into(),
        ));
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// Whether `v` has norm 1 within [`UNIT_NORM_TOLERANCE`].
pub fn is_unit(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= UNIT_NORM_TOLERANCE
}

/// Cosine similarity of two vectors of equal length, in `[-1, 1]`.
///
/// Never truncates or pads: a length mismatch is a [`MemoryError::Validation`].
/// A zero vector has similarity 0 with everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(MemoryError::Validation(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Ok((dot / (norm_a * norm_b)).clamp(-1.0, 1.0))
}
