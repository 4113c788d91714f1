use ndarray::{Array2, ArrayView1};

use crate::error::{AppError, Result};

/// Computes cosine similarity between two embeddings.
///
/// Zero vectors compare as 0. The result is clamped to `[-1, 1]`.
pub fn cosine_similarity(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let dot_product = a.dot(&b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        (dot_product / (norm_a * norm_b)).min(1.0).max(-1.0)
    } else {
        0.0
    }
}

/// Ranks the rows of `features` by cosine similarity to `query`.
///
/// Returns `(row index, score)` pairs in descending score order, at most `k`
/// of them. Rows with equal scores keep their original order. A matrix with
/// no rows yields no results.
pub fn top_k(
    query: ArrayView1<'_, f32>,
    features: &Array2<f32>,
    k: usize,
) -> Result<Vec<(usize, f32)>> {
    if features.nrows() == 0 {
        return Ok(Vec::new());
    }
    if query.len() != features.ncols() {
        return Err(AppError::DimensionMismatch {
            expected: features.ncols(),
            actual: query.len(),
        });
    }

    let mut scored: Vec<(usize, f32)> = features
        .rows()
        .into_iter()
        .map(|row| cosine_similarity(query, row))
        .enumerate()
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(k);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_cosine_similarity() {
        // Identical vectors
        let a = array![1.0f32, 0.0, 0.0];
        assert!((cosine_similarity(a.view(), a.view()) - 1.0).abs() < 1e-6);

        // Orthogonal vectors
        let a = array![1.0f32, 0.0];
        let b = array![0.0f32, 1.0];
        assert!(cosine_similarity(a.view(), b.view()).abs() < 1e-6);

        // Opposite vectors
        let b = array![-1.0f32, 0.0];
        assert!((cosine_similarity(a.view(), b.view()) + 1.0).abs() < 1e-6);

        // Zero vector
        let z = Array1::<f32>::zeros(2);
        assert_eq!(cosine_similarity(a.view(), z.view()), 0.0);
    }

    #[test]
    fn test_top_k_orders_descending() {
        let features = array![
            [0.0f32, 1.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [-1.0, 0.0],
        ];
        let query = array![1.0f32, 0.1];

        let hits = top_k(query.view(), &features, 3).unwrap();
        let indices: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 2, 0]);
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_top_k_caps_at_row_count() {
        let features = array![[1.0f32, 0.0], [0.0, 1.0]];
        let query = array![1.0f32, 1.0];
        assert_eq!(top_k(query.view(), &features, 5).unwrap().len(), 2);
        assert!(top_k(query.view(), &features, 0).unwrap().is_empty());
    }

    #[test]
    fn test_top_k_ties_keep_row_order() {
        let features = array![
            [2.0f32, 0.0],
            [0.0, 1.0],
            [1.0, 0.0],
            [3.0, 0.0],
        ];
        let query = array![1.0f32, 0.0];

        let hits = top_k(query.view(), &features, 4).unwrap();
        let indices: Vec<usize> = hits.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2, 3, 1]);
    }

    #[test]
    fn test_top_k_dimension_mismatch() {
        let features = array![[1.0f32, 0.0, 0.0]];
        let query = array![1.0f32, 0.0];
        let err = top_k(query.view(), &features, 1).unwrap_err();
        assert!(matches!(
            err,
            AppError::DimensionMismatch { expected: 3, actual: 2 }
        ));
    }

    #[test]
    fn test_top_k_empty_matrix() {
        let features = Array2::<f32>::zeros((0, 0));
        let query = array![1.0f32, 0.0];
        assert!(top_k(query.view(), &features, 5).unwrap().is_empty());
    }
}
