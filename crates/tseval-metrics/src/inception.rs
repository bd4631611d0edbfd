// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use tseval_core::{ClassProbabilities, EvalError};

/// Number of contiguous groups used for the variability estimate. When the
/// input has fewer rows than splits, every row becomes its own group.
pub const CONCENTRATION_SPLITS: usize = 10;

/// Floor applied to marginal probabilities before taking logarithms.
const MARGINAL_FLOOR: f64 = 1.0e-16;

/// Concentration score over predicted class distributions: the exponential
/// of the average KL divergence between each row and the group marginal.
///
/// The row sequence is split into [`CONCENTRATION_SPLITS`] contiguous
/// groups (sized as evenly as possible, earlier groups one row larger when
/// the count does not divide); the score is computed per group and the
/// returned pair is the mean and population standard deviation across
/// groups. Higher means sharper and more diverse predictions; the mean is
/// >= 1 for valid probability rows.
pub fn inception_score(probs: &ClassProbabilities) -> Result<(f64, f64), EvalError> {
    if probs.is_empty() {
        return Err(EvalError::insufficient_data(
            "concentration score needs at least one probability row",
        ));
    }

    let rows = probs.rows();
    let n_classes = probs.n_classes();
    let splits = CONCENTRATION_SPLITS.min(rows);
    let base = rows / splits;
    let remainder = rows % splits;

    let mut scores = Vec::with_capacity(splits);
    let mut start = 0usize;
    for group in 0..splits {
        let size = base + usize::from(group < remainder);
        let end = start + size;

        let mut marginal = vec![0.0; n_classes];
        for i in start..end {
            for (k, &p) in probs.row(i).iter().enumerate() {
                marginal[k] += p;
            }
        }
        for value in &mut marginal {
            *value /= size as f64;
        }

        let mut kl_sum = 0.0;
        for i in start..end {
            for (k, &p) in probs.row(i).iter().enumerate() {
                if p > 0.0 {
                    kl_sum += p * (p.ln() - marginal[k].max(MARGINAL_FLOOR).ln());
                }
            }
        }
        scores.push((kl_sum / size as f64).exp());

        start = end;
    }

    let mean = scores.iter().sum::<f64>() / splits as f64;
    let variance = scores
        .iter()
        .map(|score| (score - mean).powi(2))
        .sum::<f64>()
        / splits as f64;
    Ok((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::{inception_score, CONCENTRATION_SPLITS};
    use tseval_core::ClassProbabilities;

    fn assert_approx_eq(actual: f64, expected: f64) {
        let delta = (actual - expected).abs();
        assert!(
            delta <= 1e-9,
            "expected {expected}, got {actual} (delta={delta})"
        );
    }

    #[test]
    fn uniform_rows_score_exactly_one() {
        let probs = ClassProbabilities::from_rows(vec![vec![0.5, 0.5]; 40])
            .expect("uniform rows should validate");
        let (mean, std) = inception_score(&probs).expect("score should compute");
        assert_approx_eq(mean, 1.0);
        assert_approx_eq(std, 0.0);
    }

    #[test]
    fn confident_and_diverse_rows_score_the_class_count() {
        // Alternating one-hot rows: every contiguous pair covers both
        // classes, so each group marginal is uniform and the KL term is
        // ln 2 per row.
        let rows = (0..20)
            .map(|i| {
                if i % 2 == 0 {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect();
        let probs = ClassProbabilities::from_rows(rows).expect("one-hot rows should validate");
        let (mean, std) = inception_score(&probs).expect("score should compute");
        assert_approx_eq(mean, 2.0);
        assert_approx_eq(std, 0.0);
    }

    #[test]
    fn confident_but_collapsed_rows_score_one() {
        // Always the same class: sharp but not diverse.
        let probs = ClassProbabilities::from_rows(vec![vec![1.0, 0.0]; 30])
            .expect("collapsed rows should validate");
        let (mean, _) = inception_score(&probs).expect("score should compute");
        assert_approx_eq(mean, 1.0);
    }

    #[test]
    fn mean_is_at_least_one_for_mixed_rows() {
        let rows = vec![
            vec![0.7, 0.2, 0.1],
            vec![0.1, 0.8, 0.1],
            vec![0.2, 0.2, 0.6],
            vec![0.4, 0.4, 0.2],
            vec![0.05, 0.05, 0.9],
            vec![0.3, 0.5, 0.2],
        ];
        let probs = ClassProbabilities::from_rows(rows).expect("mixed rows should validate");
        let (mean, std) = inception_score(&probs).expect("score should compute");
        assert!(mean >= 1.0, "mean {mean} must be >= 1");
        assert!(std >= 0.0);
        assert!(mean.is_finite() && std.is_finite());
    }

    #[test]
    fn fewer_rows_than_splits_uses_one_group_per_row() {
        let probs = ClassProbabilities::from_rows(vec![vec![0.9, 0.1], vec![0.2, 0.8]])
            .expect("rows should validate");
        // Each singleton group's marginal is the row itself: KL 0, score 1.
        let (mean, std) = inception_score(&probs).expect("score should compute");
        assert_approx_eq(mean, 1.0);
        assert_approx_eq(std, 0.0);
    }

    #[test]
    fn uneven_split_covers_every_row() {
        // 23 rows over 10 splits: sizes 3,3,3,2,... and all rows counted.
        let rows: Vec<Vec<f64>> = (0..23)
            .map(|i| {
                let p = 0.5 + 0.02 * (i % 10) as f64;
                vec![p, 1.0 - p]
            })
            .collect();
        let probs = ClassProbabilities::from_rows(rows).expect("rows should validate");
        let (mean, std) = inception_score(&probs).expect("score should compute");
        assert!(mean >= 1.0);
        assert!(std.is_finite());
        assert_eq!(CONCENTRATION_SPLITS, 10);
    }

    #[test]
    fn empty_input_is_insufficient_data() {
        let probs =
            ClassProbabilities::new(Vec::new(), 0, 3).expect("empty set should construct");
        let err = inception_score(&probs).expect_err("empty input must fail");
        assert!(err.is_insufficient_data());
    }
}
