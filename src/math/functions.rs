//! Row-wise numeric helpers shared by the loss, the model and the data
//! pipeline.

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// One-hot encodes `labels` against `num_classes` columns.
pub fn one_hot_encode(labels: &[usize], num_classes: usize) -> Result<Matrix> {
    let mut encoded = Matrix::zeros(labels.len(), num_classes);
    for (i, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(Error::InvalidLabelIndex { label, num_classes });
        }
        encoded.data[i][label] = 1.0;
    }
    Ok(encoded)
}

/// Row-wise softmax, shifted by the row maximum so large logits cannot
/// overflow `exp`.
pub fn softmax(input: &Matrix) -> Matrix {
    let data = input
        .data
        .iter()
        .map(|row| {
            let max = row_max(row);
            let exps: Vec<f64> = row.iter().map(|x| (x - max).exp()).collect();
            let total: f64 = exps.iter().sum();
            exps.into_iter().map(|e| e / total).collect()
        })
        .collect();
    Matrix::from_data(data)
}

/// Row-wise log-softmax: `(x - max) - ln(sum(exp(x - max)))`.
pub fn log_softmax(input: &Matrix) -> Matrix {
    let data = input
        .data
        .iter()
        .map(|row| {
            let max = row_max(row);
            let log_total = row.iter().map(|x| (x - max).exp()).sum::<f64>().ln();
            row.iter().map(|x| (x - max) - log_total).collect()
        })
        .collect();
    Matrix::from_data(data)
}

/// Index of the largest value of every row. Ties resolve to the first index.
pub fn argmax_rows(input: &Matrix) -> Vec<usize> {
    input
        .data
        .iter()
        .map(|row| {
            let mut best = 0;
            for (i, &x) in row.iter().enumerate() {
                if x > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Linearly maps `data` from the `from` range onto the `to` range.
pub fn normalise(data: &Matrix, from: (f64, f64), to: (f64, f64)) -> Result<Matrix> {
    for &(min, max) in &[from, to] {
        if min >= max {
            return Err(Error::InvalidRange { min, max });
        }
    }
    let (from_min, from_max) = from;
    let (to_min, to_max) = to;
    Ok(data.map(|x| (x - from_min) * (to_max - to_min) / (from_max - from_min) + to_min))
}

/// Concatenates the rows of `data` into a single row.
pub fn flatten(data: &Matrix) -> Matrix {
    Matrix::row_vector(data.data.iter().flatten().copied().collect())
}

fn row_max(row: &[f64]) -> f64 {
    row.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_rows_close(actual: &Matrix, expected: &[f64]) {
        assert_eq!(actual.rows, 1);
        for (a, e) in actual.data[0].iter().zip(expected) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-9);
        }
    }

    #[test]
    fn one_hot_encodes_each_label() {
        let encoded = one_hot_encode(&[1, 0, 2], 3).unwrap();
        assert_eq!(
            encoded.data,
            vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]]
        );
        let encoded = one_hot_encode(&[3], 10).unwrap();
        assert_eq!(encoded.data[0][3], 1.0);
        assert_eq!(encoded.sum(), 1.0);
    }

    #[test]
    fn one_hot_rejects_out_of_range_labels() {
        let result = one_hot_encode(&[0, 1, 3], 3);
        assert!(matches!(
            result,
            Err(Error::InvalidLabelIndex { label: 3, num_classes: 3 })
        ));
    }

    #[test]
    fn softmax_values() {
        let third = 1.0 / 3.0;
        assert_rows_close(&softmax(&Matrix::row_vector(vec![1.0, 1.0, 1.0])), &[third; 3]);
        assert_rows_close(
            &softmax(&Matrix::row_vector(vec![1.0, 0.0, 0.0])),
            &[0.576116884766, 0.211941557617, 0.211941557617],
        );
        assert_rows_close(&softmax(&Matrix::row_vector(vec![999.0, 0.0, 0.0])), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn log_softmax_values() {
        assert_rows_close(
            &log_softmax(&Matrix::row_vector(vec![-1.0, -1.0, -1.0])),
            &[-1.098612288668; 3],
        );
        assert_rows_close(
            &log_softmax(&Matrix::row_vector(vec![1.0, 0.0, 0.0])),
            &[-0.551444713932, -1.551444713932, -1.551444713932],
        );
        assert_rows_close(
            &log_softmax(&Matrix::row_vector(vec![999.0, 0.0, 0.0])),
            &[0.0, -999.0, -999.0],
        );
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        let m = Matrix::from_data(vec![vec![25.0, 25.0], vec![0.0, 1.0], vec![3.0, -1.0]]);
        assert_eq!(argmax_rows(&m), vec![0, 1, 0]);
    }

    #[test]
    fn normalise_maps_pixel_range() {
        let m = Matrix::row_vector(vec![0.0, 127.5, 255.0]);
        let n = normalise(&m, (0.0, 255.0), (-1.0, 1.0)).unwrap();
        assert_rows_close(&n, &[-1.0, 0.0, 1.0]);
        assert!(matches!(
            normalise(&m, (1.0, 1.0), (-1.0, 1.0)),
            Err(Error::InvalidRange { .. })
        ));
    }

    #[test]
    fn flatten_is_row_major() {
        let m = Matrix::from_data(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(flatten(&m), Matrix::row_vector(vec![1.0, 2.0, 3.0, 4.0]));
    }
}
