use crate::error::{Error, Result};

/// Square count matrix where rows are the predicted class and columns the
/// actual class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Result<ConfusionMatrix> {
        if num_classes < 1 {
            return Err(Error::InvalidNumberOfClasses(num_classes));
        }
        Ok(ConfusionMatrix {
            counts: vec![vec![0; num_classes]; num_classes],
        })
    }

    /// Wraps existing counts; they must form a non-empty square.
    pub fn from_counts(counts: Vec<Vec<usize>>) -> Result<ConfusionMatrix> {
        let n = counts.len();
        if n < 1 {
            return Err(Error::InvalidNumberOfClasses(n));
        }
        if let Some(row) = counts.iter().find(|row| row.len() != n) {
            return Err(Error::shape((n, n), (n, row.len())));
        }
        Ok(ConfusionMatrix { counts })
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn get(&self, predicted: usize, actual: usize) -> usize {
        self.counts[predicted][actual]
    }

    /// Counts one `(predictions[i], actual[i])` pair per sample.
    pub fn add(&mut self, predictions: &[usize], actual: &[usize]) -> Result<()> {
        if predictions.len() != actual.len() {
            return Err(Error::InvalidDataset {
                predictions: predictions.len(),
                actual: actual.len(),
            });
        }
        let num_classes = self.num_classes();
        if let Some(&label) = predictions.iter().chain(actual).find(|&&c| c >= num_classes) {
            return Err(Error::InvalidLabelIndex { label, num_classes });
        }
        for (&p, &a) in predictions.iter().zip(actual) {
            self.counts[p][a] += 1;
        }
        Ok(())
    }

    /// Number of samples counted so far.
    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn trace(&self) -> usize {
        (0..self.num_classes()).map(|c| self.counts[c][c]).sum()
    }

    fn row_sum(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    fn column_sum(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    /// `trace / total`, or 0 before anything was counted.
    pub fn accuracy(&self) -> f64 {
        ratio(self.trace() as f64, self.total() as f64)
    }

    /// Per class: correct predictions over all predictions of that class.
    pub fn precision(&self) -> Vec<f64> {
        (0..self.num_classes())
            .map(|c| ratio(self.counts[c][c] as f64, self.row_sum(c) as f64))
            .collect()
    }

    /// Per class: correct predictions over all samples of that class.
    pub fn recall(&self) -> Vec<f64> {
        (0..self.num_classes())
            .map(|c| ratio(self.counts[c][c] as f64, self.column_sum(c) as f64))
            .collect()
    }

    pub fn f1_score(&self) -> Vec<f64> {
        self.precision()
            .into_iter()
            .zip(self.recall())
            .map(|(p, r)| ratio(2.0 * p * r, p + r))
            .collect()
    }
}

/// Division that yields 0 for a zero denominator.
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const TOLERANCE: f64 = 1e-5;

    fn matrices() -> Vec<ConfusionMatrix> {
        vec![
            vec![vec![3, 2], vec![1, 4]],
            vec![vec![4, 4, 2], vec![0, 2, 0], vec![3, 2, 5]],
            vec![vec![1, 0, 0], vec![0, 0, 0], vec![0, 0, 0]],
            vec![vec![20, 1, 60], vec![29, 13, 2], vec![32, 6, 34]],
            vec![vec![50, 3, 0, 0], vec![26, 8, 0, 1], vec![20, 2, 4, 0], vec![12, 0, 0, 1]],
        ]
        .into_iter()
        .map(|counts| ConfusionMatrix::from_counts(counts).unwrap())
        .collect()
    }

    fn assert_all_close(actual: &[Vec<f64>], expected: &[Vec<f64>]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert_eq!(a.len(), e.len());
            for (x, y) in a.iter().zip(e) {
                assert_abs_diff_eq!(x, y, epsilon = TOLERANCE);
            }
        }
    }

    #[test]
    fn new_matrix_is_zero() {
        let matrix = ConfusionMatrix::new(3).unwrap();
        assert_eq!(matrix.counts(), &[vec![0; 3], vec![0; 3], vec![0; 3]]);
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn zero_classes_fail() {
        assert!(matches!(ConfusionMatrix::new(0), Err(Error::InvalidNumberOfClasses(0))));
    }

    #[test]
    fn add_counts_pairs() {
        let mut matrix = ConfusionMatrix::new(3).unwrap();
        matrix.add(&[0, 1, 2], &[0, 1, 2]).unwrap();
        assert_eq!(matrix.counts(), &[vec![1, 0, 0], vec![0, 1, 0], vec![0, 0, 1]]);

        let mut matrix =
            ConfusionMatrix::from_counts(vec![vec![0, 1, 1], vec![1, 0, 0], vec![0, 0, 0]]).unwrap();
        matrix.add(&[1, 2, 0, 0], &[0, 1, 2, 0]).unwrap();
        assert_eq!(matrix.counts(), &[vec![1, 1, 2], vec![2, 0, 0], vec![0, 1, 0]]);
        assert_eq!(matrix.total(), 7);
    }

    #[test]
    fn add_rejects_mismatched_lengths() {
        let mut matrix = ConfusionMatrix::new(3).unwrap();
        assert!(matches!(
            matrix.add(&[0, 1, 2], &[1]),
            Err(Error::InvalidDataset { predictions: 3, actual: 1 })
        ));
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn add_rejects_unknown_class() {
        let mut matrix = ConfusionMatrix::new(2).unwrap();
        assert!(matches!(
            matrix.add(&[0, 1], &[2, 0]),
            Err(Error::InvalidLabelIndex { label: 2, num_classes: 2 })
        ));
        assert_eq!(matrix.total(), 0);
    }

    #[test]
    fn accuracy_is_trace_over_total() {
        let expected = [0.7, 0.5, 1.0, 0.340101522843, 0.496062992126];
        for (matrix, e) in matrices().iter().zip(expected) {
            assert_abs_diff_eq!(matrix.accuracy(), e, epsilon = TOLERANCE);
            assert_abs_diff_eq!(
                matrix.accuracy(),
                matrix.trace() as f64 / matrix.total() as f64,
                epsilon = 1e-15
            );
        }
        assert_eq!(ConfusionMatrix::new(2).unwrap().accuracy(), 0.0);
    }

    #[test]
    fn precision_per_class() {
        let actual: Vec<Vec<f64>> = matrices().iter().map(ConfusionMatrix::precision).collect();
        assert_all_close(
            &actual,
            &[
                vec![0.6, 0.8],
                vec![0.4, 1.0, 0.5],
                vec![1.0, 0.0, 0.0],
                vec![0.24691358024691357, 0.29545454545454547, 0.4722222222222222],
                vec![0.9433962264150944, 0.22857142857142856, 0.15384615384615385, 0.07692307692307693],
            ],
        );
    }

    #[test]
    fn recall_per_class() {
        let actual: Vec<Vec<f64>> = matrices().iter().map(ConfusionMatrix::recall).collect();
        assert_all_close(
            &actual,
            &[
                vec![0.75, 0.666666],
                vec![0.5714285714285714, 0.25, 0.7142857142857143],
                vec![1.0, 0.0, 0.0],
                vec![0.24691358024691357, 0.65, 0.3541666666666667],
                vec![0.46296296296296297, 0.6153846153846154, 1.0, 0.5],
            ],
        );
    }

    #[test]
    fn f1_score_per_class() {
        let actual: Vec<Vec<f64>> = matrices().iter().map(ConfusionMatrix::f1_score).collect();
        assert_all_close(
            &actual,
            &[
                vec![0.66666667, 0.72727273],
                vec![0.47058824, 0.4, 0.58823529],
                vec![1.0, 0.0, 0.0],
                vec![0.24691358, 0.40625, 0.4047619],
                vec![0.6211180124223602, 0.3333333333333333, 0.2666666666666667, 0.13333333333333336],
            ],
        );
    }

    #[test]
    fn empty_classes_score_zero() {
        let matrix = ConfusionMatrix::new(3).unwrap();
        assert_eq!(matrix.precision(), vec![0.0; 3]);
        assert_eq!(matrix.recall(), vec![0.0; 3]);
        assert_eq!(matrix.f1_score(), vec![0.0; 3]);
    }
}
