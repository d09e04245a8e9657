use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Which part of a dataset a batcher walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// One slice of samples: a `rows x features` matrix and one label per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Minibatch {
    pub data: Matrix,
    pub labels: Vec<usize>,
}

/// How a batcher orders and cuts its samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchOptions {
    pub shuffle: bool,
    /// Seed for the shuffle; a fresh thread RNG is used when `None`.
    pub seed: Option<u64>,
    /// Skip the trailing batch when it would be smaller than the batch size.
    pub drop_last: bool,
}

/// Finite, indexable sequence of minibatches. Batches are built on request.
pub trait DatasetBatcher {
    /// Number of batches.
    fn len(&self) -> usize;

    fn batch(&self, index: usize) -> Result<Minibatch>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Box<dyn Iterator<Item = Result<Minibatch>> + '_> {
        Box::new((0..self.len()).map(move |index| self.batch(index)))
    }
}

/// Source of a labelled dataset split into a train and a test part.
pub trait DatasetLoader {
    /// Class names; a label is an index into this list.
    fn classes(&self) -> &[String];

    fn batcher(&self, split: Split, batch_size: usize) -> Result<Box<dyn DatasetBatcher + '_>>;
}

/// `ceil(samples / batch_size)`, or the floor when the last batch is dropped.
pub fn batch_count(samples: usize, batch_size: usize, drop_last: bool) -> usize {
    if drop_last {
        samples / batch_size
    } else {
        (samples + batch_size - 1) / batch_size
    }
}

/// Sample order for a batcher over `samples` items.
pub(crate) fn sample_order(samples: usize, options: &BatchOptions) -> Vec<usize> {
    let mut order: Vec<usize> = (0..samples).collect();
    if options.shuffle {
        shuffle(&mut order, options.seed);
    }
    order
}

pub(crate) fn shuffle<T>(items: &mut [T], seed: Option<u64>) {
    match seed {
        Some(seed) => items.shuffle(&mut StdRng::seed_from_u64(seed)),
        None => items.shuffle(&mut rand::thread_rng()),
    }
}

/// Index range of batch `index` within `samples` items.
pub(crate) fn batch_bounds(index: usize, batch_size: usize, samples: usize) -> (usize, usize) {
    let start = index * batch_size;
    (start, (start + batch_size).min(samples))
}

/// Dataset held fully in memory as a feature matrix and labels.
///
/// The first `floor(rows * split)` rows form the train part and the rest the
/// test part, in their original order.
#[derive(Debug, Clone)]
pub struct InMemoryLoader {
    data: Matrix,
    labels: Vec<usize>,
    classes: Vec<String>,
    train_size: usize,
    options: BatchOptions,
}

impl InMemoryLoader {
    pub fn new(data: Matrix, labels: Vec<usize>, classes: Vec<String>, split: f64) -> Result<InMemoryLoader> {
        if !(0.0..=1.0).contains(&split) {
            return Err(Error::InvalidTrainTestSplit(split));
        }
        if data.rows != labels.len() {
            return Err(Error::InvalidDataset {
                predictions: data.rows,
                actual: labels.len(),
            });
        }
        let num_classes = classes.len();
        if let Some(&label) = labels.iter().find(|&&label| label >= num_classes) {
            return Err(Error::InvalidLabelIndex { label, num_classes });
        }
        let train_size = (data.rows as f64 * split) as usize;
        Ok(InMemoryLoader {
            data,
            labels,
            classes,
            train_size,
            options: BatchOptions::default(),
        })
    }

    pub fn with_options(mut self, options: BatchOptions) -> InMemoryLoader {
        self.options = options;
        self
    }

    pub fn train_size(&self) -> usize {
        self.train_size
    }

    pub fn test_size(&self) -> usize {
        self.data.rows - self.train_size
    }
}

impl DatasetLoader for InMemoryLoader {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn batcher(&self, split: Split, batch_size: usize) -> Result<Box<dyn DatasetBatcher + '_>> {
        let rows = match split {
            Split::Train => 0..self.train_size,
            Split::Test => self.train_size..self.data.rows,
        };
        let batcher = InMemoryBatcher::new(&self.data.data[rows.clone()], &self.labels[rows], batch_size, self.options)?;
        Ok(Box::new(batcher))
    }
}

/// Batcher over borrowed rows and labels.
#[derive(Debug, Clone)]
pub struct InMemoryBatcher<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [usize],
    order: Vec<usize>,
    batch_size: usize,
    drop_last: bool,
}

impl<'a> InMemoryBatcher<'a> {
    pub fn new(
        rows: &'a [Vec<f64>],
        labels: &'a [usize],
        batch_size: usize,
        options: BatchOptions,
    ) -> Result<InMemoryBatcher<'a>> {
        if batch_size < 1 {
            return Err(Error::InvalidBatchSize(batch_size));
        }
        if rows.len() != labels.len() {
            return Err(Error::InvalidDataset {
                predictions: rows.len(),
                actual: labels.len(),
            });
        }
        Ok(InMemoryBatcher {
            rows,
            labels,
            order: sample_order(rows.len(), &options),
            batch_size,
            drop_last: options.drop_last,
        })
    }
}

impl DatasetBatcher for InMemoryBatcher<'_> {
    fn len(&self) -> usize {
        batch_count(self.rows.len(), self.batch_size, self.drop_last)
    }

    fn batch(&self, index: usize) -> Result<Minibatch> {
        if index >= self.len() {
            return Err(Error::BatchOutOfRange {
                index,
                batches: self.len(),
            });
        }
        let (start, end) = batch_bounds(index, self.batch_size, self.rows.len());
        let indices = &self.order[start..end];
        Ok(Minibatch {
            data: Matrix::from_data(indices.iter().map(|&i| self.rows[i].clone()).collect()),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(split: f64) -> InMemoryLoader {
        let data = Matrix::from_data((0..10).map(|i| vec![i as f64, -(i as f64)]).collect());
        let labels = (0..10).map(|i| i % 2).collect();
        InMemoryLoader::new(data, labels, vec!["even".into(), "odd".into()], split).unwrap()
    }

    #[test]
    fn batch_count_rounds() {
        assert_eq!(batch_count(7, 3, false), 3);
        assert_eq!(batch_count(7, 3, true), 2);
        assert_eq!(batch_count(6, 3, false), 2);
        assert_eq!(batch_count(0, 3, false), 0);
    }

    #[test]
    fn split_truncates() {
        let loader = loader(0.75);
        assert_eq!(loader.train_size(), 7);
        assert_eq!(loader.test_size(), 3);
        assert_eq!(loader.batcher(Split::Train, 1).unwrap().len(), 7);
        assert_eq!(loader.batcher(Split::Test, 2).unwrap().len(), 2);
    }

    #[test]
    fn batches_keep_order() {
        let loader = loader(0.7);
        let batcher = loader.batcher(Split::Train, 3).unwrap();
        let batches: Vec<Minibatch> = batcher.iter().collect::<Result<_>>().unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].labels, vec![0, 1, 0]);
        assert_eq!(batches[2].data, Matrix::from_data(vec![vec![6.0, -6.0]]));

        let test = loader.batcher(Split::Test, 3).unwrap().batch(0).unwrap();
        assert_eq!(test.data.row(0), &[7.0, -7.0]);
        assert_eq!(test.labels, vec![1, 0, 1]);
    }

    #[test]
    fn drop_last_skips_partial_batch() {
        let options = BatchOptions {
            drop_last: true,
            ..BatchOptions::default()
        };
        let loader = loader(1.0).with_options(options);
        let batcher = loader.batcher(Split::Train, 4).unwrap();
        assert_eq!(batcher.len(), 2);
        assert!(matches!(batcher.batch(2), Err(Error::BatchOutOfRange { index: 2, batches: 2 })));
    }

    #[test]
    fn seeded_shuffle_is_a_permutation() {
        let options = BatchOptions {
            shuffle: true,
            seed: Some(7),
            ..BatchOptions::default()
        };
        let first = loader(1.0).with_options(options);
        let second = loader(1.0).with_options(options);
        let a = first.batcher(Split::Train, 10).unwrap().batch(0).unwrap();
        let b = second.batcher(Split::Train, 10).unwrap().batch(0).unwrap();
        assert_eq!(a, b);

        let mut seen: Vec<f64> = a.data.data.iter().map(|row| row[0]).collect();
        seen.sort_by(f64::total_cmp);
        assert_eq!(seen, (0..10).map(f64::from).collect::<Vec<_>>());
        for (row, label) in a.data.data.iter().zip(&a.labels) {
            assert_eq!(row[0] as usize % 2, *label);
        }
    }

    #[test]
    fn invalid_arguments_fail() {
        let loader = loader(1.0);
        assert!(matches!(loader.batcher(Split::Train, 0), Err(Error::InvalidBatchSize(0))));
        assert!(matches!(
            InMemoryLoader::new(Matrix::zeros(2, 2), vec![0, 0], vec!["a".into()], 1.5),
            Err(Error::InvalidTrainTestSplit(_))
        ));
        assert!(matches!(
            InMemoryLoader::new(Matrix::zeros(2, 2), vec![0], vec!["a".into()], 1.0),
            Err(Error::InvalidDataset { .. })
        ));
        assert!(matches!(
            InMemoryLoader::new(Matrix::zeros(2, 2), vec![0, 1], vec!["a".into()], 1.0),
            Err(Error::InvalidLabelIndex { label: 1, num_classes: 1 })
        ));
    }

    #[test]
    fn empty_split_has_no_batches() {
        let loader = loader(1.0);
        let batcher = loader.batcher(Split::Test, 1).unwrap();
        assert!(batcher.is_empty());
        assert_eq!(batcher.iter().count(), 0);
    }
}
