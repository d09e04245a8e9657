use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::data::batcher::{
    batch_bounds, batch_count, sample_order, shuffle, BatchOptions, DatasetBatcher, DatasetLoader, Minibatch, Split,
};
use crate::data::preprocess::{self, Preprocessor};
use crate::error::{Error, Result};
use crate::math::matrix::Matrix;

/// Image dataset laid out as `root/<class>/.../<image>`.
///
/// Classes are the sorted names of the directories directly under `root`,
/// and an image belongs to the class named by the first path component
/// below `root`.
#[derive(Clone)]
pub struct ImageFolderLoader {
    root: PathBuf,
    classes: Vec<String>,
    class_index: HashMap<String, usize>,
    train_files: Vec<PathBuf>,
    test_files: Vec<PathBuf>,
    preprocessing: Vec<Preprocessor>,
    options: BatchOptions,
}

impl ImageFolderLoader {
    /// Collects every file under `root` whose extension is in
    /// `file_formats` (with or without the leading dot), optionally shuffles
    /// them and keeps the first `floor(files * split)` for training.
    pub fn new<P: AsRef<Path>, S: AsRef<str>>(
        root: P,
        file_formats: &[S],
        split: f64,
        shuffle_files: bool,
        seed: Option<u64>,
    ) -> Result<ImageFolderLoader> {
        if !(0.0..=1.0).contains(&split) {
            return Err(Error::InvalidTrainTestSplit(split));
        }
        let root = root.as_ref().to_path_buf();
        let extensions: Vec<&str> = file_formats
            .iter()
            .map(|format| format.as_ref().trim_start_matches('.'))
            .collect();

        let mut files = Vec::new();
        collect_files(&root, &extensions, &mut files)?;
        if files.is_empty() {
            return Err(Error::NoFilesFound {
                root,
                formats: extensions.join(", "),
            });
        }
        files.sort();
        if shuffle_files {
            shuffle(&mut files, seed);
        }

        let train_size = (files.len() as f64 * split) as usize;
        let test_files = files.split_off(train_size);

        let mut classes = Vec::new();
        for entry in fs::read_dir(&root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                classes.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        classes.sort();
        let class_index = classes.iter().enumerate().map(|(i, c)| (c.clone(), i)).collect();

        debug!(
            root = %root.display(),
            train = files.len(),
            test = test_files.len(),
            classes = classes.len(),
            "indexed image folder"
        );

        Ok(ImageFolderLoader {
            root,
            classes,
            class_index,
            train_files: files,
            test_files,
            preprocessing: preprocess::STANDARD.to_vec(),
            options: BatchOptions::default(),
        })
    }

    pub fn with_preprocessing(mut self, steps: Vec<Preprocessor>) -> ImageFolderLoader {
        self.preprocessing = steps;
        self
    }

    /// Options applied to every batcher this loader hands out.
    pub fn with_options(mut self, options: BatchOptions) -> ImageFolderLoader {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn train_files(&self) -> &[PathBuf] {
        &self.train_files
    }

    pub fn test_files(&self) -> &[PathBuf] {
        &self.test_files
    }

    fn label(&self, path: &Path) -> Result<usize> {
        path.strip_prefix(&self.root)
            .ok()
            .and_then(|relative| relative.components().next())
            .and_then(|first| self.class_index.get(&*first.as_os_str().to_string_lossy()))
            .copied()
            .ok_or_else(|| Error::UnknownClass(path.to_path_buf()))
    }
}

impl fmt::Debug for ImageFolderLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFolderLoader")
            .field("root", &self.root)
            .field("classes", &self.classes)
            .field("train_files", &self.train_files.len())
            .field("test_files", &self.test_files.len())
            .field("preprocessing_steps", &self.preprocessing.len())
            .field("options", &self.options)
            .finish()
    }
}

impl DatasetLoader for ImageFolderLoader {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn batcher(&self, split: Split, batch_size: usize) -> Result<Box<dyn DatasetBatcher + '_>> {
        if batch_size < 1 {
            return Err(Error::InvalidBatchSize(batch_size));
        }
        let files = match split {
            Split::Train => &self.train_files,
            Split::Test => &self.test_files,
        };
        Ok(Box::new(ImageBatcher {
            loader: self,
            files,
            order: sample_order(files.len(), &self.options),
            batch_size,
            drop_last: self.options.drop_last,
        }))
    }
}

/// Decodes and preprocesses images one batch at a time.
#[derive(Debug)]
pub struct ImageBatcher<'a> {
    loader: &'a ImageFolderLoader,
    files: &'a [PathBuf],
    order: Vec<usize>,
    batch_size: usize,
    drop_last: bool,
}

impl DatasetBatcher for ImageBatcher<'_> {
    fn len(&self) -> usize {
        batch_count(self.files.len(), self.batch_size, self.drop_last)
    }

    fn batch(&self, index: usize) -> Result<Minibatch> {
        if index >= self.len() {
            return Err(Error::BatchOutOfRange {
                index,
                batches: self.len(),
            });
        }
        let (start, end) = batch_bounds(index, self.batch_size, self.files.len());
        let mut rows = Vec::with_capacity(end - start);
        let mut labels = Vec::with_capacity(end - start);
        for &i in &self.order[start..end] {
            let path = &self.files[i];
            let sample = preprocess::apply(&self.loader.preprocessing, open_grayscale(path)?)?;
            rows.extend(sample.data);
            labels.push(self.loader.label(path)?);
        }
        Ok(Minibatch {
            data: Matrix::from_rows(rows)?,
            labels,
        })
    }
}

/// Decodes an image as 8-bit grayscale into a `height x width` matrix of raw
/// intensities.
pub fn open_grayscale(path: &Path) -> Result<Matrix> {
    let image = image::open(path).map_err(|source| Error::InvalidImageFile {
        path: path.to_path_buf(),
        source,
    })?;
    let gray = image.to_luma8();
    let (width, height) = gray.dimensions();
    let data = (0..height)
        .map(|y| (0..width).map(|x| gray.get_pixel(x, y).0[0] as f64).collect())
        .collect();
    Ok(Matrix::from_data(data))
}

fn collect_files(dir: &Path, extensions: &[&str], files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, extensions, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| extensions.contains(&ext))
        {
            files.push(path);
        }
    }
    Ok(())
}
