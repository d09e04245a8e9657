use crate::error::{Error, Result};
use crate::math::functions::{flatten, normalise};
use crate::math::matrix::Matrix;

/// One step of the image pipeline.
pub type Preprocessor = fn(&Matrix) -> Result<Matrix>;

/// Maps 8-bit pixel intensities from [0, 255] onto [-1, 1].
pub fn normalise_pixels(image: &Matrix) -> Result<Matrix> {
    normalise(image, (0.0, 255.0), (-1.0, 1.0))
}

pub fn flatten_image(image: &Matrix) -> Result<Matrix> {
    Ok(flatten(image))
}

/// Normalise, then flatten row-major into one sample row.
pub const STANDARD: [Preprocessor; 2] = [normalise_pixels, flatten_image];

/// Runs `steps` in order; the result must be a single row.
pub fn apply(steps: &[Preprocessor], image: Matrix) -> Result<Matrix> {
    let mut image = image;
    for step in steps {
        image = step(&image)?;
    }
    if image.rows != 1 {
        return Err(Error::InvalidDataShapeAfterPreprocessing(image.rows));
    }
    Ok(image)
}
