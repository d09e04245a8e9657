pub mod functions;
pub mod matrix;

pub use matrix::Matrix;
