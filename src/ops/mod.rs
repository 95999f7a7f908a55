pub mod activations;
pub mod conv3x3;

pub use conv3x3::{apply_layer, apply_layer_with, KernelError};
