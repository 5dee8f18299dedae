pub mod model;
#[cfg(feature = "torch")]
pub mod torch;

pub use model::{InferenceBackend, InferenceError, ModelAdapter};
