use image::imageops::FilterType;
use ndarray::Array4;
use shared::{ClassificationResult, DiseaseLabel};
use std::path::Path;
use strum::EnumCount;

pub const INPUT_SIZE: usize = 224;
pub const INPUT_CHANNELS: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Preprocessing error: {0}")]
    Preprocessing(String),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Model produced {actual} outputs, expected {expected}")]
    OutputShape { expected: usize, actual: usize },
    #[error("Model produced a non-finite output")]
    NonFinite,
    #[error("Model not loaded: {0}")]
    NotLoaded(String),
}

/// A forward pass over a preprocessed `[1, 224, 224, 3]` batch.
pub trait InferenceBackend: Send + Sync {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// Wraps the loaded classifier. Classification never fails: any error
/// degrades to the `Error` prediction with zero confidence.
pub struct ModelAdapter {
    backend: Option<Box<dyn InferenceBackend>>,
}

impl ModelAdapter {
    /// Validates the backend with a warm-up pass before accepting it.
    pub fn with_backend(backend: Box<dyn InferenceBackend>) -> Result<Self, InferenceError> {
        let warm_up = Array4::<f32>::zeros((1, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS));
        let output = backend.forward(&warm_up)?;
        if output.len() != DiseaseLabel::COUNT {
            return Err(InferenceError::OutputShape {
                expected: DiseaseLabel::COUNT,
                actual: output.len(),
            });
        }
        Ok(Self {
            backend: Some(backend),
        })
    }

    pub fn unavailable() -> Self {
        Self { backend: None }
    }

    #[cfg(feature = "torch")]
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        let backend = super::torch::TorchBackend::load(model_path)?;
        Self::with_backend(Box::new(backend))
    }

    #[cfg(not(feature = "torch"))]
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        Err(InferenceError::NotLoaded(format!(
            "{} cannot be loaded: built without the `torch` feature",
            model_path.display()
        )))
    }

    pub fn classify(&self, image_path: &Path) -> ClassificationResult {
        match std::fs::read(image_path)
            .map_err(InferenceError::from)
            .and_then(|data| self.try_classify(&data))
        {
            Ok(result) => result,
            Err(e) => {
                log::error!("Error in prediction for {}: {}", image_path.display(), e);
                ClassificationResult::error()
            }
        }
    }

    fn try_classify(&self, image_data: &[u8]) -> Result<ClassificationResult, InferenceError> {
        let backend = self
            .backend
            .as_ref()
            .ok_or_else(|| InferenceError::NotLoaded("no model available".to_string()))?;
        let input = preprocess(image_data)?;
        let output = backend.forward(&input)?;
        let probabilities = normalize_probabilities(output)?;
        let result = ClassificationResult::from_probabilities(&probabilities);
        log::debug!(
            "Predicted {} with confidence {:.4}",
            result.prediction,
            result.confidence
        );
        Ok(result)
    }
}

/// Decodes, resizes to 224x224 (nearest) and scales RGB to [0, 1], NHWC.
pub fn preprocess(image_data: &[u8]) -> Result<Array4<f32>, InferenceError> {
    let image = image::load_from_memory(image_data)
        .map_err(|e| InferenceError::Preprocessing(e.to_string()))?;
    let rgb = image
        .resize_exact(INPUT_SIZE as u32, INPUT_SIZE as u32, FilterType::Nearest)
        .to_rgb8();

    let mut tensor = Array4::<f32>::zeros((1, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for channel in 0..INPUT_CHANNELS {
            tensor[[0, y as usize, x as usize, channel]] = pixel[channel] as f32 / 255.0;
        }
    }
    Ok(tensor)
}

/// Applies softmax unless the output already lies in [0, 1].
pub fn normalize_probabilities(output: Vec<f32>) -> Result<Vec<f32>, InferenceError> {
    if output.iter().any(|v| !v.is_finite()) {
        return Err(InferenceError::NonFinite);
    }
    if output.iter().all(|v| (0.0..=1.0).contains(v)) {
        return Ok(output);
    }

    let max = output.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = output.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    Ok(exps.into_iter().map(|v| v / sum).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb};
    use shared::Prediction;
    use std::io::Cursor;

    struct FixedBackend(Vec<f32>);

    impl InferenceBackend for FixedBackend {
        fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
            assert_eq!(input.shape(), &[1, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS]);
            Ok(self.0.clone())
        }
    }

    fn one_hot(index: usize, value: f32) -> Vec<f32> {
        let rest = (1.0 - value) / (DiseaseLabel::COUNT - 1) as f32;
        let mut probs = vec![rest; DiseaseLabel::COUNT];
        probs[index] = value;
        probs
    }

    /// Writes `data` into a temp dir and classifies it by path.
    fn classify_file(adapter: &ModelAdapter, data: &[u8]) -> ClassificationResult {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.png");
        std::fs::write(&path, data).unwrap();
        adapter.classify(&path)
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_pixel(width, height, Rgb([255u8, 0, 51]));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn preprocess_scales_and_resizes() {
        let tensor = preprocess(&png_bytes(40, 17)).unwrap();
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!((tensor[[0, 10, 10, 0]] - 1.0).abs() < 1e-6);
        assert_eq!(tensor[[0, 10, 10, 1]], 0.0);
        assert!((tensor[[0, 223, 223, 2]] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn preprocess_rejects_non_images() {
        let err = preprocess(b"definitely not an image").unwrap_err();
        assert!(matches!(err, InferenceError::Preprocessing(_)));
    }

    #[test]
    fn classify_reports_top_label() {
        let adapter =
            ModelAdapter::with_backend(Box::new(FixedBackend(one_hot(8, 0.8)))).unwrap();
        let result = classify_file(&adapter, &png_bytes(8, 8));
        assert_eq!(result.prediction, Prediction::Disease(DiseaseLabel::GrayLeafSpot));
        assert!((result.confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn classify_below_threshold_is_unknown() {
        let adapter =
            ModelAdapter::with_backend(Box::new(FixedBackend(one_hot(8, 0.3)))).unwrap();
        let result = classify_file(&adapter, &png_bytes(8, 8));
        assert_eq!(result.prediction, Prediction::Unknown);
        assert!(result.confidence >= 0.0 && result.confidence <= 1.0);
    }

    #[test]
    fn logits_are_softmaxed_into_range() {
        let mut logits = vec![-2.0f32; DiseaseLabel::COUNT];
        logits[1] = 6.0;
        let adapter = ModelAdapter::with_backend(Box::new(FixedBackend(logits))).unwrap();
        let result = classify_file(&adapter, &png_bytes(8, 8));
        assert_eq!(result.prediction, Prediction::Disease(DiseaseLabel::Armyworm));
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);
    }

    #[test]
    fn wrong_output_width_is_rejected_at_load() {
        let err = ModelAdapter::with_backend(Box::new(FixedBackend(vec![1.0, 0.0])))
            .err()
            .unwrap();
        assert!(matches!(
            err,
            InferenceError::OutputShape {
                expected: 13,
                actual: 2
            }
        ));
    }

    #[test]
    fn failures_degrade_to_error_label() {
        let adapter =
            ModelAdapter::with_backend(Box::new(FixedBackend(one_hot(0, 0.9)))).unwrap();
        let result = classify_file(&adapter, b"garbage");
        assert_eq!(result.prediction, Prediction::Error);
        assert_eq!(result.confidence, 0.0);

        let missing = adapter.classify(Path::new("/nonexistent/leaf.png"));
        assert_eq!(missing.prediction, Prediction::Error);

        let unloaded = ModelAdapter::unavailable();
        assert_eq!(
            classify_file(&unloaded, &png_bytes(8, 8)).prediction,
            Prediction::Error
        );
    }

    #[test]
    fn non_finite_output_is_an_error() {
        assert!(matches!(
            normalize_probabilities(vec![0.2, f32::NAN]),
            Err(InferenceError::NonFinite)
        ));
    }
}
