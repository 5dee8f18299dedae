use ndarray::Array4;
use std::path::Path;
use std::sync::Mutex;
use tch::{CModule, Device, Kind, Tensor};

use super::model::{InferenceBackend, InferenceError};

/// TorchScript classifier. Expects an NHWC `[1, 224, 224, 3]` float input.
pub struct TorchBackend {
    module: Mutex<CModule>,
    device: Device,
}

impl TorchBackend {
    pub fn load(model_path: &Path) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        log::info!(
            "Loading TorchScript model {} on {:?}",
            model_path.display(),
            device
        );
        let module = CModule::load_on_device(model_path, device)
            .map_err(|e| InferenceError::Model(e.to_string()))?;
        Ok(Self {
            module: Mutex::new(module),
            device,
        })
    }
}

impl InferenceBackend for TorchBackend {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let tensor = Tensor::from_slice(&data)
            .view(shape.as_slice())
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::Model("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_ts(&[tensor]))
            .map_err(|e| InferenceError::Model(e.to_string()))?;

        let output_flat = output.to_kind(Kind::Float).to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }
}
