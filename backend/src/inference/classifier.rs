use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use tch::nn::ModuleT;
use tch::{CModule, Device, Kind, Tensor};

use crate::inference::labels::{CLASS_NAMES, LABEL_UNKNOWN};

const INPUT_SIZE: u32 = 224;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("preprocessing error: {0}")]
    Preprocessing(String),
    #[error("model error: {0}")]
    Model(#[from] tch::TchError),
}

/// Opaque classification step: one image in, one labeled prediction out.
/// Implementations must be safe for concurrent use by in-flight requests.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &[u8]) -> Result<Prediction, InferenceError>;

    fn degraded(&self) -> bool {
        false
    }
}

pub struct TorchClassifier {
    module: Arc<Mutex<CModule>>,
    device: Device,
}

impl TorchClassifier {
    pub fn load(model_path: &str) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(model_path, device)?;
        log::info!("Leaf model loaded from {} on {:?}", model_path, device);
        Ok(Self {
            module: Arc::new(Mutex::new(module)),
            device,
        })
    }

    fn preprocess(&self, image: &[u8]) -> Result<Tensor, InferenceError> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| InferenceError::Preprocessing(e.to_string()))?
            .to_rgb8();
        let resized = image::imageops::resize(
            &decoded,
            INPUT_SIZE,
            INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let plane = (INPUT_SIZE * INPUT_SIZE) as usize;
        let mut chw = vec![0f32; 3 * plane];
        for (x, y, pixel) in resized.enumerate_pixels() {
            let offset = (y * INPUT_SIZE + x) as usize;
            for c in 0..3 {
                chw[c * plane + offset] = pixel[c] as f32 / 255.0;
            }
        }

        Ok(Tensor::from_slice(&chw)
            .view([1, 3, INPUT_SIZE as i64, INPUT_SIZE as i64])
            .to_device(self.device))
    }
}

impl Classifier for TorchClassifier {
    fn classify(&self, image: &[u8]) -> Result<Prediction, InferenceError> {
        let tensor = self.preprocess(image)?;
        let output = self.module.lock().unwrap().forward_t(&tensor, false);
        let output = output.softmax(-1, Kind::Float).view([-1]);

        let num_elements = output.size()[0] as usize;
        let mut scores = vec![0.0f32; num_elements];
        output.to_kind(Kind::Float).copy_data(&mut scores, num_elements);

        let (best_idx, best_score) = scores
            .iter()
            .enumerate()
            .fold((0usize, f32::MIN), |(bi, bs), (i, &s)| {
                if s > bs { (i, s) } else { (bi, bs) }
            });

        let label = CLASS_NAMES
            .get(best_idx)
            .copied()
            .unwrap_or(LABEL_UNKNOWN)
            .to_string();

        Ok(Prediction {
            label,
            confidence: best_score as f64,
        })
    }
}

static DEGRADED_WARN: Once = Once::new();
static DEGRADED_WARN_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Stand-in classifier for when no model could be loaded at startup. Every
/// call yields the fixed "unknown" prediction so the rest of the pipeline
/// stays exercisable; the warning fires once per process, not per call.
pub struct DegradedClassifier;

impl Classifier for DegradedClassifier {
    fn classify(&self, _image: &[u8]) -> Result<Prediction, InferenceError> {
        DEGRADED_WARN.call_once(|| {
            DEGRADED_WARN_COUNT.fetch_add(1, Ordering::SeqCst);
            log::warn!("Classifier running in degraded mode, returning mock predictions");
        });
        Ok(Prediction {
            label: LABEL_UNKNOWN.to_string(),
            confidence: 0.0,
        })
    }

    fn degraded(&self) -> bool {
        true
    }
}

/// Loads the Torch model once at startup, falling back to degraded mode when
/// it is missing or unloadable.
pub fn load_classifier(model_path: &str) -> Arc<dyn Classifier> {
    match TorchClassifier::load(model_path) {
        Ok(classifier) => Arc::new(classifier),
        Err(e) => {
            log::error!("Failed to load leaf model from {}: {}", model_path, e);
            Arc::new(DegradedClassifier)
        }
    }
}

#[cfg(test)]
pub fn degraded_warn_count() -> usize {
    DEGRADED_WARN_COUNT.load(Ordering::SeqCst)
}
