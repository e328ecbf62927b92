use crate::config::IntakeConfig;
use crate::error::PipelineError;

/// A submitted image as it arrives from the multipart layer.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Clone)]
pub struct ImageIntakeValidator {
    config: IntakeConfig,
}

impl ImageIntakeValidator {
    pub fn new(config: IntakeConfig) -> Self {
        Self { config }
    }

    /// Validates a submitted batch and returns the accepted subset.
    ///
    /// Individually bad images are dropped with a logged reason; a batch that
    /// ends up with zero accepted images is a hard failure naming every
    /// rejected item, and nothing downstream runs for it.
    pub fn validate(&self, batch: Vec<RawImage>) -> Result<Vec<RawImage>, PipelineError> {
        if batch.is_empty() {
            return Err(PipelineError::InvalidInput(
                "image batch is empty".to_string(),
            ));
        }

        if let Some(max) = self.config.max_batch_size {
            if batch.len() > max {
                return Err(PipelineError::InvalidInput(format!(
                    "batch of {} images exceeds the maximum of {}",
                    batch.len(),
                    max
                )));
            }
        }

        let mut accepted = Vec::new();
        let mut rejected: Vec<(String, String)> = Vec::new();

        for raw in batch {
            match self.check_image(&raw) {
                Ok(()) => accepted.push(raw),
                Err(reason) => {
                    log::warn!("Rejected image {}: {}", raw.file_name, reason);
                    rejected.push((raw.file_name, reason));
                }
            }
        }

        if accepted.is_empty() {
            let detail = rejected
                .iter()
                .map(|(name, reason)| format!("{} ({})", name, reason))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(PipelineError::InvalidInput(format!(
                "no valid images in batch: {}",
                detail
            )));
        }

        Ok(accepted)
    }

    fn check_image(&self, raw: &RawImage) -> Result<(), String> {
        if raw.bytes.is_empty() {
            return Err("empty file".to_string());
        }

        if raw.bytes.len() > self.config.max_image_bytes {
            return Err(format!(
                "exceeds the {} byte limit",
                self.config.max_image_bytes
            ));
        }

        match image::guess_format(&raw.bytes) {
            Ok(_) => {}
            Err(_) => return Err("not a supported image format".to_string()),
        }

        image::load_from_memory(&raw.bytes)
            .map(|_| ())
            .map_err(|e| format!("failed to decode: {}", e))
    }
}
