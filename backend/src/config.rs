use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub intake: IntakeConfig,
    #[serde(default)]
    pub severity: SeverityThresholds,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    #[serde(default)]
    pub max_batch_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeverityThresholds {
    #[serde(default = "default_low_max")]
    pub low_max: f64,
    #[serde(default = "default_high_min")]
    pub high_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_generator_model")]
    pub model: String,
}

fn default_max_image_bytes() -> usize {
    12 * 1024 * 1024
}

fn default_low_max() -> f64 {
    0.5
}

fn default_high_min() -> f64 {
    0.85
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_generator_model() -> String {
    "gemini-1.5-flash".to_string()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_batch_size: None,
        }
    }
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            low_max: default_low_max(),
            high_min: default_high_min(),
        }
    }
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            model: default_generator_model(),
        }
    }
}

impl PipelineConfig {
    /// Reads the pipeline config, falling back to defaults when no file is present.
    pub fn load() -> Self {
        let path = std::env::var("PIPELINE_CONFIG_PATH").unwrap_or_else(|_| {
            match std::env::var("CARGO_MANIFEST_DIR") {
                Ok(manifest_dir) => format!("{}/../config/pipeline.yaml", manifest_dir),
                Err(_) => "config/pipeline.yaml".to_string(),
            }
        });

        match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_yaml::from_str(&raw) {
                Ok(config) => {
                    log::info!("Loaded pipeline config from {}", path);
                    config
                }
                Err(e) => {
                    log::error!("Invalid pipeline config at {}: {}, using defaults", path, e);
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No pipeline config at {}, using defaults", path);
                Self::default()
            }
        }
    }
}
