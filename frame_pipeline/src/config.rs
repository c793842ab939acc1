use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PipelineConfig {
    #[serde(default)]
    pub instruction: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_jpeg_quality() -> u8 {
    30
}

fn default_min_interval_ms() -> u64 {
    1_000
}

fn default_backoff_factor() -> u32 {
    1
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            instruction: String::new(),
            timeout_ms: default_timeout_ms(),
            jpeg_quality: default_jpeg_quality(),
            min_interval_ms: default_min_interval_ms(),
            backoff_factor: default_backoff_factor(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl PipelineConfig {
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.instruction.trim().is_empty() {
            return Err("Pipeline instruction must not be empty".to_string());
        }
        if self.timeout_ms == 0 {
            return Err("Inference timeout must be greater than zero".to_string());
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(format!(
                "JPEG quality must be between 1 and 100, got {}",
                self.jpeg_quality
            ));
        }
        if self.min_interval_ms == 0 {
            return Err("Minimum interval between inference calls must be greater than zero".to_string());
        }
        if self.backoff_factor == 0 {
            return Err("Backoff factor must be at least 1".to_string());
        }
        if self.max_backoff_ms < self.min_interval_ms {
            return Err(format!(
                "Maximum backoff ({} ms) is shorter than the minimum interval ({} ms)",
                self.max_backoff_ms, self.min_interval_ms
            ));
        }
        Ok(())
    }
}
