use frame_pipeline::PipelineConfig;
use serde::Deserialize;
use std::path::PathBuf;

const RISK_PROMPT: &str = "List the physical risks and threats to human lives in the image and give percentage confidence score. If no risks are present, say 'No risks present'.";
const FALL_PROMPT: &str = "Respond in 1 sentence (Yes or No) and include confidence score, Is there any falling event? If no falling event are present, say: 'No. Confidence: 100%.";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub inference: InferenceConfig,
    pub source: SourceConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

impl Config {
    /// Pipeline settings with the instruction and timeout taken from the
    /// inference section.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            instruction: self.inference.instruction(),
            timeout_ms: self.inference.timeout_ms,
            ..self.pipeline.clone()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;
        self.display.validate()?;
        self.pipeline_config().validate()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromptPreset {
    Risk,
    Fall,
    Custom,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_prompt")]
    pub prompt: PromptPreset,
    #[serde(default)]
    pub custom_prompt: Option<String>,
}

fn default_model() -> String {
    "llava:7b".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_prompt() -> PromptPreset {
    PromptPreset::Risk
}

impl InferenceConfig {
    pub fn get_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn instruction(&self) -> String {
        match self.prompt {
            PromptPreset::Risk => RISK_PROMPT.to_string(),
            PromptPreset::Fall => FALL_PROMPT.to_string(),
            PromptPreset::Custom => self.custom_prompt.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Camera,
    File,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct CanvasSize {
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub kind: SourceKind,
    #[serde(default)]
    pub camera_index: i32,
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_width")]
    pub width: i32,
    #[serde(default = "default_height")]
    pub height: i32,
    #[serde(default = "default_camera_fps")]
    pub camera_fps: f64,
    #[serde(default = "default_offer_every")]
    pub offer_every: u64,
    #[serde(default)]
    pub letterbox: Option<CanvasSize>,
}

fn default_width() -> i32 {
    640
}

fn default_height() -> i32 {
    480
}

fn default_camera_fps() -> f64 {
    40.0
}

fn default_offer_every() -> u64 {
    1
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.kind == SourceKind::File && self.path.is_none() {
            return Err("Source kind `file` requires a `path`".to_string());
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(format!(
                "Source size must be positive, got {}x{}",
                self.width, self.height
            ));
        }
        if self.offer_every == 0 {
            return Err("`offer_every` must be at least 1".to_string());
        }
        if let Some(canvas) = self.letterbox {
            if canvas.width <= 0 || canvas.height <= 0 {
                return Err(format!(
                    "Letterbox canvas must be positive, got {}x{}",
                    canvas.width, canvas.height
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Deserialize, Debug)]
pub struct DisplayConfig {
    #[serde(default = "default_stream_fps")]
    pub stream_fps: u64,
    #[serde(default = "default_wrap_width")]
    pub wrap_width: usize,
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

fn default_stream_fps() -> u64 {
    30
}

fn default_wrap_width() -> usize {
    40
}

fn default_max_lines() -> usize {
    20
}

fn default_alpha() -> f64 {
    0.6
}

fn fps_to_delay_ms(fps: u64) -> u64 {
    (1000.0 / fps as f64).round() as u64
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            stream_fps: default_stream_fps(),
            wrap_width: default_wrap_width(),
            max_lines: default_max_lines(),
            alpha: default_alpha(),
        }
    }
}

impl DisplayConfig {
    pub fn get_stream_delay_ms(&self) -> u64 {
        fps_to_delay_ms(self.stream_fps)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.stream_fps == 0 {
            return Err("`stream_fps` must be at least 1".to_string());
        }
        if self.wrap_width == 0 || self.max_lines == 0 {
            return Err("`wrap_width` and `max_lines` must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(format!("`alpha` must be within 0..=1, got {}", self.alpha));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("OVERLAY")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        return Err(config::ConfigError::Message(e));
    }

    Ok(config)
}
