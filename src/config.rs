use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::categories::default_categories;
use crate::crops::{CropSynonyms, default_crops};
use crate::error::{KhetError, Result};

/// Main configuration structure for KhetAI
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub inference: InferenceConfig,
    pub context: ContextLimits,
    pub vocabulary: VocabularyConfig,
}

/// Where the reference tables live. File names are resolved against `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    pub villages: String,
    pub soil: String,
    pub weather_normals: String,
    pub market_prices: String,
    pub schemes: String,
    pub crop_calendar: String,
    pub pests: String,
    pub irrigation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferenceBackend {
    /// `ollama run <model>` as a child process
    Process,
    /// Ollama HTTP API
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub backend: InferenceBackend,
    pub model: String,
    pub ollama_binary: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub max_retries: u8,
    /// Prefer incremental output for answers
    pub stream: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
    pub market_limit: usize,
    pub scheme_limit: usize,
    pub calendar_limit: usize,
    pub pest_limit: usize,
    pub irrigation_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub crops: Vec<CropSynonyms>,
    pub categories: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            villages: "Villages.csv".to_string(),
            soil: "soil.csv".to_string(),
            weather_normals: "weather_normals.csv".to_string(),
            market_prices: "market_prices.csv".to_string(),
            schemes: "schemes.csv".to_string(),
            crop_calendar: "crop_calendar.csv".to_string(),
            pests: "pests.csv".to_string(),
            irrigation: "irrigation.csv".to_string(),
        }
    }
}

impl DataConfig {
    pub fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            backend: InferenceBackend::Process,
            model: "llama2".to_string(),
            ollama_binary: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.3,
            timeout_seconds: 300,
            max_retries: 3,
            stream: true,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            market_limit: 3,
            scheme_limit: 5,
            calendar_limit: 5,
            pest_limit: 5,
            irrigation_limit: 5,
        }
    }
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            crops: default_crops(),
            categories: default_categories(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::debug!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("KHETAI_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match Self::from_yaml_str(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| KhetError::Config(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup; the process environment in production.
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("KHETAI_DATA_DIR") {
            self.data.data_dir = PathBuf::from(dir);
        }

        if let Some(model) = lookup("KHETAI_MODEL") {
            self.inference.model = model;
        }
        if let Some(backend) = lookup("KHETAI_BACKEND") {
            match backend.to_lowercase().as_str() {
                "process" => self.inference.backend = InferenceBackend::Process,
                "http" => self.inference.backend = InferenceBackend::Http,
                other => tracing::warn!("Unknown KHETAI_BACKEND '{}', keeping configured", other),
            }
        }
        if let Some(bin) = lookup("OLLAMA_BIN") {
            self.inference.ollama_binary = bin;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.inference.base_url = url;
        }
        if let Some(timeout) = lookup("KHETAI_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.inference.timeout_seconds = secs;
            }
        }
        if let Some(stream) = lookup("KHETAI_STREAM") {
            if let Ok(flag) = stream.parse() {
                self.inference.stream = flag;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.inference.model.trim().is_empty() {
            return Err(KhetError::Config("inference.model cannot be empty".into()));
        }
        if self.inference.timeout_seconds == 0 {
            return Err(KhetError::Config("inference.timeout_seconds cannot be 0".into()));
        }
        if !(0.0..=2.0).contains(&self.inference.temperature) {
            return Err(KhetError::Config(
                "inference.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        let limits = self.context;
        for (name, val) in [
            ("market_limit", limits.market_limit),
            ("scheme_limit", limits.scheme_limit),
            ("calendar_limit", limits.calendar_limit),
            ("pest_limit", limits.pest_limit),
            ("irrigation_limit", limits.irrigation_limit),
        ] {
            if val == 0 {
                return Err(KhetError::Config(format!("context.{name} cannot be 0")));
            }
        }

        if !self
            .vocabulary
            .categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case("other"))
        {
            return Err(KhetError::Config(
                "vocabulary.categories must include \"other\"".into(),
            ));
        }

        // Questions are matched one word at a time
        for crop in &self.vocabulary.crops {
            if let Some(word) = std::iter::once(&crop.name)
                .chain(&crop.synonyms)
                .find(|w| w.trim().contains(char::is_whitespace))
            {
                return Err(KhetError::Config(format!(
                    "vocabulary.crops entry '{word}' has several words and can never match"
                )));
            }
        }

        Ok(())
    }
}
