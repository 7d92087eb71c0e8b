use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DubError, Result};
use crate::services::PollConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the transcription service.
    pub transcription_url: Option<String>,
    /// Base URL of the translation service.
    pub translation_url: Option<String>,
    /// Basic-auth credentials shared by the transcription/translation services.
    pub service_username: Option<String>,
    pub service_password: Option<String>,
    /// API key for the speech-synthesis service.
    pub synthesis_api_key: Option<String>,

    /// Root directory for job-scoped storage namespaces.
    pub storage_root: PathBuf,
    /// Videos longer than this are rejected before any job is scheduled.
    pub max_video_duration_secs: f64,
    /// Concurrent fragment requests per stage.
    pub concurrency: usize,

    /// Seconds before the first status poll of a remote task.
    pub poll_initial_delay_secs: u64,
    /// Cap in seconds for the growing poll delay.
    pub poll_max_delay_secs: u64,
    /// Overall deadline in seconds for one remote task.
    pub poll_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcription_url: None,
            translation_url: None,
            service_username: None,
            service_password: None,
            synthesis_api_key: None,
            storage_root: std::env::temp_dir().join("redub"),
            max_video_duration_secs: 600.0,
            concurrency: 4,
            poll_initial_delay_secs: 2,
            poll_max_delay_secs: 30,
            poll_timeout_secs: 15 * 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(url) = std::env::var("REDUB_TRANSCRIPTION_URL") {
            config.transcription_url = Some(url);
        }
        if let Ok(url) = std::env::var("REDUB_TRANSLATION_URL") {
            config.translation_url = Some(url);
        }
        if let Ok(user) = std::env::var("REDUB_SERVICE_USERNAME") {
            config.service_username = Some(user);
        }
        if let Ok(pass) = std::env::var("REDUB_SERVICE_PASSWORD") {
            config.service_password = Some(pass);
        }
        if let Ok(key) = std::env::var("REDUB_SYNTHESIS_API_KEY") {
            config.synthesis_api_key = Some(key);
        }
        if let Ok(root) = std::env::var("REDUB_STORAGE_ROOT") {
            config.storage_root = PathBuf::from(root);
        }
        if let Ok(max) = std::env::var("REDUB_MAX_VIDEO_DURATION_SECS") {
            if let Ok(m) = max.parse() {
                config.max_video_duration_secs = m;
            }
        }
        if let Ok(concurrency) = std::env::var("REDUB_CONCURRENCY") {
            if let Ok(c) = concurrency.parse() {
                config.concurrency = c;
            }
        }
        if let Ok(timeout) = std::env::var("REDUB_POLL_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse() {
                config.poll_timeout_secs = t;
            }
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.transcription_url.is_none() {
            return Err(DubError::Config(
                "REDUB_TRANSCRIPTION_URL not set".to_string(),
            ));
        }
        if self.translation_url.is_none() {
            return Err(DubError::Config(
                "REDUB_TRANSLATION_URL not set".to_string(),
            ));
        }
        if self.synthesis_api_key.is_none() {
            return Err(DubError::Config(
                "REDUB_SYNTHESIS_API_KEY not set".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(DubError::Config(
                "Concurrency must be greater than 0".to_string(),
            ));
        }
        if self.max_video_duration_secs <= 0.0 {
            return Err(DubError::Config(
                "Max video duration must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            initial_delay: Duration::from_secs(self.poll_initial_delay_secs),
            max_delay: Duration::from_secs(self.poll_max_delay_secs),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("redub").join("config.toml"))
    }
}
