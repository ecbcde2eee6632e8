use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::TranslatorError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Job pipeline settings
    pub pipeline: PipelineConfig,

    /// External providers
    pub providers: ProvidersConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port for both HTTP and the WebSocket push channel
    pub port: u16,

    /// Directory with additional static assets for the client page
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Language used when a request does not name one
    pub default_target_language: String,

    /// Root for temporary audio artifacts (system temp dir if not set)
    pub temp_dir: Option<PathBuf>,

    /// Upper bound for downloading and converting audio
    pub fetch_timeout_secs: u64,

    /// Upper bound for one speech-to-text call
    pub transcription_timeout_secs: u64,

    /// Upper bound for one translation call
    pub translation_timeout_secs: u64,

    /// Times the speech-to-text provider is tried per job
    pub transcription_attempts: u32,

    /// Events queued per observer before new ones are skipped
    pub observer_buffer: usize,

    /// Length of the pieces long audio is cut into before transcription (0 sends whole files)
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u64,
}

fn default_segment_secs() -> u64 {
    300
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub extractor: ExtractorConfig,
    pub transcription: TranscriptionConfig,
    pub translation: TranslationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// yt-dlp executable
    pub yt_dlp_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// OpenAI API key (`OPENAI_API_KEY` overrides)
    pub api_key: String,

    /// Base URL of an OpenAI-compatible API
    pub base_url: String,

    /// Speech-to-text model
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Google Cloud API key (`GOOGLE_API_KEY` overrides)
    pub api_key: String,

    /// Translation v2 endpoint
    pub endpoint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines (`LOG_FORMAT=json` overrides)
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                static_dir: Some(PathBuf::from("public")),
            },
            pipeline: PipelineConfig {
                default_target_language: "ar".to_string(),
                temp_dir: None,
                fetch_timeout_secs: 600,
                transcription_timeout_secs: 300,
                translation_timeout_secs: 30,
                transcription_attempts: 1,
                observer_buffer: 64,
                segment_secs: default_segment_secs(),
            },
            providers: ProvidersConfig {
                extractor: ExtractorConfig {
                    yt_dlp_path: "yt-dlp".to_string(),
                },
                transcription: TranscriptionConfig {
                    api_key: String::new(),
                    base_url: "https://api.openai.com/v1".to_string(),
                    model: "whisper-1".to_string(),
                },
                translation: TranslationConfig {
                    api_key: String::new(),
                    endpoint: "https://translation.googleapis.com/language/translate/v2".to_string(),
                },
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        let config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            let config = Self::default();
            config.save_to(&config_path)?;
            // Tracing is not initialised yet
            eprintln!("Created default configuration at {}", config_path.display());
            config
        };

        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Read and parse a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("video-translator").join("config.yaml"))
    }

    /// Apply environment overrides; `lookup` is `std::env::var` outside tests
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
            self.providers.transcription.api_key = key;
        }
        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|v| !v.is_empty()) {
            self.providers.translation.api_key = key;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.json = format.eq_ignore_ascii_case("json");
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.providers.transcription.api_key.trim().is_empty() {
            return invalid("transcription API key must be configured (set OPENAI_API_KEY)");
        }
        if self.pipeline.default_target_language.trim().is_empty() {
            return invalid("default target language must not be empty");
        }
        if self.pipeline.fetch_timeout_secs == 0
            || self.pipeline.transcription_timeout_secs == 0
            || self.pipeline.translation_timeout_secs == 0
        {
            return invalid("stage timeouts must be greater than zero");
        }
        if self.pipeline.transcription_attempts == 0 {
            return invalid("transcription_attempts must be at least 1");
        }

        if self.providers.translation.api_key.trim().is_empty() {
            tracing::warn!("No translation API key configured, transcripts will be returned untranslated");
        }

        Ok(())
    }

    /// Root directory for audio artifacts
    pub fn temp_root(&self) -> PathBuf {
        self.pipeline
            .temp_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("video-translator"))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.fetch_timeout_secs)
    }

    pub fn transcription_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.transcription_timeout_secs)
    }

    pub fn translation_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.translation_timeout_secs)
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        if let Some(dir) = &self.server.static_dir {
            println!("  Static Dir: {}", dir.display());
        }
        println!("  Default Language: {}", self.pipeline.default_target_language);
        println!("  Temp Dir: {}", self.temp_root().display());
        match self.pipeline.segment_secs {
            0 => println!("  Audio Segments: off"),
            secs => println!("  Audio Segments: {}s", secs),
        }
        println!("  yt-dlp: {}", self.providers.extractor.yt_dlp_path);
        println!("  Transcription: {} ({})", self.providers.transcription.model, self.providers.transcription.base_url);
        println!("  Transcription Key: {}", mask(&self.providers.transcription.api_key));
        println!("  Translation Key: {}", mask(&self.providers.translation.api_key));
        println!("  JSON Logs: {}", self.logging.json);
    }
}

fn invalid(msg: &str) -> Result<()> {
    Err(TranslatorError::ConfigError(msg.to_string()).into())
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<not set>"
    } else {
        "<set>"
    }
}
