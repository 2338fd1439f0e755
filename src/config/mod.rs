use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listener settings
    pub server: ServerConfig,

    /// Transient file storage
    pub staging: StagingConfig,

    /// yt-dlp invocation settings
    pub acquisition: AcquisitionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// Port to bind
    pub port: u16,

    /// Allowed CORS origins ("*" or empty allows any)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory for files produced by yt-dlp before they are streamed
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// yt-dlp executable name or path
    pub yt_dlp_path: String,

    /// Directory or binary path handed to yt-dlp as --ffmpeg-location
    pub ffmpeg_location: Option<PathBuf>,

    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,

    /// Abort a fetch after this many seconds (no limit when unset)
    pub timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: Vec::new(),
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("downloads"),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            ffmpeg_location: None,
            max_concurrent_jobs: 3,
            timeout_secs: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            staging: StagingConfig::default(),
            acquisition: AcquisitionConfig::default(),
        }
    }
}

impl AcquisitionConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load configuration from file or fall back to defaults
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file at {}, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs_err::read_to_string(path)
            .context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content)
            .context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<PathBuf> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(config_path)
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

        Ok(config_dir.join("media-fetch").join("config.yaml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }

        if self.acquisition.max_concurrent_jobs == 0 {
            anyhow::bail!("acquisition.max_concurrent_jobs must be at least 1");
        }

        if self.acquisition.timeout_secs == Some(0) {
            anyhow::bail!("acquisition.timeout_secs must be at least 1 when set");
        }

        if self.acquisition.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("acquisition.yt_dlp_path must not be empty");
        }

        Ok(())
    }

    /// Apply command line / environment overrides
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self
    }

    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid bind address {}:{}",
                    self.server.host, self.server.port
                )
            })
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Listen: {}:{}", self.server.host, self.server.port);
        if self.server.cors_origins.is_empty() {
            println!("  CORS Origins: any");
        } else {
            println!("  CORS Origins: {}", self.server.cors_origins.join(", "));
        }
        println!("  Staging Dir: {}", self.staging.dir.display());
        println!("  yt-dlp: {}", self.acquisition.yt_dlp_path);
        if let Some(ffmpeg) = &self.acquisition.ffmpeg_location {
            println!("  ffmpeg: {}", ffmpeg.display());
        }
        println!("  Max Concurrent Jobs: {}", self.acquisition.max_concurrent_jobs);
        match self.acquisition.timeout_secs {
            Some(secs) => println!("  Timeout: {}s", secs),
            None => println!("  Timeout: none"),
        }
    }
}
