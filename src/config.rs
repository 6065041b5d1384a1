use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, Context};
use log::{info, warn, error};

use crate::audio::AudioSettings;
use crate::error::{ConfigError, CredentialField};
use crate::network::{ConnectionInfo, ConnectionType, EffectiveType, StaticDeviceInfo};
use crate::resilience::RetryPolicy;

pub const PUBLIC_KEY_ENV: &str = "VOXLINK_PUBLIC_KEY";
pub const ASSISTANT_ID_ENV: &str = "VOXLINK_ASSISTANT_ID";

/// Persistent application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub credentials: CredentialSettings,
    pub probe: ProbeSettings,
    pub device: DeviceSettings,
    pub session: SessionSettings,
    pub retry: RetrySettings,
    pub cellular_audio: CellularAudioSettings,
    pub health: HealthSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    pub public_key: Option<String>,
    pub assistant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub url: String,
    pub timeout_ms: u64,
    pub rtt_threshold_ms: u64,
}

/// Static stand-in for the platform's connection metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    pub mobile: bool,
    pub connection_type: Option<String>,
    pub effective_type: Option<String>,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// How long a hang-up waits for the transport before forcing idle
    pub ending_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub cellular_max_attempts: u32,
    pub retry_delay_ms: u64,
    pub cellular_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CellularAudioSettings {
    pub max_bitrate_kbps: u32,
    pub disable_video: bool,
    pub disable_background_denoising: bool,
    pub enable_fec: bool,
    pub enable_dtx: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    pub history_size: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/health".to_string(),
            timeout_ms: 3000,
            rtt_threshold_ms: 150,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self { ending_timeout_ms: 5000 }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cellular_max_attempts: 2,
            retry_delay_ms: 2000,
            cellular_retry_delay_ms: 3000,
        }
    }
}

impl Default for CellularAudioSettings {
    fn default() -> Self {
        Self {
            max_bitrate_kbps: 24,
            disable_video: true,
            disable_background_denoising: true,
            enable_fec: true,
            enable_dtx: true,
        }
    }
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self { history_size: 100 }
    }
}

/// Where session credentials come from. Read again before every attempt.
pub trait CredentialSource: Send + Sync {
    fn credentials(&self) -> Credentials;
}

impl CredentialSource for Credentials {
    fn credentials(&self) -> Credentials {
        self.clone()
    }
}

impl CredentialSource for AppConfig {
    fn credentials(&self) -> Credentials {
        AppConfig::credentials(self)
    }
}

/// Credentials needed to open a session. Blank values count as missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub public_key: Option<String>,
    pub assistant_id: Option<String>,
}

/// Credentials that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCredentials {
    pub public_key: String,
    pub assistant_id: String,
}

impl Credentials {
    pub fn new(public_key: impl Into<String>, assistant_id: impl Into<String>) -> Self {
        Self {
            public_key: Some(public_key.into()),
            assistant_id: Some(assistant_id.into()),
        }
    }

    pub fn from_env() -> Self {
        Self {
            public_key: std::env::var(PUBLIC_KEY_ENV).ok(),
            assistant_id: std::env::var(ASSISTANT_ID_ENV).ok(),
        }
    }

    /// Fill fields missing here from `fallback`
    pub fn or(self, fallback: Credentials) -> Self {
        Self {
            public_key: non_blank(self.public_key).or(non_blank(fallback.public_key)),
            assistant_id: non_blank(self.assistant_id).or(non_blank(fallback.assistant_id)),
        }
    }

    pub fn validate(&self) -> Result<ValidCredentials, ConfigError> {
        let public_key = non_blank(self.public_key.clone());
        let assistant_id = non_blank(self.assistant_id.clone());

        match (public_key, assistant_id) {
            (Some(public_key), Some(assistant_id)) => Ok(ValidCredentials {
                public_key,
                assistant_id,
            }),
            (public_key, assistant_id) => {
                let mut missing = Vec::new();
                if public_key.is_none() {
                    missing.push(CredentialField::PublicKey);
                }
                if assistant_id.is_none() {
                    missing.push(CredentialField::AssistantId);
                }
                Err(ConfigError::MissingCredentials(missing))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config_path: PathBuf::from("fallback_config.toml"),
            config,
        }
    }

    pub fn new() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        Self::load(config_path)
    }

    /// Load from an explicit path, creating a default file when absent
    pub fn load(config_path: PathBuf) -> Result<Self> {
        let config = Self::load_or_create_config(&config_path)?;

        Ok(Self {
            config_path,
            config,
        })
    }

    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config(&mut self, config: AppConfig) -> Result<()> {
        self.config = config;
        self.save_config()
    }

    pub fn save_config(&self) -> Result<()> {
        Self::save_config_to_path(&self.config, &self.config_path)?;
        info!("Configuration saved to: {:?}", self.config_path);
        Ok(())
    }

    fn load_or_create_config(config_path: &Path) -> Result<AppConfig> {
        if config_path.exists() {
            info!("Loading configuration from: {:?}", config_path);
            let config_str = fs::read_to_string(config_path)
                .context("Failed to read configuration file")?;

            match toml::from_str::<AppConfig>(&config_str) {
                Ok(config) => {
                    info!("Configuration loaded successfully");
                    Ok(config)
                }
                Err(e) => {
                    warn!("Failed to parse configuration file: {}. Using defaults.", e);
                    Ok(AppConfig::default())
                }
            }
        } else {
            info!("No configuration file found. Creating default configuration.");
            let default_config = AppConfig::default();

            if let Err(e) = Self::save_config_to_path(&default_config, config_path) {
                error!("Failed to save default configuration: {}", e);
            }

            Ok(default_config)
        }
    }

    fn save_config_to_path(config: &AppConfig, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(config)
            .context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        fs::write(path, config_str)
            .context("Failed to write configuration file")?;

        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("voxlink")
        } else {
            let home_dir = dirs::home_dir()
                .context("Could not determine home directory")?;
            home_dir.join(".voxlink")
        };

        Ok(config_dir.join("config.toml"))
    }
}

// Conversions into the runtime components
impl AppConfig {
    /// File credentials with environment variables taking precedence
    pub fn credentials(&self) -> Credentials {
        Credentials::from_env().or(Credentials {
            public_key: self.credentials.public_key.clone(),
            assistant_id: self.credentials.assistant_id.clone(),
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }

    pub fn ending_timeout(&self) -> Duration {
        Duration::from_millis(self.session.ending_timeout_ms)
    }

    pub fn rtt_threshold(&self) -> Duration {
        Duration::from_millis(self.probe.rtt_threshold_ms)
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            cellular_max_attempts: self.retry.cellular_max_attempts,
            retry_delay: Duration::from_millis(self.retry.retry_delay_ms),
            cellular_retry_delay: Duration::from_millis(self.retry.cellular_retry_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn to_device_info(&self) -> StaticDeviceInfo {
        let device = &self.device;
        let has_metadata = device.connection_type.is_some()
            || device.effective_type.is_some()
            || device.downlink_mbps.is_some()
            || device.rtt_ms.is_some();

        let connection = has_metadata.then(|| ConnectionInfo {
            connection_type: device
                .connection_type
                .as_deref()
                .map(ConnectionType::from_platform),
            effective_type: device
                .effective_type
                .as_deref()
                .map(EffectiveType::from_platform)
                .unwrap_or(EffectiveType::Unknown),
            downlink_mbps: device.downlink_mbps,
            rtt_ms: device.rtt_ms,
        });

        StaticDeviceInfo::new(device.mobile, connection)
    }

    /// Settings pushed before a cellular call is asked to begin
    pub fn to_cellular_prestart_audio(&self) -> AudioSettings {
        let cellular = &self.cellular_audio;
        AudioSettings {
            video_enabled: !cellular.disable_video,
            max_bitrate_kbps: Some(cellular.max_bitrate_kbps),
            background_denoising: !cellular.disable_background_denoising,
            ..AudioSettings::default()
        }
    }

    /// Settings added once a cellular call is up
    pub fn to_cellular_in_call_audio(&self) -> AudioSettings {
        AudioSettings {
            fec_enabled: self.cellular_audio.enable_fec,
            dtx_enabled: self.cellular_audio.enable_dtx,
            ..self.to_cellular_prestart_audio()
        }
    }
}
