use std::sync::Arc;
use std::time::{Duration, Instant};
use anyhow::{Result, anyhow, Context};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Connection quality bucket as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "slow-2g")]
    Slow2g,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    pub fn from_platform(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "slow-2g" => EffectiveType::Slow2g,
            "2g" => EffectiveType::TwoG,
            "3g" => EffectiveType::ThreeG,
            "4g" => EffectiveType::FourG,
            _ => EffectiveType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectiveType::Slow2g => "slow-2g",
            EffectiveType::TwoG => "2g",
            EffectiveType::ThreeG => "3g",
            EffectiveType::FourG => "4g",
            EffectiveType::Unknown => "unknown",
        }
    }

    pub fn is_slow(&self) -> bool {
        matches!(self, EffectiveType::Slow2g | EffectiveType::TwoG | EffectiveType::ThreeG)
    }
}

/// Physical link type as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Cellular,
    Wifi,
    Ethernet,
    Bluetooth,
    Other,
    Unknown,
}

impl ConnectionType {
    pub fn from_platform(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "cellular" => ConnectionType::Cellular,
            "wifi" => ConnectionType::Wifi,
            "ethernet" => ConnectionType::Ethernet,
            "bluetooth" => ConnectionType::Bluetooth,
            "other" | "wimax" | "mixed" => ConnectionType::Other,
            _ => ConnectionType::Unknown,
        }
    }
}

/// Raw connection metadata exposed by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub connection_type: Option<ConnectionType>,
    pub effective_type: EffectiveType,
    pub downlink_mbps: Option<f64>,
    pub rtt_ms: Option<f64>,
}

/// Result of one classification. Always replaced, never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub is_cellular: bool,
    pub effective_type: EffectiveType,
    pub downlink_mbps: Option<f64>,
    pub round_trip_ms: Option<f64>,
}

impl NetworkProfile {
    pub fn wifi() -> Self {
        Self {
            is_cellular: false,
            effective_type: EffectiveType::Unknown,
            downlink_mbps: None,
            round_trip_ms: None,
        }
    }

    pub fn cellular(effective_type: EffectiveType) -> Self {
        Self {
            is_cellular: true,
            effective_type,
            downlink_mbps: None,
            round_trip_ms: None,
        }
    }

    pub fn label(&self) -> &'static str {
        if self.is_cellular { "cellular" } else { "wifi" }
    }
}

/// What the host platform knows about the device and its link
pub trait DeviceInfo: Send + Sync {
    fn is_mobile(&self) -> bool;
    fn connection_info(&self) -> Option<ConnectionInfo>;
}

/// Device description fixed at construction time
#[derive(Debug, Clone)]
pub struct StaticDeviceInfo {
    mobile: bool,
    connection: Option<ConnectionInfo>,
}

impl StaticDeviceInfo {
    pub fn new(mobile: bool, connection: Option<ConnectionInfo>) -> Self {
        Self { mobile, connection }
    }

    pub fn desktop() -> Self {
        Self::new(false, None)
    }
}

impl DeviceInfo for StaticDeviceInfo {
    fn is_mobile(&self) -> bool {
        self.mobile
    }

    fn connection_info(&self) -> Option<ConnectionInfo> {
        self.connection.clone()
    }
}

/// Measures one round trip to a liveness endpoint
#[async_trait]
pub trait LatencyProbe: Send + Sync {
    async fn round_trip(&self) -> Result<Duration>;
}

/// HEAD request against the configured health endpoint
pub struct HttpLatencyProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpLatencyProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build probe HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl LatencyProbe for HttpLatencyProbe {
    async fn round_trip(&self) -> Result<Duration> {
        let started = Instant::now();
        let response = self
            .client
            .head(&self.url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .with_context(|| format!("Probe request to {} failed", self.url))?;

        let elapsed = started.elapsed();
        if !response.status().is_success() {
            return Err(anyhow!("Probe returned status {}", response.status()));
        }

        Ok(elapsed)
    }
}

/// Decides whether the current link should be treated as cellular-like
pub struct NetworkClassifier {
    device: Arc<dyn DeviceInfo>,
    probe: Arc<dyn LatencyProbe>,
    rtt_threshold: Duration,
    probe_timeout: Duration,
}

impl NetworkClassifier {
    pub fn new(
        device: Arc<dyn DeviceInfo>,
        probe: Arc<dyn LatencyProbe>,
        rtt_threshold: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            device,
            probe,
            rtt_threshold,
            probe_timeout,
        }
    }

    /// Classify the current network. Never fails: a failed probe degrades to
    /// the cellular profile.
    pub async fn classify(&self) -> NetworkProfile {
        if let Some(info) = self.device.connection_info() {
            let profile = Self::from_metadata(&info);
            debug!(
                "Classified network from metadata: {} ({})",
                profile.label(),
                profile.effective_type.as_str()
            );
            return profile;
        }

        if !self.device.is_mobile() {
            return NetworkProfile::wifi();
        }

        match tokio::time::timeout(self.probe_timeout, self.probe.round_trip()).await {
            Ok(Ok(rtt)) => {
                let round_trip_ms = rtt.as_secs_f64() * 1000.0;
                let is_cellular = rtt > self.rtt_threshold;
                info!(
                    "Latency probe: {:.0}ms, classified as {}",
                    round_trip_ms,
                    if is_cellular { "cellular" } else { "wifi" }
                );
                NetworkProfile {
                    is_cellular,
                    effective_type: EffectiveType::Unknown,
                    downlink_mbps: None,
                    round_trip_ms: Some(round_trip_ms),
                }
            }
            Ok(Err(e)) => {
                warn!("Latency probe failed, assuming cellular: {}", e);
                NetworkProfile::cellular(EffectiveType::Unknown)
            }
            Err(_) => {
                warn!(
                    "Latency probe timed out after {:?}, assuming cellular",
                    self.probe_timeout
                );
                NetworkProfile::cellular(EffectiveType::Unknown)
            }
        }
    }

    fn from_metadata(info: &ConnectionInfo) -> NetworkProfile {
        let is_cellular = info.connection_type == Some(ConnectionType::Cellular)
            || info.effective_type.is_slow();

        NetworkProfile {
            is_cellular,
            effective_type: info.effective_type,
            downlink_mbps: info.downlink_mbps,
            round_trip_ms: info.rtt_ms,
        }
    }
}
