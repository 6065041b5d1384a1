use serde::{Deserialize, Serialize};

/// Audio and media parameters pushed to the transport.
///
/// The default mirrors an unconstrained WiFi call: video allowed, no bitrate
/// cap and the full post-processing chain. Cellular profiles are derived from
/// configuration, see [`crate::config::AppConfig::to_cellular_prestart_audio`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub video_enabled: bool,
    /// Upper bound for the outbound audio bitrate; `None` leaves it to the transport
    pub max_bitrate_kbps: Option<u32>,
    /// Model-based background denoising, the heavy part of post-processing
    pub background_denoising: bool,
    /// Lightweight platform noise suppression
    pub noise_suppression: bool,
    pub fec_enabled: bool,
    pub dtx_enabled: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            video_enabled: true,
            max_bitrate_kbps: None,
            background_denoising: true,
            noise_suppression: true,
            fec_enabled: false,
            dtx_enabled: false,
        }
    }
}

impl AudioSettings {
    pub fn is_degraded(&self) -> bool {
        !self.video_enabled || self.max_bitrate_kbps.is_some() || !self.background_denoising
    }

    pub fn describe(&self) -> String {
        let bitrate = self
            .max_bitrate_kbps
            .map(|kbps| format!("{} kbps", kbps))
            .unwrap_or_else(|| "uncapped".to_string());
        format!(
            "video {}, bitrate {}, denoising {}, fec {}, dtx {}",
            on_off(self.video_enabled),
            bitrate,
            on_off(self.background_denoising),
            on_off(self.fec_enabled),
            on_off(self.dtx_enabled),
        )
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
