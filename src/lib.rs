//! # Voxlink Voice Session Client
//!
//! Session lifecycle and network-adaptive resilience for real-time voice
//! conversations with a remote assistant.
//!
//! ## Overview
//!
//! Voxlink drives one voice session at a time against an external real-time
//! transport. It classifies the current network, degrades audio on
//! cellular-like links before the call begins, and retries network failures
//! under a bounded policy. Rendering, media transport and the assistant itself
//! are collaborators behind traits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voxlink::{AppConfig, ClientCommand, VoiceClient};
//! use voxlink::presentation::TerminalPresentation;
//! use voxlink::screen_lock::UnsupportedScreenLock;
//! use voxlink::simulation::{SimulatedTransportFactory, SimulationPlan};
//! use anyhow::Result;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let client = VoiceClient::new(
//!         AppConfig::default(),
//!         Arc::new(SimulatedTransportFactory::new(SimulationPlan::default())),
//!         Arc::new(UnsupportedScreenLock),
//!         Arc::new(TerminalPresentation::new(false)),
//!     )?;
//!
//!     let (commands, rx) = tokio::sync::mpsc::channel(16);
//!     commands.send(ClientCommand::Start).await?;
//!     commands.send(ClientCommand::Shutdown).await?;
//!     client.run(rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`network`]: connection metadata and latency-probe based classification
//! - [`state_machine`]: pure session transition table
//! - [`session`]: the session driver executing transitions against a transport
//! - [`resilience`]: retry policy, failure classification and health checks
//! - [`app`]: the single event loop feeding the controller
//! - [`config`]: persistent configuration and credentials

/// Crate error taxonomy
pub mod error;

/// Configuration management with persistence and environment overrides
pub mod config;

/// Audio parameters pushed to the transport
pub mod audio;

/// Network classification from metadata or an active latency probe
pub mod network;

/// Remote session boundary and event types
pub mod transport;

/// Best-effort display wake lock
pub mod screen_lock;

/// Delayed callbacks for retry scheduling
pub mod scheduler;

/// User-facing output
pub mod presentation;

/// Session lifecycle transition table
pub mod state_machine;

/// Single-session driver
pub mod session;

/// Session health history
pub mod monitoring;

/// Bounded retries and degraded-connectivity detection
pub mod resilience;

/// Event loop and high-level client API
pub mod app;

/// Scripted transport for offline runs
pub mod simulation;

#[cfg(test)]
pub mod tests;

// Re-export main types for convenience
pub use app::{ClientCommand, VoiceClient};
pub use config::{AppConfig, Credentials};
pub use error::{ConfigError, TransportError, VoiceError};
pub use network::{NetworkClassifier, NetworkProfile};
pub use resilience::{ResilienceController, RetryPolicy};
pub use state_machine::SessionState;
