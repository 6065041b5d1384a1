use std::fmt;
use thiserror::Error;

use crate::state_machine::SessionState;

/// Credential fields required before a session can be started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    PublicKey,
    AssistantId,
}

impl CredentialField {
    pub fn env_var(&self) -> &'static str {
        match self {
            CredentialField::PublicKey => crate::config::PUBLIC_KEY_ENV,
            CredentialField::AssistantId => crate::config::ASSISTANT_ID_ENV,
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialField::PublicKey => write!(f, "public key"),
            CredentialField::AssistantId => write!(f, "assistant id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required credentials: {}", join_fields(.0))]
    MissingCredentials(Vec<CredentialField>),
}

impl ConfigError {
    /// Text shown to the user, naming what to set
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::MissingCredentials(fields) => {
                let vars: Vec<&str> = fields.iter().map(|f| f.env_var()).collect();
                format!(
                    "Configuration incomplete: missing {}. Set {} and try again.",
                    join_fields(fields),
                    vars.join(" and ")
                )
            }
        }
    }
}

fn join_fields(fields: &[CredentialField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure reported by the remote session transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Best-effort platform resource failures. Never surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("screen lock request rejected: {0}")]
    ScreenLockRejected(String),
    #[error("screen lock release failed: {0}")]
    ScreenLockRelease(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoiceError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    #[error("a session is already {0}")]
    SessionBusy(SessionState),
}

impl VoiceError {
    pub fn is_config(&self) -> bool {
        matches!(self, VoiceError::Config(_))
    }
}
