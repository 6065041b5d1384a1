//! Boundary to the remote real-time session.
//!
//! A [`TransportFactory`] builds one [`Transport`] per session attempt and hands
//! it an [`EventSink`]. Everything the transport emits goes through that sink,
//! tagged with the attempt it belongs to, so the driver can drop events from
//! attempts it has already torn down.

use std::fmt;
use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::AudioSettings;
use crate::error::TransportError;

/// Identity of one pass through the start sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptId(Uuid);

impl AttemptId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable
        let id = self.0.simple().to_string();
        write!(f, "{}", &id[..8])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CallStarted,
    CallEnded,
    SpeechStarted,
    SpeechEnded,
    Message(Value),
    ResponseStarted,
    ResponseEnded,
    VolumeLevel(f32),
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransportEvent {
    pub attempt: AttemptId,
    pub event: SessionEvent,
}

/// Sender half handed to a transport at creation
#[derive(Debug, Clone)]
pub struct EventSink {
    attempt: AttemptId,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl EventSink {
    pub fn new(attempt: AttemptId, tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Returns false once the controller loop has gone away
    pub fn emit(&self, event: SessionEvent) -> bool {
        let sent = self
            .tx
            .send(TransportEvent {
                attempt: self.attempt,
                event,
            })
            .is_ok();
        if !sent {
            debug!("Dropping event for attempt {}: receiver closed", self.attempt);
        }
        sent
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RawTranscript {
    #[serde(rename = "type")]
    kind: String,
    role: Role,
    #[serde(rename = "transcriptType")]
    transcript_type: Option<String>,
    transcript: String,
}

/// A finalized transcript line carried by a `Message` event
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMessage {
    pub role: Role,
    pub text: String,
}

impl TranscriptMessage {
    /// `None` for anything other than a final transcript
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let raw: RawTranscript = serde_json::from_value(payload.clone()).ok()?;
        if raw.kind != "transcript" || raw.transcript_type.as_deref() != Some("final") {
            return None;
        }

        let text = raw.transcript.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            role: raw.role,
            text: text.to_string(),
        })
    }
}

/// One live session with the remote assistant
#[async_trait]
pub trait Transport: Send + Sync {
    async fn start(&mut self, assistant_id: &str) -> Result<(), TransportError>;
    async fn stop(&mut self) -> Result<(), TransportError>;
    async fn apply_audio_settings(&mut self, settings: &AudioSettings) -> Result<(), TransportError>;
    /// Number of remote participants currently in the room
    async fn participant_count(&self) -> Result<usize, TransportError>;
}

pub trait TransportFactory: Send + Sync {
    fn create(&self, public_key: &str, events: EventSink) -> Result<Box<dyn Transport>, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_final_transcript_is_extracted() {
        let payload = json!({
            "type": "transcript",
            "role": "assistant",
            "transcriptType": "final",
            "transcript": "  Hello there ",
        });
        let message = TranscriptMessage::from_payload(&payload).unwrap();
        assert_eq!(message.role, Role::Assistant);
        assert_eq!(message.text, "Hello there");
    }

    #[test]
    fn test_partial_and_foreign_messages_are_ignored() {
        let partial = json!({
            "type": "transcript",
            "role": "user",
            "transcriptType": "partial",
            "transcript": "Hel",
        });
        assert!(TranscriptMessage::from_payload(&partial).is_none());

        let status = json!({ "type": "status-update", "status": "in-progress" });
        assert!(TranscriptMessage::from_payload(&status).is_none());

        let empty = json!({
            "type": "transcript",
            "role": "user",
            "transcriptType": "final",
            "transcript": "   ",
        });
        assert!(TranscriptMessage::from_payload(&empty).is_none());
    }

    #[tokio::test]
    async fn test_event_sink_tags_attempt() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let attempt = AttemptId::new();
        let sink = EventSink::new(attempt, tx);

        assert!(sink.emit(SessionEvent::CallStarted));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.attempt, attempt);
        assert_eq!(received.event, SessionEvent::CallStarted);

        drop(rx);
        assert!(!sink.emit(SessionEvent::CallEnded));
    }

    #[test]
    fn test_attempt_ids_are_unique() {
        assert_ne!(AttemptId::new(), AttemptId::new());
        assert_eq!(AttemptId::new().to_string().len(), 8);
    }
}
