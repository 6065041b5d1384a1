//! Session lifecycle as a pure transition table.
//!
//! Every input (user command or transport event) maps the current
//! [`SessionState`] to the next one plus a list of [`Effect`]s. Nothing here
//! touches a transport; [`crate::session::SessionDriver`] executes the effects.
//!
//! ```text
//! Idle ──start──▶ Connecting ──CallStarted──▶ Active ──stop──▶ Ending ──CallEnded──▶ Idle
//!                     │                          │
//!                     └──────── Error ───────────┴──────────▶ Idle
//! ```

use std::fmt;

use crate::error::TransportError;
use crate::presentation::{StatusKind, VisualState};
use crate::transport::{Role, SessionEvent, TranscriptMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Active,
    Ending,
}

impl SessionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Active)
    }

    pub fn visual(&self) -> VisualState {
        match self {
            SessionState::Idle => VisualState::Idle,
            SessionState::Connecting => VisualState::Connecting,
            SessionState::Active => VisualState::Active,
            SessionState::Ending => VisualState::Ending,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Ending => write!(f, "ending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ResetRetries,
    /// Push the in-call cellular audio profile, if the attempt was classified cellular
    ApplyInCallAudio,
    ReleaseScreenLock,
    /// Ask the transport to end the call but keep it for the closing `CallEnded`
    EndTransport,
    /// Stop the transport best-effort and drop it
    TearDownTransport,
    /// Drop a transport that has already ended
    DiscardTransport,
    Status(String, StatusKind),
    Visual(VisualState),
    Log(Role, String),
    Volume(f32),
    ReportFailure(TransportError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: SessionState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn stay(state: SessionState) -> Self {
        Self {
            next: state,
            effects: Vec::new(),
        }
    }

    fn to(next: SessionState, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }

    fn status(state: SessionState, text: &str, kind: StatusKind) -> Self {
        Self::to(state, vec![Effect::Status(text.to_string(), kind)])
    }

    pub fn is_noop(&self, from: SessionState) -> bool {
        self.next == from && self.effects.is_empty()
    }
}

/// `None` when a session is already in progress
pub fn on_start(state: SessionState) -> Option<Transition> {
    match state {
        SessionState::Idle => Some(Transition::to(
            SessionState::Connecting,
            vec![
                Effect::Visual(VisualState::Connecting),
                Effect::Status("Connecting...".to_string(), StatusKind::Info),
            ],
        )),
        _ => None,
    }
}

/// Cleanup after the start sequence itself failed
pub fn on_start_failed(state: SessionState) -> Transition {
    match state {
        SessionState::Idle => Transition::stay(state),
        _ => Transition::to(
            SessionState::Idle,
            vec![
                Effect::TearDownTransport,
                Effect::ReleaseScreenLock,
                Effect::Visual(VisualState::Idle),
            ],
        ),
    }
}

pub fn on_stop(state: SessionState) -> Transition {
    match state {
        SessionState::Connecting | SessionState::Active => Transition::to(
            SessionState::Ending,
            vec![
                Effect::EndTransport,
                Effect::ReleaseScreenLock,
                Effect::ResetRetries,
                Effect::Visual(VisualState::Ending),
                Effect::Status("Ending call...".to_string(), StatusKind::Info),
            ],
        ),
        SessionState::Idle | SessionState::Ending => Transition::stay(state),
    }
}

/// The transport rejected the stop request or never confirmed it
pub fn on_end_abandoned(state: SessionState) -> Transition {
    match state {
        SessionState::Ending => Transition::to(
            SessionState::Idle,
            vec![
                Effect::DiscardTransport,
                Effect::ReleaseScreenLock,
                Effect::Visual(VisualState::Idle),
                Effect::Status("Call ended".to_string(), StatusKind::Info),
            ],
        ),
        _ => Transition::stay(state),
    }
}

pub fn on_event(state: SessionState, event: &SessionEvent) -> Transition {
    use SessionState::*;

    match (state, event) {
        (Connecting, SessionEvent::CallStarted) => Transition::to(
            Active,
            vec![
                Effect::ResetRetries,
                Effect::ApplyInCallAudio,
                Effect::Visual(VisualState::Active),
                Effect::Status("Connected. Start talking.".to_string(), StatusKind::Success),
            ],
        ),
        (_, SessionEvent::CallStarted) => Transition::stay(state),

        (Connecting | Active | Ending, SessionEvent::CallEnded) => Transition::to(
            Idle,
            vec![
                Effect::DiscardTransport,
                Effect::ReleaseScreenLock,
                Effect::Visual(VisualState::Idle),
                Effect::Status("Call ended".to_string(), StatusKind::Info),
            ],
        ),

        (Connecting | Active, SessionEvent::Error(reason)) => Transition::to(
            Idle,
            vec![
                Effect::TearDownTransport,
                Effect::ReleaseScreenLock,
                Effect::Visual(VisualState::Idle),
                Effect::ReportFailure(TransportError::new(reason.clone())),
            ],
        ),
        // The user already hung up; finish the teardown without a retry
        (Ending, SessionEvent::Error(_)) => Transition::to(
            Idle,
            vec![
                Effect::TearDownTransport,
                Effect::ReleaseScreenLock,
                Effect::Visual(VisualState::Idle),
                Effect::Status("Call ended".to_string(), StatusKind::Info),
            ],
        ),

        (Active, SessionEvent::SpeechStarted) => {
            Transition::status(state, "Listening...", StatusKind::Info)
        }
        (Active, SessionEvent::SpeechEnded) => {
            Transition::status(state, "Thinking...", StatusKind::Info)
        }
        (Active, SessionEvent::ResponseStarted) => {
            Transition::status(state, "Assistant speaking...", StatusKind::Info)
        }
        (Active, SessionEvent::ResponseEnded) => {
            Transition::status(state, "Your turn", StatusKind::Info)
        }

        (Connecting | Active, SessionEvent::Message(payload)) => {
            match TranscriptMessage::from_payload(payload) {
                Some(message) => Transition::to(state, vec![Effect::Log(message.role, message.text)]),
                None => Transition::stay(state),
            }
        }

        (Active, SessionEvent::VolumeLevel(level)) => {
            Transition::to(state, vec![Effect::Volume(*level)])
        }

        _ => Transition::stay(state),
    }
}
