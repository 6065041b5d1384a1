use std::sync::Arc;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::audio::AudioSettings;
use crate::config::Credentials;
use crate::error::{TransportError, VoiceError};
use crate::network::{NetworkClassifier, NetworkProfile};
use crate::presentation::Presentation;
use crate::screen_lock::{ScreenLock, ScreenLockProvider};
use crate::state_machine::{self, Effect, SessionState, Transition};
use crate::transport::{AttemptId, EventSink, Transport, TransportEvent, TransportFactory};

/// Signals the driver passes up to its owner after executing effects
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventOutcome {
    pub reset_retries: bool,
    pub failure: Option<TransportError>,
    /// The transport refused to end the call
    pub end_failed: bool,
}

/// Collaborators shared by every session attempt
#[derive(Clone)]
pub struct DriverDeps {
    pub factory: Arc<dyn TransportFactory>,
    pub classifier: Arc<NetworkClassifier>,
    pub screen_locks: Arc<dyn ScreenLockProvider>,
    pub presentation: Arc<dyn Presentation>,
    pub cellular_prestart_audio: AudioSettings,
    pub cellular_in_call_audio: AudioSettings,
}

/// Owns the single voice session and its state
pub struct SessionDriver {
    deps: DriverDeps,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    state: SessionState,
    attempt: Option<AttemptId>,
    transport: Option<Box<dyn Transport>>,
    screen_lock: Option<ScreenLock>,
    profile: Option<NetworkProfile>,
}

impl SessionDriver {
    pub fn new(deps: DriverDeps, events_tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self {
            deps,
            events_tx,
            state: SessionState::Idle,
            attempt: None,
            transport: None,
            screen_lock: None,
            profile: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.attempt
    }

    /// Classification taken for the current attempt
    pub fn network_profile(&self) -> Option<&NetworkProfile> {
        self.profile.as_ref()
    }

    pub fn holds_screen_lock(&self) -> bool {
        self.screen_lock.is_some()
    }

    pub async fn start(&mut self, credentials: &Credentials) -> Result<AttemptId, VoiceError> {
        let transition =
            state_machine::on_start(self.state).ok_or(VoiceError::SessionBusy(self.state))?;
        let credentials = credentials.validate()?;

        let attempt = AttemptId::new();
        self.attempt = Some(attempt);
        info!("Starting session attempt {}", attempt);
        self.transition(transition).await;

        let sink = EventSink::new(attempt, self.events_tx.clone());
        match self.deps.factory.create(&credentials.public_key, sink) {
            Ok(transport) => self.transport = Some(transport),
            Err(e) => {
                warn!("Failed to create transport for attempt {}: {}", attempt, e);
                self.abort_start().await;
                return Err(e.into());
            }
        }

        self.acquire_screen_lock().await;

        let profile = self.deps.classifier.classify().await;
        if profile.is_cellular {
            let settings = self.deps.cellular_prestart_audio.clone();
            info!("Cellular network detected, applying {}", settings.describe());
            self.push_audio_settings(&settings).await;
        }
        self.profile = Some(profile);

        let started = match self.transport.as_mut() {
            Some(transport) => transport.start(&credentials.assistant_id).await,
            None => Err(TransportError::new("transport missing before start")),
        };

        if let Err(e) = started {
            warn!("Transport failed to start for attempt {}: {}", attempt, e);
            self.abort_start().await;
            return Err(e.into());
        }

        debug!("Attempt {} waiting for call to start", attempt);
        Ok(attempt)
    }

    /// Request termination. Only acts while connecting or active.
    pub async fn stop(&mut self) -> EventOutcome {
        let transition = state_machine::on_stop(self.state);
        if transition.is_noop(self.state) {
            debug!("Stop ignored while {}", self.state);
            return EventOutcome::default();
        }

        let mut outcome = self.transition(transition).await;
        if outcome.end_failed {
            let abandoned = self.abandon_ending().await;
            outcome.reset_retries |= abandoned.reset_retries;
        }
        outcome
    }

    /// Give up waiting for the transport to confirm the end of the call
    pub async fn abandon_ending(&mut self) -> EventOutcome {
        let transition = state_machine::on_end_abandoned(self.state);
        if transition.is_noop(self.state) {
            return EventOutcome::default();
        }
        warn!("Transport did not confirm the end of the call, forcing idle");
        self.transition(transition).await
    }

    pub async fn handle_event(&mut self, event: TransportEvent) -> EventOutcome {
        if self.attempt != Some(event.attempt) {
            debug!(
                "Ignoring {:?} from superseded attempt {}",
                event.event, event.attempt
            );
            return EventOutcome::default();
        }

        let transition = state_machine::on_event(self.state, &event.event);
        self.transition(transition).await
    }

    /// Remote participants in the live call, `None` when no call is active
    pub async fn participant_count(&self) -> Option<Result<usize, TransportError>> {
        if self.state != SessionState::Active {
            return None;
        }
        match self.transport.as_ref() {
            Some(transport) => Some(transport.participant_count().await),
            None => None,
        }
    }

    async fn abort_start(&mut self) {
        let transition = state_machine::on_start_failed(self.state);
        self.transition(transition).await;
    }

    async fn transition(&mut self, transition: Transition) -> EventOutcome {
        if transition.next != self.state {
            info!("Session {} -> {}", self.state, transition.next);
        }
        self.state = transition.next;

        let mut outcome = EventOutcome::default();
        for effect in transition.effects {
            self.apply(effect, &mut outcome).await;
        }

        if self.state == SessionState::Idle {
            self.attempt = None;
            self.profile = None;
        }
        outcome
    }

    async fn apply(&mut self, effect: Effect, outcome: &mut EventOutcome) {
        match effect {
            Effect::ResetRetries => outcome.reset_retries = true,
            Effect::ApplyInCallAudio => {
                if self.profile.as_ref().is_some_and(|p| p.is_cellular) {
                    let settings = self.deps.cellular_in_call_audio.clone();
                    info!("Applying in-call cellular audio: {}", settings.describe());
                    self.push_audio_settings(&settings).await;
                }
            }
            Effect::ReleaseScreenLock => self.release_screen_lock().await,
            Effect::EndTransport => {
                if let Some(transport) = self.transport.as_mut() {
                    if let Err(e) = transport.stop().await {
                        warn!("Transport stop request failed: {}", e);
                        outcome.end_failed = true;
                    }
                }
            }
            Effect::TearDownTransport => {
                if let Some(mut transport) = self.transport.take() {
                    if let Err(e) = transport.stop().await {
                        debug!("Ignoring stop failure during teardown: {}", e);
                    }
                }
            }
            Effect::DiscardTransport => {
                self.transport = None;
            }
            Effect::Status(text, kind) => self.deps.presentation.update_status(&text, kind),
            Effect::Visual(state) => self.deps.presentation.set_visual_state(state),
            Effect::Log(role, text) => self.deps.presentation.append_log_message(role, &text),
            Effect::Volume(level) => self.deps.presentation.show_volume_level(level),
            Effect::ReportFailure(error) => outcome.failure = Some(error),
        }
    }

    async fn push_audio_settings(&mut self, settings: &AudioSettings) {
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.apply_audio_settings(settings).await {
                warn!("Transport rejected audio settings: {}", e);
            }
        }
    }

    async fn acquire_screen_lock(&mut self) {
        match self.deps.screen_locks.acquire().await {
            Ok(Some(lock)) => {
                debug!("Screen lock {} acquired", lock.id());
                self.screen_lock = Some(lock);
            }
            Ok(None) => debug!("Screen lock not supported on this platform"),
            Err(e) => warn!("Screen lock unavailable: {}", e),
        }
    }

    async fn release_screen_lock(&mut self) {
        if let Some(lock) = self.screen_lock.take() {
            let id = lock.id();
            match self.deps.screen_locks.release(lock).await {
                Ok(()) => debug!("Screen lock {} released", id),
                Err(e) => warn!("Screen lock release failed: {}", e),
            }
        }
    }
}
