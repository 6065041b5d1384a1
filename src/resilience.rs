use std::sync::Arc;
use std::time::Duration;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CredentialSource;
use crate::error::{TransportError, VoiceError};
use crate::monitoring::{HealthCheck, HealthMonitor, HealthStatus};
use crate::network::{NetworkClassifier, NetworkProfile};
use crate::presentation::{Presentation, StatusKind, VisualState};
use crate::scheduler::{Scheduler, TimerId};
use crate::session::{EventOutcome, SessionDriver};
use crate::state_machine::SessionState;
use crate::transport::TransportEvent;

pub const DEFAULT_NETWORK_MARKERS: &[&str] = &[
    "network",
    "connection",
    "timeout",
    "timed out",
    "failed to fetch",
    "offline",
    "disconnect",
];

const PARTICIPANT_CHECK: &str = "remote_participants";

pub const DEFAULT_ENDING_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    Network,
    Other,
}

impl FailureKind {
    pub fn classify(message: &str, markers: &[String]) -> Self {
        let message = message.to_lowercase();
        if markers.iter().any(|marker| message.contains(marker.as_str())) {
            FailureKind::Network
        } else {
            FailureKind::Other
        }
    }
}

/// Failed network attempts in the current retry chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn reset(&mut self) {
        if self.attempts > 0 {
            debug!("Retry counter reset from {}", self.attempts);
        }
        self.attempts = 0;
    }

    /// Count one failed attempt, never going past `cap`
    fn record_failure(&mut self, cap: u32) -> u32 {
        let cap = cap.min(self.max_attempts);
        self.attempts = (self.attempts + 1).min(cap);
        self.attempts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// `attempt` of `retries_allowed` retries in this chain
    Retry { delay: Duration, attempt: u32, retries_allowed: u32 },
    /// `attempts` connection attempts failed in a row
    Exhausted { attempts: u32 },
    NotRetriable,
}

/// Retry caps and delays. Cellular links get a tighter cap and a longer delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub cellular_max_attempts: u32,
    pub retry_delay: Duration,
    pub cellular_retry_delay: Duration,
    pub network_markers: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            cellular_max_attempts: 2,
            retry_delay: Duration::from_millis(2000),
            cellular_retry_delay: Duration::from_millis(3000),
            network_markers: DEFAULT_NETWORK_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl RetryPolicy {
    pub fn cap_for(&self, profile: &NetworkProfile) -> u32 {
        if profile.is_cellular {
            self.cellular_max_attempts.min(self.max_attempts)
        } else {
            self.max_attempts
        }
    }

    pub fn delay_for(&self, profile: &NetworkProfile) -> Duration {
        if profile.is_cellular {
            self.cellular_retry_delay
        } else {
            self.retry_delay
        }
    }

    /// Retries one chain may schedule on this network
    pub fn retries_allowed(&self, profile: &NetworkProfile) -> u32 {
        let cap = self.cap_for(profile);
        if profile.is_cellular { cap.saturating_sub(1) } else { cap }
    }

    pub fn classify(&self, error: &TransportError) -> FailureKind {
        FailureKind::classify(error.message(), &self.network_markers)
    }

    /// Record the failure in `retry` and decide what happens next.
    ///
    /// Cellular counts the failure and then compares with its cap, so the
    /// second failure in a row is terminal. Other links retry while the
    /// counter is below the cap and count each retry.
    pub fn decide(
        &self,
        retry: &mut RetryState,
        error: &TransportError,
        profile: &NetworkProfile,
    ) -> RetryDecision {
        if self.classify(error) == FailureKind::Other {
            return RetryDecision::NotRetriable;
        }

        let cap = self.cap_for(profile);
        let retries_allowed = self.retries_allowed(profile);

        if profile.is_cellular {
            let attempt = retry.record_failure(cap);
            return if attempt < cap {
                RetryDecision::Retry {
                    delay: self.delay_for(profile),
                    attempt,
                    retries_allowed,
                }
            } else {
                RetryDecision::Exhausted { attempts: attempt }
            };
        }

        if retry.attempts() < cap {
            let attempt = retry.record_failure(cap);
            RetryDecision::Retry {
                delay: self.delay_for(profile),
                attempt,
                retries_allowed,
            }
        } else {
            RetryDecision::Exhausted {
                attempts: retry.attempts() + 1,
            }
        }
    }
}

/// Wraps the session driver with bounded retries and health checks
pub struct ResilienceController {
    driver: SessionDriver,
    policy: RetryPolicy,
    retry: RetryState,
    scheduler: Box<dyn Scheduler>,
    pending_retry: Option<TimerId>,
    pending_ending: Option<TimerId>,
    ending_timeout: Duration,
    credentials: Option<Arc<dyn CredentialSource>>,
    classifier: Arc<NetworkClassifier>,
    presentation: Arc<dyn Presentation>,
    health: HealthMonitor,
}

impl ResilienceController {
    pub fn new(
        driver: SessionDriver,
        policy: RetryPolicy,
        scheduler: Box<dyn Scheduler>,
        classifier: Arc<NetworkClassifier>,
        presentation: Arc<dyn Presentation>,
        health: HealthMonitor,
    ) -> Self {
        let retry = RetryState::new(policy.max_attempts);
        Self {
            driver,
            policy,
            retry,
            scheduler,
            pending_retry: None,
            pending_ending: None,
            ending_timeout: DEFAULT_ENDING_TIMEOUT,
            credentials: None,
            classifier,
            presentation,
            health,
        }
    }

    /// How long `Ending` may wait for the transport to confirm
    pub fn with_ending_timeout(mut self, timeout: Duration) -> Self {
        self.ending_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.driver.state()
    }

    pub fn driver(&self) -> &SessionDriver {
        &self.driver
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    pub fn pending_retry(&self) -> Option<TimerId> {
        self.pending_retry
    }

    pub fn pending_ending(&self) -> Option<TimerId> {
        self.pending_ending
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// User-initiated start. Supersedes any scheduled retry; otherwise starts
    /// a fresh retry chain. `credentials` is read again on every retry.
    pub async fn start(
        &mut self,
        credentials: impl CredentialSource + 'static,
    ) -> Result<(), VoiceError> {
        if self.driver.state() != SessionState::Idle {
            warn!("Start requested while session is {}", self.driver.state());
            return Err(VoiceError::SessionBusy(self.driver.state()));
        }
        if !self.cancel_pending_retry("manual start") {
            self.retry.reset();
        }
        self.credentials = Some(Arc::new(credentials));
        self.attempt_start().await
    }

    /// User-initiated stop. Also cancels a scheduled retry.
    pub async fn stop(&mut self) {
        if self.cancel_pending_retry("manual stop") {
            self.retry.reset();
            self.presentation.update_status("Reconnect cancelled", StatusKind::Info);
        }

        let outcome = self.driver.stop().await;
        if self.driver.state() == SessionState::Ending && self.pending_ending.is_none() {
            self.pending_ending = Some(self.scheduler.schedule(self.ending_timeout));
        }
        self.absorb(outcome).await;
    }

    pub async fn handle_event(&mut self, event: TransportEvent) {
        let outcome = self.driver.handle_event(event).await;
        self.absorb(outcome).await;
    }

    /// A scheduled timer fired. Stale timers are ignored.
    pub async fn on_timer(&mut self, timer: TimerId) {
        if self.pending_ending == Some(timer) {
            self.pending_ending = None;
            warn!("No call end confirmed within {:?}", self.ending_timeout);
            let outcome = self.driver.abandon_ending().await;
            self.absorb(outcome).await;
            return;
        }

        if self.pending_retry != Some(timer) {
            debug!("Ignoring stale timer {:?}", timer);
            return;
        }
        self.pending_retry = None;

        if self.driver.state() != SessionState::Idle {
            warn!("Retry skipped: session is {}", self.driver.state());
            return;
        }

        if self.credentials.is_none() {
            warn!("Retry skipped: no credentials from a previous start");
            return;
        }

        info!("Retrying session after {} failed attempt(s)", self.retry.attempts());
        if let Err(e) = self.attempt_start().await {
            debug!("Retry attempt did not start: {}", e);
        }
    }

    /// Decide whether `error` gets another attempt; reports terminal failures
    pub async fn on_failure(&mut self, error: &TransportError, profile: &NetworkProfile) -> bool {
        let decision = self.policy.decide(&mut self.retry, error, profile);
        info!(
            "Session failure on {} network: {} -> {:?}",
            profile.label(),
            error,
            decision
        );

        match decision {
            RetryDecision::Retry { delay, attempt, retries_allowed } => {
                self.cancel_pending_retry("superseded by new retry");
                self.pending_retry = Some(self.scheduler.schedule(delay));
                self.presentation.update_status(
                    &format!(
                        "Connection problem: {}. Reconnecting in {}s ({}/{})...",
                        error,
                        delay.as_secs_f32().round(),
                        attempt,
                        retries_allowed
                    ),
                    StatusKind::Warning,
                );
                self.presentation.set_visual_state(VisualState::Idle);
                true
            }
            RetryDecision::Exhausted { attempts } => {
                self.presentation.update_status(
                    &format!(
                        "Connection failed after {} attempts: {}. Check your network and try again.",
                        attempts, error
                    ),
                    StatusKind::Error,
                );
                self.presentation.set_visual_state(VisualState::Idle);
                false
            }
            RetryDecision::NotRetriable => {
                self.presentation
                    .update_status(&format!("Call failed: {}", error), StatusKind::Error);
                self.presentation.set_visual_state(VisualState::Idle);
                false
            }
        }
    }

    /// Run the participant check when the app becomes visible again
    pub async fn on_visibility_change(&mut self, visible: bool) -> Option<HealthCheck> {
        if !visible {
            debug!("App hidden while session is {}", self.driver.state());
            return None;
        }

        let check = match self.driver.participant_count().await? {
            Ok(0) => {
                self.presentation.update_status(
                    "Connection may have dropped: the assistant is no longer in the call",
                    StatusKind::Warning,
                );
                HealthCheck::new(PARTICIPANT_CHECK, HealthStatus::Warning, "No remote participant")
                    .with_participants(0)
            }
            Ok(count) => HealthCheck::new(
                PARTICIPANT_CHECK,
                HealthStatus::Healthy,
                format!("{} remote participant(s)", count),
            )
            .with_participants(count),
            Err(e) => HealthCheck::new(
                PARTICIPANT_CHECK,
                HealthStatus::Unknown,
                format!("Participant query failed: {}", e),
            ),
        };

        self.health.record(check.clone());
        Some(check)
    }

    async fn attempt_start(&mut self) -> Result<(), VoiceError> {
        let Some(source) = self.credentials.clone() else {
            return Ok(());
        };
        let credentials = source.credentials();

        match self.driver.start(&credentials).await {
            Ok(_) => Ok(()),
            Err(VoiceError::Config(e)) => {
                warn!("Cannot start session: {}", e);
                self.presentation.update_status(&e.user_message(), StatusKind::Error);
                self.presentation.set_visual_state(VisualState::Idle);
                Err(e.into())
            }
            Err(VoiceError::Transport(e)) => {
                let profile = self.classifier.classify().await;
                self.on_failure(&e, &profile).await;
                Err(e.into())
            }
            Err(e) => Err(e),
        }
    }

    async fn absorb(&mut self, outcome: EventOutcome) {
        if self.driver.state() != SessionState::Ending {
            if let Some(timer) = self.pending_ending.take() {
                self.scheduler.cancel(timer);
            }
        }
        if outcome.reset_retries {
            self.retry.reset();
        }
        if let Some(error) = outcome.failure {
            let profile = self.classifier.classify().await;
            self.on_failure(&error, &profile).await;
        }
    }

    fn cancel_pending_retry(&mut self, reason: &str) -> bool {
        match self.pending_retry.take() {
            Some(timer) => {
                info!("Cancelling scheduled retry ({})", reason);
                self.scheduler.cancel(timer);
                true
            }
            None => false,
        }
    }
}
