//! In-memory collaborators for driving the session controller in tests.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audio::AudioSettings;
use crate::config::{AppConfig, CredentialSource, Credentials};
use crate::error::{ResourceError, TransportError};
use crate::monitoring::HealthMonitor;
use crate::network::{
    ConnectionInfo, ConnectionType, EffectiveType, LatencyProbe, NetworkClassifier,
    StaticDeviceInfo,
};
use crate::presentation::{Presentation, Role, StatusKind, VisualState};
use crate::resilience::ResilienceController;
use crate::scheduler::{Scheduler, TimerId};
use crate::screen_lock::{ScreenLock, ScreenLockProvider};
use crate::session::{DriverDeps, SessionDriver};
use crate::transport::{EventSink, SessionEvent, Transport, TransportEvent, TransportFactory};

pub fn credentials() -> Credentials {
    Credentials::new("pk-test-1234", "assistant-1")
}

/// Credentials that can change between attempts
#[derive(Clone, Default)]
pub struct SharedCredentials {
    current: Arc<Mutex<Credentials>>,
}

impl SharedCredentials {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            current: Arc::new(Mutex::new(credentials)),
        }
    }

    pub fn set(&self, credentials: Credentials) {
        *self.current.lock().unwrap() = credentials;
    }
}

impl CredentialSource for SharedCredentials {
    fn credentials(&self) -> Credentials {
        self.current.lock().unwrap().clone()
    }
}

/// Calls made against fake transports, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create,
    ApplyAudio(AudioSettings),
    Start(String),
    Stop,
}

pub struct FakeTransportFactory {
    calls: Arc<Mutex<Vec<Call>>>,
    sinks: Mutex<Vec<EventSink>>,
    create_error: Mutex<Option<String>>,
    start_errors: Arc<Mutex<VecDeque<String>>>,
    stop_error: Arc<Mutex<Option<String>>>,
    participants: Arc<Mutex<Result<usize, String>>>,
}

impl FakeTransportFactory {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            sinks: Mutex::new(Vec::new()),
            create_error: Mutex::new(None),
            start_errors: Arc::new(Mutex::new(VecDeque::new())),
            stop_error: Arc::new(Mutex::new(None)),
            participants: Arc::new(Mutex::new(Ok(1))),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub fn fail_create(&self, message: &str) {
        *self.create_error.lock().unwrap() = Some(message.to_string());
    }

    /// The next `start` call rejects with `message`
    pub fn fail_next_start(&self, message: &str) {
        self.start_errors.lock().unwrap().push_back(message.to_string());
    }

    /// Every later `stop` call rejects with `message`
    pub fn fail_stop(&self, message: &str) {
        *self.stop_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_participants(&self, participants: Result<usize, String>) {
        *self.participants.lock().unwrap() = participants;
    }

    /// Sink handed to the most recently created transport
    pub fn latest_sink(&self) -> EventSink {
        self.sinks.lock().unwrap().last().cloned().expect("no transport created")
    }

    pub fn sink(&self, index: usize) -> EventSink {
        self.sinks.lock().unwrap()[index].clone()
    }

    /// Emit `event` as the most recent transport
    pub fn emit(&self, event: SessionEvent) {
        self.latest_sink().emit(event);
    }
}

impl TransportFactory for FakeTransportFactory {
    fn create(&self, _public_key: &str, events: EventSink) -> Result<Box<dyn Transport>, TransportError> {
        self.calls.lock().unwrap().push(Call::Create);
        if let Some(message) = self.create_error.lock().unwrap().clone() {
            return Err(TransportError::new(message));
        }
        self.sinks.lock().unwrap().push(events);
        Ok(Box::new(FakeTransport {
            calls: self.calls.clone(),
            start_errors: self.start_errors.clone(),
            stop_error: self.stop_error.clone(),
            participants: self.participants.clone(),
        }))
    }
}

struct FakeTransport {
    calls: Arc<Mutex<Vec<Call>>>,
    start_errors: Arc<Mutex<VecDeque<String>>>,
    stop_error: Arc<Mutex<Option<String>>>,
    participants: Arc<Mutex<Result<usize, String>>>,
}

#[async_trait]
impl Transport for FakeTransport {
    async fn start(&mut self, assistant_id: &str) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Start(assistant_id.to_string()));
        match self.start_errors.lock().unwrap().pop_front() {
            Some(message) => Err(TransportError::new(message)),
            None => Ok(()),
        }
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Stop);
        match self.stop_error.lock().unwrap().clone() {
            Some(message) => Err(TransportError::new(message)),
            None => Ok(()),
        }
    }

    async fn apply_audio_settings(&mut self, settings: &AudioSettings) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::ApplyAudio(settings.clone()));
        Ok(())
    }

    async fn participant_count(&self) -> Result<usize, TransportError> {
        self.participants.lock().unwrap().clone().map_err(TransportError::new)
    }
}

/// Screen lock provider that tracks which locks are outstanding
#[derive(Default)]
pub struct FakeScreenLocks {
    held: Mutex<HashSet<Uuid>>,
    acquired: AtomicUsize,
    reject: bool,
}

impl FakeScreenLocks {
    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn held(&self) -> usize {
        self.held.lock().unwrap().len()
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenLockProvider for FakeScreenLocks {
    async fn acquire(&self) -> Result<Option<ScreenLock>, ResourceError> {
        if self.reject {
            return Err(ResourceError::ScreenLockRejected("battery saver".to_string()));
        }
        let lock = ScreenLock::new();
        self.held.lock().unwrap().insert(lock.id());
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Some(lock))
    }

    async fn release(&self, lock: ScreenLock) -> Result<(), ResourceError> {
        self.held.lock().unwrap().remove(&lock.id());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPresentation {
    pub statuses: Mutex<Vec<(String, StatusKind)>>,
    pub visuals: Mutex<Vec<VisualState>>,
    pub logs: Mutex<Vec<(Role, String)>>,
    pub volumes: Mutex<Vec<f32>>,
}

impl RecordingPresentation {
    pub fn last_status(&self) -> Option<(String, StatusKind)> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn last_visual(&self) -> Option<VisualState> {
        self.visuals.lock().unwrap().last().copied()
    }

    pub fn has_status(&self, needle: &str) -> bool {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .any(|(text, _)| text.contains(needle))
    }
}

impl Presentation for RecordingPresentation {
    fn update_status(&self, text: &str, kind: StatusKind) {
        self.statuses.lock().unwrap().push((text.to_string(), kind));
    }

    fn set_visual_state(&self, state: VisualState) {
        self.visuals.lock().unwrap().push(state);
    }

    fn append_log_message(&self, role: Role, text: &str) {
        self.logs.lock().unwrap().push((role, text.to_string()));
    }

    fn show_volume_level(&self, level: f32) {
        self.volumes.lock().unwrap().push(level);
    }
}

/// Probe answering with a fixed round trip, an error, or never
pub struct FakeProbe {
    calls: AtomicUsize,
    outcome: Mutex<ProbeOutcome>,
}

#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    RoundTrip(Duration),
    Fail(String),
    Hang,
}

impl FakeProbe {
    pub fn new(outcome: ProbeOutcome) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            outcome: Mutex::new(outcome),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LatencyProbe for FakeProbe {
    async fn round_trip(&self) -> Result<Duration> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self.outcome.lock().unwrap().clone();
        match outcome {
            ProbeOutcome::RoundTrip(rtt) => Ok(rtt),
            ProbeOutcome::Fail(message) => Err(anyhow!(message)),
            ProbeOutcome::Hang => {
                std::future::pending::<()>().await;
                Err(anyhow!("unreachable"))
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ManualTimers {
    next_id: u64,
    pub scheduled: Vec<(TimerId, Duration)>,
    pub cancelled: Vec<TimerId>,
}

/// Scheduler that only records requests; tests fire timers by hand
#[derive(Clone, Default)]
pub struct ManualScheduler {
    pub timers: Arc<Mutex<ManualTimers>>,
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        let mut timers = self.timers.lock().unwrap();
        timers.next_id += 1;
        let id = TimerId(timers.next_id);
        timers.scheduled.push((id, delay));
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        let mut timers = self.timers.lock().unwrap();
        let known = timers.scheduled.iter().any(|(scheduled, _)| *scheduled == id);
        if known && !timers.cancelled.contains(&id) {
            timers.cancelled.push(id);
            return true;
        }
        false
    }
}

pub fn wifi_device() -> StaticDeviceInfo {
    StaticDeviceInfo::new(
        false,
        Some(ConnectionInfo {
            connection_type: Some(ConnectionType::Wifi),
            effective_type: EffectiveType::FourG,
            downlink_mbps: Some(50.0),
            rtt_ms: Some(30.0),
        }),
    )
}

pub fn cellular_device(effective_type: EffectiveType) -> StaticDeviceInfo {
    StaticDeviceInfo::new(
        true,
        Some(ConnectionInfo {
            connection_type: Some(ConnectionType::Cellular),
            effective_type,
            downlink_mbps: Some(0.25),
            rtt_ms: Some(1800.0),
        }),
    )
}

/// A controller wired to fakes, with its event channel exposed
pub struct Harness {
    pub controller: ResilienceController,
    pub events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    pub factory: Arc<FakeTransportFactory>,
    pub locks: Arc<FakeScreenLocks>,
    pub presentation: Arc<RecordingPresentation>,
    pub probe: Arc<FakeProbe>,
    pub scheduler: ManualScheduler,
}

impl Harness {
    pub fn new(device: StaticDeviceInfo) -> Self {
        Self::build(device, FakeScreenLocks::default())
    }

    pub fn wifi() -> Self {
        Self::new(wifi_device())
    }

    pub fn cellular(effective_type: EffectiveType) -> Self {
        Self::new(cellular_device(effective_type))
    }

    pub fn build(device: StaticDeviceInfo, locks: FakeScreenLocks) -> Self {
        let config = AppConfig::default();
        let factory = Arc::new(FakeTransportFactory::new());
        let locks = Arc::new(locks);
        let presentation = Arc::new(RecordingPresentation::default());
        let probe = Arc::new(FakeProbe::new(ProbeOutcome::RoundTrip(Duration::from_millis(40))));
        let scheduler = ManualScheduler::default();

        let classifier = Arc::new(NetworkClassifier::new(
            Arc::new(device),
            probe.clone(),
            config.rtt_threshold(),
            config.probe_timeout(),
        ));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let driver = SessionDriver::new(
            DriverDeps {
                factory: factory.clone(),
                classifier: classifier.clone(),
                screen_locks: locks.clone(),
                presentation: presentation.clone(),
                cellular_prestart_audio: config.to_cellular_prestart_audio(),
                cellular_in_call_audio: config.to_cellular_in_call_audio(),
            },
            events_tx,
        );

        let controller = ResilienceController::new(
            driver,
            config.to_retry_policy(),
            Box::new(scheduler.clone()),
            classifier,
            presentation.clone(),
            HealthMonitor::new(config.health.history_size),
        );

        Self {
            controller,
            events_rx,
            factory,
            locks,
            presentation,
            probe,
            scheduler,
        }
    }

    /// Feed every queued transport event to the controller
    pub async fn pump(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.controller.handle_event(event).await;
        }
    }

    /// Emit from the latest transport and process it
    pub async fn deliver(&mut self, event: SessionEvent) {
        self.factory.emit(event);
        self.pump().await;
    }

    pub fn scheduled(&self) -> Vec<(TimerId, Duration)> {
        self.scheduler.timers.lock().unwrap().scheduled.clone()
    }

    pub fn cancelled(&self) -> Vec<TimerId> {
        self.scheduler.timers.lock().unwrap().cancelled.clone()
    }

    /// Fire the most recently scheduled timer
    pub async fn fire_latest_timer(&mut self) {
        let (id, _) = *self.scheduled().last().expect("no timer scheduled");
        self.controller.on_timer(id).await;
    }
}
