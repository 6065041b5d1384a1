use std::sync::Arc;
use anyhow::Result;
use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::monitoring::{HealthMonitor, HealthReport};
use crate::network::{DeviceInfo, HttpLatencyProbe, LatencyProbe, NetworkClassifier};
use crate::presentation::{Presentation, StatusKind};
use crate::resilience::ResilienceController;
use crate::scheduler::{TimerId, TokioScheduler};
use crate::screen_lock::ScreenLockProvider;
use crate::session::{DriverDeps, SessionDriver};
use crate::transport::{TransportEvent, TransportFactory};

/// Inputs from the user or the hosting page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    Start,
    Stop,
    VisibilityChanged(bool),
    Status,
    Health,
    Shutdown,
}

/// Voice client: the resilience controller plus the loop that feeds it.
///
/// All controller work happens on the task running [`VoiceClient::run`]; user
/// commands, transport events and retry timers are handled one at a time.
pub struct VoiceClient {
    config: AppConfig,
    controller: ResilienceController,
    presentation: Arc<dyn Presentation>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    timers_rx: mpsc::UnboundedReceiver<TimerId>,
}

impl VoiceClient {
    /// Build a client probing the configured liveness endpoint over HTTP
    pub fn new(
        config: AppConfig,
        factory: Arc<dyn TransportFactory>,
        screen_locks: Arc<dyn ScreenLockProvider>,
        presentation: Arc<dyn Presentation>,
    ) -> Result<Self> {
        let probe = HttpLatencyProbe::new(config.probe.url.clone(), config.probe_timeout())?;
        let device = Arc::new(config.to_device_info());

        Ok(Self::with_components(
            config,
            factory,
            device,
            Arc::new(probe),
            screen_locks,
            presentation,
        ))
    }

    pub fn with_components(
        config: AppConfig,
        factory: Arc<dyn TransportFactory>,
        device: Arc<dyn DeviceInfo>,
        probe: Arc<dyn LatencyProbe>,
        screen_locks: Arc<dyn ScreenLockProvider>,
        presentation: Arc<dyn Presentation>,
    ) -> Self {
        let classifier = Arc::new(NetworkClassifier::new(
            device,
            probe,
            config.rtt_threshold(),
            config.probe_timeout(),
        ));

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (scheduler, timers_rx) = TokioScheduler::channel();

        let driver = SessionDriver::new(
            DriverDeps {
                factory,
                classifier: classifier.clone(),
                screen_locks,
                presentation: presentation.clone(),
                cellular_prestart_audio: config.to_cellular_prestart_audio(),
                cellular_in_call_audio: config.to_cellular_in_call_audio(),
            },
            events_tx,
        );

        let controller = ResilienceController::new(
            driver,
            config.to_retry_policy(),
            Box::new(scheduler),
            classifier,
            presentation.clone(),
            HealthMonitor::new(config.health.history_size),
        )
        .with_ending_timeout(config.ending_timeout());

        Self {
            config,
            controller,
            presentation,
            events_rx,
            timers_rx,
        }
    }

    pub fn controller(&self) -> &ResilienceController {
        &self.controller
    }

    pub fn health_report(&self) -> HealthReport {
        self.controller.health().report()
    }

    /// Process inputs until `Shutdown` or until the command channel closes
    pub async fn run(mut self, mut commands: mpsc::Receiver<ClientCommand>) -> Result<()> {
        info!("Voice client ready");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.events_rx.recv() => {
                    self.controller.handle_event(event).await;
                }
                Some(timer) = self.timers_rx.recv() => {
                    self.controller.on_timer(timer).await;
                }
            }
        }

        info!("Shutting down voice client");
        self.controller.stop().await;
        Ok(())
    }

    pub async fn handle_command(&mut self, command: ClientCommand) {
        debug!("Command: {:?}", command);
        match command {
            ClientCommand::Start => {
                if let Err(e) = self.controller.start(self.config.clone()).await {
                    warn!("Start failed: {}", e);
                }
            }
            ClientCommand::Stop => self.controller.stop().await,
            ClientCommand::VisibilityChanged(visible) => {
                self.controller.on_visibility_change(visible).await;
            }
            ClientCommand::Status => {
                let retry = self.controller.retry_state();
                let network = self
                    .controller
                    .driver()
                    .network_profile()
                    .map(|p| format!("{} ({})", p.label(), p.effective_type.as_str()))
                    .unwrap_or_else(|| "not classified".to_string());
                self.presentation.update_status(
                    &format!(
                        "Session {}, network {}, failed attempts {}/{}{}",
                        self.controller.state(),
                        network,
                        retry.attempts(),
                        retry.max_attempts(),
                        if self.controller.pending_retry().is_some() {
                            ", reconnect scheduled"
                        } else {
                            ""
                        }
                    ),
                    StatusKind::Info,
                );
            }
            ClientCommand::Health => {
                let report = self.health_report();
                let latest = report
                    .latest
                    .map(|check| check.message)
                    .unwrap_or_else(|| "no checks yet".to_string());
                self.presentation.update_status(
                    &format!(
                        "Health {:?}: {} ({} checks, {} warnings)",
                        report.overall_status, latest, report.checks_run, report.warnings
                    ),
                    StatusKind::Info,
                );
            }
            ClientCommand::Shutdown => {}
        }
    }
}
