//! Scripted stand-in for the remote session, used by the CLI to exercise the
//! controller without a real backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use log::{debug, info};
use serde_json::json;

use crate::audio::AudioSettings;
use crate::error::TransportError;
use crate::transport::{EventSink, SessionEvent, Transport, TransportFactory};

#[derive(Debug, Clone)]
pub struct SimulationPlan {
    /// Failure reasons consumed one per session attempt
    pub failures: VecDeque<String>,
    pub participants: usize,
    pub connect_delay: Duration,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            failures: VecDeque::new(),
            participants: 1,
            connect_delay: Duration::from_millis(500),
        }
    }
}

pub struct SimulatedTransportFactory {
    plan: Arc<Mutex<SimulationPlan>>,
}

impl SimulatedTransportFactory {
    pub fn new(plan: SimulationPlan) -> Self {
        Self {
            plan: Arc::new(Mutex::new(plan)),
        }
    }

    /// Change how many remote participants live calls report
    pub fn set_participants(&self, participants: usize) {
        if let Ok(mut plan) = self.plan.lock() {
            plan.participants = participants;
        }
    }
}

impl TransportFactory for SimulatedTransportFactory {
    fn create(&self, public_key: &str, events: EventSink) -> Result<Box<dyn Transport>, TransportError> {
        let key_prefix: String = public_key.chars().take(4).collect();
        debug!("Creating simulated transport for key {}...", key_prefix);
        Ok(Box::new(SimulatedTransport {
            events,
            plan: self.plan.clone(),
            live: false,
        }))
    }
}

struct SimulatedTransport {
    events: EventSink,
    plan: Arc<Mutex<SimulationPlan>>,
    live: bool,
}

#[async_trait]
impl Transport for SimulatedTransport {
    async fn start(&mut self, assistant_id: &str) -> Result<(), TransportError> {
        let (failure, delay) = {
            let mut plan = self
                .plan
                .lock()
                .map_err(|_| TransportError::new("simulation plan poisoned"))?;
            (plan.failures.pop_front(), plan.connect_delay)
        };

        info!("Simulated call to assistant {} (failure: {:?})", assistant_id, failure);
        self.live = failure.is_none();

        let events = self.events.clone();
        let assistant = assistant_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match failure {
                Some(reason) => {
                    events.emit(SessionEvent::Error(reason));
                }
                None => {
                    events.emit(SessionEvent::CallStarted);
                    events.emit(SessionEvent::Message(json!({
                        "type": "transcript",
                        "role": "assistant",
                        "transcriptType": "final",
                        "transcript": format!("Hi, this is {}. How can I help?", assistant),
                    })));
                }
            }
        });

        Ok(())
    }

    async fn stop(&mut self) -> Result<(), TransportError> {
        self.live = false;
        self.events.emit(SessionEvent::CallEnded);
        Ok(())
    }

    async fn apply_audio_settings(&mut self, settings: &AudioSettings) -> Result<(), TransportError> {
        info!("Simulated transport audio: {}", settings.describe());
        Ok(())
    }

    async fn participant_count(&self) -> Result<usize, TransportError> {
        if !self.live {
            return Ok(0);
        }
        self.plan
            .lock()
            .map(|plan| plan.participants)
            .map_err(|_| TransportError::new("simulation plan poisoned"))
    }
}
