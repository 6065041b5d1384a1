use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use log::debug;

/// Session health levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Unknown,
}

/// Result of one session health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: String,
    pub participants: Option<usize>,
    pub last_updated: u64, // Unix timestamp
}

impl HealthCheck {
    pub fn new(name: &str, status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            participants: None,
            last_updated: current_timestamp(),
        }
    }

    pub fn with_participants(mut self, participants: usize) -> Self {
        self.participants = Some(participants);
        self
    }
}

/// Summary of the recorded checks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub overall_status: HealthStatus,
    pub latest: Option<HealthCheck>,
    pub checks_run: usize,
    pub warnings: usize,
    pub timestamp: u64,
    pub uptime_seconds: u64,
}

/// Bounded history of session health checks
pub struct HealthMonitor {
    history: VecDeque<HealthCheck>,
    max_history_size: usize,
    checks_run: usize,
    start_time: Instant,
}

impl HealthMonitor {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max_history_size: max_history_size.max(1),
            checks_run: 0,
            start_time: Instant::now(),
        }
    }

    pub fn record(&mut self, check: HealthCheck) {
        debug!("Health check '{}': {:?} - {}", check.name, check.status, check.message);
        self.history.push_back(check);
        self.checks_run += 1;

        while self.history.len() > self.max_history_size {
            self.history.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&HealthCheck> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &HealthCheck> {
        self.history.iter()
    }

    pub fn report(&self) -> HealthReport {
        let latest = self.latest().cloned();
        HealthReport {
            overall_status: latest
                .as_ref()
                .map(|check| check.status)
                .unwrap_or(HealthStatus::Unknown),
            latest,
            checks_run: self.checks_run,
            warnings: self
                .history
                .iter()
                .filter(|check| check.status == HealthStatus::Warning)
                .count(),
            timestamp: current_timestamp(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
