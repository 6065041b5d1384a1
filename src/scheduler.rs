use std::collections::HashMap;
use std::time::Duration;
use log::debug;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identifies one scheduled callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Delayed wake-ups for the controller loop.
///
/// A scheduler never runs controller code itself; a fired timer is delivered
/// back to the loop, which decides whether it is still relevant.
pub trait Scheduler: Send {
    fn schedule(&mut self, delay: Duration) -> TimerId;
    /// Returns true if the timer was still pending
    fn cancel(&mut self, id: TimerId) -> bool;
}

/// Tokio-backed scheduler delivering fired timers over a channel
pub struct TokioScheduler {
    next_id: u64,
    pending: HashMap<TimerId, JoinHandle<()>>,
    fired_tx: mpsc::UnboundedSender<TimerId>,
}

impl TokioScheduler {
    pub fn new(fired_tx: mpsc::UnboundedSender<TimerId>) -> Self {
        Self {
            next_id: 0,
            pending: HashMap::new(),
            fired_tx,
        }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<TimerId>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.values().filter(|h| !h.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration) -> TimerId {
        self.pending.retain(|_, handle| !handle.is_finished());

        self.next_id += 1;
        let id = TimerId(self.next_id);
        let tx = self.fired_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(id);
        });
        self.pending.insert(id, handle);

        debug!("Scheduled timer {:?} in {:?}", id, delay);
        id
    }

    fn cancel(&mut self, id: TimerId) -> bool {
        match self.pending.remove(&id) {
            Some(handle) => {
                let was_pending = !handle.is_finished();
                handle.abort();
                debug!("Cancelled timer {:?}", id);
                was_pending
            }
            None => false,
        }
    }
}
