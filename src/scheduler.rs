//! Per-reminder deferred firing.
//!
//! Each scheduled reminder gets its own timer task; there is no polling
//! loop. The pending set is kept ordered by fire time for display only.
//! Cancellation removes the reminder from the pending set, and the timer
//! checks — atomically, by removing — that the reminder is still pending
//! before handing it to the fired channel, so a cancelled reminder's side
//! effects are suppressed even when cancellation races the timer.
//!
//! Reminders live only in memory and do not survive a restart.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::types::Reminder;

/// Fired reminders are handed to whoever holds the receiving end (the
/// orchestrator's reminder-fired pipeline).
pub struct ReminderScheduler {
    pending: Arc<Mutex<Vec<Reminder>>>,
    fired_tx: mpsc::UnboundedSender<Reminder>,
}

impl ReminderScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Reminder>) {
        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: Arc::new(Mutex::new(Vec::new())),
                fired_tx,
            },
            fired_rx,
        )
    }

    /// Register a reminder and start its timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, reminder: Reminder, delay: Duration) {
        {
            let mut pending = self.pending.lock();
            pending.push(reminder.clone());
            pending.sort_by_key(|r| r.fire_date);
        }

        let pending = self.pending.clone();
        let fired_tx = self.fired_tx.clone();
        let id = reminder.id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            // Gate on the reminder still being pending: remove-and-check in
            // one step so a concurrent cancel cannot lose the race.
            let fired = {
                let mut pending = pending.lock();
                match pending.iter().position(|r| r.id == id) {
                    Some(index) => Some(pending.remove(index)),
                    None => None,
                }
            };

            match fired {
                Some(reminder) => {
                    log::info!("Reminder '{}' fired", reminder.message);
                    if fired_tx.send(reminder).is_err() {
                        log::error!("Reminder fired but no handler is listening");
                    }
                }
                None => {
                    log::info!("Reminder timer expired after cancellation; skipping");
                }
            }
        });
    }

    /// Remove a reminder from the pending set. Returns false when the id is
    /// unknown (already fired or cancelled).
    pub fn cancel(&self, id: &str) -> bool {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|r| r.id != id);
        pending.len() < before
    }

    /// Pending reminders ordered by fire time.
    pub fn pending(&self) -> Vec<Reminder> {
        self.pending.lock().clone()
    }
}
