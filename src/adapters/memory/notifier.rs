//! Outbox that keeps sent mail for inspection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::PortError;
use crate::ports::{Email, Notifier, PortFuture};

/// Notifier that appends every email to a shared list.
#[derive(Clone, Default)]
pub struct MemoryOutbox {
    sent: Arc<Mutex<Vec<Email>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryOutbox {
    /// Emails sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().expect("outbox lock poisoned").clone()
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Notifier for MemoryOutbox {
    fn send<'a>(&'a self, email: &'a Email) -> PortFuture<'a, ()> {
        let result = if self.failing.load(Ordering::SeqCst) {
            Err(PortError::Transient("mail transport unavailable".into()))
        } else {
            self.sent.lock().expect("outbox lock poisoned").push(email.clone());
            Ok(())
        };
        Box::pin(std::future::ready(result))
    }
}
