//! Predictable id sequence.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::ports::IdGenerator;

/// Generates `run-1`, `run-2`, ...
#[derive(Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn generate_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("run-{n}")
    }
}
