//! Process-wide click counter
//!
//! Single-writer: every increment takes the lock, and whatever the caller
//! does with the new value inside `increment_with` happens before the next
//! increment can start. Counter broadcasts therefore leave in value order.

use parking_lot::Mutex;

/// Shared click counter
#[derive(Debug, Default)]
pub struct ClickCounter {
    value: Mutex<u64>,
}

impl ClickCounter {
    pub fn new(initial: u64) -> Self {
        ClickCounter {
            value: Mutex::new(initial),
        }
    }

    /// Current value
    pub fn get(&self) -> u64 {
        *self.value.lock()
    }

    /// Add exactly one and hand the new value to `publish` while still
    /// holding the writer lock. `publish` must not block.
    pub fn increment_with<F>(&self, publish: F) -> u64
    where
        F: FnOnce(u64),
    {
        let mut value = self.value.lock();
        *value = value.saturating_add(1);
        let current = *value;
        publish(current);
        current
    }
}
