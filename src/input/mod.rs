//! Button input injection
//!
//! A logical button press is three device writes: `Press`, a `Short` or
//! `Long` qualifier, then `Release`. [`InputDispatcher`] serialises these
//! sequences across callers and enforces a minimum spacing between accepted
//! presses so a held terminal key does not flood the device.

pub mod keymap;

pub use keymap::{map_key, map_scroll, ScrollDirection};

use crate::device::DeviceSource;
use crate::types::{InputKey, InputType};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// What happened to a dispatched press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// All three phases were attempted on a live device
    Sent,
    /// Arrived inside the cooldown window; nothing was written
    Dropped,
    /// No device handle; nothing was written and the cooldown was not consumed
    Unavailable,
}

/// Rate-limited sender of button presses
pub struct InputDispatcher {
    source: Arc<dyn DeviceSource>,
    cooldown: Duration,
    // Held for the whole three-phase sequence
    last_accepted: Mutex<Option<Instant>>,
}

impl InputDispatcher {
    pub fn new(source: Arc<dyn DeviceSource>, cooldown: Duration) -> Self {
        Self {
            source,
            cooldown,
            last_accepted: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Send one short or long press of `key`
    pub fn dispatch(&self, key: InputKey, is_long: bool) -> DispatchOutcome {
        let mut last = match self.last_accepted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        if let Some(prev) = *last {
            if now.duration_since(prev) < self.cooldown {
                tracing::trace!("Input {} dropped, inside cooldown", key);
                return DispatchOutcome::Dropped;
            }
        }

        let device = match self.source.device() {
            Ok(device) => device,
            Err(e) => {
                tracing::debug!("Input {} ignored: {}", key, e);
                return DispatchOutcome::Unavailable;
            }
        };
        *last = Some(now);

        let phases = [InputType::Press, InputType::qualifier(is_long), InputType::Release];
        for kind in phases {
            if let Err(e) = device.send_input_event(key, kind) {
                tracing::warn!("Failed to send {:?} for {}: {}", kind, key, e);
            }
        }
        DispatchOutcome::Sent
    }
}

impl std::fmt::Debug for InputDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputDispatcher")
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}
