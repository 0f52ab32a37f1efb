//! Non-blocking hand-off of decoded frames
//!
//! The device pushes frames from its own callback thread. Sending into the
//! presentation layer must never stall that thread, so the queue is bounded
//! and a full queue sheds frames according to [`DropPolicy`].

use super::decoder::{DecodedScreen, ScreenDecoder};
use crate::device::ScreenCallback;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Which frame loses when the consumer falls behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropPolicy {
    /// Evict the stalest queued frame so the newest one gets in
    #[default]
    DropOldest,
    /// Keep the queue as is and discard the incoming frame
    DropNewest,
}

/// Producer half, owned by the device callback
#[derive(Debug, Clone)]
pub struct ScreenSink {
    tx: Sender<DecodedScreen>,
    // Only used to evict under DropOldest
    evict: Receiver<DecodedScreen>,
    policy: DropPolicy,
    dropped: Arc<AtomicU64>,
    consumer: Weak<()>,
}

/// Consumer half, owned by the presentation layer
#[derive(Debug, Clone)]
pub struct ScreenReceiver {
    rx: Receiver<DecodedScreen>,
    dropped: Arc<AtomicU64>,
    _alive: Arc<()>,
}

/// Create a bounded screen channel
pub fn screen_channel(depth: usize, policy: DropPolicy) -> (ScreenSink, ScreenReceiver) {
    let (tx, rx) = bounded(depth.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let alive = Arc::new(());
    (
        ScreenSink {
            tx,
            evict: rx.clone(),
            policy,
            dropped: Arc::clone(&dropped),
            consumer: Arc::downgrade(&alive),
        },
        ScreenReceiver {
            rx,
            dropped,
            _alive: alive,
        },
    )
}

impl ScreenSink {
    /// Queue a decoded frame without blocking
    ///
    /// Returns `false` when the consumer side has gone away.
    pub fn deliver(&self, screen: DecodedScreen) -> bool {
        if self.consumer.strong_count() == 0 {
            return false;
        }
        let mut screen = screen;
        // One eviction is enough with a single producer; a second full
        // queue means a concurrent producer won and this frame is shed.
        for _ in 0..2 {
            match self.tx.try_send(screen) {
                Ok(()) => return true,
                Err(TrySendError::Disconnected(_)) => return false,
                Err(TrySendError::Full(rejected)) => match self.policy {
                    DropPolicy::DropNewest => {
                        self.record_drop();
                        return true;
                    }
                    DropPolicy::DropOldest => {
                        if self.evict.try_recv().is_ok() {
                            self.record_drop();
                        }
                        screen = rejected;
                    }
                },
            }
        }
        self.record_drop();
        true
    }

    fn record_drop(&self) {
        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("Screen consumer is behind, dropped {} frame(s) so far", total);
    }

    pub fn policy(&self) -> DropPolicy {
        self.policy
    }
}

impl ScreenReceiver {
    /// Block until the next frame arrives; `None` once all sinks are gone
    pub fn recv(&self) -> Option<DecodedScreen> {
        self.rx.recv().ok()
    }

    /// Wait up to `timeout` for a frame
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DecodedScreen> {
        match self.rx.recv_timeout(timeout) {
            Ok(screen) => Some(screen),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Take a frame if one is queued
    pub fn try_recv(&self) -> Option<DecodedScreen> {
        self.rx.try_recv().ok()
    }

    /// Drain the queue and keep only the newest frame
    pub fn latest(&self) -> Option<DecodedScreen> {
        self.rx.try_iter().last()
    }

    /// Frames shed because the consumer was slower than the device
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Underlying channel, for use in a `select!`
    pub fn as_receiver(&self) -> &Receiver<DecodedScreen> {
        &self.rx
    }
}

/// Device callback that decodes each frame and hands it to `sink`
pub fn screen_callback(decoder: ScreenDecoder, sink: ScreenSink) -> ScreenCallback {
    Arc::new(move |frame| match decoder.decode(&frame) {
        Ok(screen) => {
            if !sink.deliver(screen) {
                tracing::trace!("Screen receiver closed, frame discarded");
            }
        }
        Err(e) => tracing::warn!("Could not decode screen frame: {}", e),
    })
}
