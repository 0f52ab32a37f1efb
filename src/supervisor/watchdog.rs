//! Link watchdog
//!
//! USB serial endpoints do not reliably report unplugging on reads, so one
//! watchdog per transport generation issues a zero-length write on a fixed
//! tick. The first failure raises a single reconnect signal and the watchdog
//! exits; the next generation gets a fresh one.

use crate::cancel::CancelToken;
use crate::error::LinkError;
use crossbeam_channel::{select, tick};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Result of one liveness probe
#[derive(Debug)]
pub enum ProbeOutcome {
    /// The write went through
    Healthy,
    /// Not connected right now; try again next tick
    Idle,
    /// The probed generation has been replaced or torn down
    Stale,
    /// The write failed
    Failed(LinkError),
}

/// What a watchdog needs from its owner
pub trait LinkProbe: Send + Sync {
    /// Probe the transport of `generation`
    fn probe(&self, generation: u64) -> ProbeOutcome;

    /// Whether teardown has started
    fn is_closing(&self) -> bool;

    /// Report that `generation` is dead
    fn link_lost(&self, generation: u64, error: LinkError);
}

/// Periodic prober bound to one transport generation
#[derive(Debug, Clone)]
pub struct LinkWatchdog {
    interval: Duration,
    generation: u64,
    cancel: CancelToken,
}

impl LinkWatchdog {
    pub fn new(interval: Duration, generation: u64, cancel: CancelToken) -> Self {
        Self {
            interval,
            generation,
            cancel,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run on a background thread
    pub fn spawn(self, probe: Arc<dyn LinkProbe>) -> JoinHandle<()> {
        std::thread::spawn(move || self.run(probe.as_ref()))
    }

    /// Tick until the link fails, the generation goes stale, or cancellation
    pub fn run(&self, probe: &dyn LinkProbe) {
        let ticker = tick(self.interval);
        tracing::trace!("Watchdog started for generation {}", self.generation);
        loop {
            select! {
                recv(self.cancel.done()) -> _ => {
                    tracing::trace!("Watchdog {} cancelled", self.generation);
                    return;
                }
                recv(ticker) -> _ => {}
            }

            match probe.probe(self.generation) {
                ProbeOutcome::Healthy => tracing::trace!("Watchdog {} tick ok", self.generation),
                ProbeOutcome::Idle => {}
                ProbeOutcome::Stale => {
                    tracing::trace!("Watchdog {} superseded", self.generation);
                    return;
                }
                ProbeOutcome::Failed(e) => {
                    if probe.is_closing() {
                        return;
                    }
                    tracing::warn!("Link check failed: {}", e);
                    probe.link_lost(self.generation, e);
                    return;
                }
            }
        }
    }
}
