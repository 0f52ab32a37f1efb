//! Test data builders for creating test objects

use super::mock_helpers::{FakeConnector, MemoryOpener, StaticPorts};
use fzlink::device::ScreenCallback;
use fzlink::screen::{ScreenFrame, SCREEN_HEIGHT, SCREEN_WIDTH};
use fzlink::serial::{EndpointIdentity, EndpointLocator};
use fzlink::supervisor::{ConnectionSupervisor, RetryPolicy, SupervisorBuilder};
use std::sync::Arc;
use std::time::Duration;

pub const DEVICE_PORT: &str = "/dev/ttyACM0";

/// Builder for a supervisor wired to in-memory fakes
pub struct SupervisorFixture {
    opener: Arc<MemoryOpener>,
    connector: Arc<FakeConnector>,
    ports: Box<StaticPorts>,
    callback: Option<ScreenCallback>,
    watchdog: Duration,
    retry: Duration,
}

impl SupervisorFixture {
    pub fn new() -> Self {
        Self {
            opener: MemoryOpener::accepting(),
            connector: FakeConnector::new(),
            ports: StaticPorts::single(DEVICE_PORT),
            callback: None,
            watchdog: Duration::from_millis(10),
            retry: Duration::from_millis(10),
        }
    }

    pub fn opener(mut self, opener: Arc<MemoryOpener>) -> Self {
        self.opener = opener;
        self
    }

    pub fn ports(mut self, ports: Box<StaticPorts>) -> Self {
        self.ports = ports;
        self
    }

    pub fn screen_callback(mut self, callback: ScreenCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn watchdog(mut self, interval: Duration) -> Self {
        self.watchdog = interval;
        self
    }

    pub fn build(self) -> (Arc<ConnectionSupervisor>, Arc<MemoryOpener>, Arc<FakeConnector>) {
        let callback: ScreenCallback = match self.callback {
            Some(callback) => callback,
            None => Arc::new(|_frame: ScreenFrame| {}),
        };
        let locator = EndpointLocator::new(EndpointIdentity::new(0x0483, 0x5740), self.ports);
        let supervisor = SupervisorBuilder::new(self.connector.clone())
            .locator(locator)
            .opener(self.opener.clone())
            .screen_callback(callback)
            .watchdog_interval(self.watchdog)
            .retry_policy(RetryPolicy::fixed(self.retry))
            .build()
            .unwrap();
        (supervisor, self.opener, self.connector)
    }
}

/// Device-sized frame with the given pixels lit
pub fn device_frame(lit: &[(usize, usize)]) -> ScreenFrame {
    ScreenFrame::from_fn(SCREEN_WIDTH, SCREEN_HEIGHT, |x, y| lit.contains(&(x, y))).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_frame_builder() {
        let frame = device_frame(&[(3, 4)]);
        assert!(frame.is_pixel_set(3, 4));
        assert!(!frame.is_pixel_set(4, 3));
    }
}
