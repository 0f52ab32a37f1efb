//! In-memory stand-ins for the serial port, the port list and the device RPC layer

use fzlink::device::{DeviceRpc, RpcConnector, ScreenCallback};
use fzlink::error::{LinkError, Result};
use fzlink::screen::ScreenFrame;
use fzlink::serial::{
    EndpointInfo, PortEnumerator, PortOpener, Transport, BOOT_PROMPT, START_RPC_SESSION,
};
use fzlink::types::{InputKey, InputType};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Console output of a device that accepts the session
pub fn accepting_console() -> Vec<u8> {
    let mut bytes = b"Flipper CLI banner\r\n".to_vec();
    bytes.extend_from_slice(BOOT_PROMPT);
    bytes.extend_from_slice(START_RPC_SESSION);
    bytes
}

/// Console output of a device that answers with `reply`
pub fn console_replying(reply: &str) -> Vec<u8> {
    let mut bytes = BOOT_PROMPT.to_vec();
    bytes.extend_from_slice(reply.as_bytes());
    bytes
}

/// Shared state of one simulated serial line
#[derive(Default)]
pub struct Line {
    inbound: Mutex<VecDeque<u8>>,
    written: Mutex<Vec<u8>>,
    broken: AtomicBool,
    hung_up: AtomicBool,
    write_stall: Mutex<Option<Duration>>,
    write_budget: Mutex<Option<usize>>,
}

impl Line {
    pub fn with_input(bytes: &[u8]) -> Arc<Self> {
        let line = Self::default();
        line.push(bytes);
        Arc::new(line)
    }

    /// Queue bytes as if the device had sent them
    pub fn push(&self, bytes: &[u8]) {
        self.inbound.lock().unwrap().extend(bytes.iter().copied());
    }

    /// Make every further read and write fail, like a pulled cable
    pub fn unplug(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Report end of stream once the queued input is consumed
    pub fn hang_up(&self) {
        self.hung_up.store(true, Ordering::SeqCst);
    }

    /// Hold every further write for `delay`, like a device that stopped draining
    pub fn stall_writes(&self, delay: Duration) {
        *self.write_stall.lock().unwrap() = Some(delay);
    }

    /// Let `count` more writes through, then fail them all
    pub fn break_after_writes(&self, count: usize) {
        *self.write_budget.lock().unwrap() = Some(count);
    }

    pub fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }
}

/// [`Transport`] over a [`Line`]; clones share the line
pub struct FakeTransport {
    name: String,
    line: Arc<Line>,
}

impl FakeTransport {
    pub fn new(name: &str, line: Arc<Line>) -> Self {
        Self {
            name: name.to_string(),
            line,
        }
    }
}

impl Read for FakeTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.line.broken.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        let mut inbound = self.line.inbound.lock().unwrap();
        if inbound.is_empty() {
            drop(inbound);
            if self.line.hung_up.load(Ordering::SeqCst) {
                return Ok(0);
            }
            std::thread::sleep(Duration::from_millis(2));
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(inbound.len());
        for (slot, byte) in buf.iter_mut().zip(inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for FakeTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let stall = *self.line.write_stall.lock().unwrap();
        if let Some(delay) = stall {
            std::thread::sleep(delay);
        }
        if self.line.broken.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        if let Some(left) = self.line.write_budget.lock().unwrap().as_mut() {
            if *left == 0 {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            *left -= 1;
        }
        self.line.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.line.broken.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        Ok(())
    }
}

impl Transport for FakeTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn try_clone_transport(&self) -> io::Result<Box<dyn Transport>> {
        Ok(Box::new(FakeTransport::new(&self.name, Arc::clone(&self.line))))
    }
}

/// Opens a fresh simulated line per call
pub struct MemoryOpener {
    console: Vec<u8>,
    failures_left: AtomicUsize,
    fragile_left: AtomicUsize,
    opened: Mutex<Vec<(String, Arc<Line>)>>,
}

impl MemoryOpener {
    /// Every open yields a device that accepts the session
    pub fn accepting() -> Arc<Self> {
        Self::with_console(accepting_console())
    }

    pub fn with_console(console: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            console,
            failures_left: AtomicUsize::new(0),
            fragile_left: AtomicUsize::new(0),
            opened: Mutex::new(Vec::new()),
        })
    }

    /// Fail the next `count` opens as if the endpoint had vanished
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// The next `count` opened lines complete the handshake and then fail
    /// the first liveness write
    pub fn fragile_next(&self, count: usize) {
        self.fragile_left.store(count, Ordering::SeqCst);
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    pub fn opened_names(&self) -> Vec<String> {
        self.opened.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    /// Line of the most recent successful open
    pub fn last_line(&self) -> Option<Arc<Line>> {
        self.opened.lock().unwrap().last().map(|(_, l)| Arc::clone(l))
    }
}

impl PortOpener for MemoryOpener {
    fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(LinkError::Transport(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} vanished", endpoint),
            )));
        }
        let line = Line::with_input(&self.console);
        let fragile = self
            .fragile_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fragile {
            // the handshake writes once
            line.break_after_writes(1);
        }
        self.opened
            .lock()
            .unwrap()
            .push((endpoint.to_string(), Arc::clone(&line)));
        Ok(Box::new(FakeTransport::new(endpoint, line)))
    }
}

/// Fixed port list
pub struct StaticPorts(pub Vec<EndpointInfo>);

impl StaticPorts {
    /// One endpoint carrying the default device identity
    pub fn single(name: &str) -> Box<Self> {
        Box::new(Self(vec![
            EndpointInfo::other("/dev/ttyS0"),
            EndpointInfo::usb(name, 0x0483, 0x5740),
        ]))
    }

    pub fn empty() -> Box<Self> {
        Box::new(Self(Vec::new()))
    }
}

impl PortEnumerator for StaticPorts {
    fn endpoints(&self) -> Result<Vec<EndpointInfo>> {
        Ok(self.0.clone())
    }
}

/// Device RPC double that records input and can push frames
#[derive(Default)]
pub struct FakeDevice {
    callback: Mutex<Option<ScreenCallback>>,
    events: Mutex<Vec<(InputKey, InputType)>>,
}

impl FakeDevice {
    pub fn events(&self) -> Vec<(InputKey, InputType)> {
        self.events.lock().unwrap().clone()
    }

    /// Invoke the registered screen callback, as the RPC reader thread would
    pub fn push_frame(&self, frame: ScreenFrame) -> bool {
        let callback = self.callback.lock().unwrap().clone();
        match callback {
            Some(callback) => {
                callback(frame);
                true
            }
            None => false,
        }
    }
}

impl DeviceRpc for FakeDevice {
    fn start_screen_stream(&self, callback: ScreenCallback) -> Result<()> {
        *self.callback.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn send_input_event(&self, key: InputKey, kind: InputType) -> Result<()> {
        self.events.lock().unwrap().push((key, kind));
        Ok(())
    }
}

/// Hands out a new [`FakeDevice`] per connection
#[derive(Default)]
pub struct FakeConnector {
    devices: Mutex<Vec<Arc<FakeDevice>>>,
    transports: Mutex<Vec<Box<dyn Transport>>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connect_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }

    pub fn last_device(&self) -> Option<Arc<FakeDevice>> {
        self.devices.lock().unwrap().last().cloned()
    }
}

impl RpcConnector for FakeConnector {
    fn connect(&self, transport: Box<dyn Transport>, _timeout: Duration) -> Result<Arc<dyn DeviceRpc>> {
        let device = Arc::new(FakeDevice::default());
        self.transports.lock().unwrap().push(transport);
        self.devices.lock().unwrap().push(Arc::clone(&device));
        Ok(device)
    }
}
