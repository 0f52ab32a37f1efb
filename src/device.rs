//! Device RPC seam
//!
//! The structured RPC protocol spoken over the transport is provided by an
//! external implementation. This crate depends on exactly two capabilities of
//! it: subscribing to the screen stream and injecting input events. Both are
//! captured by [`DeviceRpc`]; [`RpcConnector`] turns a handshaken transport
//! into a live handle.

use crate::error::Result;
use crate::screen::ScreenFrame;
use crate::serial::Transport;
use crate::types::{InputKey, InputType};
use std::sync::Arc;
use std::time::Duration;

/// Callback the device RPC layer invokes for every pushed screen frame
///
/// Runs on the RPC layer's own thread and must not block.
pub type ScreenCallback = Arc<dyn Fn(ScreenFrame) + Send + Sync>;

/// Live RPC session with the device
#[cfg_attr(test, mockall::automock)]
pub trait DeviceRpc: Send + Sync {
    /// Ask the device to push screen frames to `callback`
    fn start_screen_stream(&self, callback: ScreenCallback) -> Result<()>;

    /// Inject one phase of a button event
    fn send_input_event(&self, key: InputKey, kind: InputType) -> Result<()>;
}

/// Establishes an RPC session over a transport already in RPC mode
pub trait RpcConnector: Send + Sync {
    fn connect(&self, transport: Box<dyn Transport>, timeout: Duration) -> Result<Arc<dyn DeviceRpc>>;
}

/// Anything that can hand out the current device handle
///
/// Implementors return [`LinkError::Unavailable`](crate::error::LinkError::Unavailable)
/// while no session is live. Callers should hold the returned handle only for
/// the duration of one operation.
pub trait DeviceSource: Send + Sync {
    fn device(&self) -> Result<Arc<dyn DeviceRpc>>;
}
