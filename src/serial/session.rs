//! Serial session handshake
//!
//! The device boots its serial console into an interactive CLI. Writing the
//! session-start command switches it into RPC mode; the device echoes the
//! command back before it starts speaking the binary protocol.
//!
//! 1. wait for the CLI prompt ([`BOOT_PROMPT`])
//! 2. write [`START_RPC_SESSION`]
//! 3. read one `\r`-terminated line and require it to equal the command

use super::reader::{read_chunk, read_until};
use super::{PortOpener, Transport};
use crate::cancel::CancelToken;
use crate::error::{LinkError, Result};
use std::io::{BufReader, Write};
use std::sync::Arc;

/// Prompt printed by the device CLI when it is ready for a command
pub const BOOT_PROMPT: &[u8] = b"\r\n\r\n>: ";

/// Command that switches the serial console into RPC mode
pub const START_RPC_SESSION: &[u8] = b"start_rpc_session\r";

/// Opens an endpoint and performs the session handshake on it
#[derive(Clone)]
pub struct SessionOpener {
    opener: Arc<dyn PortOpener>,
    cancel: CancelToken,
}

impl SessionOpener {
    pub fn new(opener: Arc<dyn PortOpener>, cancel: CancelToken) -> Self {
        Self { opener, cancel }
    }

    /// Open `endpoint` and leave it in RPC mode
    pub fn open(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let transport = self.opener.open(endpoint)?;
        let transport = handshake(transport, &self.cancel)?;
        tracing::info!("Opened RPC session on {}", endpoint);
        Ok(transport)
    }
}

impl std::fmt::Debug for SessionOpener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionOpener").finish_non_exhaustive()
    }
}

/// Run the handshake on an already open transport
///
/// Blocks until the prompt arrives, the transport fails, or `cancel` fires.
pub fn handshake(mut transport: Box<dyn Transport>, cancel: &CancelToken) -> Result<Box<dyn Transport>> {
    let name = transport.name().to_string();
    {
        let mut reader = BufReader::new(&mut *transport);

        match read_until(&mut reader, BOOT_PROMPT, cancel) {
            Ok(banner) => {
                tracing::trace!("Skipped {} bytes of console output on {}", banner.len(), name)
            }
            Err(LinkError::Cancelled) => return Err(LinkError::Cancelled),
            Err(e) => {
                return Err(LinkError::HandshakePrelude(format!(
                    "no CLI prompt on {}: {}",
                    name, e
                )))
            }
        }

        reader.get_mut().write_all(START_RPC_SESSION)?;
        reader.get_mut().flush()?;

        let mut echo = Vec::new();
        let terminator = START_RPC_SESSION[START_RPC_SESSION.len() - 1];
        read_chunk(&mut reader, terminator, &mut echo, cancel)?;

        if echo != START_RPC_SESSION {
            let text = String::from_utf8_lossy(&echo).trim().to_string();
            tracing::warn!("Device on {} refused RPC session: {:?}", name, text);
            return Err(LinkError::UnexpectedDeviceResponse(text));
        }

        if !reader.buffer().is_empty() {
            tracing::debug!(
                "Discarding {} buffered bytes after handshake on {}",
                reader.buffer().len(),
                name
            );
        }
    }
    Ok(transport)
}
