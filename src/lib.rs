//! # fzlink: resilient serial link to a handheld device
//!
//! Finds the device among the host's serial endpoints, switches its console
//! into RPC mode, keeps the session alive across cable pulls and reboots,
//! decodes the pushed screen into terminal glyphs and an image, and injects
//! rate-limited button presses.
//!
//! ## Architecture
//!
//! - **Serial**: endpoint discovery and the text handshake ([`serial`])
//! - **Supervisor**: connection state machine, watchdog and reconnect loop ([`supervisor`])
//! - **Screen**: frame decoding and non-blocking hand-off ([`screen`])
//! - **Input**: three-phase button presses with a cooldown ([`input`])
//! - **Communication**: crossbeam channels between the device callback thread,
//!   the watchdog, the supervision thread and the presentation loop
//!
//! The RPC protocol itself is supplied by the caller through
//! [`device::RpcConnector`].
//!
//! ## Example
//!
//! ```ignore
//! use fzlink::{
//!     config::AppConfig,
//!     input::InputDispatcher,
//!     screen::{screen_callback, screen_channel, ScreenDecoder},
//!     supervisor::SupervisorBuilder,
//!     types::InputKey,
//! };
//! use std::sync::Arc;
//!
//! let config = AppConfig::load_or_default();
//! let (sink, screens) = screen_channel(config.screen.queue_depth, config.screen.drop_policy);
//! let decoder = ScreenDecoder::new(config.screen.fg_color, config.screen.bg_color);
//!
//! let supervisor = SupervisorBuilder::from_config(&config, connector)
//!     .screen_callback(screen_callback(decoder, sink))
//!     .build()?;
//! supervisor.start()?;
//!
//! let input = InputDispatcher::new(supervisor.clone(), config.input.cooldown());
//! input.dispatch(InputKey::Ok, false);
//!
//! while let Some(screen) = screens.recv() {
//!     println!("{}", screen.grid);
//! }
//! supervisor.shutdown();
//! ```

pub mod cancel;
pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod screen;
pub mod serial;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use cancel::CancelToken;
pub use config::AppConfig;
pub use device::{DeviceRpc, DeviceSource, RpcConnector, ScreenCallback};
pub use error::{LinkError, Result};
pub use input::{DispatchOutcome, InputDispatcher};
pub use screen::{DecodedScreen, ScreenDecoder, ScreenFrame};
pub use supervisor::{ConnectionSupervisor, SupervisorBuilder};
pub use types::{ConnectionState, InputKey, InputType};
