//! Core data types for fzlink
//!
//! This module contains the small value types shared by the connection
//! supervisor, the input path and the screen pipeline.
//!
//! # Main Types
//!
//! - [`ConnectionState`] - Named states of the connection supervisor
//! - [`InputKey`] / [`InputType`] - Device buttons and press phases
//! - [`Rgb`] - `#RRGGBB` colour used for screen rendering
//! - [`ScreenshotResolution`] - `WxH` export size

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// State of the connection to the device
///
/// Only the connection supervisor moves between states; everyone else observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum ConnectionState {
    /// Nothing has been attempted yet, or the last attempt failed
    #[default]
    Disconnected,
    /// A connect attempt is in flight
    Connecting,
    /// Transport and device handle are published
    Connected,
    /// Link loss was detected and the retry loop owns the connection
    Reconnecting,
    /// Shut down; terminal
    Closed,
}

impl ConnectionState {
    /// Whether the supervisor may move from `self` to `next`
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) | (Connecting, Disconnected) | (Connecting, Reconnecting) => {
                true
            }
            (Connected, Reconnecting) | (Connected, Connecting) => true,
            (Reconnecting, Connecting) => true,
            _ => false,
        }
    }

    /// Terminal state check
    pub fn is_closed(self) -> bool {
        self == ConnectionState::Closed
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting..."),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Reconnecting => write!(f, "Reconnecting..."),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Hardware buttons on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKey {
    Up,
    Down,
    Right,
    Left,
    Ok,
    Back,
}

impl std::fmt::Display for InputKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputKey::Up => "up",
            InputKey::Down => "down",
            InputKey::Right => "right",
            InputKey::Left => "left",
            InputKey::Ok => "ok",
            InputKey::Back => "back",
        };
        f.write_str(name)
    }
}

/// Phase of a button event as understood by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    /// Button went down
    Press,
    /// Button went up
    Release,
    /// Qualifier for a short press, sent between press and release
    Short,
    /// Qualifier for a held press, sent between press and release
    Long,
    /// Auto-repeat while held
    Repeat,
}

impl InputType {
    /// The qualifier phase for a press of the given duration
    pub fn qualifier(is_long: bool) -> Self {
        if is_long {
            InputType::Long
        } else {
            InputType::Short
        }
    }
}

/// A 24-bit colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Create a colour from components
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Components as an array, the order `image::Rgb` expects
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| format!("colour must start with '#': {s:?}"))?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("colour must have six hex digits: {s:?}"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| format!("invalid colour {s:?}: {e}"))
        };
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl TryFrom<String> for Rgb {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgb> for String {
    fn from(value: Rgb) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Output size of exported screenshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScreenshotResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenshotResolution {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 512,
        }
    }
}

impl FromStr for ScreenshotResolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once('x')
            .ok_or_else(|| format!("resolution must look like 1024x512: {s:?}"))?;
        let width: u32 = w
            .trim()
            .parse()
            .map_err(|e| format!("invalid width in {s:?}: {e}"))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|e| format!("invalid height in {s:?}: {e}"))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution must be non-zero: {s:?}"));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for ScreenshotResolution {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScreenshotResolution> for String {
    fn from(value: ScreenshotResolution) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ScreenshotResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
