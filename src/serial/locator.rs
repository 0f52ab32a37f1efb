//! Endpoint autodetection
//!
//! Enumerates the host's serial endpoints and picks the one whose USB
//! vendor/product pair matches the device.

use crate::error::{LinkError, Result};
use serde::{Deserialize, Serialize};
use serialport::SerialPortType;

/// USB vendor/product pair that identifies the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl EndpointIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    fn matches(&self, info: &EndpointInfo) -> bool {
        info.vendor_id == Some(self.vendor_id) && info.product_id == Some(self.product_id)
    }
}

impl std::fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// One enumerated serial endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    /// OS name of the endpoint (`/dev/ttyACM0`, `COM3`, ...)
    pub name: String,
    /// USB vendor id, when the endpoint is a USB device
    pub vendor_id: Option<u16>,
    /// USB product id, when the endpoint is a USB device
    pub product_id: Option<u16>,
    pub serial_number: Option<String>,
    pub product: Option<String>,
}

impl EndpointInfo {
    /// Endpoint with USB identifiers and no descriptive strings
    pub fn usb(name: impl Into<String>, vendor_id: u16, product_id: u16) -> Self {
        Self {
            name: name.into(),
            vendor_id: Some(vendor_id),
            product_id: Some(product_id),
            serial_number: None,
            product: None,
        }
    }

    /// Endpoint that is not backed by USB (built-in UART, Bluetooth, PTY)
    pub fn other(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vendor_id: None,
            product_id: None,
            serial_number: None,
            product: None,
        }
    }
}

impl std::fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.vendor_id, self.product_id) {
            (Some(vid), Some(pid)) => {
                write!(f, "{} ({:04x}:{:04x})", self.name, vid, pid)?;
                if let Some(product) = &self.product {
                    write!(f, " {}", product)?;
                }
                if let Some(serial) = &self.serial_number {
                    write!(f, " - {}", serial)?;
                }
                Ok(())
            }
            _ => write!(f, "{}", self.name),
        }
    }
}

/// Source of serial endpoint listings
pub trait PortEnumerator: Send + Sync {
    fn endpoints(&self) -> Result<Vec<EndpointInfo>>;
}

/// Enumerates endpoints with `serialport::available_ports`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn endpoints(&self) -> Result<Vec<EndpointInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|p| match p.port_type {
                SerialPortType::UsbPort(usb) => EndpointInfo {
                    name: p.port_name,
                    vendor_id: Some(usb.vid),
                    product_id: Some(usb.pid),
                    serial_number: usb.serial_number,
                    product: usb.product,
                },
                _ => EndpointInfo::other(p.port_name),
            })
            .collect())
    }
}

/// How to resolve several endpoints matching the same identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleMatchPolicy {
    /// Take the first match in enumeration order, with a warning
    #[default]
    First,
    /// Refuse to guess and fail with [`LinkError::AmbiguousEndpoint`]
    Reject,
}

/// Finds the device's endpoint among those the host exposes
pub struct EndpointLocator {
    identity: EndpointIdentity,
    policy: MultipleMatchPolicy,
    enumerator: Box<dyn PortEnumerator>,
}

impl EndpointLocator {
    pub fn new(identity: EndpointIdentity, enumerator: Box<dyn PortEnumerator>) -> Self {
        Self {
            identity,
            policy: MultipleMatchPolicy::default(),
            enumerator,
        }
    }

    /// Locator over the host's real serial ports
    pub fn system(identity: EndpointIdentity) -> Self {
        Self::new(identity, Box::new(SystemPorts))
    }

    pub fn with_policy(mut self, policy: MultipleMatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn identity(&self) -> EndpointIdentity {
        self.identity
    }

    /// Every enumerated endpoint, matching or not
    pub fn endpoints(&self) -> Result<Vec<EndpointInfo>> {
        self.enumerator.endpoints()
    }

    /// Every endpoint matching the identity, in enumeration order
    pub fn candidates(&self) -> Result<Vec<EndpointInfo>> {
        Ok(self
            .enumerator
            .endpoints()?
            .into_iter()
            .filter(|info| self.identity.matches(info))
            .collect())
    }

    /// Name of the device's endpoint
    pub fn locate(&self) -> Result<String> {
        let mut candidates = self.candidates()?;
        match candidates.len() {
            0 => Err(LinkError::EndpointNotFound {
                vendor_id: self.identity.vendor_id,
                product_id: self.identity.product_id,
            }),
            1 => {
                let found = candidates.remove(0);
                tracing::info!("Found device on {}", found.name);
                Ok(found.name)
            }
            _ => {
                let names: Vec<String> = candidates.iter().map(|c| c.name.clone()).collect();
                match self.policy {
                    MultipleMatchPolicy::First => {
                        tracing::warn!(
                            "Multiple devices match {}: {}; using {}",
                            self.identity,
                            names.join(", "),
                            names[0]
                        );
                        Ok(candidates.remove(0).name)
                    }
                    MultipleMatchPolicy::Reject => {
                        Err(LinkError::AmbiguousEndpoint { candidates: names })
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for EndpointLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointLocator")
            .field("identity", &self.identity)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
