//! Error types for the capture side of the monitor
//!
//! `StartupError` covers everything that must stop the monitor before the
//! first receive. `CaptureError` is what a packet source reports while the
//! loop is running; only `Closed` ends the loop.

use std::io;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Failure while preparing capture; nothing has been captured yet
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to enumerate network interfaces: {0}")]
    InterfaceEnumeration(#[source] io::Error),

    #[error("no interface with an IPv4 address was found")]
    NoLocalAddress,

    #[error("invalid subnet prefix length /{0}")]
    InvalidPrefix(u8),

    #[error("no capture interface owns local address {0}")]
    InterfaceNotFound(Ipv4Addr),

    #[error("permission denied opening capture on {interface}. Required: {}", required.join(", "))]
    PermissionDenied {
        interface: String,
        required: Vec<String>,
    },

    #[error("interface {0} does not provide a link-layer capture channel")]
    UnsupportedChannel(String),

    #[error("failed to open capture channel on {interface}: {source}")]
    Channel {
        interface: String,
        #[source]
        source: io::Error,
    },
}

/// Outcome of a failed receive
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The capture handle was closed; the loop exits without error
    #[error("capture handle closed")]
    Closed,

    /// Any other receive failure; the loop logs it and receives again
    #[error("receive failed: {0}")]
    Receive(#[from] io::Error),
}
