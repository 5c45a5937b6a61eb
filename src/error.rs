//! Unified error types for the coordinator firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the tick loop
//! can log any component failure the same way.  All variants are `Copy`;
//! context such as the node id is attached by the caller when logging.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Node registry rejected or failed an operation.
    Registry(RegistryError),
    /// A frame could not be delivered to a peer.
    Link(LinkError),
    /// Peer radio could not be configured.  Fatal at boot.
    RadioConfig(RadioConfigError),
    /// Uplink is not available or a broker operation failed.
    Uplink(UplinkError),
    /// Radar, peer or command payload failed validation.
    Malformed(MalformedFrame),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::RadioConfig(e) => write!(f, "radio config: {e}"),
            Self::Uplink(e) => write!(f, "uplink: {e}"),
            Self::Malformed(e) => write!(f, "malformed: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// Every peer slot is taken; pairing is rejected rather than evicting.
    Full,
    /// No node with the requested id.
    UnknownNode,
    /// Write-through to durable storage failed.
    Storage,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "registry full"),
            Self::UnknownNode => write!(f, "unknown node"),
            Self::Storage => write!(f, "persist failed"),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

// ---------------------------------------------------------------------------
// Peer link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Target is not a registered, configured radio peer.
    UnknownPeer,
    /// The radio driver reported a send or peer-table failure.
    RadioFailure,
    /// Encoded frame exceeds the radio payload limit.
    PayloadTooLarge,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPeer => write!(f, "unknown peer"),
            Self::RadioFailure => write!(f, "radio failure"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Radio configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioConfigError {
    InvalidChannel,
    InvalidPower,
    DriverInit,
}

impl fmt::Display for RadioConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidChannel => write!(f, "channel must be 1-13"),
            Self::InvalidPower => write!(f, "tx power must be 2-20 dBm"),
            Self::DriverInit => write!(f, "radio driver init failed"),
        }
    }
}

impl From<RadioConfigError> for Error {
    fn from(e: RadioConfigError) -> Self {
        Self::RadioConfig(e)
    }
}

// ---------------------------------------------------------------------------
// Uplink errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UplinkError {
    /// Expected transient state; drives backoff, never escalated.
    Disconnected,
    PublishFailed,
    SubscribeFailed,
}

impl fmt::Display for UplinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "uplink disconnected"),
            Self::PublishFailed => write!(f, "publish failed"),
            Self::SubscribeFailed => write!(f, "subscribe failed"),
        }
    }
}

impl From<UplinkError> for Error {
    fn from(e: UplinkError) -> Self {
        Self::Uplink(e)
    }
}

// ---------------------------------------------------------------------------
// Malformed input
// ---------------------------------------------------------------------------

/// Which input stream produced an invalid frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedFrame {
    Radar,
    Peer,
    Command,
}

impl fmt::Display for MalformedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radar => write!(f, "radar frame"),
            Self::Peer => write!(f, "peer frame"),
            Self::Command => write!(f, "command payload"),
        }
    }
}

impl From<MalformedFrame> for Error {
    fn from(e: MalformedFrame) -> Self {
        Self::Malformed(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
