//! Unified error types for the CO2 monitor firmware.
//!
//! Every subsystem has its own small `Copy` error enum.  Startup code in
//! `main` wraps them with `anyhow` context; inside the sampling loop
//! errors are never propagated past the stage that produced them: they
//! are logged and the tick continues.

use core::fmt;

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// No (complete) response arrived before the read deadline.
    Timeout,
    /// Response frame had the wrong header or command byte.
    Frame,
    /// Response frame failed its checksum.
    Checksum,
    /// Value decoded fine but is physically implausible.
    OutOfRange,
    /// The underlying UART / I2C bus reported an error.
    Bus,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "read timed out"),
            Self::Frame => write!(f, "malformed response frame"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::OutOfRange => write!(f, "reading out of range"),
            Self::Bus => write!(f, "bus error"),
        }
    }
}

impl std::error::Error for SensorError {}

// ---------------------------------------------------------------------------
// Broker errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// Broker unreachable or the session dropped.
    Unavailable,
    /// The client refused the publish (outbox full, not connected, ...).
    Rejected,
    /// Topic or payload exceeds the fixed-capacity buffers.
    PayloadTooLarge,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "broker unavailable"),
            Self::Rejected => write!(f, "publish rejected"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
        }
    }
}

impl std::error::Error for BrokerError {}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The settings store could not be opened at all.  Fatal at startup.
    StoreUnavailable,
    /// A value failed validation; the message names the rule.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StoreUnavailable => write!(f, "settings store unavailable"),
            Self::Invalid(msg) => write!(f, "invalid: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    Unavailable,
    IoError,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "storage unavailable"),
            Self::IoError => write!(f, "storage I/O error"),
        }
    }
}

impl std::error::Error for StorageError {}

// ---------------------------------------------------------------------------
// Display errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// The draw surface rejected the update.
    Surface,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface => write!(f, "draw surface error"),
        }
    }
}

impl std::error::Error for DisplayError {}
