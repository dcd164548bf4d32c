//! Error codes for the kmon crate
//!
//! ## License
//!
//! Copyright (c) Microsoft Corporation.
//!
//! SPDX-License-Identifier: BSD-2-Clause-Patent
use core::fmt;

/// Status a command reports when it fails.
pub const COMMAND_FAILURE: i32 = -1;

/// Non-fatal command failures. These are reported to the operator and the
/// monitor keeps prompting.
#[derive(Debug, PartialEq, Eq)]
pub enum MonitorError {
    /// The command was invoked with the wrong arguments. Holds the usage line.
    Usage(&'static str),

    /// An argument could not be parsed as a hexadecimal address.
    InvalidAddress(&'static str),

    /// The end of an address range is below its start.
    InvalidRange { start: u32, end: u32 },

    /// The command needs a trapped context but the monitor was entered
    /// without one.
    NoContext(&'static str),

    /// The command line has more arguments than the monitor accepts. Holds
    /// the configured maximum.
    TooManyArguments(usize),
}

impl MonitorError {
    /// The status code reported for this failure.
    pub const fn status(&self) -> i32 {
        COMMAND_FAILURE
    }
}

impl fmt::Display for MonitorError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MonitorError::Usage(usage) => write!(fmt, "Usage: {usage}"),
            MonitorError::InvalidAddress(usage) => write!(fmt, "Usage: {usage}"),
            MonitorError::InvalidRange { .. } => write!(fmt, "start_addr cannot exceed end_addr"),
            MonitorError::NoContext(command) => write!(fmt, "{command}: no trapped environment to resume"),
            MonitorError::TooManyArguments(max) => write!(fmt, "Too many arguments (max {max})"),
        }
    }
}

/// A specialized result type for monitor commands.
pub type MonResult<T> = Result<T, MonitorError>;
