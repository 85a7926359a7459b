// Copyright (c) 2025 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! # Startup errors
//!
//! This module contains an `Error` and `Result` type for the one operation in
//! this crate that can fail: [`start`].  Once the pump tasks are running, no
//! operation reports failure; bus timeouts and empty event queues are
//! scheduling hints, not errors.
//!
//! [`start`]: crate::BleHost::start

use core::fmt;

use std::io;

/// A startup failure.
///
/// Construction of the pump tasks aborts on the first failure rather than
/// proceeding with a partially constructed core.
pub enum Error {
    /// The kernel refused to create one of the pump tasks, typically from
    /// memory exhaustion.
    TaskCreate(io::Error),
    /// The configured link-layer priority does not strictly exceed the stack
    /// pump priority.  The link-layer context must preempt the stack context
    /// to bound link-layer jitter.
    PriorityInversion,
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Error::TaskCreate(err) => Some(err),
            Error::PriorityInversion => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TaskCreate(err) => write!(f, "pump task creation failed: {}", err),
            Error::PriorityInversion => {
                write!(f, "link-layer priority must exceed stack pump priority")
            }
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Wraps a value with a possible startup error.
pub type Result<T> = core::result::Result<T, Error>;
