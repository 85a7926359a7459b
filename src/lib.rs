// Copyright (c) 2025 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Bluetooth stack / RTOS synchronization core.
//!
//! A cooperative, interrupt-driven BLE controller/host stack exposes a
//! single-threaded, poll-driven API: an event pump that must be invoked
//! repeatedly, plus a synchronous command interface, none of it reentrant.
//! This crate is the glue that runs such a stack on a preemptive
//! multitasking kernel.  Three independent producers of work (the link-layer
//! interrupt source, application tasks issuing commands, and the stack's
//! own event queue) are arbitrated onto one serialized execution
//! context through an event-flag rendezvous protocol, while honoring the
//! stack's self-reported sleep budget so idle time is spent blocked, not
//! polling.
//!
//! The pieces:
//!
//! - [`sync::EventFlags`]: the signal bus everything rendezvouses on,
//!   usable from task and interrupt context.
//! - [`stack::BleStack`]: the trait the opaque stack library implements.
//! - [`host::BleHost`]: startup and the application surface, covering command
//!   submission under the stack access lock, one-at-a-time event delivery
//!   with explicit acknowledgment, and the notification entry points.
//!
//! Logging goes through the `log` facade; the application installs whatever
//! logger suits its kernel.

#![deny(missing_docs)]

pub mod error;
pub mod host;
pub mod stack;
pub mod sync;
pub mod time;

pub use error::{Error, Result};
pub use host::{BleHost, Config, EventGuard, Priority, StackAccess};
pub use stack::{BleStack, CommandHeader, ResponseHandler, SleepHint};
