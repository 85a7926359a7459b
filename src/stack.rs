// Copyright (c) 2025 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! The BLE stack collaborator.
//!
//! The stack itself is opaque to this crate: link-layer timing, L2CAP/GATT
//! logic and radio control all live behind [`BleStack`].  What the trait
//! pins down is the *calling discipline* the stack requires.  The stack is
//! single-threaded and not reentrant, and the pump tasks are the only
//! contexts that uphold that:
//!
//! - [`pump_link_layer`] is only ever invoked from the link-layer pump.
//! - [`peek_event`], [`sleep_hint`] and [`dispatch_command`] are only ever
//!   invoked from the stack pump.
//!
//! Implementations may rely on this serialization; they must in turn tolerate
//! the link-layer step running concurrently with the stack-pump calls, since
//! the two pumps are independent kernel tasks.
//!
//! [`pump_link_layer`]: BleStack::pump_link_layer
//! [`peek_event`]: BleStack::peek_event
//! [`sleep_hint`]: BleStack::sleep_hint
//! [`dispatch_command`]: BleStack::dispatch_command

use core::fmt;

use crate::time::Tick;

/// The stack's native clock frequency, in Hz.  Sleep hints in
/// [`SleepHint::Ticks`] are expressed in this unit.
pub const STACK_FREQUENCY: u32 = 32_768;

/// The opcode word identifying a BGAPI command.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandHeader(pub u32);

impl fmt::Debug for CommandHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommandHeader({:#010x})", self.0)
    }
}

/// A response handler the stack invokes, synchronously and on the stack pump
/// context, with the response payload of a dispatched command.
pub type ResponseHandler = fn(&[u8]);

/// The stack's self-reported sleep budget, recomputed every stack pump
/// iteration and never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SleepHint {
    /// The stack has work to do right now and must be pumped again without
    /// sleeping.
    Zero,
    /// The stack has no work for this many of its own ticks (at
    /// [`STACK_FREQUENCY`]).
    Ticks(Tick),
    /// The stack is idle indefinitely; only an external signal creates new
    /// work.
    Infinite,
}

/// A cooperative, poll-driven BLE controller/host stack.
///
/// Modeled as the four entry points the synchronization core needs; see the
/// module docs for the serialization contract each one is called under.
pub trait BleStack: Send + Sync {
    /// An asynchronous notification produced by the stack.
    ///
    /// This is an owned handle into the stack's internal event queue (an
    /// index or pointer wrapper, typically), not a copy of the event body.
    /// The queue slot it designates stays valid until the handle is dropped,
    /// which the delivery protocol guarantees happens before the next event
    /// is fetched.
    type Event: Send + 'static;

    /// Run one time-critical link-layer step.
    ///
    /// Invoked exactly once per consumed link-layer signal, from the
    /// highest-priority pump context.
    fn pump_link_layer(&self);

    /// Fetch the next pending event, if any.
    fn peek_event(&self) -> Option<Self::Event>;

    /// Report how long the stack can sleep.
    ///
    /// This is advisory scheduling input, never an error.  A stack that
    /// perpetually reports [`SleepHint::Zero`] without producing events will
    /// spin the stack pump; honoring the hint's meaning is the stack
    /// library's obligation.
    fn sleep_hint(&self) -> SleepHint;

    /// Execute one BGAPI command synchronously.
    ///
    /// The response, if `handler` is given, is delivered through it before
    /// this call returns.  `payload` is borrowed from the submitting caller,
    /// which stays blocked for the duration of the call.
    fn dispatch_command(
        &self,
        header: CommandHeader,
        handler: Option<ResponseHandler>,
        payload: &[u8],
    );
}
