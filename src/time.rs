// Copyright (c) 2025 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! Time types for waits and sleep negotiation.
//!
//! The kernel counts time in ticks, with [`Duration`] a [`fugit`] duration in
//! those units.  The BLE stack counts time in its own, faster tick (see
//! [`STACK_FREQUENCY`]); [`stack_ticks_at_least`] converts a stack-reported
//! sleep budget into a kernel duration that never undershoots it.
//!
//! Blocking operations accept anything `Into<Timeout>`, so call sites can say
//! `wait(.., Forever)`, `wait(.., NoWait)`, or pass a [`Duration`] directly.
//!
//! [`STACK_FREQUENCY`]: crate::stack::STACK_FREQUENCY

use crate::stack::STACK_FREQUENCY;

/// The base time unit for waits and durations.
pub type Tick = u64;

/// The kernel tick frequency, in Hz.
pub const SYS_FREQUENCY: u32 = 1_000;

/// A kernel-tick-typed duration.
pub type Duration = fugit::Duration<Tick, 1, { SYS_FREQUENCY }>;

// The stack clock must be the faster of the two for the ratio below to be
// meaningful.
const _: () = assert!(STACK_FREQUENCY >= SYS_FREQUENCY);

/// Whole kernel ticks per stack tick.  The fractional part is discarded here
/// and compensated by the ceiling division in [`stack_ticks_at_least`], which
/// only ever errs toward a longer wait.
const STACK_TICK_RATIO: Tick = (STACK_FREQUENCY / SYS_FREQUENCY) as Tick;

/// Convert a sleep budget in stack ticks to a kernel duration of at least the
/// same length.
///
/// The conversion rounds up, so a pump that sleeps for the returned duration
/// is guaranteed not to wake before the stack's budget has elapsed.
pub const fn stack_ticks_at_least(ticks: Tick) -> Duration {
    Duration::from_ticks(ticks.div_ceil(STACK_TICK_RATIO))
}

/// An encoded timeout for blocking operations.
///
/// Wraps the number of kernel ticks to wait, with `None` meaning wait
/// indefinitely.  Constructed through the `From` impls on [`Duration`],
/// [`Forever`], and [`NoWait`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeout(pub(crate) Option<Tick>);

/// A timeout that waits as long as necessary for the operation to complete.
#[derive(Clone, Copy, Debug)]
pub struct Forever;

/// A timeout that does not wait at all: the operation either completes
/// immediately or reports that it could not.
#[derive(Clone, Copy, Debug)]
pub struct NoWait;

impl From<Forever> for Timeout {
    fn from(_: Forever) -> Timeout {
        Timeout(None)
    }
}

impl From<NoWait> for Timeout {
    fn from(_: NoWait) -> Timeout {
        Timeout(Some(0))
    }
}

impl From<Duration> for Timeout {
    fn from(value: Duration) -> Timeout {
        Timeout(Some(value.ticks()))
    }
}

impl Timeout {
    /// The bounded wait length, in the host kernel's native duration type.
    /// `None` means unbounded.
    pub(crate) fn to_std(self) -> Option<core::time::Duration> {
        self.0
            .map(|ticks| core::time::Duration::from_micros(Duration::from_ticks(ticks).to_micros()))
    }
}
