//! An event-flag group.
//!
//! A single set of independently settable boolean flags with blocking wait,
//! the rendezvous point for every piece of coordination in this crate.  The
//! interface follows the event-group shape found on most small kernels: bits
//! are published with [`set`] (or [`set_from_isr`] from interrupt context),
//! and consumed with [`wait`], which atomically clears the satisfied bits so
//! that each publication is observed exactly once (edge-triggered semantics).
//! [`sync`] combines a publication with a wait, for two parties that must
//! each observe the other before proceeding.
//!
//! The group is built over the host kernel's mutex and condition variable.
//! Waiting is a cooperative block, never a spin; the condition variable is
//! susceptible to spurious wakeups, so every return path re-checks the
//! requested bits under the lock.
//!
//! [`set`]: EventFlags::set
//! [`set_from_isr`]: EventFlags::set_from_isr
//! [`wait`]: EventFlags::wait
//! [`sync`]: EventFlags::sync

use std::sync::{Condvar, Mutex};
use std::time::Instant;

use crate::time::Timeout;

/// The flag bits plus the number of contexts currently blocked on them.  The
/// waiter count is what lets [`EventFlags::set_from_isr`] report whether a
/// reschedule is worth requesting.
struct FlagState {
    bits: u32,
    waiters: u32,
}

/// A group of event flags usable from task and interrupt context.
pub struct EventFlags {
    state: Mutex<FlagState>,
    cond: Condvar,
}

impl EventFlags {
    /// Construct a new group with all flags clear.
    pub fn new() -> EventFlags {
        EventFlags {
            state: Mutex::new(FlagState {
                bits: 0,
                waiters: 0,
            }),
            cond: Condvar::new(),
        }
    }

    /// Set the given flags, waking any context whose wait they satisfy.
    ///
    /// Task-context entry point.  From an interrupt handler use
    /// [`set_from_isr`] instead.
    ///
    /// [`set_from_isr`]: EventFlags::set_from_isr
    pub fn set(&self, bits: u32) {
        let mut state = self.state.lock().unwrap();
        state.bits |= bits;
        self.cond.notify_all();
    }

    /// Set the given flags from interrupt context.
    ///
    /// Does not block beyond the group's short internal critical section.
    /// Returns whether any context was blocked on the group at the time, so
    /// an interrupt epilogue on a port with explicit preemption points can
    /// decide to request a reschedule before returning.  On a hosted kernel
    /// the scheduler preempts on its own and the value is informational.
    pub fn set_from_isr(&self, bits: u32) -> bool {
        let mut state = self.state.lock().unwrap();
        state.bits |= bits;
        let woken = state.waiters > 0;
        self.cond.notify_all();
        woken
    }

    /// Block until at least one (or, with `wait_all`, every one) of the
    /// requested flags is set, or the timeout elapses.
    ///
    /// Returns the satisfied subset of `bits`, which is empty exactly when
    /// the wait timed out.  With `clear`, the satisfied flags are cleared
    /// atomically with the successful return, consuming them; unrequested
    /// flags are never touched.
    pub fn wait<T>(&self, bits: u32, clear: bool, wait_all: bool, timeout: T) -> u32
    where
        T: Into<Timeout>,
    {
        let timeout: Timeout = timeout.into();
        let deadline = timeout.to_std().map(|d| Instant::now() + d);

        let mut state = self.state.lock().unwrap();
        loop {
            let satisfied = state.bits & bits;
            let done = if wait_all {
                satisfied == bits
            } else {
                satisfied != 0
            };
            if done {
                if clear {
                    state.bits &= !satisfied;
                }
                return satisfied;
            }

            match deadline {
                None => {
                    state.waiters += 1;
                    state = self.cond.wait(state).unwrap();
                    state.waiters -= 1;
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return 0;
                    }
                    state.waiters += 1;
                    let (guard, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
                    state = guard;
                    state.waiters -= 1;
                }
            }
        }
    }

    /// Atomically set `set` and block until every flag in `wait` is set,
    /// consuming the `wait` flags on the way out.
    ///
    /// This is the rendezvous operation: the caller publishes its half and
    /// does not proceed until the other party has published the reply.  A
    /// timeout returns an empty mask and leaves whatever subset of `wait`
    /// was reached uncleared.
    pub fn sync<T>(&self, set: u32, wait: u32, timeout: T) -> u32
    where
        T: Into<Timeout>,
    {
        let timeout: Timeout = timeout.into();
        let deadline = timeout.to_std().map(|d| Instant::now() + d);

        let mut state = self.state.lock().unwrap();
        state.bits |= set;
        self.cond.notify_all();

        loop {
            if state.bits & wait == wait {
                state.bits &= !wait;
                return wait;
            }

            match deadline {
                None => {
                    state.waiters += 1;
                    state = self.cond.wait(state).unwrap();
                    state.waiters -= 1;
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return 0;
                    }
                    state.waiters += 1;
                    let (guard, _) = self.cond.wait_timeout(state, deadline - now).unwrap();
                    state = guard;
                    state.waiters -= 1;
                }
            }
        }
    }
}

impl Default for EventFlags {
    fn default() -> EventFlags {
        EventFlags::new()
    }
}
