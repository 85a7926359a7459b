// Copyright (c) 2025 Linaro LTD
// SPDX-License-Identifier: Apache-2.0

//! The application-facing surface of the synchronization core.
//!
//! [`BleHost::start`] brings up the two pump tasks around a [`BleStack`] and
//! returns a cheaply cloneable handle.  Everything the application does goes
//! through that handle:
//!
//! - signal the pumps from task or interrupt context
//!   ([`notify_link_layer`], [`notify_stack_update`]);
//! - submit commands under the stack access lock
//!   ([`acquire`], then [`StackAccess::submit`]);
//! - consume events one at a time ([`wait_event`], with the returned
//!   [`EventGuard`] acknowledging the event when dropped);
//! - register a wakeup hook invoked on each new event
//!   ([`set_wakeup_callback`]).
//!
//! A stack can be started at most once: `start` takes it by value, so the
//! single-initialization contract is enforced by the move rather than
//! documented as a caller error.  Independent stacks get independent,
//! coexisting hosts.
//!
//! [`notify_link_layer`]: BleHost::notify_link_layer
//! [`notify_stack_update`]: BleHost::notify_stack_update
//! [`acquire`]: BleHost::acquire
//! [`wait_event`]: BleHost::wait_event
//! [`set_wakeup_callback`]: BleHost::set_wakeup_callback

use core::fmt;
use core::mem::ManuallyDrop;
use core::ops::Deref;

use std::sync::MutexGuard;

use crate::error::{Error, Result};
use crate::stack::{BleStack, CommandHeader, ResponseHandler};
use crate::sync::Arc;
use crate::time::{Forever, Timeout};

mod event;
mod pump;
mod relay;

use self::pump::{
    Shared, CMD_WAITING, EVT_HANDLED, EVT_WAITING, LL_PENDING, RSP_WAITING, STACK_PENDING,
};

/// A scheduling priority for a pump task.  Numerically greater values denote
/// more urgent contexts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Priority(pub u8);

/// Default stack size for the link-layer pump task, in bytes.
///
/// Hosted kernels need far more than the ~1 KiB an MCU port gives this task.
pub const DEFAULT_LL_STACK_SIZE: usize = 64 * 1024;

/// Default stack size for the stack pump task, in bytes.
pub const DEFAULT_STACK_STACK_SIZE: usize = 128 * 1024;

/// The application wakeup hook.
///
/// Invoked synchronously from the stack pump each time a new event is
/// published, typically to unblock an application task (give a semaphore,
/// send on a channel).  Part of its contract: it runs on the pump's context,
/// **must not block**, and must not replace the hook from within itself.
pub type WakeupCallback = Box<dyn Fn() + Send + Sync>;

/// Startup configuration for the pump tasks.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Priority of the link-layer pump.  Must strictly exceed
    /// `stack_priority`; [`BleHost::start`] rejects configurations that do
    /// not, since an outranked link-layer pump cannot bound link-layer
    /// jitter.
    pub ll_priority: Priority,
    /// Priority of the stack pump.
    pub stack_priority: Priority,
    /// Stack size of the link-layer pump task, in bytes.
    pub ll_stack_size: usize,
    /// Stack size of the stack pump task, in bytes.
    pub stack_stack_size: usize,
    /// Probe reporting whether the current context is an interrupt handler.
    ///
    /// Consulted by the notify entry points to pick the interrupt-safe bus
    /// operation.  `None` means no context this crate sees is ever an
    /// interrupt handler, which is the case on hosted kernels.
    pub in_isr: Option<fn() -> bool>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            ll_priority: Priority(6),
            stack_priority: Priority(5),
            ll_stack_size: DEFAULT_LL_STACK_SIZE,
            stack_stack_size: DEFAULT_STACK_STACK_SIZE,
            in_isr: None,
        }
    }
}

/// A handle to a running synchronization core.
///
/// Clones share the same core; the handle is `Send + Sync` and every method
/// is callable from any task context.  The pump tasks run for the life of
/// the process.
pub struct BleHost<S: BleStack> {
    shared: Arc<Shared<S>>,
}

impl<S: BleStack> Clone for BleHost<S> {
    fn clone(&self) -> BleHost<S> {
        BleHost {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: BleStack> fmt::Debug for BleHost<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BleHost")
    }
}

impl<S: BleStack + 'static> BleHost<S> {
    /// Start the core: create the signal bus and the stack access lock, run
    /// `init` on the calling context, then create both pump tasks.
    ///
    /// `init` is the place for one-time stack configuration; it runs before
    /// either pump exists, so it may use the stack freely.
    ///
    /// Fails only on startup resource exhaustion ([`Error::TaskCreate`]) or
    /// a priority ordering the core cannot honor
    /// ([`Error::PriorityInversion`]); a failure aborts initialization
    /// rather than leaving a partially constructed core in use.
    pub fn start<F>(stack: S, config: Config, init: F) -> Result<BleHost<S>>
    where
        F: FnOnce(&S),
    {
        if config.ll_priority <= config.stack_priority {
            return Err(Error::PriorityInversion);
        }

        let shared = Arc::new(Shared::new(stack, config.in_isr));
        init(&shared.stack);
        pump::spawn(&shared, &config)?;

        Ok(BleHost { shared })
    }
}

impl<S: BleStack> BleHost<S> {
    /// Signal that the link layer needs a time-critical step.
    ///
    /// Callable from task or interrupt context (see [`Config::in_isr`]).
    /// Signals coalesce: several notifications before the pump runs produce
    /// a single step.
    pub fn notify_link_layer(&self) {
        self.shared.signal(LL_PENDING);
    }

    /// Signal that the stack's internal queue may have new work.
    ///
    /// Callable from task or interrupt context.
    pub fn notify_stack_update(&self) {
        self.shared.signal(STACK_PENDING);
    }

    /// Register the wakeup hook invoked on each new event publication.
    ///
    /// See [`WakeupCallback`] for the contract.  Replaces any previously
    /// registered hook.
    pub fn set_wakeup_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.shared.wakeup.lock().unwrap() = Some(Box::new(callback));
    }

    /// Remove the wakeup hook.
    pub fn clear_wakeup_callback(&self) {
        *self.shared.wakeup.lock().unwrap() = None;
    }

    /// Acquire exclusive access to the stack's command interface.
    ///
    /// Blocks until every other caller has finished; there is no try
    /// variant.  Commands are submitted through the returned guard, which
    /// releases the access lock when dropped.  Callers are served strictly
    /// one at a time, so command order is lock acquisition order.
    pub fn acquire(&self) -> StackAccess<'_, S> {
        StackAccess {
            shared: &self.shared,
            _guard: self.shared.access.lock().unwrap(),
        }
    }

    /// Wait for the next stack event.
    ///
    /// Returns `None` if no event was published within the timeout.  The
    /// returned guard gives access to the event; dropping it acknowledges
    /// the event and permits the stack pump to fetch the next one.  Holding
    /// the guard is the application-side back-pressure: the pump will not
    /// advance, and no event is ever overwritten unconsumed.
    pub fn wait_event<T>(&self, timeout: T) -> Option<EventGuard<'_, S>>
    where
        T: Into<Timeout>,
    {
        if self.shared.flags.wait(EVT_WAITING, true, false, timeout) == 0 {
            return None;
        }
        let event = self.shared.slot.take()?;
        Some(EventGuard {
            shared: &self.shared,
            event: ManuallyDrop::new(event),
        })
    }
}

/// Exclusive access to the stack's command interface.
///
/// Returned by [`BleHost::acquire`]; holding it serializes this caller
/// against all others.  The access lock is not reentrant: a second
/// `acquire` from the same task deadlocks, as on any kernel mutex without
/// ownership tracking.
pub struct StackAccess<'a, S: BleStack> {
    shared: &'a Shared<S>,
    _guard: MutexGuard<'a, ()>,
}

impl<S: BleStack> StackAccess<'_, S> {
    /// Submit one BGAPI command and block until the stack pump has
    /// dispatched it.
    ///
    /// The payload is borrowed for the duration of the call; because this
    /// call does not return until the dispatch has completed, the stack
    /// never observes a dangling payload and no copy is made.  There is no
    /// cancellation: a partially executed command is not a supported state.
    pub fn submit(&self, header: CommandHeader, handler: Option<ResponseHandler>, payload: &[u8]) {
        self.shared.relay.publish(header, handler, payload);
        self.shared.flags.sync(CMD_WAITING, RSP_WAITING, Forever);
    }

    /// Submit a command whose response the caller does not care about.
    pub fn submit_without_response(&self, header: CommandHeader, payload: &[u8]) {
        self.submit(header, None, payload);
    }
}

/// One delivered stack event, alive until acknowledged.
///
/// Dereferences to the event; dropping the guard signals the handled gate,
/// allowing the stack pump to fetch the next event.
pub struct EventGuard<'a, S: BleStack> {
    shared: &'a Shared<S>,
    event: ManuallyDrop<S::Event>,
}

impl<S: BleStack> Deref for EventGuard<'_, S> {
    type Target = S::Event;

    fn deref(&self) -> &S::Event {
        &self.event
    }
}

impl<S: BleStack> Drop for EventGuard<'_, S> {
    fn drop(&mut self) {
        // SAFETY: the handle is dropped exactly once, here, and not touched
        // afterwards.
        unsafe { ManuallyDrop::drop(&mut self.event) };
        // Only after the handle is gone may the pump advance the queue.
        self.shared.flags.set(EVT_HANDLED);
    }
}
