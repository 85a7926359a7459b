//! The two pump tasks and the signal protocol binding them.
//!
//! Everything rendezvouses on six flags in one [`EventFlags`] group:
//!
//! - `LL_PENDING`: the link layer needs a time-critical step.
//! - `STACK_PENDING`: the stack's internal queue may hold work.
//! - `CMD_WAITING` / `RSP_WAITING`: the command/response rendezvous between
//!   a caller task and the stack pump.
//! - `EVT_WAITING` / `EVT_HANDLED`: the delivery gate between the stack
//!   pump and the application; `EVT_HANDLED` is the application's
//!   acknowledgment and the pump's permission to fetch the next event.
//!
//! The link-layer pump does nothing beyond waiting for its signal and
//! running one step per wakeup.  The stack pump carries the real protocol
//! and is the only context that ever touches the stack's non-reentrant
//! queue and command API.

use std::sync::Mutex;
use std::thread;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::stack::{BleStack, SleepHint};
use crate::sync::{Arc, EventFlags};
use crate::time::{self, Forever, Timeout};

use super::event::EventSlot;
use super::relay::Relay;
use super::{Config, WakeupCallback};

pub(crate) const STACK_PENDING: u32 = 1 << 0;
pub(crate) const LL_PENDING: u32 = 1 << 1;
pub(crate) const CMD_WAITING: u32 = 1 << 2;
pub(crate) const RSP_WAITING: u32 = 1 << 3;
pub(crate) const EVT_WAITING: u32 = 1 << 4;
pub(crate) const EVT_HANDLED: u32 = 1 << 5;

const LL_TASK_NAME: &str = "BLE LL";
const STACK_TASK_NAME: &str = "BLE Stack";

/// The shared context both pumps and every API handle hold a reference to.
///
/// This is the whole mutable state of the core; there are no statics.  The
/// individual pieces need no data lock beyond their own short critical
/// sections because the bus flags make each of them a single-writer,
/// single-reader handoff at any instant.
pub(crate) struct Shared<S: BleStack> {
    pub(crate) stack: S,
    pub(crate) flags: EventFlags,
    /// The stack access lock: serializes caller tasks over the one
    /// pending-command slot.  Carries no data.
    pub(crate) access: Mutex<()>,
    pub(crate) relay: Relay,
    pub(crate) slot: EventSlot<S::Event>,
    pub(crate) wakeup: Mutex<Option<WakeupCallback>>,
    in_isr: Option<fn() -> bool>,
}

impl<S: BleStack> Shared<S> {
    pub(crate) fn new(stack: S, in_isr: Option<fn() -> bool>) -> Shared<S> {
        Shared {
            stack,
            flags: EventFlags::new(),
            access: Mutex::new(()),
            relay: Relay::new(),
            slot: EventSlot::new(),
            wakeup: Mutex::new(None),
            in_isr,
        }
    }

    /// Raise bus flags from whatever context the caller is in, using the
    /// interrupt-safe entry point when the configured probe says we are in
    /// an interrupt handler.
    pub(crate) fn signal(&self, bits: u32) {
        let in_isr = self.in_isr.map(|probe| probe()).unwrap_or(false);
        if in_isr {
            // The reschedule hint is the interrupt epilogue's business on
            // ports that have one; the hosted kernel preempts on its own.
            let _ = self.flags.set_from_isr(bits);
        } else {
            self.flags.set(bits);
        }
    }

    /// Invoke the application wakeup hook, if one is registered.
    fn wake_application(&self) {
        if let Some(callback) = self.wakeup.lock().unwrap().as_ref() {
            callback();
        }
    }
}

/// Create both pump tasks.  The link-layer pump is created first, matching
/// the order the stack expects to come up in.
pub(crate) fn spawn<S: BleStack + 'static>(shared: &Arc<Shared<S>>, config: &Config) -> Result<()> {
    debug!(
        "starting pumps: ll {:?} (prio {:?}), stack {:?} (prio {:?})",
        LL_TASK_NAME, config.ll_priority, STACK_TASK_NAME, config.stack_priority
    );

    let ll = Arc::clone(shared);
    thread::Builder::new()
        .name(LL_TASK_NAME.into())
        .stack_size(config.ll_stack_size)
        .spawn(move || ll_pump(ll))
        .map_err(Error::TaskCreate)?;

    let stack = Arc::clone(shared);
    thread::Builder::new()
        .name(STACK_TASK_NAME.into())
        .stack_size(config.stack_stack_size)
        .spawn(move || stack_pump(stack))
        .map_err(Error::TaskCreate)?;

    Ok(())
}

/// The link-layer pump: one stack link-layer step per consumed signal.
///
/// Must outrank every other context driven by this crate so the step's
/// jitter stays bounded by interrupt latency plus scheduling, not by stack
/// pump workload.
fn ll_pump<S: BleStack>(host: Arc<Shared<S>>) {
    debug!("link-layer pump running");
    loop {
        host.flags.wait(LL_PENDING, true, false, Forever);
        host.stack.pump_link_layer();
    }
}

/// The stack pump: drives the stack's event queue and command execution,
/// then sleeps for whatever budget the stack reports.
///
/// This loop never terminates and has no error exit; everything the stack
/// reports is a scheduling hint.
fn stack_pump<S: BleStack>(host: Arc<Shared<S>>) {
    // Working copy of the signal state.  The stack starts with the delivery
    // slot free and gets one initial poll.
    let mut flags = EVT_HANDLED | STACK_PENDING;

    debug!("stack pump running");
    loop {
        // Command phase.  A caller is parked in the rendezvous with a
        // published command; dispatching before event delivery keeps a busy
        // event stream from starving commands.
        if flags & CMD_WAITING != 0 {
            let dispatched = host.relay.dispatch(&host.stack);
            flags &= !CMD_WAITING;
            if dispatched {
                host.flags.set(RSP_WAITING);
            }
        }

        // Event phase.  Fetch only when the stack may have work *and* the
        // application has acknowledged the previous event.
        if flags & STACK_PENDING != 0 && flags & EVT_HANDLED != 0 {
            if let Some(event) = host.stack.peek_event() {
                host.slot.publish(event);
                host.flags.set(EVT_WAITING);
                flags &= !EVT_HANDLED;
                host.wake_application();
            } else {
                // Queue drained for this round.
                flags &= !STACK_PENDING;
            }
        }

        // Sleep negotiation.
        let timeout: Timeout = match host.stack.sleep_hint() {
            SleepHint::Zero => {
                if flags & EVT_HANDLED != 0 {
                    // Immediate work and a free slot: keep draining without
                    // blocking.
                    flags |= STACK_PENDING;
                    continue;
                }
                // The slot is still unacknowledged; the stack must not be
                // driven further until the application frees it.
                Forever.into()
            }
            SleepHint::Ticks(ticks) => time::stack_ticks_at_least(ticks).into(),
            SleepHint::Infinite => Forever.into(),
        };

        trace!("stack pump blocking, timeout {:?}", timeout);
        let bits = host
            .flags
            .wait(STACK_PENDING | EVT_HANDLED | CMD_WAITING, true, false, timeout);
        if bits != 0 {
            flags |= bits;
        } else {
            // Timed out: a timer inside the stack may have expired without
            // touching the bus.  Re-poll.
            flags |= STACK_PENDING;
        }
    }
}
