//! The event delivery slot.
//!
//! A single-item handoff from the stack pump to the application.  The slot
//! itself only tracks occupancy; the handled/unhandled gate that keeps the
//! pump from overwriting an unconsumed event lives on the signal bus
//! (`EVT_WAITING`/`EVT_HANDLED`), driven by [`BleHost::wait_event`] and the
//! guard it returns.
//!
//! [`BleHost::wait_event`]: crate::host::BleHost::wait_event

use core::mem;

use std::sync::Mutex;

/// Slot occupancy.
enum Slot<E> {
    Free,
    Occupied(E),
}

/// The one-event delivery slot.
pub(crate) struct EventSlot<E> {
    current: Mutex<Slot<E>>,
}

impl<E> EventSlot<E> {
    pub(crate) fn new() -> EventSlot<E> {
        EventSlot {
            current: Mutex::new(Slot::Free),
        }
    }

    /// Publish a new event.  The stack pump only calls this while it holds
    /// the handled gate, so the slot is free.
    pub(crate) fn publish(&self, event: E) {
        let mut current = self.current.lock().unwrap();
        debug_assert!(
            matches!(*current, Slot::Free),
            "event published over an unconsumed one"
        );
        *current = Slot::Occupied(event);
    }

    /// Take the occupying event, freeing the slot.
    pub(crate) fn take(&self) -> Option<E> {
        match mem::replace(&mut *self.current.lock().unwrap(), Slot::Free) {
            Slot::Occupied(event) => Some(event),
            Slot::Free => None,
        }
    }
}
