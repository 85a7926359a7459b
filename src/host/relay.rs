//! The command relay.
//!
//! Hands one BGAPI command at a time from an arbitrary caller task to the
//! stack pump, which is the only context allowed to enter the stack's
//! command interface.  The relay itself is just the pending-command slot;
//! the caller publishes into it and then parks in the command/response
//! rendezvous on the signal bus (see [`StackAccess::submit`]), and the stack
//! pump drains it in the command phase of its loop.
//!
//! The payload is *borrowed* from the caller, not copied.  That is safe
//! precisely because of the rendezvous: the caller cannot leave `submit`
//! (and so cannot invalidate the payload) until the pump has finished the
//! synchronous dispatch and raised the response signal.
//!
//! [`StackAccess::submit`]: crate::host::StackAccess::submit

use core::slice;

use std::sync::Mutex;

use crate::stack::{BleStack, CommandHeader, ResponseHandler};

/// One published command: header, optional response handler, and the
/// caller's payload as raw parts.
struct PendingCommand {
    header: CommandHeader,
    handler: Option<ResponseHandler>,
    payload: *const u8,
    len: usize,
}

// SAFETY: the raw payload pointer crosses from the publishing task to the
// stack pump, but the publisher stays blocked in the command/response
// rendezvous for the whole crossing, so the pointee outlives every access.
unsafe impl Send for PendingCommand {}

/// The single pending-command slot.
///
/// At most one command exists at a time; the stack access lock serializes
/// publishers, so the slot is a single-writer/single-reader handoff and the
/// inner mutex only guards against torn publication.
pub(crate) struct Relay {
    pending: Mutex<Option<PendingCommand>>,
}

impl Relay {
    pub(crate) fn new() -> Relay {
        Relay {
            pending: Mutex::new(None),
        }
    }

    /// Publish a command for the stack pump.
    ///
    /// The caller must hold the stack access lock and must enter the
    /// command/response rendezvous before touching `payload` again.
    pub(crate) fn publish(
        &self,
        header: CommandHeader,
        handler: Option<ResponseHandler>,
        payload: &[u8],
    ) {
        let mut pending = self.pending.lock().unwrap();
        debug_assert!(pending.is_none(), "command published over a pending one");
        *pending = Some(PendingCommand {
            header,
            handler,
            payload: payload.as_ptr(),
            len: payload.len(),
        });
    }

    /// Dispatch the pending command through the stack, consuming it (the
    /// handler reference included).
    ///
    /// Returns whether a command was actually dispatched, and therefore
    /// whether a parked caller is owed the response signal.  Runs on the
    /// stack pump only.
    pub(crate) fn dispatch<S: BleStack>(&self, stack: &S) -> bool {
        let taken = self.pending.lock().unwrap().take();
        match taken {
            Some(cmd) => {
                // SAFETY: the publisher is parked in the rendezvous until we
                // return and the response signal is raised after that, so
                // the payload it lent is still alive.
                let payload = unsafe { slice::from_raw_parts(cmd.payload, cmd.len) };
                stack.dispatch_command(cmd.header, cmd.handler, payload);
                true
            }
            None => false,
        }
    }
}
