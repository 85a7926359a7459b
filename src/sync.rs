//! Synchronization primitives.
//!
//! These are modeled after the synchronization primitives in
//! [`std::sync`](https://doc.rust-lang.org/stable/std/sync/index.html), in as
//! much as it makes sense for a crate whose other half targets small
//! preemptive kernels.

pub mod atomic {
    //! Re-export portable atomic.
    //!
    //! Although `core` contains a
    //! [`sync::atomic`](https://doc.rust-lang.org/stable/core/sync/atomic/index.html)
    //! module, these are dependent on the target having atomic instructions,
    //! and the types are missing when the platform cannot support them.  In
    //! the Rust-embedded world, this is handled through the
    //! [`portable-atomic`](https://crates.io/crates/portable-atomic) crate,
    //! which will either just re-export the types from core, or provide an
    //! implementation using spinlocks when those aren't available.

    pub use portable_atomic::*;
}

pub use portable_atomic_util::Arc;

mod event_flags;

pub use event_flags::EventFlags;
