//! System package installation for devfetch.
//!
//! Wraps `apt-get` and waits out dpkg/apt lock contention before running it.

mod commands;
mod locks;

pub use commands::AptInstaller;
pub use locks::{
    DEFAULT_LOCK_TIMEOUT, DEFAULT_LOCKS, DEFAULT_POLL_INTERVAL, LockProbe, LockWait, LockWaiter,
    wait_for_locks,
};
