//! Core module: Spin Lock satu byte di dalam shared memory
//!
//! Prinsip desain:
//! - One-Byte State: `0` unlocked, `1` locked, tidak ada metadata lain
//! - CAS-Only: transisi lock hanya lewat compare-and-swap, tanpa store
//! - No-Syscall Fast Path: uncontended acquire/release = satu CAS

mod backoff;
mod guard;
mod shared_flag;
mod spin_lock;

pub use backoff::{BackoffPolicy, ExponentialBackoff, FnBackoff, PureSpin, YieldingBackoff};
pub use guard::SpinGuard;
pub use shared_flag::{SharedFlag, LOCKED, UNLOCKED};
pub use spin_lock::SpinLock;
