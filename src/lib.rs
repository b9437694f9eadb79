//! shmlock - Spin Lock Antar Proses di Shared Memory
//!
//! Arsitektur:
//! - Core: flag satu byte + CAS + backoff, tanpa kernel object
//! - Segment: region mmap (`/dev/shm`) yang dibuat oleh collaborator
//! - Config: konfigurasi untuk binary demo dan probe
//!
//! # Example
//! ```
//! use shmlock::core::{SpinLock, YieldingBackoff};
//! use std::sync::atomic::AtomicU8;
//! use std::time::Duration;
//!
//! let region = [AtomicU8::new(0), AtomicU8::new(0)];
//! let lock = SpinLock::new(&region, 1, YieldingBackoff::default()).unwrap();
//!
//! {
//!     let _guard = lock.lock_for(Duration::from_millis(10)).unwrap();
//!     assert!(lock.is_locked());
//! }
//! assert!(!lock.is_locked());
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod segment;

pub use crate::core::{BackoffPolicy, SpinGuard, SpinLock};
pub use crate::error::{Error, Result};
pub use crate::segment::{SharedRegion, ShmRegion};
