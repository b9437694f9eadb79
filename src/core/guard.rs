//! Scoped acquisition: release otomatis di setiap exit path
//!
//! [`SpinGuard`] menjamin `release()` dipanggil tepat sekali saat scope
//! selesai (return normal, early return, atau unwind). Crash proses holder
//! tetap tidak terdeteksi: guard tidak bisa berjalan jika prosesnya mati.

use log::warn;
use std::fmt;
use std::time::{Duration, Instant};

use super::backoff::{BackoffPolicy, PureSpin};
use super::spin_lock::SpinLock;
use crate::error::Result;

/// Handle RAII untuk lock yang sedang dipegang
///
/// Lock di-release saat guard di-drop. Karena `Drop` tidak bisa
/// mengembalikan error, kegagalan release di sana hanya di-log; gunakan
/// [`SpinGuard::unlock`] jika hasil release dibutuhkan.
#[must_use = "lock langsung di-release jika guard tidak disimpan"]
pub struct SpinGuard<'g, B: BackoffPolicy = PureSpin> {
    lock: &'g SpinLock<'g, B>,
}

impl<'g, B: BackoffPolicy> SpinGuard<'g, B> {
    /// Release sekarang dan kembalikan hasilnya
    pub fn unlock(self) -> Result<()> {
        let lock = self.lock;
        std::mem::forget(self);
        lock.release()
    }

    /// Lock yang dipegang guard ini
    #[inline(always)]
    pub fn lock(&self) -> &SpinLock<'g, B> {
        self.lock
    }
}

impl<B: BackoffPolicy> Drop for SpinGuard<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.lock.release() {
            warn!("guard for offset {} dropped: {}", self.lock.offset(), e);
        }
    }
}

impl<B: BackoffPolicy> fmt::Debug for SpinGuard<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinGuard")
            .field("offset", &self.lock.offset())
            .finish()
    }
}

impl<'a, B: BackoffPolicy> SpinLock<'a, B> {
    /// Non-blocking: `Some(guard)` jika lock bebas
    #[inline]
    pub fn try_lock(&self) -> Option<SpinGuard<'_, B>> {
        if self.try_acquire() {
            Some(SpinGuard { lock: self })
        } else {
            None
        }
    }

    /// [`acquire`](SpinLock::acquire) lalu bungkus dalam guard
    #[inline]
    pub fn lock(&self, deadline: Option<Instant>) -> Result<SpinGuard<'_, B>> {
        self.acquire(deadline)?;
        Ok(SpinGuard { lock: self })
    }

    /// Guard dengan deadline `now + timeout`
    pub fn lock_for(&self, timeout: Duration) -> Result<SpinGuard<'_, B>> {
        self.acquire_timeout(timeout)?;
        Ok(SpinGuard { lock: self })
    }

    /// Menjalankan closure di dalam critical section
    ///
    /// # Example
    /// ```
    /// use shmlock::core::SpinLock;
    /// use std::sync::atomic::AtomicU8;
    ///
    /// let region = [AtomicU8::new(0)];
    /// let lock = SpinLock::pure_spin(&region, 0).unwrap();
    /// let value = lock.with_lock(None, || 42).unwrap();
    /// assert_eq!(value, 42);
    /// assert!(!lock.is_locked());
    /// ```
    pub fn with_lock<R>(&self, deadline: Option<Instant>, f: impl FnOnce() -> R) -> Result<R> {
        let _guard = self.lock(deadline)?;
        Ok(f())
    }
}
