//! Spin Lock antar proses di atas satu byte shared memory
//!
//! Protokol:
//! - Acquire: CAS `0 -> 1`, satu-satunya transisi yang mengunci
//! - Release: CAS `1 -> 0`, satu-satunya transisi yang membuka
//! - Tidak ada holder id: proses yang mati saat memegang lock meninggalkan
//!   flag di `1` selamanya. Tidak ada lease, heartbeat, atau watchdog.
//!
//! Fast path (uncontended) hanya satu CAS, tanpa syscall dan tanpa baca clock.

use log::{debug, warn};
use std::fmt;
use std::time::{Duration, Instant};

use super::backoff::{BackoffPolicy, PureSpin};
use super::shared_flag::{SharedFlag, LOCKED, UNLOCKED};
use crate::error::{Error, Result};
use crate::segment::SharedRegion;

/// Mutual exclusion antar proses lewat satu byte di region shared memory
///
/// Instance tidak punya state selain view flag dan policy, jadi banyak
/// instance independen (di thread atau proses berbeda) boleh dibuat atas
/// byte yang sama. Lock ini tidak reentrant.
pub struct SpinLock<'a, B = PureSpin> {
    flag: SharedFlag<'a>,
    backoff: B,
}

impl<'a> SpinLock<'a, PureSpin> {
    /// Lock dengan [`PureSpin`], untuk critical section yang sangat pendek
    pub fn pure_spin<R: SharedRegion + ?Sized>(region: &'a R, offset: usize) -> Result<Self> {
        Self::new(region, offset, PureSpin)
    }
}

impl<'a, B: BackoffPolicy> SpinLock<'a, B> {
    /// Membuat lock atas byte `region[offset]`
    ///
    /// Byte tersebut harus sudah di-inisialisasi `0` oleh pembuat region.
    /// Gagal dengan [`Error::OffsetOutOfRange`] jika offset di luar region.
    pub fn new<R: SharedRegion + ?Sized>(region: &'a R, offset: usize, backoff: B) -> Result<Self> {
        let flag = SharedFlag::new(region, offset)?;
        Ok(Self::from_flag(flag, backoff))
    }

    /// Membuat lock dari flag yang sudah divalidasi
    #[inline]
    pub fn from_flag(flag: SharedFlag<'a>, backoff: B) -> Self {
        Self { flag, backoff }
    }

    /// Satu kali CAS `0 -> 1`, tidak pernah blocking
    ///
    /// Returns `true` jika caller sekarang memegang lock.
    #[inline(always)]
    pub fn try_acquire(&self) -> bool {
        self.flag.compare_and_swap(UNLOCKED, LOCKED)
    }

    /// Retry [`try_acquire`](Self::try_acquire) sampai berhasil atau deadline lewat
    ///
    /// Antar retry, thread menunggu sesuai `backoff.wait(attempt)`; sleep
    /// dipotong supaya tidak melewati deadline. `None` berarti tunggu
    /// selamanya. Timeout tidak pernah mengubah flag.
    #[inline]
    pub fn acquire(&self, deadline: Option<Instant>) -> Result<()> {
        if self.try_acquire() {
            return Ok(());
        }
        self.acquire_contended(deadline)
    }

    /// Seperti [`acquire`](Self::acquire) dengan deadline `now + timeout`
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<()> {
        self.acquire(Instant::now().checked_add(timeout))
    }

    #[cold]
    fn acquire_contended(&self, deadline: Option<Instant>) -> Result<()> {
        let start = Instant::now();
        // Jumlah CAS yang gagal sejauh ini
        let mut attempt: u32 = 0;

        loop {
            attempt = attempt.saturating_add(1);

            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    let waited = now.duration_since(start);
                    warn!(
                        "lock at offset {} not acquired: timeout after {} attempts ({:?})",
                        self.flag.offset(),
                        attempt,
                        waited
                    );
                    return Err(Error::AcquireTimeout {
                        waited,
                        attempts: attempt,
                    });
                }
            }

            let pause = self.backoff.wait(attempt);
            if pause.is_zero() {
                self.backoff.relax(attempt);
            } else {
                let pause = match deadline {
                    Some(deadline) => pause.min(deadline.saturating_duration_since(Instant::now())),
                    None => pause,
                };
                std::thread::sleep(pause);
            }

            if self.try_acquire() {
                debug!(
                    "lock at offset {} acquired after {} failed attempts ({:?})",
                    self.flag.offset(),
                    attempt,
                    start.elapsed()
                );
                return Ok(());
            }
        }
    }

    /// CAS `1 -> 0`
    ///
    /// Gagal dengan [`Error::ReleaseNotHeld`] jika flag sudah `0`. Identitas
    /// caller tidak dicek: release oleh actor yang bukan holder adalah
    /// pelanggaran kontrak caller, bukan error yang terdeteksi.
    #[inline]
    pub fn release(&self) -> Result<()> {
        if self.flag.compare_and_swap(LOCKED, UNLOCKED) {
            Ok(())
        } else {
            warn!("release on unheld lock at offset {}", self.flag.offset());
            Err(Error::ReleaseNotHeld)
        }
    }

    /// Diagnostik saja: hasilnya sudah basi begitu method return
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        self.flag.load() != UNLOCKED
    }

    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.flag.offset()
    }

    #[inline(always)]
    pub fn flag(&self) -> &SharedFlag<'a> {
        &self.flag
    }

    #[inline(always)]
    pub fn backoff(&self) -> &B {
        &self.backoff
    }
}

impl<B> fmt::Debug for SpinLock<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpinLock").field("flag", &self.flag).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backoff::{ExponentialBackoff, YieldingBackoff};
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
    use std::thread;

    fn region(len: usize) -> Vec<AtomicU8> {
        (0..len).map(|_| AtomicU8::new(0)).collect()
    }

    #[test]
    fn test_round_trip_cycle() {
        let bytes = region(1);
        let lock = SpinLock::pure_spin(&bytes[..], 0).unwrap();

        assert!(lock.try_acquire());
        assert!(!lock.try_acquire());
        assert!(lock.is_locked());
        lock.release().unwrap();
        assert!(!lock.is_locked());
        assert!(lock.try_acquire());
    }

    #[test]
    fn test_release_not_held() {
        let bytes = region(1);
        let lock = SpinLock::pure_spin(&bytes[..], 0).unwrap();

        assert!(matches!(lock.release(), Err(Error::ReleaseNotHeld)));
        assert_eq!(bytes[0].load(Ordering::Acquire), UNLOCKED);

        lock.acquire(None).unwrap();
        lock.release().unwrap();
        assert!(lock.release().unwrap_err().is_not_held());
        assert_eq!(bytes[0].load(Ordering::Acquire), UNLOCKED);
    }

    #[test]
    fn test_offset_out_of_range() {
        let bytes = region(4);
        let result = SpinLock::new(&bytes[..], 4, PureSpin);
        assert!(matches!(result, Err(Error::OffsetOutOfRange { offset: 4, len: 4 })));
    }

    #[test]
    fn test_locks_at_different_offsets_are_independent() {
        let bytes = region(2);
        let a = SpinLock::pure_spin(&bytes[..], 0).unwrap();
        let b = SpinLock::pure_spin(&bytes[..], 1).unwrap();

        assert!(a.try_acquire());
        assert!(b.try_acquire());
        a.release().unwrap();
        assert!(b.is_locked());
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), 1);
    }

    #[test]
    fn test_timeout_leaves_flag_untouched() {
        let bytes = region(1);
        let holder = SpinLock::pure_spin(&bytes[..], 0).unwrap();
        let waiter = SpinLock::new(&bytes[..], 0, ExponentialBackoff::default()).unwrap();

        assert!(holder.try_acquire());

        let timeout = Duration::from_millis(20);
        let start = Instant::now();
        let err = waiter.acquire_timeout(timeout).unwrap_err();
        let elapsed = start.elapsed();

        match err {
            Error::AcquireTimeout { waited, attempts } => {
                assert!(attempts >= 1);
                assert!(waited <= elapsed);
            }
            other => panic!("expected AcquireTimeout, got {:?}", other),
        }
        assert!(elapsed >= timeout);
        assert_eq!(bytes[0].load(Ordering::Acquire), LOCKED);

        // Holder masih bisa release seperti biasa
        holder.release().unwrap();
        waiter.acquire_timeout(timeout).unwrap();
    }

    #[test]
    fn test_expired_deadline_still_takes_free_lock() {
        let bytes = region(1);
        let lock = SpinLock::pure_spin(&bytes[..], 0).unwrap();

        assert!(lock.acquire(Some(Instant::now())).is_ok());
        assert!(lock.acquire(Some(Instant::now())).unwrap_err().is_timeout());
    }

    #[test]
    fn test_acquire_waits_for_release() {
        let bytes = region(1);
        let lock = SpinLock::new(&bytes[..], 0, YieldingBackoff::default()).unwrap();
        assert!(lock.try_acquire());

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                let lock = SpinLock::new(&bytes[..], 0, YieldingBackoff::default()).unwrap();
                lock.acquire(None).unwrap();
                lock.release().unwrap();
            });

            thread::sleep(Duration::from_millis(10));
            lock.release().unwrap();
            waiter.join().unwrap();
        });

        assert_eq!(bytes[0].load(Ordering::Acquire), UNLOCKED);
    }

    /// Hanya satu thread boleh berada di critical section pada satu waktu
    #[test]
    fn test_mutual_exclusion_threads() {
        const THREADS: usize = 8;
        const ITERATIONS: usize = 2_000;

        let bytes = region(1);
        let inside = AtomicUsize::new(0);
        let max_inside = AtomicUsize::new(0);
        let total = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..THREADS {
                s.spawn(|| {
                    let lock = SpinLock::new(&bytes[..], 0, YieldingBackoff::default()).unwrap();
                    for _ in 0..ITERATIONS {
                        lock.acquire(None).unwrap();
                        let now = inside.fetch_add(1, Ordering::Relaxed) + 1;
                        max_inside.fetch_max(now, Ordering::Relaxed);
                        // Non-atomic style read-modify-write, dilindungi lock
                        let v = total.load(Ordering::Relaxed);
                        total.store(v + 1, Ordering::Relaxed);
                        inside.fetch_sub(1, Ordering::Relaxed);
                        lock.release().unwrap();
                    }
                });
            }
        });

        assert_eq!(max_inside.load(Ordering::Relaxed), 1);
        assert_eq!(total.load(Ordering::Relaxed), THREADS * ITERATIONS);
        assert_eq!(bytes[0].load(Ordering::Acquire), UNLOCKED);
    }

    #[test]
    fn test_try_acquire_race_single_winner() {
        let bytes = region(1);
        let winners = AtomicUsize::new(0);

        thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| {
                    let lock = SpinLock::pure_spin(&bytes[..], 0).unwrap();
                    if lock.try_acquire() {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(winners.load(Ordering::Relaxed), 1);
        assert_eq!(bytes[0].load(Ordering::Acquire), LOCKED);
    }

    #[test]
    fn test_is_locked_treats_garbage_as_locked() {
        let bytes = region(1);
        bytes[0].store(7, Ordering::Release);
        let lock = SpinLock::pure_spin(&bytes[..], 0).unwrap();

        assert!(lock.is_locked());
        assert!(!lock.try_acquire());
        assert!(lock.release().is_err());
        assert_eq!(bytes[0].load(Ordering::Acquire), 7);
    }
}
