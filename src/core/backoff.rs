//! Backoff Policy: jarak antar retry saat lock sedang dipegang actor lain
//!
//! Policy adalah fungsi murni dari jumlah attempt yang gagal berturut-turut,
//! tanpa state. Satu instance boleh dipakai bersama oleh banyak [`SpinLock`]
//! (lewat `&P`, `Arc<P>`, atau `Box<P>`).
//!
//! Variant yang tersedia:
//! - [`PureSpin`]: selalu nol, latency minimum, CPU 100% selama menunggu
//! - [`ExponentialBackoff`]: sleep 10µs, dobel per attempt, maksimum 10ms,
//!   jitter per pid opsional
//! - [`YieldingBackoff`]: spin, lalu yield, lalu sleep exponential
//!
//! [`SpinLock`]: crate::core::SpinLock

use std::hint::spin_loop;
use std::sync::Arc;
use std::time::Duration;

/// Interval sleep awal untuk [`ExponentialBackoff::default`].
const DEFAULT_INITIAL: Duration = Duration::from_micros(10);

/// Interval sleep maksimum untuk [`ExponentialBackoff::default`].
const DEFAULT_MAX: Duration = Duration::from_millis(10);

/// Batas attempt fase spin untuk [`YieldingBackoff::default`].
const DEFAULT_SPIN_LIMIT: u32 = 16;

/// Batas attempt fase yield untuk [`YieldingBackoff::default`].
const DEFAULT_YIELD_LIMIT: u32 = 64;

/// Shift maksimum agar `1 << shift` tidak overflow.
const MAX_SHIFT: u32 = 31;

/// Strategi backoff untuk loop `acquire`
///
/// `attempt` dimulai dari 1 untuk kegagalan CAS pertama.
pub trait BackoffPolicy {
    /// Durasi tunggu sebelum retry berikutnya. `Duration::ZERO` berarti
    /// retry tanpa sleep, hanya [`relax`](BackoffPolicy::relax).
    fn wait(&self, attempt: u32) -> Duration;

    /// Dipanggil saat [`wait`](BackoffPolicy::wait) mengembalikan nol.
    ///
    /// Default: CPU pause hint.
    #[inline(always)]
    fn relax(&self, _attempt: u32) {
        spin_loop();
    }
}

/// Selalu retry tanpa menunggu
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PureSpin;

impl BackoffPolicy for PureSpin {
    #[inline(always)]
    fn wait(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Sleep exponential dengan batas atas
///
/// Interval attempt ke-n adalah `initial * 2^(n-1)`, di-clamp ke `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    initial: Duration,
    max: Duration,
    pid_jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL, DEFAULT_MAX)
    }
}

impl ExponentialBackoff {
    /// Membuat policy dengan interval awal dan maksimum
    ///
    /// # Panics
    /// Panic jika `initial > max`
    pub const fn new(initial: Duration, max: Duration) -> Self {
        assert!(initial.as_nanos() <= max.as_nanos(), "initial must not exceed max");
        Self {
            initial,
            max,
            pid_jitter: false,
        }
    }

    /// Aktifkan jitter per proses supaya dua contender tidak retry bersamaan.
    ///
    /// Interval dikali `(pid % 4 + 1) / 2`, yaitu 0.5, 1.0, 1.5 atau 2.0.
    /// Dengan jitter, sleep bisa melebihi `max` sampai dua kali lipat.
    pub const fn with_pid_jitter(mut self) -> Self {
        self.pid_jitter = true;
        self
    }

    #[inline]
    pub const fn initial(&self) -> Duration {
        self.initial
    }

    #[inline]
    pub const fn max(&self) -> Duration {
        self.max
    }
}

impl BackoffPolicy for ExponentialBackoff {
    #[inline]
    fn wait(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_SHIFT);
        let interval = self.initial.saturating_mul(1u32 << shift).min(self.max);

        if self.pid_jitter {
            pid_jitter(interval, std::process::id())
        } else {
            interval
        }
    }
}

#[inline]
fn pid_jitter(interval: Duration, pid: u32) -> Duration {
    interval.saturating_mul(pid % 4 + 1) / 2
}

/// Spin dulu, lalu yield, lalu sleep exponential
///
/// - `attempt <= spin_limit`: nol, CPU pause hint
/// - `attempt <= yield_limit`: nol, `thread::yield_now`
/// - selebihnya: sleep mengikuti [`ExponentialBackoff`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YieldingBackoff {
    spin_limit: u32,
    yield_limit: u32,
    sleep: ExponentialBackoff,
}

impl Default for YieldingBackoff {
    fn default() -> Self {
        Self::new(DEFAULT_SPIN_LIMIT, DEFAULT_YIELD_LIMIT, ExponentialBackoff::default())
    }
}

impl YieldingBackoff {
    /// # Panics
    /// Panic jika `spin_limit > yield_limit`
    pub const fn new(spin_limit: u32, yield_limit: u32, sleep: ExponentialBackoff) -> Self {
        assert!(spin_limit <= yield_limit, "spin_limit must not exceed yield_limit");
        Self {
            spin_limit,
            yield_limit,
            sleep,
        }
    }

    #[inline]
    pub const fn spin_limit(&self) -> u32 {
        self.spin_limit
    }

    #[inline]
    pub const fn yield_limit(&self) -> u32 {
        self.yield_limit
    }
}

impl BackoffPolicy for YieldingBackoff {
    #[inline]
    fn wait(&self, attempt: u32) -> Duration {
        if attempt <= self.yield_limit {
            Duration::ZERO
        } else {
            self.sleep.wait(attempt - self.yield_limit)
        }
    }

    #[inline]
    fn relax(&self, attempt: u32) {
        if attempt <= self.spin_limit {
            spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

/// Policy dari closure `Fn(attempt) -> Duration`
///
/// ```
/// use shmlock::core::{BackoffPolicy, FnBackoff};
/// use std::time::Duration;
///
/// let linear = FnBackoff(|attempt: u32| Duration::from_micros(attempt as u64));
/// assert_eq!(linear.wait(3), Duration::from_micros(3));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct FnBackoff<F>(pub F);

impl<F: Fn(u32) -> Duration> BackoffPolicy for FnBackoff<F> {
    #[inline]
    fn wait(&self, attempt: u32) -> Duration {
        (self.0)(attempt)
    }
}

impl<P: BackoffPolicy + ?Sized> BackoffPolicy for &P {
    #[inline(always)]
    fn wait(&self, attempt: u32) -> Duration {
        (**self).wait(attempt)
    }

    #[inline(always)]
    fn relax(&self, attempt: u32) {
        (**self).relax(attempt)
    }
}

impl<P: BackoffPolicy + ?Sized> BackoffPolicy for Box<P> {
    #[inline(always)]
    fn wait(&self, attempt: u32) -> Duration {
        (**self).wait(attempt)
    }

    #[inline(always)]
    fn relax(&self, attempt: u32) {
        (**self).relax(attempt)
    }
}

impl<P: BackoffPolicy + ?Sized> BackoffPolicy for Arc<P> {
    #[inline(always)]
    fn wait(&self, attempt: u32) -> Duration {
        (**self).wait(attempt)
    }

    #[inline(always)]
    fn relax(&self, attempt: u32) {
        (**self).relax(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pure_spin_never_waits() {
        for attempt in [1, 2, 100, u32::MAX] {
            assert_eq!(PureSpin.wait(attempt), Duration::ZERO);
        }
    }

    /// Interval dobel per attempt sampai mencapai max
    #[test]
    fn test_exponential_growth_and_cap() {
        let b = ExponentialBackoff::default();

        assert_eq!(b.wait(1), Duration::from_micros(10));
        assert_eq!(b.wait(2), Duration::from_micros(20));
        assert_eq!(b.wait(3), Duration::from_micros(40));

        let mut prev = Duration::ZERO;
        for attempt in 1..64 {
            let curr = b.wait(attempt);
            assert!(curr >= prev, "Backoff did not grow");
            assert!(curr <= b.max(), "Backoff exceeded max");
            prev = curr;
        }
        assert_eq!(b.wait(u32::MAX), Duration::from_millis(10));
    }

    #[test]
    fn test_exponential_is_stateless() {
        let b = ExponentialBackoff::new(Duration::from_micros(1), Duration::from_millis(1));
        let first = b.wait(5);
        let _ = b.wait(20);
        assert_eq!(b.wait(5), first);
    }

    #[test]
    fn test_pid_jitter() {
        let base = Duration::from_micros(10);
        assert_eq!(pid_jitter(base, 4), Duration::from_micros(5));
        assert_eq!(pid_jitter(base, 5), Duration::from_micros(10));
        assert_eq!(pid_jitter(base, 6), Duration::from_micros(15));
        assert_eq!(pid_jitter(base, 7), Duration::from_micros(20));

        let b = ExponentialBackoff::default().with_pid_jitter();
        assert_eq!(b.wait(1), pid_jitter(base, std::process::id()));
        assert_eq!(ExponentialBackoff::default().wait(1), base);
    }

    #[test]
    #[should_panic]
    fn test_exponential_rejects_inverted_bounds() {
        let _ = ExponentialBackoff::new(Duration::from_millis(2), Duration::from_millis(1));
    }

    #[test]
    fn test_yielding_phases() {
        let sleep = ExponentialBackoff::new(Duration::from_micros(50), Duration::from_millis(1));
        let b = YieldingBackoff::new(2, 4, sleep);

        // Fase spin dan yield tidak pernah sleep
        for attempt in 1..=4 {
            assert_eq!(b.wait(attempt), Duration::ZERO);
            b.relax(attempt);
        }

        // Fase sleep mulai dari interval awal
        assert_eq!(b.wait(5), Duration::from_micros(50));
        assert_eq!(b.wait(6), Duration::from_micros(100));
        assert_eq!(b.wait(1000), Duration::from_millis(1));
    }

    #[test]
    fn test_shared_policies() {
        let shared = Arc::new(YieldingBackoff::default());
        let boxed: Box<dyn BackoffPolicy + Send + Sync> = Box::new(ExponentialBackoff::default());
        let by_ref = &PureSpin;

        assert_eq!(shared.wait(1), Duration::ZERO);
        assert_eq!(boxed.wait(1), Duration::from_micros(10));
        assert_eq!(by_ref.wait(7), Duration::ZERO);
    }

    #[test]
    fn test_fn_backoff() {
        let fixed = FnBackoff(|_: u32| Duration::from_micros(3));
        assert_eq!(fixed.wait(1), Duration::from_micros(3));
        assert_eq!(fixed.wait(99), Duration::from_micros(3));
    }
}
