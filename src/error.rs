//! Error types untuk shmlock.
//!
//! Semua operasi yang bisa gagal mengembalikan `Result<T>` dengan variant
//! spesifik. Tidak ada kondisi error yang dipakai sebagai control flow biasa.

use std::time::Duration;
use thiserror::Error;

/// Result type alias menggunakan [`Error`] milik shmlock.
pub type Result<T> = std::result::Result<T, Error>;

/// Error utama untuk operasi lock dan region.
#[derive(Error, Debug)]
pub enum Error {
    /// Offset flag berada di luar region (`offset + 1 > len`).
    #[error("offset {offset} out of range for region of {len} bytes")]
    OffsetOutOfRange { offset: usize, len: usize },

    /// `acquire` melewati deadline tanpa CAS yang berhasil.
    ///
    /// Flag tidak diubah oleh timeout. Caller yang memutuskan retry atau abort.
    #[error("lock not acquired after {attempts} attempts ({waited:?})")]
    AcquireTimeout { waited: Duration, attempts: u32 },

    /// `release` melihat flag sudah `0` (double release atau release tanpa acquire).
    #[error("release called on a lock that is not held")]
    ReleaseNotHeld,

    /// Region shared memory tidak bisa dibuka, di-resize, atau di-map.
    #[error("shared memory unavailable: {0}")]
    SharedMemoryUnavailable(#[from] std::io::Error),

    /// Konfigurasi binary tidak valid.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True untuk [`Error::AcquireTimeout`], satu-satunya error yang layak di-retry.
    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::AcquireTimeout { .. })
    }

    /// True untuk [`Error::ReleaseNotHeld`].
    #[inline]
    pub fn is_not_held(&self) -> bool {
        matches!(self, Error::ReleaseNotHeld)
    }
}
