//! Shared Flag: view atomic atas satu byte di dalam region shared memory
//!
//! Byte ini adalah seluruh state lock (`0` = unlocked, `1` = locked).
//! Tidak ada holder id, tidak ada generation counter.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Error, Result};
use crate::segment::SharedRegion;

/// Nilai flag saat lock bebas
pub const UNLOCKED: u8 = 0;

/// Nilai flag saat lock dipegang
pub const LOCKED: u8 = 1;

/// View atas satu byte di `region_base + offset`
///
/// Flag tidak memiliki memory-nya. Lifetime `'a` mengikat view ke borrow
/// region, sehingga view tidak bisa hidup lebih lama dari mapping.
#[derive(Clone, Copy)]
pub struct SharedFlag<'a> {
    cell: &'a AtomicU8,
    offset: usize,
}

impl<'a> SharedFlag<'a> {
    /// Membuat view atas byte ke-`offset` dari region
    ///
    /// Gagal dengan [`Error::OffsetOutOfRange`] jika `offset + 1 > region.len()`.
    /// Offset tidak pernah di-clamp.
    pub fn new<R: SharedRegion + ?Sized>(region: &'a R, offset: usize) -> Result<Self> {
        let len = region.len();
        if offset >= len {
            return Err(Error::OffsetOutOfRange { offset, len });
        }

        // SAFETY: offset < len sudah dicek, AtomicU8 punya align 1, dan
        // kontrak SharedRegion menjamin memory valid selama borrow 'a.
        let cell = unsafe { &*(region.as_ptr().add(offset) as *const AtomicU8) };

        Ok(Self { cell, offset })
    }

    /// Inisialisasi byte ke `UNLOCKED`
    ///
    /// Hanya untuk proses yang membuat region, sekali, sebelum ada actor
    /// yang mencoba acquire. Memanggil ini saat lock dipegang akan merusak
    /// mutual exclusion.
    pub fn init<R: SharedRegion + ?Sized>(region: &'a R, offset: usize) -> Result<Self> {
        let flag = Self::new(region, offset)?;
        flag.store(UNLOCKED);
        Ok(flag)
    }

    /// Atomic read dengan Acquire ordering
    #[inline(always)]
    pub fn load(&self) -> u8 {
        self.cell.load(Ordering::Acquire)
    }

    /// Atomic CAS: `expected -> new`
    ///
    /// Returns `true` jika transisi terjadi. Success ordering AcqRel supaya
    /// transisi 0->1 menjadi acquire dan 1->0 menjadi release; failure
    /// ordering Acquire supaya state yang diamati selalu terbaru.
    #[inline(always)]
    pub fn compare_and_swap(&self, expected: u8, new: u8) -> bool {
        self.cell
            .compare_exchange(expected, new, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Unconditional atomic write
    ///
    /// Reserved untuk owner segment. Acquire/release tidak pernah memakainya.
    #[inline(always)]
    pub fn store(&self, value: u8) {
        self.cell.store(value, Ordering::Release);
    }

    /// Offset byte di dalam region
    #[inline(always)]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl fmt::Debug for SharedFlag<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedFlag")
            .field("offset", &self.offset)
            .field("value", &self.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(len: usize) -> Vec<AtomicU8> {
        (0..len).map(|_| AtomicU8::new(0)).collect()
    }

    #[test]
    fn test_offset_bounds() {
        let bytes = region(8);

        assert!(SharedFlag::new(&bytes[..], 0).is_ok());
        assert!(SharedFlag::new(&bytes[..], 7).is_ok());

        match SharedFlag::new(&bytes[..], 8) {
            Err(Error::OffsetOutOfRange { offset, len }) => {
                assert_eq!(offset, 8);
                assert_eq!(len, 8);
            }
            other => panic!("expected OffsetOutOfRange, got {:?}", other),
        }

        let empty: [AtomicU8; 0] = [];
        assert!(matches!(
            SharedFlag::new(&empty, 0),
            Err(Error::OffsetOutOfRange { offset: 0, len: 0 })
        ));
    }

    #[test]
    fn test_view_points_at_offset() {
        let bytes = region(4);
        let flag = SharedFlag::new(&bytes[..], 2).unwrap();

        flag.store(LOCKED);
        assert_eq!(bytes[2].load(Ordering::Acquire), LOCKED);
        assert_eq!(bytes[1].load(Ordering::Acquire), UNLOCKED);
        assert_eq!(bytes[3].load(Ordering::Acquire), UNLOCKED);
        assert_eq!(flag.offset(), 2);
    }

    #[test]
    fn test_compare_and_swap() {
        let bytes = region(1);
        let flag = SharedFlag::new(&bytes[..], 0).unwrap();

        assert!(flag.compare_and_swap(UNLOCKED, LOCKED));
        assert_eq!(flag.load(), LOCKED);

        // Expected salah: gagal dan nilai tidak berubah
        assert!(!flag.compare_and_swap(UNLOCKED, LOCKED));
        assert_eq!(flag.load(), LOCKED);

        assert!(flag.compare_and_swap(LOCKED, UNLOCKED));
        assert_eq!(flag.load(), UNLOCKED);
    }

    #[test]
    fn test_init_resets_to_unlocked() {
        let bytes = region(2);
        bytes[1].store(LOCKED, Ordering::Release);

        let flag = SharedFlag::init(&bytes[..], 1).unwrap();
        assert_eq!(flag.load(), UNLOCKED);
    }

    #[test]
    fn test_views_over_same_byte_agree() {
        let bytes = region(1);
        let a = SharedFlag::new(&bytes[..], 0).unwrap();
        let b = SharedFlag::new(&bytes[..], 0).unwrap();

        assert!(a.compare_and_swap(UNLOCKED, LOCKED));
        assert!(!b.compare_and_swap(UNLOCKED, LOCKED));
        assert_eq!(b.load(), LOCKED);
    }
}
