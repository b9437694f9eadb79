//! Segment module: region shared memory tempat flag lock berada
//!
//! Core lock tidak pernah membuat atau menghapus region. Module ini hanya
//! mendefinisikan kontrak [`SharedRegion`] yang harus dipenuhi collaborator,
//! plus [`ShmRegion`] sebagai implementasi berbasis file mmap (`/dev/shm`).

mod shm_region;

pub use shm_region::{default_dir, named_path, unlink, ShmRegion};

use memmap2::MmapRaw;
use std::sync::atomic::AtomicU8;

/// Region memory yang bisa dilihat oleh banyak proses sekaligus.
///
/// # Safety
/// Implementor menjamin bahwa `len()` bytes mulai dari `as_ptr()` tetap
/// ter-map dan valid selama `&self` masih dipinjam, dan bahwa byte di dalamnya
/// hanya dimutasi lewat operasi atomic (oleh proses mana pun).
pub unsafe trait SharedRegion {
    /// Alamat awal region.
    fn as_ptr(&self) -> *const u8;

    /// Panjang region dalam bytes.
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// SAFETY: MmapRaw tidak pernah membuat reference ke isi mapping, dan mapping
// tetap hidup sampai MmapRaw di-drop.
unsafe impl SharedRegion for MmapRaw {
    #[inline]
    fn as_ptr(&self) -> *const u8 {
        MmapRaw::as_ptr(self)
    }

    #[inline]
    fn len(&self) -> usize {
        MmapRaw::len(self)
    }
}

// SAFETY: AtomicU8 punya layout yang sama dengan u8 dan hanya bisa diakses secara atomic.
unsafe impl SharedRegion for [AtomicU8] {
    #[inline]
    fn as_ptr(&self) -> *const u8 {
        <[AtomicU8]>::as_ptr(self) as *const u8
    }

    #[inline]
    fn len(&self) -> usize {
        <[AtomicU8]>::len(self)
    }
}

// SAFETY: sama dengan slice di atas.
unsafe impl<const N: usize> SharedRegion for [AtomicU8; N] {
    #[inline]
    fn as_ptr(&self) -> *const u8 {
        self.as_slice().as_ptr() as *const u8
    }

    #[inline]
    fn len(&self) -> usize {
        N
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_slice_region() {
        let bytes: Vec<AtomicU8> = (0..16).map(|_| AtomicU8::new(0)).collect();
        let region: &[AtomicU8] = &bytes;

        assert_eq!(SharedRegion::len(region), 16);
        assert!(!SharedRegion::is_empty(region));
        assert_eq!(SharedRegion::as_ptr(region), bytes.as_ptr() as *const u8);
    }

    #[test]
    fn test_atomic_array_region() {
        let region: [AtomicU8; 4] = Default::default();
        assert_eq!(SharedRegion::len(&region), 4);

        let empty: [AtomicU8; 0] = [];
        assert!(SharedRegion::is_empty(&empty));
    }
}
