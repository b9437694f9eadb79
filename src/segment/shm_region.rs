//! Memory-Mapped Shared Region untuk flag lock antar proses
//!
//! File di-mmap dengan `MAP_SHARED`, sehingga semua proses yang membuka path
//! yang sama melihat byte yang sama lewat cache coherence:
//! - Create-or-open: proses pertama membuat file, proses lain membukanya
//! - Open-existing: worker yang tidak boleh membuat region baru
//! - Grow-only: ukuran dicek dan diperpanjang di bawah `flock` exclusive,
//!   jadi opener dengan `len` lebih kecil tidak pernah memotong file
//! - Zero-init: byte baru hasil `set_len` selalu `0` (state unlocked)
//! - Tidak ada header: offset flag sepenuhnya ditentukan oleh caller

use log::debug;
use memmap2::{MmapOptions, MmapRaw};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use super::SharedRegion;
use crate::error::Result;

/// Suffix file backing, sama untuk semua proses yang memakai nama yang sama.
const FLAG_FILE_SUFFIX: &str = "ipcflag";

/// Region shared memory berbasis file yang di-mmap
pub struct ShmRegion {
    map: MmapRaw,
    path: PathBuf,
}

impl ShmRegion {
    /// Membuat atau membuka region
    ///
    /// # Arguments
    /// * `path` - Path ke file backing (biasanya di `/dev/shm`)
    /// * `len` - Panjang region dalam bytes (minimal 1)
    ///
    /// File yang lebih pendek dari `len` diperpanjang dengan byte nol.
    /// File yang sudah ada tidak pernah di-truncate, karena proses lain
    /// mungkin sedang memegang lock di dalamnya.
    pub fn open<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref();
        check_len(len)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        {
            // Cek + set_len harus atomic terhadap opener lain
            let _sizing = SizingLock::exclusive(&file)?;
            let current = file.metadata()?.len();
            if current < len as u64 {
                file.set_len(len as u64)?;
                debug!("region {} grown from {} to {} bytes", path.display(), current, len);
            }
        }

        Self::map(file, path, len)
    }

    /// Membuka region yang sudah dibuat proses lain
    ///
    /// Tidak pernah membuat atau memperpanjang file. File yang tidak ada atau
    /// lebih pendek dari `len` adalah `SharedMemoryUnavailable`.
    pub fn open_existing<P: AsRef<Path>>(path: P, len: usize) -> Result<Self> {
        let path = path.as_ref();
        check_len(len)?;

        let file = OpenOptions::new().read(true).write(true).open(path)?;

        let current = file.metadata()?.len();
        if current < len as u64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("region {} is {} bytes, need {}", path.display(), current, len),
            )
            .into());
        }

        Self::map(file, path, len)
    }

    fn map(file: File, path: &Path, len: usize) -> Result<Self> {
        let map = MmapOptions::new().len(len).map_raw(&file)?;
        debug!("region {} mapped ({} bytes)", path.display(), len);

        Ok(Self {
            map,
            path: path.to_path_buf(),
        })
    }

    /// Membuka region dengan nama pendek: `<default_dir>/<name>.ipcflag`
    pub fn open_named(name: &str, len: usize) -> Result<Self> {
        Self::open(named_path(name), len)
    }

    /// Path file backing
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Panjang region dalam bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.len() == 0
    }

    /// Flush isi mapping ke file backing
    pub fn flush(&self) -> Result<()> {
        self.map.flush()?;
        Ok(())
    }
}

// SAFETY: mapping dimiliki ShmRegion dan baru di-unmap saat ShmRegion di-drop.
unsafe impl SharedRegion for ShmRegion {
    #[inline]
    fn as_ptr(&self) -> *const u8 {
        self.map.as_ptr()
    }

    #[inline]
    fn len(&self) -> usize {
        self.map.len()
    }
}

fn check_len(len: usize) -> Result<()> {
    if len == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "region length must be > 0").into());
    }
    Ok(())
}

/// `flock(LOCK_EX)` atas file backing, dilepas saat di-drop
#[cfg(unix)]
struct SizingLock<'f> {
    file: &'f File,
}

#[cfg(unix)]
impl<'f> SizingLock<'f> {
    fn exclusive(file: &'f File) -> io::Result<Self> {
        use std::os::unix::io::AsRawFd;

        loop {
            // SAFETY: fd valid selama `file` dipinjam
            if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) } == 0 {
                return Ok(Self { file });
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

#[cfg(unix)]
impl Drop for SizingLock<'_> {
    fn drop(&mut self) {
        use std::os::unix::io::AsRawFd;

        // SAFETY: fd masih valid, lock ini yang mengambil LOCK_EX
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

// Di luar unix tidak ada flock; sizing tetap grow-only tapi tidak atomic.
#[cfg(not(unix))]
struct SizingLock;

#[cfg(not(unix))]
impl SizingLock {
    fn exclusive(_file: &File) -> io::Result<Self> {
        Ok(Self)
    }
}

/// Direktori default untuk file backing: `/dev/shm` jika ada, selain itu temp dir
pub fn default_dir() -> PathBuf {
    let shm = Path::new("/dev/shm");
    if cfg!(target_os = "linux") && shm.is_dir() {
        shm.to_path_buf()
    } else {
        std::env::temp_dir()
    }
}

/// Path file backing untuk nama pendek: `<default_dir>/<name>.ipcflag`
pub fn named_path(name: &str) -> PathBuf {
    default_dir().join(format!("{}.{}", name, FLAG_FILE_SUFFIX))
}

/// Menghapus file backing. File yang tidak ada bukan error.
///
/// Proses yang masih me-map region tetap melihat byte lama sampai unmap.
pub fn unlink<P: AsRef<Path>>(path: P) -> Result<()> {
    match std::fs::remove_file(path.as_ref()) {
        Ok(()) => {
            debug!("region {} unlinked", path.as_ref().display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
