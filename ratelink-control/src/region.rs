use std::{
    ffi::c_void,
    fs::File,
    num::NonZeroUsize,
    path::Path,
    ptr::NonNull,
    sync::atomic::{AtomicU64, Ordering},
};

use nix::sys::mman::{mmap, msync, munmap, MapFlags, MsFlags, ProtFlags};

use crate::{ControlError, ControlSnapshot, CONTROL_REGION_SIZE, ENABLED_FIELD, FIELD_COUNT, RATE_FIELD};

/// Access mode of a [`MappedRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Access {
    ReadOnly,
    ReadWrite,
}

/// A `MAP_SHARED` mapping of the first [`CONTROL_REGION_SIZE`] bytes of a control file.
///
/// The mapping is page aligned, so both words are naturally aligned `u64`s and can be accessed
/// as [`AtomicU64`]. Nothing outside this module ever sees the raw pointer.
#[derive(Debug)]
pub(crate) struct MappedRegion {
    ptr: NonNull<c_void>,
    access: Access,
}

// SAFETY: the region is only accessed through atomic loads and stores.
unsafe impl Send for MappedRegion {}
unsafe impl Sync for MappedRegion {}

impl MappedRegion {
    /// Maps `file`, which must have been opened with permissions matching `access`.
    pub(crate) fn map(path: &Path, file: &File, access: Access) -> Result<Self, ControlError> {
        let len = file.metadata()?.len();
        if len < CONTROL_REGION_SIZE as u64 {
            return Err(ControlError::TooSmall { path: path.to_path_buf(), len });
        }

        let prot = match access {
            Access::ReadOnly => ProtFlags::PROT_READ,
            Access::ReadWrite => ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
        };

        let size = NonZeroUsize::new(CONTROL_REGION_SIZE).expect("region size is non-zero");

        // SAFETY: we map a fresh region at a kernel-chosen address and the file is known to be
        // at least as long as the mapping.
        let ptr = unsafe { mmap(None, size, prot, MapFlags::MAP_SHARED, file, 0) }
            .map_err(|source| ControlError::Map { path: path.to_path_buf(), source })?;

        tracing::debug!(?path, ?access, file_len = len, "mapped control region");

        Ok(Self { ptr, access })
    }

    #[inline]
    fn word(&self, index: usize) -> &AtomicU64 {
        assert!(index < FIELD_COUNT, "control field {index} out of range");

        // SAFETY: the mapping is page aligned and CONTROL_REGION_SIZE bytes long, `index` is in
        // bounds, and AtomicU64 has the same in-memory representation as u64.
        unsafe { &*self.ptr.as_ptr().cast::<AtomicU64>().add(index) }
    }

    #[inline]
    pub(crate) fn load(&self, index: usize) -> u64 {
        self.word(index).load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn store(&self, index: usize, value: u64) {
        debug_assert_eq!(self.access, Access::ReadWrite, "store on a read-only control region");
        self.word(index).store(value, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot::from_words([self.load(RATE_FIELD), self.load(ENABLED_FIELD)])
    }

    /// Flushes the mapping to the backing file.
    pub(crate) fn sync(&self) -> Result<(), nix::Error> {
        // SAFETY: `ptr` is the start of a live mapping of exactly this length.
        unsafe { msync(self.ptr, CONTROL_REGION_SIZE, MsFlags::MS_SYNC) }
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        // SAFETY: the mapping was created by `map` with this length and is not used afterwards.
        if let Err(e) = unsafe { munmap(self.ptr, CONTROL_REGION_SIZE) } {
            tracing::warn!(error = %e, "failed to unmap control region");
        }
    }
}
