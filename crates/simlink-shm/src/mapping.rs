//! Owned views of shared memory regions.
//!
//! A [`Mapping`] is this process's window onto one named region. Dropping
//! it releases the window (`munmap`, or one reference to an in-process
//! heap block) but never removes the name: that is
//! [`IpcBackend::unlink_region`](crate::IpcBackend::unlink_region)'s job.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

/// Zero-initialised heap block standing in for a shared-memory object.
pub(crate) struct HeapRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

// SAFETY: HeapRegion owns its allocation exclusively; the pointer is only
// dereferenced through Mapping, whose access discipline is enforced by the
// tick handshake (one side touches a buffer at a time).
unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    /// Allocate `len` zeroed bytes, or `None` if the allocator refuses.
    pub(crate) fn zeroed(len: usize) -> Option<Self> {
        let layout = Layout::from_size_align(len.max(1), 8).ok()?;
        // SAFETY:
        // - layout has non-zero size (len.max(1) above)
        // - alloc_zeroed returns null on failure, which NonNull::new maps to None
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(raw).map(|ptr| Self { ptr, layout })
    }

    pub(crate) fn len(&self) -> usize {
        self.layout.size()
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        // SAFETY:
        // - ptr was returned by alloc_zeroed with exactly this layout
        // - HeapRegion is only dropped once, when the last Arc goes away
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

enum Owner {
    #[cfg(target_os = "linux")]
    Mmap,
    Heap(Arc<HeapRegion>),
}

/// One process-local mapping of a named shared region.
pub struct Mapping {
    ptr: NonNull<u8>,
    len: usize,
    owner: Owner,
}

// SAFETY: Mapping points to memory that stays valid for its lifetime
// (mmap'd pages or an Arc-held heap block). Cross-party access is
// serialised by the tick handshake, not by Rust borrows.
unsafe impl Send for Mapping {}
unsafe impl Sync for Mapping {}

impl Mapping {
    /// Wrap a successful `mmap` result.
    ///
    /// # Safety
    ///
    /// `ptr` must come from `mmap` with `len` bytes mapped read/write, and
    /// must not be unmapped by anyone else.
    #[cfg(target_os = "linux")]
    pub(crate) unsafe fn from_mmap(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            owner: Owner::Mmap,
        }
    }

    pub(crate) fn from_heap(region: Arc<HeapRegion>, len: usize) -> Self {
        let len = len.min(region.len());
        Self {
            ptr: region.ptr,
            len,
            owner: Owner::Heap(region),
        }
    }

    /// Mapped size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the mapping is zero-sized.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The mapped bytes.
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY:
        // - ptr is valid for len bytes for as long as self lives (see Owner)
        // - u8 has alignment 1 and every bit pattern is valid
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// The mapped bytes, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY:
        // - ptr is valid for len bytes and mapped writable
        // - &mut self guarantees no other slice from this Mapping is live
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        match &self.owner {
            #[cfg(target_os = "linux")]
            Owner::Mmap => {
                // SAFETY:
                // - ptr/len are exactly what mmap returned and was asked for
                // - Drop runs once, so the region has not been unmapped yet
                unsafe {
                    libc::munmap(self.ptr.as_ptr().cast::<libc::c_void>(), self.len);
                }
            }
            Owner::Heap(_) => {}
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.owner {
            #[cfg(target_os = "linux")]
            Owner::Mmap => "mmap",
            Owner::Heap(_) => "heap",
        };
        f.debug_struct("Mapping")
            .field("len", &self.len)
            .field("kind", &kind)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_mappings_share_bytes() {
        let region = Arc::new(HeapRegion::zeroed(16).unwrap());
        let mut a = Mapping::from_heap(Arc::clone(&region), 16);
        let b = Mapping::from_heap(region, 16);
        a.as_mut_slice()[3] = 7;
        assert_eq!(b.as_slice()[3], 7);
        assert!(b.as_slice().iter().enumerate().all(|(i, &v)| i == 3 || v == 0));
    }

    #[test]
    fn region_outlives_first_mapping() {
        let region = Arc::new(HeapRegion::zeroed(4).unwrap());
        let mut a = Mapping::from_heap(Arc::clone(&region), 4);
        let b = Mapping::from_heap(region, 4);
        a.as_mut_slice().copy_from_slice(&[1, 2, 3, 4]);
        drop(a);
        assert_eq!(b.as_slice(), &[1, 2, 3, 4]);
    }
}
