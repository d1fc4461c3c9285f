//! Cache-line aligned buffers for packet slabs and repair output
//!
//! Every buffer handed out here starts on a 64-byte boundary and its length is
//! rounded up to a multiple of 64, so vector kernels never straddle a cache
//! line at the start of a packet and streaming stores are always legal on the
//! repair output.
//!
//! The allocation header (capacity, alignment, and the mapping length for
//! NUMA-bound buffers) is kept in the bytes right before the returned pointer.
//! This lets raw buffers cross the C boundary and be released later from the
//! pointer alone.

pub mod numa;

use crate::error::{FecError, FecResult};
use log::debug;
use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

/// Alignment (and length granularity) of every buffer
pub const CACHE_LINE: usize = 64;

#[derive(Clone, Copy)]
#[repr(C)]
struct Header {
    capacity: usize,
    align: usize,
    /// Length of the backing `mmap`, or 0 for heap allocations
    mapped: usize,
}

const HEADER_SIZE: usize = std::mem::size_of::<Header>();

/// Round `size` up to the next multiple of [`CACHE_LINE`] (minimum one line)
pub fn aligned_capacity(size: usize) -> Option<usize> {
    size.max(1)
        .checked_add(CACHE_LINE - 1)
        .map(|s| s & !(CACHE_LINE - 1))
}

/// Owned, zero-initialised, 64-byte aligned byte buffer
pub struct AlignedBuffer {
    ptr: NonNull<u8>,
    len: usize,
}

// SAFETY: AlignedBuffer uniquely owns its allocation, like Vec<u8>
unsafe impl Send for AlignedBuffer {}
unsafe impl Sync for AlignedBuffer {}

impl AlignedBuffer {
    /// Allocate at least `size` bytes on a cache-line boundary
    pub fn new(size: usize) -> FecResult<Self> {
        Self::with_alignment(size, CACHE_LINE)
    }

    /// Allocate and ask the OS to place the pages on NUMA `node`
    ///
    /// A bound buffer gets its own page-aligned mapping and its length is
    /// rounded up to whole pages, so the policy covers exactly the buffer and
    /// is discarded when the buffer is dropped.
    ///
    /// Binding is advisory: with `node == None`, on platforms without NUMA
    /// support, or when the kernel rejects the request, this returns an
    /// ordinary aligned buffer.
    pub fn new_numa(size: usize, node: Option<u32>) -> FecResult<Self> {
        let Some(node) = node else {
            return Self::new(size);
        };

        if !numa::is_available() {
            debug!("NUMA not available, node {} request ignored", node);
            return Self::new(size);
        }

        let failed = FecError::AllocationFailed { size };
        let page = numa::page_size();
        let capacity = aligned_capacity(size)
            .and_then(|c| c.checked_next_multiple_of(page))
            .ok_or(failed.clone())?;
        // One leading page holds the header
        let mapped = capacity.checked_add(page).ok_or(failed.clone())?;

        // SAFETY: mapped is a non-zero multiple of the page size
        let base = match unsafe { numa::map(mapped) } {
            Ok(base) => base,
            Err(err) => {
                debug!("mmap of {} bytes failed: {}", mapped, err);
                return Err(failed);
            }
        };

        // SAFETY: base + page is inside the mapping and page >= 64 > HEADER_SIZE
        unsafe {
            let ptr = base.add(page);
            ptr.sub(HEADER_SIZE).cast::<Header>().write(Header {
                capacity,
                align: page,
                mapped,
            });
            // [ptr, ptr + capacity) is whole pages of our own mapping
            if let Err(err) = numa::bind(ptr, capacity, node) {
                debug!("NUMA bind of {} bytes to node {} failed: {}", capacity, node, err);
            }
            Ok(Self {
                ptr: NonNull::new_unchecked(ptr),
                len: capacity,
            })
        }
    }

    fn with_alignment(size: usize, align: usize) -> FecResult<Self> {
        let failed = FecError::AllocationFailed { size };

        let capacity = aligned_capacity(size).ok_or(failed.clone())?;
        // The header lives in the padding before the data, so reserve one
        // full alignment unit in front
        let total = capacity.checked_add(align).ok_or(failed.clone())?;
        let layout = Layout::from_size_align(total, align).map_err(|_| failed.clone())?;

        // SAFETY: layout has non-zero size
        let base = NonNull::new(unsafe { alloc_zeroed(layout) }).ok_or(failed)?;

        // SAFETY: base + align is inside the allocation, and align >= 64 > HEADER_SIZE
        unsafe {
            let ptr = base.as_ptr().add(align);
            ptr.sub(HEADER_SIZE)
                .cast::<Header>()
                .write(Header {
                    capacity,
                    align,
                    mapped: 0,
                });
            Ok(Self {
                ptr: NonNull::new_unchecked(ptr),
                len: capacity,
            })
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// Give up ownership; release with [`release_aligned`] or [`AlignedBuffer::from_raw`]
    pub fn into_raw(self) -> *mut u8 {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }

    /// Take back ownership of a pointer produced by [`AlignedBuffer::into_raw`]
    ///
    /// # Safety
    /// `ptr` must come from `into_raw` (or [`allocate_aligned`]) and must not
    /// have been released already.
    pub unsafe fn from_raw(ptr: *mut u8) -> Self {
        let header = read_header(ptr);
        Self {
            ptr: NonNull::new_unchecked(ptr),
            len: header.capacity,
        }
    }
}

unsafe fn read_header(ptr: *const u8) -> Header {
    ptr.sub(HEADER_SIZE).cast::<Header>().read()
}

impl Drop for AlignedBuffer {
    fn drop(&mut self) {
        // SAFETY: the header was written by with_alignment or new_numa
        unsafe {
            let header = read_header(self.ptr.as_ptr());
            let base = self.ptr.as_ptr().sub(header.align);
            if header.mapped > 0 {
                if let Err(err) = numa::unmap(base, header.mapped) {
                    debug!("munmap of {} bytes failed: {}", header.mapped, err);
                }
            } else {
                let layout =
                    Layout::from_size_align_unchecked(header.capacity + header.align, header.align);
                dealloc(base, layout);
            }
        }
    }
}

impl Deref for AlignedBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        // SAFETY: len bytes were allocated and zero-initialised
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }
}

impl DerefMut for AlignedBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        // SAFETY: unique ownership, len bytes initialised
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl std::fmt::Debug for AlignedBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Allocate a raw 64-byte aligned region, null on failure
pub fn allocate_aligned(size: usize) -> *mut u8 {
    match AlignedBuffer::new(size) {
        Ok(buffer) => buffer.into_raw(),
        Err(err) => {
            debug!("{}", err);
            std::ptr::null_mut()
        }
    }
}

/// NUMA-affine variant of [`allocate_aligned`]; negative `node` means no binding
pub fn allocate_aligned_numa(size: usize, node: i32) -> *mut u8 {
    let node = u32::try_from(node).ok();
    match AlignedBuffer::new_numa(size, node) {
        Ok(buffer) => buffer.into_raw(),
        Err(err) => {
            debug!("{}", err);
            std::ptr::null_mut()
        }
    }
}

/// Free a region from [`allocate_aligned`] / [`allocate_aligned_numa`]; null is a no-op
///
/// # Safety
/// `ptr` must be null or a live pointer returned by one of the allocation
/// functions above, released exactly once.
pub unsafe fn release_aligned(ptr: *mut u8) {
    if !ptr.is_null() {
        drop(AlignedBuffer::from_raw(ptr));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_to_cache_line() {
        assert_eq!(aligned_capacity(0), Some(64));
        assert_eq!(aligned_capacity(1), Some(64));
        assert_eq!(aligned_capacity(64), Some(64));
        assert_eq!(aligned_capacity(65), Some(128));
        assert_eq!(aligned_capacity(1200), Some(1216));
        assert_eq!(aligned_capacity(usize::MAX), None);
    }

    #[test]
    fn buffers_are_aligned_and_zeroed() {
        for size in [1, 7, 63, 64, 65, 1200, 4096, 100_000] {
            let buffer = AlignedBuffer::new(size).unwrap();
            assert_eq!(buffer.as_ptr() as usize % CACHE_LINE, 0, "size {}", size);
            assert!(buffer.len() >= size);
            assert_eq!(buffer.len() % CACHE_LINE, 0);
            assert!(buffer.iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn raw_round_trip_keeps_length() {
        let mut buffer = AlignedBuffer::new(100).unwrap();
        buffer[99] = 0x5A;

        let raw = buffer.into_raw();
        let restored = unsafe { AlignedBuffer::from_raw(raw) };

        assert_eq!(restored.len(), 128);
        assert_eq!(restored[99], 0x5A);
    }

    #[test]
    fn oversized_request_fails() {
        assert_eq!(
            AlignedBuffer::new(usize::MAX - 10).unwrap_err(),
            FecError::AllocationFailed {
                size: usize::MAX - 10
            }
        );
        assert!(allocate_aligned(usize::MAX).is_null());
    }

    #[test]
    fn release_null_is_noop() {
        unsafe { release_aligned(std::ptr::null_mut()) };
    }

    #[test]
    fn numa_without_node_is_plain_allocation() {
        let buffer = AlignedBuffer::new_numa(1000, None).unwrap();
        assert_eq!(buffer.as_ptr() as usize % CACHE_LINE, 0);
        assert_eq!(buffer.len(), 1024);
    }

    #[test]
    fn numa_bogus_node_degrades() {
        let buffer = AlignedBuffer::new_numa(5000, Some(4000)).unwrap();
        assert_eq!(buffer.as_ptr() as usize % CACHE_LINE, 0);
        assert!(buffer.len() >= 5000);

        let raw = allocate_aligned_numa(5000, -1);
        assert!(!raw.is_null());
        assert_eq!(raw as usize % CACHE_LINE, 0);
        unsafe { release_aligned(raw) };
    }
}
