//! Pieces shared by every vector kernel
//!
//! Each vector tier runs the same three passes: a 4-way unrolled vector pass,
//! a single-vector pass, then the byte tail implemented here.

/// Vector lanes accumulated per iteration of the unrolled pass
pub const UNROLL: usize = 4;

/// How far ahead of the current offset source packets are prefetched
pub const PREFETCH_DISTANCE: usize = 256;

/// Minimum packet size before non-temporal stores are used
pub const STREAM_THRESHOLD: usize = 4096;

/// Decide whether a kernel of the given width should stream its stores
///
/// Streaming only pays off for buffers large enough that the repair data is
/// unlikely to be re-read from cache, and the store instructions require the
/// destination to be aligned to the vector width.
#[inline]
pub fn use_stream_stores(repair: *const u8, packet_size: usize, width: usize) -> bool {
    packet_size >= STREAM_THRESHOLD && (repair as usize) % width == 0
}

/// Byte-at-a-time XOR of `packets[..][start..]` into `repair[start..]`
///
/// # Safety
/// `packets` must be non-empty and every packet must be at least
/// `repair.len()` bytes long.
#[inline]
pub unsafe fn xor_tail(packets: &[&[u8]], repair: &mut [u8], start: usize) {
    let (first, rest) = packets.split_first().unwrap_unchecked();
    for i in start..repair.len() {
        let mut acc = *first.get_unchecked(i);
        for packet in rest {
            acc ^= *packet.get_unchecked(i);
        }
        *repair.get_unchecked_mut(i) = acc;
    }
}
