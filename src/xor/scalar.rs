//! Scalar XOR parity kernel
//!
//! The baseline every vector tier must agree with bit-for-bit, and the kernel
//! selected on hosts without a supported vector extension. The compiler is free
//! to auto-vectorise the inner loop for the build target.

use super::simd::common::xor_tail;

/// XOR every packet into `repair`, one byte at a time
///
/// Leaves `repair` untouched when `packets` is empty or `repair` is empty.
///
/// # Safety
/// Every packet must be at least `repair.len()` bytes long.
#[inline]
pub unsafe fn xor_packets_scalar(packets: &[&[u8]], repair: &mut [u8]) {
    if packets.is_empty() || repair.is_empty() {
        return;
    }
    xor_tail(packets, repair, 0);
}
