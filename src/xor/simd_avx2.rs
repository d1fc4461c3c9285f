//! AVX2 XOR parity kernel (32-byte vectors)
//!
//! ## Passes
//!
//! 1. 4-way unrolled: 128 bytes per iteration. Packet 0 seeds four
//!    accumulators, every further packet is XORed into them, then all four
//!    are stored. Source packets are prefetched `PREFETCH_DISTANCE` bytes ahead.
//! 2. Single vector: 32 bytes per iteration for the `< 128` byte remainder.
//! 3. Byte tail for the final `< 32` bytes.
//!
//! ## Stores
//!
//! When the repair buffer is 32-byte aligned and the packet is at least
//! `STREAM_THRESHOLD` bytes, results are written with `vmovntdq`, followed by
//! an `sfence` before returning.

#[cfg(target_arch = "x86_64")]
use super::simd::common::{use_stream_stores, xor_tail, PREFETCH_DISTANCE, UNROLL};

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "x86_64")]
const WIDTH: usize = 32;

#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn load(src: *const u8) -> __m256i {
    _mm256_loadu_si256(src as *const __m256i)
}

#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx2")]
unsafe fn store(dst: *mut u8, value: __m256i, stream: bool) {
    if stream {
        _mm256_stream_si256(dst as *mut __m256i, value);
    } else {
        _mm256_storeu_si256(dst as *mut __m256i, value);
    }
}

/// AVX2 XOR of all `packets` into `repair`
///
/// Leaves `repair` untouched when `packets` is empty or `repair` is empty.
///
/// # Safety
/// - Requires AVX2. Caller must ensure the CPU has it before calling.
/// - Every packet must be at least `repair.len()` bytes long.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
pub unsafe fn xor_packets_avx2(packets: &[&[u8]], repair: &mut [u8]) {
    if packets.is_empty() || repair.is_empty() {
        return;
    }

    let len = repair.len();
    let out = repair.as_mut_ptr();
    let stream = use_stream_stores(out, len, WIDTH);
    let first = packets[0].as_ptr();
    let rest = &packets[1..];

    let mut pos = 0;

    while pos + UNROLL * WIDTH <= len {
        if pos + PREFETCH_DISTANCE < len {
            for packet in packets {
                _mm_prefetch::<_MM_HINT_T0>(packet.as_ptr().add(pos + PREFETCH_DISTANCE) as *const i8);
            }
        }

        let mut acc0 = load(first.add(pos));
        let mut acc1 = load(first.add(pos + WIDTH));
        let mut acc2 = load(first.add(pos + 2 * WIDTH));
        let mut acc3 = load(first.add(pos + 3 * WIDTH));

        for packet in rest {
            let src = packet.as_ptr().add(pos);
            acc0 = _mm256_xor_si256(acc0, load(src));
            acc1 = _mm256_xor_si256(acc1, load(src.add(WIDTH)));
            acc2 = _mm256_xor_si256(acc2, load(src.add(2 * WIDTH)));
            acc3 = _mm256_xor_si256(acc3, load(src.add(3 * WIDTH)));
        }

        store(out.add(pos), acc0, stream);
        store(out.add(pos + WIDTH), acc1, stream);
        store(out.add(pos + 2 * WIDTH), acc2, stream);
        store(out.add(pos + 3 * WIDTH), acc3, stream);

        pos += UNROLL * WIDTH;
    }

    while pos + WIDTH <= len {
        let mut acc = load(first.add(pos));
        for packet in rest {
            acc = _mm256_xor_si256(acc, load(packet.as_ptr().add(pos)));
        }
        store(out.add(pos), acc, stream);

        pos += WIDTH;
    }

    if pos < len {
        xor_tail(packets, repair, pos);
    }

    if stream {
        _mm_sfence();
    }
}
