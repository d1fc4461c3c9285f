//! AVX-512 XOR parity kernel (64-byte vectors)
//!
//! Same three-pass shape as the AVX2 kernel with 64-byte lanes: 256 bytes per
//! unrolled iteration, then single 64-byte vectors, then a byte tail.
//!
//! The selector never picks this tier on its own. It is reachable through
//! `kernel_for(SimdLevel::Avx512)` and the `xor_packets_avx512` C export.

#[cfg(target_arch = "x86_64")]
use super::simd::common::{use_stream_stores, xor_tail, PREFETCH_DISTANCE, UNROLL};

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

#[cfg(target_arch = "x86_64")]
const WIDTH: usize = 64;

#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx512f")]
unsafe fn load(src: *const u8) -> __m512i {
    _mm512_loadu_si512(src.cast())
}

#[cfg(target_arch = "x86_64")]
#[inline]
#[target_feature(enable = "avx512f")]
unsafe fn store(dst: *mut u8, value: __m512i, stream: bool) {
    if stream {
        _mm512_stream_si512(dst.cast(), value);
    } else {
        _mm512_storeu_si512(dst.cast(), value);
    }
}

/// AVX-512 XOR of all `packets` into `repair`
///
/// Leaves `repair` untouched when `packets` is empty or `repair` is empty.
///
/// # Safety
/// - Requires AVX-512F. Caller must ensure the CPU has it before calling.
/// - Every packet must be at least `repair.len()` bytes long.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx512f")]
pub unsafe fn xor_packets_avx512(packets: &[&[u8]], repair: &mut [u8]) {
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
            acc0 = _mm512_xor_si512(acc0, load(src));
            acc1 = _mm512_xor_si512(acc1, load(src.add(WIDTH)));
            acc2 = _mm512_xor_si512(acc2, load(src.add(2 * WIDTH)));
            acc3 = _mm512_xor_si512(acc3, load(src.add(3 * WIDTH)));
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
            acc = _mm512_xor_si512(acc, load(packet.as_ptr().add(pos)));
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
