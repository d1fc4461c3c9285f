//! ARM NEON XOR parity kernel (16-byte vectors)
//!
//! Uses `veorq_u8` over 64 bytes per unrolled iteration, then single 16-byte
//! vectors, then a byte tail. NEON is part of the AArch64 baseline so this
//! kernel is selected unconditionally on ARM64. Stores are always ordinary
//! cached stores; no fence is needed.

#[cfg(target_arch = "aarch64")]
use super::simd::common::{xor_tail, UNROLL};

#[cfg(target_arch = "aarch64")]
use std::arch::aarch64::*;

#[cfg(target_arch = "aarch64")]
const WIDTH: usize = 16;

/// NEON XOR of all `packets` into `repair`
///
/// Leaves `repair` untouched when `packets` is empty or `repair` is empty.
///
/// # Safety
/// - Requires ARM NEON support (all ARM64 CPUs have this)
/// - Every packet must be at least `repair.len()` bytes long.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn xor_packets_neon(packets: &[&[u8]], repair: &mut [u8]) {
    if packets.is_empty() || repair.is_empty() {
        return;
    }

    let len = repair.len();
    let out = repair.as_mut_ptr();
    let first = packets[0].as_ptr();
    let rest = &packets[1..];

    let mut pos = 0;

    while pos + UNROLL * WIDTH <= len {
        let mut acc0 = vld1q_u8(first.add(pos));
        let mut acc1 = vld1q_u8(first.add(pos + WIDTH));
        let mut acc2 = vld1q_u8(first.add(pos + 2 * WIDTH));
        let mut acc3 = vld1q_u8(first.add(pos + 3 * WIDTH));

        for packet in rest {
            let src = packet.as_ptr().add(pos);
            acc0 = veorq_u8(acc0, vld1q_u8(src));
            acc1 = veorq_u8(acc1, vld1q_u8(src.add(WIDTH)));
            acc2 = veorq_u8(acc2, vld1q_u8(src.add(2 * WIDTH)));
            acc3 = veorq_u8(acc3, vld1q_u8(src.add(3 * WIDTH)));
        }

        vst1q_u8(out.add(pos), acc0);
        vst1q_u8(out.add(pos + WIDTH), acc1);
        vst1q_u8(out.add(pos + 2 * WIDTH), acc2);
        vst1q_u8(out.add(pos + 3 * WIDTH), acc3);

        pos += UNROLL * WIDTH;
    }

    while pos + WIDTH <= len {
        let mut acc = vld1q_u8(first.add(pos));
        for packet in rest {
            acc = veorq_u8(acc, vld1q_u8(packet.as_ptr().add(pos)));
        }
        vst1q_u8(out.add(pos), acc);

        pos += WIDTH;
    }

    if pos < len {
        xor_tail(packets, repair, pos);
    }
}

#[cfg(test)]
#[cfg(target_arch = "aarch64")]
mod tests {
    use super::*;
    use crate::xor::scalar::xor_packets_scalar;

    #[test]
    fn neon_matches_scalar_across_pass_boundaries() {
        for len in [1, 15, 16, 17, 63, 64, 65, 80, 1200, 1201] {
            let packets: Vec<Vec<u8>> = (0..4)
                .map(|s| (0..len).map(|i| (i * 29 + s * 71 + 3) as u8).collect())
                .collect();
            let refs: Vec<&[u8]> = packets.iter().map(|p| p.as_slice()).collect();

            let mut expected = vec![0u8; len];
            let mut actual = vec![0u8; len];
            unsafe {
                xor_packets_scalar(&refs, &mut expected);
                xor_packets_neon(&refs, &mut actual);
            }

            assert_eq!(expected, actual, "NEON mismatch at size {}", len);
        }
    }
}
