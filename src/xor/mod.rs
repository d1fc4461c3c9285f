//! XOR parity kernels
//!
//! Computes `repair[i] = p0[i] ^ p1[i] ^ ... ^ pn[i]` over a group of
//! equal-length packets. Losing any one packet of the group is recoverable by
//! XOR-ing the survivors with the repair packet.
//!
//! Four bit-exact-equivalent implementations are provided and the fastest one
//! supported by the host is chosen once per process:
//! - `scalar`: byte loop, every platform
//! - `simd_neon`: 16-byte NEON vectors (aarch64)
//! - `simd_avx2`: 32-byte AVX2 vectors (x86_64)
//! - `simd_avx512`: 64-byte AVX-512 vectors (x86_64, never auto-selected)

pub mod dispatch;
pub mod scalar;
pub mod simd;
pub mod simd_avx2;
pub mod simd_avx512;
pub mod simd_neon;

pub use dispatch::*;
pub use simd::{detect_cpu_features, select_simd_level, CpuFeatures, SimdLevel};

#[doc(hidden)]
pub use scalar::xor_packets_scalar;

#[cfg(target_arch = "x86_64")]
#[doc(hidden)]
pub use simd_avx2::xor_packets_avx2;

#[cfg(target_arch = "x86_64")]
#[doc(hidden)]
pub use simd_avx512::xor_packets_avx512;

#[cfg(target_arch = "aarch64")]
#[doc(hidden)]
pub use simd_neon::xor_packets_neon;
