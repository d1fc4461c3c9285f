//! CPU capability detection and kernel tier selection
//!
//! Provides the tier tags for the XOR kernels and the fixed policy that maps
//! detected CPU features onto one of them:
//! - x86_64: AVX2 (preferred even when AVX-512 is present) → scalar
//! - ARM64: NEON (always present) → never scalar
//! - Other: scalar
//!
//! # Note
//! This module is public for benchmarks and tests. Most callers want
//! [`crate::xor::selected_kernel`] instead.

pub mod common;

/// Vector instruction tiers available on the running CPU
///
/// A plain value type: detection is pure, so two calls on the same host always
/// compare equal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CpuFeatures {
    /// x86_64 AVX2 (32-byte vectors)
    pub avx2: bool,
    /// x86_64 AVX-512F + AVX-512BW (64-byte vectors)
    pub avx512: bool,
    /// ARM64 NEON (16-byte vectors)
    pub neon: bool,
}

impl CpuFeatures {
    /// No vector tier at all
    pub const NONE: CpuFeatures = CpuFeatures {
        avx2: false,
        avx512: false,
        neon: false,
    };

    pub fn is_empty(&self) -> bool {
        !(self.avx2 || self.avx512 || self.neon)
    }

    /// Whether a kernel of the given tier may run on this CPU
    pub fn supports(&self, level: SimdLevel) -> bool {
        match level {
            SimdLevel::Scalar => true,
            SimdLevel::Neon => self.neon,
            SimdLevel::Avx2 => self.avx2,
            SimdLevel::Avx512 => self.avx512,
        }
    }
}

/// XOR kernel implementation tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimdLevel {
    /// Byte-at-a-time fallback, runs everywhere
    Scalar,
    /// ARM64 NEON (128-bit)
    Neon,
    /// x86_64 AVX2 (256-bit)
    Avx2,
    /// x86_64 AVX-512F/BW (512-bit)
    Avx512,
}

impl SimdLevel {
    /// Every tier, narrowest first
    pub const ALL: [SimdLevel; 4] = [
        SimdLevel::Scalar,
        SimdLevel::Neon,
        SimdLevel::Avx2,
        SimdLevel::Avx512,
    ];

    /// Bytes processed by one vector instruction (1 for scalar)
    pub const fn vector_width(self) -> usize {
        match self {
            SimdLevel::Scalar => 1,
            SimdLevel::Neon => 16,
            SimdLevel::Avx2 => 32,
            SimdLevel::Avx512 => 64,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SimdLevel::Scalar => "scalar",
            SimdLevel::Neon => "neon",
            SimdLevel::Avx2 => "avx2",
            SimdLevel::Avx512 => "avx512",
        }
    }
}

impl std::fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Inspect the running CPU
///
/// # Platform-specific behavior:
/// - **x86_64**: runtime CPUID via `is_x86_feature_detected!`
/// - **ARM64**: NEON is architecturally guaranteed
/// - **Other**: empty set
pub fn detect_cpu_features() -> CpuFeatures {
    #[cfg(target_arch = "x86_64")]
    {
        CpuFeatures {
            avx2: is_x86_feature_detected!("avx2"),
            avx512: is_x86_feature_detected!("avx512f") && is_x86_feature_detected!("avx512bw"),
            neon: false,
        }
    }

    #[cfg(target_arch = "aarch64")]
    {
        CpuFeatures {
            avx2: false,
            avx512: false,
            neon: true,
        }
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        CpuFeatures::NONE
    }
}

/// Map detected features onto a kernel tier
///
/// AVX2 wins over AVX-512 when both are present; AVX-512 alone falls back to
/// scalar.
pub fn select_simd_level(features: CpuFeatures) -> SimdLevel {
    if features.avx2 {
        return SimdLevel::Avx2;
    }
    if features.neon {
        return SimdLevel::Neon;
    }
    SimdLevel::Scalar
}
