//! Runtime kernel selection
//!
//! Each tier is described by one `'static` [`XorKernel`]. The descriptor for
//! the running CPU is resolved exactly once through a `OnceLock`; every later
//! call to [`selected_kernel`] returns the same reference without locking, so
//! callers may compare kernels with `std::ptr::eq` for diagnostics.

use super::scalar::xor_packets_scalar;
use super::simd::{detect_cpu_features, select_simd_level, CpuFeatures, SimdLevel};
use log::debug;
use std::sync::OnceLock;

#[cfg(target_arch = "x86_64")]
use super::simd_avx2::xor_packets_avx2;
#[cfg(target_arch = "x86_64")]
use super::simd_avx512::xor_packets_avx512;
#[cfg(target_arch = "aarch64")]
use super::simd_neon::xor_packets_neon;

/// Raw kernel entry point shared by every tier
///
/// # Safety
/// The CPU must support the tier and every packet must be at least
/// `repair.len()` bytes long.
pub type XorFn = unsafe fn(packets: &[&[u8]], repair: &mut [u8]);

/// A resolved XOR kernel
///
/// Descriptors are only handed out for tiers the host supports, which is what
/// makes [`XorKernel::encode`] safe to call.
pub struct XorKernel {
    level: SimdLevel,
    func: XorFn,
}

static SCALAR_KERNEL: XorKernel = XorKernel {
    level: SimdLevel::Scalar,
    func: xor_packets_scalar,
};

#[cfg(target_arch = "aarch64")]
static NEON_KERNEL: XorKernel = XorKernel {
    level: SimdLevel::Neon,
    func: xor_packets_neon,
};

#[cfg(target_arch = "x86_64")]
static AVX2_KERNEL: XorKernel = XorKernel {
    level: SimdLevel::Avx2,
    func: xor_packets_avx2,
};

#[cfg(target_arch = "x86_64")]
static AVX512_KERNEL: XorKernel = XorKernel {
    level: SimdLevel::Avx512,
    func: xor_packets_avx512,
};

impl XorKernel {
    pub fn level(&self) -> SimdLevel {
        self.level
    }

    pub fn name(&self) -> &'static str {
        self.level.name()
    }

    pub fn vector_width(&self) -> usize {
        self.level.vector_width()
    }

    /// XOR every packet into `repair` (`repair.len()` is the packet size)
    ///
    /// An empty group or empty repair buffer is a no-op.
    ///
    /// # Panics
    /// Panics if any packet is shorter than `repair`.
    pub fn encode(&self, packets: &[&[u8]], repair: &mut [u8]) {
        let packet_size = repair.len();
        if let Some((index, short)) = packets
            .iter()
            .enumerate()
            .find(|(_, packet)| packet.len() < packet_size)
        {
            panic!(
                "packet {} is {} bytes, shorter than packet size {}",
                index,
                short.len(),
                packet_size
            );
        }

        // SAFETY: tier support is guaranteed by construction, lengths checked above
        unsafe { (self.func)(packets, repair) }
    }

    /// [`XorKernel::encode`] without the length check
    ///
    /// # Safety
    /// Every packet must be at least `repair.len()` bytes long.
    #[inline]
    pub unsafe fn encode_unchecked(&self, packets: &[&[u8]], repair: &mut [u8]) {
        (self.func)(packets, repair)
    }
}

impl std::fmt::Debug for XorKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XorKernel")
            .field("level", &self.level)
            .field("vector_width", &self.vector_width())
            .finish()
    }
}

impl PartialEq for XorKernel {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
    }
}

impl Eq for XorKernel {}

/// Features of the running CPU, detected once
pub fn cpu_features() -> CpuFeatures {
    static FEATURES: OnceLock<CpuFeatures> = OnceLock::new();
    *FEATURES.get_or_init(detect_cpu_features)
}

/// Descriptor for a specific tier, if the host can run it
pub fn kernel_for(level: SimdLevel) -> Option<&'static XorKernel> {
    if !cpu_features().supports(level) {
        return None;
    }

    match level {
        SimdLevel::Scalar => Some(&SCALAR_KERNEL),
        #[cfg(target_arch = "aarch64")]
        SimdLevel::Neon => Some(&NEON_KERNEL),
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx2 => Some(&AVX2_KERNEL),
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Avx512 => Some(&AVX512_KERNEL),
        _ => None,
    }
}

/// The scalar reference kernel, available on every host
pub fn scalar_kernel() -> &'static XorKernel {
    &SCALAR_KERNEL
}

/// The best kernel for this process, resolved on first use
pub fn selected_kernel() -> &'static XorKernel {
    static SELECTED: OnceLock<&'static XorKernel> = OnceLock::new();
    SELECTED.get_or_init(|| {
        let features = cpu_features();
        let level = select_simd_level(features);
        let kernel = kernel_for(level).unwrap_or(&SCALAR_KERNEL);
        debug!(
            "XOR kernel selected: {} (features: {:?})",
            kernel.name(),
            features
        );
        kernel
    })
}

/// Every kernel the host can run, narrowest tier first
pub fn available_kernels() -> Vec<&'static XorKernel> {
    SimdLevel::ALL
        .iter()
        .filter_map(|&level| kernel_for(level))
        .collect()
}

/// XOR `packets` into `repair` with the selected kernel
///
/// # Panics
/// Panics if any packet is shorter than `repair`.
pub fn xor_packets(packets: &[&[u8]], repair: &mut [u8]) {
    selected_kernel().encode(packets, repair);
}
