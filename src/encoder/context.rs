//! Encoder context: redundancy settings bound to a resolved kernel

use crate::config::{
    EncoderConfig, DEFAULT_MAX_GROUPS, DEFAULT_PACKETS_PER_GROUP, DEFAULT_REDUNDANCY_RATIO,
};
use crate::xor::{selected_kernel, XorKernel};
use log::debug;

/// Configuration and kernel shared by every batch encoded with it
///
/// The kernel is captured at construction and never changes. Contexts are
/// immutable, so one context can drive batches from several threads.
#[derive(Debug, Clone)]
pub struct EncoderContext {
    redundancy_ratio: f64,
    max_groups: u32,
    packets_per_group: usize,
    kernel: &'static XorKernel,
}

impl EncoderContext {
    /// Create a context using the process-wide selected kernel
    ///
    /// `redundancy_ratio` outside `(0, 1]` (including NaN) becomes
    /// [`DEFAULT_REDUNDANCY_RATIO`]; `max_groups == 0` becomes
    /// [`DEFAULT_MAX_GROUPS`].
    pub fn new(redundancy_ratio: f64, max_groups: u32) -> Self {
        Self::with_kernel(redundancy_ratio, max_groups, selected_kernel())
    }

    /// Create a context pinned to a specific kernel
    pub fn with_kernel(redundancy_ratio: f64, max_groups: u32, kernel: &'static XorKernel) -> Self {
        let redundancy_ratio = if redundancy_ratio > 0.0 && redundancy_ratio <= 1.0 {
            redundancy_ratio
        } else {
            DEFAULT_REDUNDANCY_RATIO
        };
        let max_groups = if max_groups > 0 {
            max_groups
        } else {
            DEFAULT_MAX_GROUPS
        };

        debug!(
            "Encoder context: redundancy={}, max_groups={}, kernel={}",
            redundancy_ratio,
            max_groups,
            kernel.name()
        );

        Self {
            redundancy_ratio,
            max_groups,
            packets_per_group: DEFAULT_PACKETS_PER_GROUP,
            kernel,
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.redundancy_ratio, config.max_groups)
            .with_packets_per_group(config.packets_per_group)
    }

    /// Set the cardinality used by fixed-layout batches (0 keeps the default)
    pub fn with_packets_per_group(mut self, packets_per_group: usize) -> Self {
        self.packets_per_group = if packets_per_group > 0 {
            packets_per_group
        } else {
            DEFAULT_PACKETS_PER_GROUP
        };
        self
    }

    pub fn redundancy_ratio(&self) -> f64 {
        self.redundancy_ratio
    }

    pub fn max_groups(&self) -> u32 {
        self.max_groups
    }

    pub fn packets_per_group(&self) -> usize {
        self.packets_per_group
    }

    pub fn kernel(&self) -> &'static XorKernel {
        self.kernel
    }

    /// XOR one group into `repair` with this context's kernel
    ///
    /// # Panics
    /// Panics if any packet is shorter than `repair`.
    pub fn encode_group(&self, packets: &[&[u8]], repair: &mut [u8]) {
        self.kernel.encode(packets, repair);
    }
}

impl Default for EncoderContext {
    fn default() -> Self {
        Self::new(DEFAULT_REDUNDANCY_RATIO, DEFAULT_MAX_GROUPS)
    }
}
