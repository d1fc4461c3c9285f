//! Configuration for encoder contexts and slab encoders

/// Redundancy ratio used when the caller's value is outside `(0, 1]`
pub const DEFAULT_REDUNDANCY_RATIO: f64 = 0.10;

/// Group capacity used when the caller passes zero
pub const DEFAULT_MAX_GROUPS: u32 = 1024;

/// Packets per group assumed by the fixed-cardinality batch entry point
pub const DEFAULT_PACKETS_PER_GROUP: usize = 10;

/// Typical packet payload, used to pre-size slabs
pub const DEFAULT_PACKET_SIZE: usize = 1200;

/// Configuration for encoding
///
/// Out-of-range values are never rejected; [`crate::EncoderContext`] replaces
/// them with the defaults above.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderConfig {
    /// Repair-to-data ratio, `(0, 1]`
    pub redundancy_ratio: f64,
    /// Number of groups buffers are pre-sized for
    pub max_groups: u32,
    /// Cardinality used when a batch does not carry per-group sizes
    pub packets_per_group: usize,
    /// Whether batches are spread over a rayon pool
    pub parallel: bool,
    /// Number of threads for parallel batches (0 = auto-detect)
    pub threads: usize,
    /// NUMA node for slab memory (None = no binding)
    pub numa_node: Option<u32>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            redundancy_ratio: DEFAULT_REDUNDANCY_RATIO,
            max_groups: DEFAULT_MAX_GROUPS,
            packets_per_group: DEFAULT_PACKETS_PER_GROUP,
            parallel: false,
            threads: 0,
            numa_node: None,
        }
    }
}

impl EncoderConfig {
    pub fn new(redundancy_ratio: f64, max_groups: u32) -> Self {
        Self {
            redundancy_ratio,
            max_groups,
            ..Self::default()
        }
    }

    pub fn with_packets_per_group(mut self, packets_per_group: usize) -> Self {
        self.packets_per_group = packets_per_group;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_numa_node(mut self, numa_node: Option<u32>) -> Self {
        self.numa_node = numa_node;
        self
    }

    /// Get effective thread count (auto-detect if 0)
    pub fn effective_threads(&self) -> usize {
        match (self.parallel, self.threads) {
            (false, _) => 1,
            (true, 0) => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            (true, n) => n,
        }
    }
}
