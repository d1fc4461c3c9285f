//! Error types for XOR parity encoding

use thiserror::Error;

/// Errors that can occur while allocating buffers or encoding packet groups
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FecError {
    /// The allocator could not satisfy the request
    #[error("Failed to allocate {size} bytes of aligned memory")]
    AllocationFailed { size: usize },

    /// Offset table has fewer entries than the group layout requires
    #[error("Offset table too short: need {needed} offsets, got {available}")]
    OffsetTableTooShort { needed: usize, available: usize },

    /// Explicit cardinality list has fewer entries than `num_groups`
    #[error("Group size table too short: need {needed} entries, got {available}")]
    GroupSizesTooShort { needed: usize, available: usize },

    /// Repair output cannot hold one packet per group
    #[error("Repair buffer too small: need {needed} bytes, got {available}")]
    RepairBufferTooSmall { needed: usize, available: usize },

    /// A packet's byte range extends past the end of the slab
    #[error("Packet {packet} of group {group} at offset {offset} exceeds slab of {slab_len} bytes")]
    PacketOutOfBounds {
        group: usize,
        packet: usize,
        offset: usize,
        slab_len: usize,
    },

    /// A packet handed to the slab encoder is longer than the group's packet size
    #[error("Packet {packet} of group {group} is {len} bytes, larger than packet size {packet_size}")]
    PacketTooLarge {
        group: usize,
        packet: usize,
        len: usize,
        packet_size: usize,
    },

    /// Batch dimensions overflow `usize`
    #[error("Batch layout overflows: {0}")]
    LayoutOverflow(&'static str),
}

/// Type alias for encoding results
pub type FecResult<T> = Result<T, FecError>;
