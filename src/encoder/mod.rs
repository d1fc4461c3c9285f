//! Packet-group encoding on top of the XOR kernels
//!
//! - `context`: redundancy settings bound to a resolved kernel
//! - `batch`: drives the kernel over many groups stored in one slab
//! - `slab`: owns the slab and repair buffers for callers holding loose packets

pub mod batch;
pub mod context;
pub mod slab;

pub use batch::GroupSizes;
pub use context::EncoderContext;
pub use slab::{EncoderStats, RepairPacket, SlabEncoder};
