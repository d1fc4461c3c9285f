//! Single-parity XOR forward error correction
//!
//! Given a group of equal-length packets, computes one repair packet such that
//! any single lost packet can be rebuilt by XOR-ing the survivors with it.
//! The XOR kernel is chosen once per process from the vector extensions the
//! CPU offers (AVX2, AVX-512, NEON, or scalar), and every kernel produces
//! bit-identical output.
//!
//! ```
//! use fec_xor::{EncoderContext, GroupSizes};
//!
//! let slab = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let offsets = [0u32, 4];
//! let mut repair = [0u8; 4];
//!
//! let ctx = EncoderContext::new(0.1, 16);
//! ctx.encode_batch(&slab, &offsets, 1, GroupSizes::Uniform(2), 4, &mut repair)
//!     .unwrap();
//! assert_eq!(repair, [0x04, 0x04, 0x04, 0x0C]);
//! ```

pub mod aligned;
pub mod config;
pub mod encoder;
pub mod error;
pub mod ffi;
pub mod xor;

pub use aligned::{allocate_aligned, allocate_aligned_numa, release_aligned, AlignedBuffer};
pub use config::EncoderConfig;
pub use encoder::{EncoderContext, EncoderStats, GroupSizes, RepairPacket, SlabEncoder};
pub use error::{FecError, FecResult};
pub use xor::{selected_kernel, xor_packets, SimdLevel, XorKernel};
