//! Slab-owning encoder
//!
//! Copies caller packets into one aligned slab, builds the offset table and
//! per-group cardinalities, and runs the batch driver. Buffers are sized up
//! front from the configuration and only grow, so steady-state encoding does
//! not allocate beyond the returned repair packets.

use super::batch::GroupSizes;
use super::context::EncoderContext;
use crate::aligned::AlignedBuffer;
use crate::config::{EncoderConfig, DEFAULT_PACKET_SIZE};
use crate::error::{FecError, FecResult};
use log::{debug, warn};

/// An owned repair packet
pub type RepairPacket = Vec<u8>;

/// Running totals for one [`SlabEncoder`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncoderStats {
    pub batches: u64,
    pub groups: u64,
    pub packets: u64,
    pub repair_bytes: u64,
}

/// Encoder owning its slab, offset table and repair buffer
pub struct SlabEncoder {
    context: EncoderContext,
    config: EncoderConfig,
    slab: AlignedBuffer,
    repair: AlignedBuffer,
    offsets: Vec<u32>,
    group_sizes: Vec<u32>,
    pool: Option<rayon::ThreadPool>,
    stats: EncoderStats,
}

impl SlabEncoder {
    pub fn new(redundancy_ratio: f64, max_groups: u32) -> FecResult<Self> {
        Self::with_config(EncoderConfig::new(redundancy_ratio, max_groups))
    }

    pub fn with_config(config: EncoderConfig) -> FecResult<Self> {
        let context = EncoderContext::from_config(&config);
        let max_groups = context.max_groups() as usize;

        let slab_size = max_groups
            .saturating_mul(context.packets_per_group())
            .saturating_mul(DEFAULT_PACKET_SIZE);
        let repair_size = max_groups.saturating_mul(DEFAULT_PACKET_SIZE);
        let offsets_capacity = max_groups.saturating_mul(context.packets_per_group());

        let slab = AlignedBuffer::new_numa(slab_size, config.numa_node)?;
        let repair = AlignedBuffer::new_numa(repair_size, config.numa_node)?;

        let pool = if config.parallel && config.threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.threads)
                .build()
            {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(
                        "Could not build a {}-thread pool, using the global pool: {}",
                        config.threads, err
                    );
                    None
                }
            }
        } else {
            None
        };

        debug!(
            "Slab encoder: slab={} bytes, repair={} bytes, parallel={}",
            slab.len(),
            repair.len(),
            config.parallel
        );

        Ok(Self {
            context,
            config,
            slab,
            repair,
            offsets: Vec::with_capacity(offsets_capacity),
            group_sizes: Vec::with_capacity(max_groups),
            pool,
            stats: EncoderStats::default(),
        })
    }

    pub fn context(&self) -> &EncoderContext {
        &self.context
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    pub fn stats(&self) -> EncoderStats {
        self.stats
    }

    pub fn slab_capacity(&self) -> usize {
        self.slab.len()
    }

    pub fn repair_capacity(&self) -> usize {
        self.repair.len()
    }

    /// Encode one repair packet per group
    ///
    /// Packets shorter than `packet_size` are zero-padded, which leaves the
    /// XOR parity of the real bytes intact. A group with no packets yields an
    /// all-zero repair packet.
    pub fn encode<G, P>(&mut self, groups: &[G], packet_size: usize) -> FecResult<Vec<RepairPacket>>
    where
        G: AsRef<[P]>,
        P: AsRef<[u8]>,
    {
        if groups.is_empty() {
            return Ok(Vec::new());
        }
        if packet_size == 0 {
            return Ok(vec![Vec::new(); groups.len()]);
        }

        let mut total_packets = 0usize;
        for (group_index, group) in groups.iter().enumerate() {
            for (packet_index, packet) in group.as_ref().iter().enumerate() {
                let len = packet.as_ref().len();
                if len > packet_size {
                    return Err(FecError::PacketTooLarge {
                        group: group_index,
                        packet: packet_index,
                        len,
                        packet_size,
                    });
                }
            }
            total_packets += group.as_ref().len();
        }

        let slab_needed = total_packets
            .checked_mul(packet_size)
            .ok_or(FecError::LayoutOverflow("slab size"))?;
        if slab_needed.saturating_sub(packet_size) > u32::MAX as usize {
            return Err(FecError::LayoutOverflow("slab offsets exceed 32 bits"));
        }
        let repair_needed = groups
            .len()
            .checked_mul(packet_size)
            .ok_or(FecError::LayoutOverflow("repair size"))?;

        grow(&mut self.slab, slab_needed, self.config.numa_node, "slab")?;
        grow(&mut self.repair, repair_needed, self.config.numa_node, "repair buffer")?;

        self.offsets.clear();
        self.group_sizes.clear();
        let mut cursor = 0usize;
        for group in groups {
            let packets = group.as_ref();
            self.group_sizes.push(
                u32::try_from(packets.len()).map_err(|_| FecError::LayoutOverflow("group size"))?,
            );
            for packet in packets {
                let packet = packet.as_ref();
                let dst = &mut self.slab[cursor..cursor + packet_size];
                dst[..packet.len()].copy_from_slice(packet);
                dst[packet.len()..].fill(0);
                self.offsets.push(cursor as u32);
                cursor += packet_size;
            }
        }

        let repair_out = &mut self.repair[..repair_needed];
        repair_out.fill(0);

        let sizes = GroupSizes::PerGroup(&self.group_sizes);
        let slab = &self.slab[..slab_needed];
        let context = &self.context;
        let offsets = &self.offsets;
        let num_groups = groups.len();

        if self.config.parallel {
            match &self.pool {
                Some(pool) => pool.install(|| {
                    context.encode_batch_parallel(slab, offsets, num_groups, sizes, packet_size, repair_out)
                })?,
                None => {
                    context.encode_batch_parallel(slab, offsets, num_groups, sizes, packet_size, repair_out)?
                }
            }
        } else {
            context.encode_batch(slab, offsets, num_groups, sizes, packet_size, repair_out)?;
        }

        self.stats.batches += 1;
        self.stats.groups += num_groups as u64;
        self.stats.packets += total_packets as u64;
        self.stats.repair_bytes += repair_needed as u64;

        Ok(self.repair[..repair_needed]
            .chunks_exact(packet_size)
            .map(|chunk| chunk.to_vec())
            .collect())
    }
}

/// Replace `buffer` with a larger one if it cannot hold `needed` bytes
///
/// Contents are not preserved: every batch rewrites the slab from scratch.
fn grow(
    buffer: &mut AlignedBuffer,
    needed: usize,
    numa_node: Option<u32>,
    what: &str,
) -> FecResult<()> {
    if needed <= buffer.len() {
        return Ok(());
    }
    let new_size = needed.max(buffer.len().saturating_mul(2));
    debug!("Growing {} from {} to {} bytes", what, buffer.len(), new_size);
    *buffer = AlignedBuffer::new_numa(new_size, numa_node)?;
    Ok(())
}
