//! Batch driver: one kernel call per packet group stored in a flat slab
//!
//! A batch is described by three caller-owned buffers:
//! - the slab, holding the bytes of every packet
//! - the offset table, one byte offset into the slab per packet, group by group
//! - the repair output, `num_groups * packet_size` bytes
//!
//! Group `g` writes its repair packet to
//! `repair_out[g * packet_size..(g + 1) * packet_size]`.

use super::context::EncoderContext;
use crate::error::{FecError, FecResult};
use crate::xor::XorKernel;
use log::trace;
use rayon::prelude::*;
use smallvec::SmallVec;
use std::ops::Range;

/// Packet pointers for one group; groups of up to 16 stay on the stack
type PacketRefs<'a> = SmallVec<[&'a [u8]; 16]>;

/// How many packets each group in a batch holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupSizes<'a> {
    /// Every group holds the same number of packets; group `g` uses
    /// `offsets[g * k..(g + 1) * k]`
    Uniform(usize),
    /// Group `g` holds `sizes[g]` packets; offsets are consumed in order
    PerGroup(&'a [u32]),
}

impl<'a> GroupSizes<'a> {
    /// Offset-table entries used by the first `num_groups` groups
    ///
    /// Also the only validation the cardinalities need: once this succeeds,
    /// [`GroupSizes::ranges`] cannot overflow or run off the size table.
    fn offsets_needed(&self, num_groups: usize) -> FecResult<usize> {
        match *self {
            GroupSizes::Uniform(k) => num_groups
                .checked_mul(k)
                .ok_or(FecError::LayoutOverflow("offset count")),
            GroupSizes::PerGroup(sizes) => {
                if sizes.len() < num_groups {
                    return Err(FecError::GroupSizesTooShort {
                        needed: num_groups,
                        available: sizes.len(),
                    });
                }
                sizes[..num_groups]
                    .iter()
                    .try_fold(0usize, |total, &count| total.checked_add(count as usize))
                    .ok_or(FecError::LayoutOverflow("offset count"))
            }
        }
    }

    /// Offset-table ranges of the first `num_groups` groups, in order
    ///
    /// Only call after [`GroupSizes::offsets_needed`] accepted `num_groups`.
    fn ranges(self, num_groups: usize) -> GroupRanges<'a> {
        GroupRanges {
            sizes: self,
            group: 0,
            num_groups,
            cursor: 0,
        }
    }
}

/// Lazily walks group boundaries in the offset table
#[derive(Debug, Clone)]
struct GroupRanges<'a> {
    sizes: GroupSizes<'a>,
    group: usize,
    num_groups: usize,
    cursor: usize,
}

impl Iterator for GroupRanges<'_> {
    type Item = Range<usize>;

    fn next(&mut self) -> Option<Range<usize>> {
        if self.group >= self.num_groups {
            return None;
        }
        let count = match self.sizes {
            GroupSizes::Uniform(k) => k,
            GroupSizes::PerGroup(sizes) => sizes[self.group] as usize,
        };
        let start = self.cursor;
        self.cursor += count;
        self.group += 1;
        Some(start..self.cursor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_groups - self.group;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GroupRanges<'_> {}

/// Check the whole layout up front so a bad batch writes nothing
fn plan_batch(
    slab: &[u8],
    offsets: &[u32],
    num_groups: usize,
    sizes: GroupSizes<'_>,
    packet_size: usize,
    repair_len: usize,
) -> FecResult<()> {
    let repair_needed = num_groups
        .checked_mul(packet_size)
        .ok_or(FecError::LayoutOverflow("repair size"))?;
    if repair_len < repair_needed {
        return Err(FecError::RepairBufferTooSmall {
            needed: repair_needed,
            available: repair_len,
        });
    }

    let offsets_needed = sizes.offsets_needed(num_groups)?;
    if offsets.len() < offsets_needed {
        return Err(FecError::OffsetTableTooShort {
            needed: offsets_needed,
            available: offsets.len(),
        });
    }

    for (group, range) in sizes.ranges(num_groups).enumerate() {
        for (packet, &offset) in offsets[range].iter().enumerate() {
            let offset = offset as usize;
            let in_bounds = offset
                .checked_add(packet_size)
                .is_some_and(|end| end <= slab.len());
            if !in_bounds {
                return Err(FecError::PacketOutOfBounds {
                    group,
                    packet,
                    offset,
                    slab_len: slab.len(),
                });
            }
        }
    }

    Ok(())
}

fn encode_planned_group(
    kernel: &XorKernel,
    slab: &[u8],
    offsets: &[u32],
    packet_size: usize,
    repair: &mut [u8],
) {
    let packets: PacketRefs<'_> = offsets
        .iter()
        .map(|&offset| &slab[offset as usize..offset as usize + packet_size])
        .collect();
    // SAFETY: every packet slice is exactly packet_size == repair.len() bytes
    unsafe { kernel.encode_unchecked(&packets, repair) }
}

impl EncoderContext {
    /// Encode `num_groups` groups from `slab` into `repair_out`
    ///
    /// `num_groups == 0` or `packet_size == 0` succeeds without touching
    /// anything. Otherwise the full layout is validated before the first
    /// repair byte is written.
    pub fn encode_batch(
        &self,
        slab: &[u8],
        offsets: &[u32],
        num_groups: usize,
        sizes: GroupSizes<'_>,
        packet_size: usize,
        repair_out: &mut [u8],
    ) -> FecResult<()> {
        if num_groups == 0 || packet_size == 0 {
            return Ok(());
        }

        plan_batch(slab, offsets, num_groups, sizes, packet_size, repair_out.len())?;
        trace!(
            "encode_batch: {} groups x {} bytes ({})",
            num_groups,
            packet_size,
            self.kernel().name()
        );

        let groups = sizes
            .ranges(num_groups)
            .zip(repair_out.chunks_exact_mut(packet_size));
        for (range, repair) in groups {
            encode_planned_group(self.kernel(), slab, &offsets[range], packet_size, repair);
        }

        Ok(())
    }

    /// [`EncoderContext::encode_batch`] with groups spread across the current rayon pool
    ///
    /// Each group writes a disjoint slice of `repair_out`, so results are
    /// identical to the sequential driver.
    pub fn encode_batch_parallel(
        &self,
        slab: &[u8],
        offsets: &[u32],
        num_groups: usize,
        sizes: GroupSizes<'_>,
        packet_size: usize,
        repair_out: &mut [u8],
    ) -> FecResult<()> {
        if num_groups == 0 || packet_size == 0 {
            return Ok(());
        }

        plan_batch(slab, offsets, num_groups, sizes, packet_size, repair_out.len())?;
        trace!(
            "encode_batch_parallel: {} groups x {} bytes ({})",
            num_groups,
            packet_size,
            self.kernel().name()
        );

        let kernel = self.kernel();
        sizes
            .ranges(num_groups)
            .zip(repair_out.chunks_exact_mut(packet_size))
            .par_bridge()
            .for_each(|(range, repair)| {
                encode_planned_group(kernel, slab, &offsets[range], packet_size, repair);
            });

        Ok(())
    }
}

/// Number of offset-table entries a raw batch reads
pub(crate) fn offsets_needed(sizes: GroupSizes<'_>, num_groups: usize) -> FecResult<usize> {
    sizes.offsets_needed(num_groups)
}

/// Pointer-based batch driver behind the C entry points
///
/// # Safety
/// - `offsets` must hold every entry the layout addresses
/// - each `slab + offset` must address `packet_size` readable bytes
/// - `repair_out` must address `num_groups * packet_size` writable bytes not
///   overlapping any packet
pub(crate) unsafe fn encode_batch_raw(
    kernel: &XorKernel,
    slab: *const u8,
    offsets: &[u32],
    num_groups: usize,
    sizes: GroupSizes<'_>,
    packet_size: usize,
    repair_out: *mut u8,
) -> FecResult<()> {
    if num_groups == 0 || packet_size == 0 {
        return Ok(());
    }

    sizes.offsets_needed(num_groups)?;
    num_groups
        .checked_mul(packet_size)
        .ok_or(FecError::LayoutOverflow("repair size"))?;

    for (group, range) in sizes.ranges(num_groups).enumerate() {
        let packets: PacketRefs<'_> = offsets[range]
            .iter()
            .map(|&offset| std::slice::from_raw_parts(slab.add(offset as usize), packet_size))
            .collect();
        let repair = std::slice::from_raw_parts_mut(repair_out.add(group * packet_size), packet_size);
        kernel.encode_unchecked(&packets, repair);
    }

    Ok(())
}
