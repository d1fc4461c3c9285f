//! C-linkage surface
//!
//! Mirrors `include/fec_xor.h`. Null arguments are reported, but raw
//! layouts are trusted: a packet pointer that does not address `packet_size`
//! readable bytes is undefined behaviour, exactly as for the Rust
//! `encode_unchecked` path. Panics are caught at the boundary and reported as
//! [`FEC_ERR_PANIC`] (or null / no-op for entry points without a status).

use crate::aligned::{allocate_aligned, allocate_aligned_numa, release_aligned};
use crate::encoder::batch::{encode_batch_raw, offsets_needed};
use crate::encoder::{EncoderContext, GroupSizes};
use crate::xor::{kernel_for, scalar_kernel, selected_kernel, SimdLevel, XorKernel};
use log::warn;
use smallvec::SmallVec;
use std::ffi::{c_char, c_int, c_void, CStr};
use std::panic::{self, AssertUnwindSafe};

pub const FEC_OK: c_int = 0;
pub const FEC_ERR_NULL_ARGUMENT: c_int = -1;
pub const FEC_ERR_PANIC: c_int = -2;
pub const FEC_ERR_INVALID_LAYOUT: c_int = -3;

/// C signature shared by every kernel export
pub type XorImplFn = unsafe extern "C" fn(
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
);

/// Opaque encoder handle handed to C callers
pub struct FecEncoderCtx {
    context: EncoderContext,
}

/// Build slices over C packet pointers and run `kernel`
///
/// # Safety
/// `packets` must address `num_packets` pointers, each to `packet_size`
/// readable bytes; `repair` must address `packet_size` writable bytes.
unsafe fn run_kernel(
    kernel: &XorKernel,
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    if num_packets == 0 || packet_size == 0 || packets.is_null() || repair.is_null() {
        return;
    }

    let packets: SmallVec<[&[u8]; 16]> = std::slice::from_raw_parts(packets, num_packets)
        .iter()
        .map(|&packet| std::slice::from_raw_parts(packet, packet_size))
        .collect();
    let repair = std::slice::from_raw_parts_mut(repair, packet_size);
    kernel.encode_unchecked(&packets, repair);
}

/// Run the kernel for `level`, or the scalar kernel if this host lacks it
unsafe fn run_tier(
    level: SimdLevel,
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    let kernel = kernel_for(level).unwrap_or_else(scalar_kernel);
    run_kernel(kernel, packets, num_packets, packet_size, repair);
}

/// # Safety
/// See [`XorImplFn`]: `num_packets` pointers of `packet_size` bytes each and a
/// `packet_size`-byte repair buffer.
#[no_mangle]
pub unsafe extern "C" fn xor_packets_scalar(
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    run_tier(SimdLevel::Scalar, packets, num_packets, packet_size, repair);
}

/// # Safety
/// Same contract as [`xor_packets_scalar`].
#[no_mangle]
pub unsafe extern "C" fn xor_packets_avx2(
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    run_tier(SimdLevel::Avx2, packets, num_packets, packet_size, repair);
}

/// # Safety
/// Same contract as [`xor_packets_scalar`].
#[no_mangle]
pub unsafe extern "C" fn xor_packets_avx512(
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    run_tier(SimdLevel::Avx512, packets, num_packets, packet_size, repair);
}

/// # Safety
/// Same contract as [`xor_packets_scalar`].
#[no_mangle]
pub unsafe extern "C" fn xor_packets_neon(
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    run_tier(SimdLevel::Neon, packets, num_packets, packet_size, repair);
}

/// Selected kernel, same as calling through [`fec_select_xor_impl`]
///
/// # Safety
/// Same contract as [`xor_packets_scalar`].
#[no_mangle]
pub unsafe extern "C" fn xor_packets(
    packets: *const *const u8,
    num_packets: usize,
    packet_size: usize,
    repair: *mut u8,
) {
    run_kernel(selected_kernel(), packets, num_packets, packet_size, repair);
}

/// Function pointer for the process-wide selected kernel
#[no_mangle]
pub extern "C" fn fec_select_xor_impl() -> XorImplFn {
    let func: XorImplFn = match selected_kernel().level() {
        SimdLevel::Scalar => xor_packets_scalar,
        SimdLevel::Neon => xor_packets_neon,
        SimdLevel::Avx2 => xor_packets_avx2,
        SimdLevel::Avx512 => xor_packets_avx512,
    };
    func
}

/// NUL-terminated name of the selected kernel; static, never freed
#[no_mangle]
pub extern "C" fn fec_kernel_name() -> *const c_char {
    let name: &'static CStr = match selected_kernel().level() {
        SimdLevel::Scalar => c"scalar",
        SimdLevel::Neon => c"neon",
        SimdLevel::Avx2 => c"avx2",
        SimdLevel::Avx512 => c"avx512",
    };
    name.as_ptr()
}

#[no_mangle]
pub extern "C" fn fec_alloc_slab(size: usize) -> *mut c_void {
    panic::catch_unwind(|| allocate_aligned(size))
        .unwrap_or(std::ptr::null_mut())
        .cast()
}

/// Slab with advisory NUMA binding; `numa_node < 0` means no binding
#[no_mangle]
pub extern "C" fn fec_alloc_slab_numa(size: usize, numa_node: c_int) -> *mut c_void {
    panic::catch_unwind(|| allocate_aligned_numa(size, numa_node))
        .unwrap_or(std::ptr::null_mut())
        .cast()
}

/// # Safety
/// `ptr` must be null or come from `fec_alloc_slab*`, released once.
#[no_mangle]
pub unsafe extern "C" fn fec_free_slab(ptr: *mut c_void) {
    release_aligned(ptr.cast());
}

#[no_mangle]
pub extern "C" fn fec_alloc_repair_buffer(size: usize) -> *mut c_void {
    fec_alloc_slab(size)
}

/// # Safety
/// `ptr` must be null or come from `fec_alloc_repair_buffer`, released once.
#[no_mangle]
pub unsafe extern "C" fn fec_free_repair_buffer(ptr: *mut c_void) {
    release_aligned(ptr.cast());
}

/// New encoder context; release with [`fec_encoder_free`]
#[no_mangle]
pub extern "C" fn fec_encoder_new(redundancy: f64, max_groups: u32) -> *mut FecEncoderCtx {
    match panic::catch_unwind(|| EncoderContext::new(redundancy, max_groups)) {
        Ok(context) => Box::into_raw(Box::new(FecEncoderCtx { context })),
        Err(_) => std::ptr::null_mut(),
    }
}

/// # Safety
/// `ctx` must be null or come from [`fec_encoder_new`], released once.
#[no_mangle]
pub unsafe extern "C" fn fec_encoder_free(ctx: *mut FecEncoderCtx) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

/// Shared body of the batch entry points
unsafe fn encode_batch_ffi(
    ctx: *const FecEncoderCtx,
    slab: *const u8,
    offsets: *const u32,
    group_sizes: Option<*const u32>,
    num_groups: u32,
    packet_size: u32,
    repair_out: *mut u8,
) -> c_int {
    if ctx.is_null()
        || slab.is_null()
        || offsets.is_null()
        || repair_out.is_null()
        || group_sizes.is_some_and(|sizes| sizes.is_null())
    {
        return FEC_ERR_NULL_ARGUMENT;
    }
    if num_groups == 0 || packet_size == 0 {
        return FEC_OK;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let context = &(*ctx).context;
        let num_groups = num_groups as usize;
        let sizes = match group_sizes {
            Some(sizes) => GroupSizes::PerGroup(std::slice::from_raw_parts(sizes, num_groups)),
            None => GroupSizes::Uniform(context.packets_per_group()),
        };
        let offsets = std::slice::from_raw_parts(offsets, offsets_needed(sizes, num_groups)?);
        encode_batch_raw(
            context.kernel(),
            slab,
            offsets,
            num_groups,
            sizes,
            packet_size as usize,
            repair_out,
        )
    }));

    match result {
        Ok(Ok(())) => FEC_OK,
        Ok(Err(err)) => {
            warn!("fec_encode_batch: {}", err);
            FEC_ERR_INVALID_LAYOUT
        }
        Err(_) => FEC_ERR_PANIC,
    }
}

/// Encode `num_groups` groups of the context's fixed cardinality
///
/// # Safety
/// `offsets` must hold `num_groups * packets_per_group` entries, each
/// addressing `packet_size` bytes of `slab`; `repair_out` must hold
/// `num_groups * packet_size` bytes.
#[no_mangle]
pub unsafe extern "C" fn fec_encode_batch(
    ctx: *mut FecEncoderCtx,
    slab: *const u8,
    offsets: *const u32,
    num_groups: u32,
    packet_size: u32,
    repair_out: *mut u8,
) -> c_int {
    encode_batch_ffi(ctx, slab, offsets, None, num_groups, packet_size, repair_out)
}

/// Encode groups whose sizes are given by `group_sizes[0..num_groups]`
///
/// # Safety
/// As [`fec_encode_batch`], with `offsets` holding `sum(group_sizes)` entries.
#[no_mangle]
pub unsafe extern "C" fn fec_encode_batch_groups(
    ctx: *mut FecEncoderCtx,
    slab: *const u8,
    offsets: *const u32,
    group_sizes: *const u32,
    num_groups: u32,
    packet_size: u32,
    repair_out: *mut u8,
) -> c_int {
    encode_batch_ffi(
        ctx,
        slab,
        offsets,
        Some(group_sizes),
        num_groups,
        packet_size,
        repair_out,
    )
}
