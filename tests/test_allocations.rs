//! Heap traffic of the encode paths and the NUMA allocator
//!
//! A counting global allocator records, per thread, how many heap
//! allocations happen and the largest single request.

use fec_xor::ffi::{fec_encode_batch, fec_encoder_free, fec_encoder_new, FEC_OK};
use fec_xor::{allocate_aligned_numa, release_aligned, selected_kernel, EncoderContext, GroupSizes};
use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;

struct CountingAlloc;

thread_local! {
    static ALLOCS: Cell<usize> = const { Cell::new(0) };
    static LARGEST: Cell<usize> = const { Cell::new(0) };
}

fn record(size: usize) {
    let _ = ALLOCS.try_with(|n| n.set(n.get() + 1));
    let _ = LARGEST.try_with(|l| l.set(l.get().max(size)));
}

unsafe impl GlobalAlloc for CountingAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        System.alloc(layout)
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record(layout.size());
        System.alloc_zeroed(layout)
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        record(new_size);
        System.realloc(ptr, layout, new_size)
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout)
    }
}

#[global_allocator]
static GLOBAL: CountingAlloc = CountingAlloc;

/// Run `f` and return (allocation count, largest request) it caused on this thread
fn measure<T>(f: impl FnOnce() -> T) -> (T, usize, usize) {
    ALLOCS.with(|n| n.set(0));
    LARGEST.with(|l| l.set(0));
    let out = f();
    (out, ALLOCS.with(Cell::get), LARGEST.with(Cell::get))
}

const GROUPS: usize = 10_000;
const PER_GROUP: usize = 10;
const PACKET: usize = 64;

fn batch_layout() -> (Vec<u8>, Vec<u32>, Vec<u8>) {
    let total = GROUPS * PER_GROUP;
    let slab: Vec<u8> = (0..total * PACKET).map(|i| (i * 7) as u8).collect();
    let offsets: Vec<u32> = (0..total).map(|i| (i * PACKET) as u32).collect();
    (slab, offsets, vec![0u8; GROUPS * PACKET])
}

#[test]
fn test_encode_batch_does_not_allocate() {
    let (slab, offsets, mut repair) = batch_layout();
    let ctx = EncoderContext::default();
    let sizes = vec![PER_GROUP as u32; GROUPS];

    let (result, allocs, _) = measure(|| {
        ctx.encode_batch(&slab, &offsets, GROUPS, GroupSizes::Uniform(PER_GROUP), PACKET, &mut repair)
    });
    assert_eq!(result, Ok(()));
    assert_eq!(allocs, 0, "uniform batch allocated");

    let (result, allocs, _) = measure(|| {
        ctx.encode_batch(&slab, &offsets, GROUPS, GroupSizes::PerGroup(&sizes), PACKET, &mut repair)
    });
    assert_eq!(result, Ok(()));
    assert_eq!(allocs, 0, "per-group batch allocated");
}

#[test]
fn test_c_encode_batch_does_not_allocate() {
    let (slab, offsets, mut repair) = batch_layout();
    let _ = selected_kernel();
    let ctx = fec_encoder_new(0.1, GROUPS as u32);

    let (rc, allocs, _) = measure(|| unsafe {
        fec_encode_batch(
            ctx,
            slab.as_ptr(),
            offsets.as_ptr(),
            GROUPS as u32,
            PACKET as u32,
            repair.as_mut_ptr(),
        )
    });

    unsafe { fec_encoder_free(ctx) };
    assert_eq!(rc, FEC_OK);
    assert_eq!(allocs, 0, "fec_encode_batch allocated");
}

#[test]
fn test_bogus_numa_node_stays_small() {
    // Warm the cached NUMA probes so only the request itself is measured
    unsafe { release_aligned(allocate_aligned_numa(64, 0)) };

    let (ptr, _, largest) = measure(|| allocate_aligned_numa(64, i32::MAX));

    assert!(!ptr.is_null());
    assert_eq!(ptr as usize % 64, 0);
    assert!(largest < 64 * 1024, "largest single allocation was {} bytes", largest);
    unsafe { release_aligned(ptr) };
}
