//! Property-based tests for XOR parity encoding
//!
//! Random groups and sizes, checked against a reference loop and against the
//! algebraic properties single-parity recovery relies on.

use fec_xor::xor::{available_kernels, scalar_kernel};
use fec_xor::{EncoderContext, GroupSizes};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Between 1 and 16 packets of one shared random length
fn packet_group() -> impl Strategy<Value = Vec<Vec<u8>>> {
    (1usize..=600, 1usize..=16).prop_flat_map(|(size, count)| {
        prop::collection::vec(prop::collection::vec(any::<u8>(), size), count)
    })
}

fn reference_xor(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0u8; packets[0].len()];
    for packet in packets {
        for (o, b) in out.iter_mut().zip(packet) {
            *o ^= b;
        }
    }
    out
}

fn encode(packets: &[Vec<u8>]) -> Vec<u8> {
    let refs: Vec<&[u8]> = packets.iter().map(|p| &p[..]).collect();
    let mut repair = vec![0u8; packets[0].len()];
    EncoderContext::default().encode_group(&refs, &mut repair);
    repair
}

proptest! {
    /// Property: every kernel equals the byte-wise reference
    #[test]
    fn prop_kernels_match_reference(group in packet_group()) {
        let expected = reference_xor(&group);
        let refs: Vec<&[u8]> = group.iter().map(|p| &p[..]).collect();

        for kernel in available_kernels() {
            let mut repair = vec![0x5Au8; expected.len()];
            kernel.encode(&refs, &mut repair);
            prop_assert_eq!(&repair, &expected, "kernel {}", kernel.name());
        }
    }

    /// Property: packet order within a group does not matter
    #[test]
    fn prop_permutation_invariant(group in packet_group(), seed in any::<u64>()) {
        let mut shuffled = group.clone();
        shuffled.shuffle(&mut StdRng::seed_from_u64(seed));

        prop_assert_eq!(encode(&group), encode(&shuffled));
    }

    /// Property: any single packet is recoverable from the others plus repair
    #[test]
    fn prop_single_loss_recoverable(group in packet_group(), lost in any::<prop::sample::Index>()) {
        let repair = encode(&group);
        let lost = lost.index(group.len());

        let mut survivors: Vec<Vec<u8>> = group
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != lost)
            .map(|(_, p)| p.clone())
            .collect();
        survivors.push(repair);

        prop_assert_eq!(&encode(&survivors), &group[lost]);
    }

    /// Property: a group XORed with its own repair packet is all zeros
    #[test]
    fn prop_repair_cancels_group(group in packet_group()) {
        let mut with_repair = group.clone();
        with_repair.push(encode(&group));

        prop_assert!(encode(&with_repair).iter().all(|&b| b == 0));
    }

    /// Property: a batch equals encoding each group on its own
    #[test]
    fn prop_batch_matches_per_group(
        size in 1usize..=300,
        counts in prop::collection::vec(0u32..=12, 1..=8),
        seed in any::<u64>(),
    ) {
        use rand::Rng;
        let mut rng = StdRng::seed_from_u64(seed);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let mut slab = vec![0u8; total * size];
        rng.fill(&mut slab[..]);
        let offsets: Vec<u32> = (0..total).map(|i| (i * size) as u32).collect();

        let ctx = EncoderContext::with_kernel(0.1, 8, scalar_kernel());
        let mut batch = vec![0u8; counts.len() * size];
        ctx.encode_batch(&slab, &offsets, counts.len(), GroupSizes::PerGroup(&counts), size, &mut batch)
            .unwrap();

        let mut parallel = vec![0u8; counts.len() * size];
        EncoderContext::default()
            .encode_batch_parallel(&slab, &offsets, counts.len(), GroupSizes::PerGroup(&counts), size, &mut parallel)
            .unwrap();
        prop_assert_eq!(&batch, &parallel);

        let mut start = 0usize;
        for (g, &count) in counts.iter().enumerate() {
            let group: Vec<Vec<u8>> = (start..start + count as usize)
                .map(|i| slab[i * size..(i + 1) * size].to_vec())
                .collect();
            start += count as usize;
            let expected = if group.is_empty() { vec![0u8; size] } else { reference_xor(&group) };
            prop_assert_eq!(&batch[g * size..(g + 1) * size], &expected[..]);
        }
    }
}
