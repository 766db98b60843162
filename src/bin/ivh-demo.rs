//! Synthetic-sketch demo: patch a reference and an overlapping query
//! sketch, build the occurrence index, and collect seeds.
//!
//! Run with `RUST_LOG=info` to see the per-stage counters.

use clap::Parser;
use itertools::Itertools;
use ivh_overlap::prelude::*;
use log::info;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Parser)]
struct Cli {
    #[clap(flatten)]
    params: IvhParams,

    /// Minimizers in the reference sketch.
    #[clap(short, default_value_t = 2000)]
    n: usize,

    /// Reference length in bases.
    #[clap(short, default_value_t = 200_000)]
    l: u32,

    /// Distinct k-mer fingerprints to draw from.
    #[clap(long, default_value_t = 512)]
    kmers: u64,

    /// RNG seed.
    #[clap(long, default_value_t = 42)]
    seed: u64,
}

const K: u32 = 15;

fn main() {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .init();
    let args = Cli::parse();
    let opts: IvhOpts = args.params.into();

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let mut reference = synth_sketch(&mut rng, args.n, args.l, args.kmers);
    let (mut query, qlen) = cut_read(&reference, args.n / 4..3 * args.n / 4);

    let mut stats = SketchStats {
        n_mini: reference.len(),
        ..Default::default()
    };

    // hash diversity over the raw reference positions
    let y = reference.iter().map(|m| m.y).collect_vec();
    let mut hashes = vec![];
    stats.n_hash = compute_hash(
        &SketchIndex::new(ref_seqs(args.l), K, opts.skip_bnd),
        &y,
        opts.wing,
        opts.max_ivh_span,
        K,
        &mut hashes,
    );

    patch_sketch(&mut reference, args.l, &opts);
    let mi = SketchIndex::build(ref_seqs(args.l), K, opts.skip_bnd, &reference);

    patch_sketch(&mut query, qlen, &opts);
    stats.n_masked = query.iter().filter(|m| m.y & Y_FLT != 0).count();

    let (seeds, n_occ) = collect_matches(&mi, &mut query, opts.max_occ, opts.tie_rescue_w);
    stats.n_seeds = seeds.len();
    stats.n_occ = n_occ;

    info!("{:<24}: {:>9}", "minimizers", stats.n_mini);
    info!("{:<24}: {:>9}", "distinct hashes", stats.n_hash);
    info!("{:<24}: {:>9}", "query minimizers", query.len());
    info!("{:<24}: {:>9}", "masked (dense)", stats.n_masked);
    info!("{:<24}: {:>9}", "seeds kept", stats.n_seeds);
    info!("{:<24}: {:>9}", "occurrences", stats.n_occ);
}

fn ref_seqs(len: u32) -> Vec<SeqInfo> {
    vec![SeqInfo {
        name: "ref0".into(),
        len,
    }]
}

/// A sketch with roughly even minimizer spacing, drawing fingerprints from
/// a small pool so that repeats occur.
fn synth_sketch(rng: &mut ChaCha8Rng, n: usize, len: u32, kmers: u64) -> Vec<Mini> {
    let pool: Vec<u64> = (0..kmers).map(|_| rng.gen::<u64>() >> 8).collect();
    let step = (len - 2 * K) / n as u32;
    let mut pos = K + 1;
    (0..n)
        .map(|_| {
            pos += rng.gen_range(1..=2 * step.max(1));
            let f = pool[rng.gen_range(0..pool.len())];
            Mini::new(f, K as u8, pos.min(len - 1), rng.gen_bool(0.5))
        })
        .collect()
}

/// Slice a window of the reference sketch and rebase it as a read.
fn cut_read(mv: &[Mini], range: std::ops::Range<usize>) -> (Vec<Mini>, u32) {
    let slice = &mv[range];
    let base = slice[0].qbeg() as u32;
    let read = slice
        .iter()
        .map(|m| Mini::new(m.fprint(), m.span() as u8, m.qend() as u32 - base, m.is_rev()))
        .collect_vec();
    let qlen = read.last().unwrap().qend() as u32 + K;
    (read, qlen)
}
