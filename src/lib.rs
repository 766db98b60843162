//! Interval-hash-augmented minimizers (IVH) for all-vs-all long-read
//! overlap detection.
//!
//! Given a sketch (a vector of packed minimizers), this crate augments
//! each minimizer's k-mer fingerprint with a 24-bit signature derived from
//! the pattern of gaps between nearby minimizers sharing that fingerprint.
//! Matches against an index built from patched sketches must then agree on
//! both k-mer identity and local minimizer spacing, which suppresses
//! spurious hits in repetitive regions.
//!
//! The crate also carries the surrounding seed machinery: local-frequency
//! filtering, seed selection with tie-rescue, hit-pileup reconstruction
//! along a chain, and region-level post-filters for overlap candidates.
//! Sequence input, sketching, chaining and base-level alignment live
//! outside this crate.

#[cfg(feature = "cli")]
mod cli;
mod config;
pub mod index;
pub mod patch;
pub mod pattern;
pub mod pileup;
pub mod regions;
pub mod seeds;
pub mod sketch;

#[cfg(feature = "cli")]
pub use cli::IvhParams;
pub use index::{SeqInfo, SketchIndex};
pub use patch::{flt_rep, patch_sketch};
pub use pattern::compute_hash;
pub use pileup::{comp_hits_pileup, PileupCounts};
pub use regions::{del_full_intl, dump_seeds, est_err, select_sub_indv, Region};
pub use seeds::{collect_matches, Seed};
pub use sketch::{IvhIdx, IvhOpts, Mini, SketchStats};

pub mod prelude {
    pub use crate::config::*;
    pub use crate::index::{SeqInfo, SketchIndex};
    pub use crate::patch::{flt_rep, patch_sketch};
    pub use crate::pattern::compute_hash;
    pub use crate::pileup::{comp_hits_pileup, PileupCounts};
    pub use crate::regions::{del_full_intl, dump_seeds, est_err, select_sub_indv, Region};
    pub use crate::seeds::{collect_matches, Seed};
    pub use crate::sketch::*;

    #[cfg(feature = "cli")]
    pub use crate::cli::IvhParams;

    pub use rustc_hash::FxHashMap as HashMap;
    pub use std::cmp::{max, min};
}
