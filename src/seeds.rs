//! Seed selection: per-k-mer multiplicity caps with a sliding-window rescue
//! of the locally rarest seed.
//!
//! Pure threshold filtering loses all sensitivity in repeats; rescuing the
//! rarest seed per window keeps a minimal trail through them without
//! readmitting high-frequency noise.

use crate::config::PRINT;
use crate::index::SketchIndex;
use crate::sketch::{Mini, Y_FLT};

/// A candidate match of one query minimizer against the target index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seed {
    /// Copy of the sketch entry's packed `y`; truncated to its low 32 bits
    /// once selection is done.
    pub y: u64,
    /// Occurrences in the target index.
    pub n: u32,
    pub flt: bool,
}

#[inline]
fn weight(s: &Seed) -> u64 {
    ((1u64 << 63) / s.n as u64) >> 34
}

/// Filter seeds above `mid_occ` occurrences, then rescue the maximum-weight
/// (rarest) seed of each sliding window unless it ties with too many
/// others.
fn seed_select(a: &mut [Seed], tie_rescue_w: u32, mid_occ: u32) {
    let n = a.len();
    if n == 0 {
        return;
    }
    for s in a.iter_mut() {
        if s.n > mid_occ {
            s.flt = true;
        }
    }

    let w = tie_rescue_w as usize;
    if n < w {
        return;
    }
    for i in 0..=n - w {
        let (mut max_wt, mut max_i, mut tie) = (0u64, None, 0u32);
        for (j, s) in a[i..i + w].iter().enumerate() {
            let wt = weight(s);
            if wt > max_wt {
                max_wt = wt;
                max_i = Some(i + j);
                tie = 0;
            } else if wt == max_wt {
                tie += 1;
            }
        }
        if tie < tie_rescue_w / 2 {
            if let Some(j) = max_i {
                a[j].flt = false;
            }
        }
    }
}

/// One seed per unfiltered sketch entry with at least one index hit, in
/// sketch order.
fn collect_all(mi: &SketchIndex, mv: &[Mini]) -> Vec<Seed> {
    let mut m = Vec::with_capacity(mv.len());
    for e in mv {
        if e.y >> 62 != 0 {
            continue;
        }
        let occ = mi.occ(e.fprint());
        if occ.is_empty() {
            continue;
        }
        m.push(Seed {
            y: e.y,
            n: occ.len() as u32,
            flt: false,
        });
    }
    m
}

/// Collect candidate matches from the index, run seed selection, and fold
/// the filter verdicts back onto the sketch ([`Y_FLT`] on `y`). Returns the
/// surviving seeds, with `y` truncated to its low 32 bits, and the sum of
/// their occurrence counts.
///
/// Seeds and sketch entries are in matching order by construction, so the
/// merge advances two pointers in lockstep.
pub fn collect_matches(
    mi: &SketchIndex,
    mv: &mut [Mini],
    max_occ: u32,
    tie_rescue_w: u32,
) -> (Vec<Seed>, u64) {
    let mut m = collect_all(mi, mv);
    let n_m = m.len();
    seed_select(&mut m, tie_rescue_w, max_occ);

    let (mut j, mut k) = (0, 0);
    let mut n_a = 0u64;
    for e in mv.iter_mut() {
        if e.y >> 62 != 0 || j >= n_m || m[j].y != e.y {
            continue;
        }
        if m[j].flt {
            e.y |= Y_FLT;
        } else {
            n_a += m[j].n as u64;
            m[k] = m[j];
            k += 1;
        }
        j += 1;
    }
    debug_assert_eq!(j, n_m);
    m.truncate(k);
    for s in m.iter_mut() {
        s.y = s.y as u32 as u64;
    }
    if PRINT {
        eprintln!("seeds kept {k} of {n_m}, occurrences {n_a}");
    }
    (m, n_a)
}
