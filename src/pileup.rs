//! Hit pileup: reconstruct which minimizers a chain touched and spread hits
//! through shared pattern windows.
//!
//! A minimizer counts as hit if it anchors the chain itself or if it lies
//! in the wing of one that does: neighbors inside the same pattern window
//! contributed to the matched signature even when chaining skipped them.

use crate::sketch::{IvhIdx, Mini};

/// Counters produced by one pileup pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PileupCounts {
    /// Sketch entries masked by the frequency/select filters.
    pub n_flt: i32,
    /// Unfiltered sketch entries in the chain's range.
    pub n_tot: i32,
    /// Unfiltered entries hit directly or through a wing.
    pub n_match: i32,
}

/// An anchor's query position reverted to the forward strand.
#[inline]
pub(crate) fn for_qpos(qlen: i32, a: &Mini) -> i32 {
    let x = a.y as u32 as i32;
    let q_span = (a.y >> 32 & 0xff) as i32;
    if a.x >> 63 != 0 {
        qlen - 1 - (x + 1 - q_span)
    } else {
        x
    }
}

/// Locate an anchor's sketch entry by binary search over the
/// position-sorted sketch.
pub(crate) fn mini_idx_of(qlen: i32, a: &Mini, mv: &[Mini]) -> Option<usize> {
    let x = for_qpos(qlen, a);
    let (mut l, mut r) = (0i64, mv.len() as i64 - 1);
    while l <= r {
        let m = ((l + r) >> 1) as usize;
        let y = (mv[m].y as u32 as i32) >> 1;
        if y < x {
            l = m as i64 + 1;
        } else if y > x {
            r = m as i64 - 1;
        } else {
            return Some(m);
        }
    }
    None
}

/// Reconstruct the hit pileup of one chain.
///
/// Walks the sketch from the chain's first anchor, marking every entry the
/// chain hits; propagates each hit across its index record's wings so
/// neighbors sharing the pattern window count as matched; then tallies
/// filtered, total and matched entries over the walked range. Chains of at
/// least `min_cnt` anchors additionally bump a saturating per-minimizer hit
/// counter in `y`. All transient flags are restored before returning.
///
/// Returns `None` when the first anchor has no sketch entry.
pub fn comp_hits_pileup(
    min_cnt: i32,
    rev: bool,
    qlen: i32,
    chain: &[Mini],
    mv: &mut [Mini],
    idx: &mut [IvhIdx],
) -> Option<PileupCounts> {
    let n = mv.len();
    let cnt = chain.len();
    let first = if rev { &chain[cnt - 1] } else { &chain[0] };
    let st = mini_idx_of(qlen, first, mv)?;

    // mark the anchors' own entries
    let mut i = st;
    let mut j = 0;
    while i < n && j < cnt {
        let a = if rev { &chain[cnt - 1 - j] } else { &chain[j] };
        if for_qpos(qlen, a) == (mv[i].y as u32 as i32) >> 1 {
            mv[i].y |= 1 << 63;
            j += 1;
        }
        i += 1;
    }
    let en = i;

    // project hits into group order; idx is sorted by fingerprint group
    for r in 0..n {
        idx[r].aux = (mv[idx[r].mini_idx as usize].y >> 63) as u8;
    }
    // spread across the wings
    for r in 0..n {
        if idx[r].aux == 0 {
            continue;
        }
        for w in r - idx[r].fc as usize..=r + idx[r].rc as usize {
            idx[w].aux |= 2;
        }
    }
    // and copy the widened hits back
    for r in 0..n {
        mv[idx[r].mini_idx as usize].y |= ((idx[r].aux >> 1) as u64) << 63;
    }

    let mut c = PileupCounts::default();
    for m in &mut mv[st..en] {
        if m.y >> 62 & 1 != 0 {
            c.n_flt += 1;
            continue;
        }
        c.n_tot += 1;
        if m.y >> 63 == 0 {
            continue;
        }
        c.n_match += 1;
        if cnt as i32 >= min_cnt && (m.y >> 32) & 0x3fff_ffff < 0x3fff_ffff {
            m.y += 1 << 32;
        }
    }

    for r in 0..n {
        mv[r].y = mv[r].y << 1 >> 1;
        idx[r].aux = 0;
    }
    Some(c)
}
