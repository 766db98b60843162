//! Region-level post-filters for overlap candidates: internal-overlap
//! removal, per-reference subsampling, and divergence estimation.

use log::{debug, warn};

use crate::index::SketchIndex;
use crate::pileup::{comp_hits_pileup, mini_idx_of};
use crate::prelude::min;
use crate::sketch::{IvhIdx, Mini};

/// One overlap candidate between the query and a reference sequence.
#[derive(Clone, Debug)]
pub struct Region {
    pub rid: u32,
    pub rev: bool,
    /// Query interval.
    pub qs: i32,
    pub qe: i32,
    /// Reference interval.
    pub rs: i32,
    pub re: i32,
    /// Chaining score.
    pub score: i32,
    /// Extension score, when base-level alignment ran.
    pub dp_score: Option<i32>,
    /// Offset of the region's anchors in the chain array.
    pub a_off: usize,
    /// Number of anchors.
    pub cnt: i32,
    /// Sketch index of the chain head, set by [`est_err`].
    pub aux: i32,
    /// Estimated divergence; -1 when undefined.
    pub div: f32,
    /// Fraction of the chain's sketch range masked by filters.
    pub frac_flt: f32,
    /// Fraction of the chain's sketch range matched.
    pub frac_hit: f32,
}

impl Default for Region {
    fn default() -> Self {
        Region {
            rid: 0,
            rev: false,
            qs: 0,
            qe: 0,
            rs: 0,
            re: 0,
            score: 0,
            dp_score: None,
            a_off: 0,
            cnt: 0,
            aux: -1,
            div: -1.0,
            frac_flt: 0.0,
            frac_hit: 0.0,
        }
    }
}

/// Drop fully internal overlaps: a region survives if it reaches within
/// `max_ovh` of both sequence ends (full dovetail), or of one end (half
/// dovetail) while spanning at least `min_intl` bases in both dimensions.
pub fn del_full_intl(
    mi: &SketchIndex,
    max_ovh: i32,
    min_intl: i32,
    qlen: i32,
    regs: &mut Vec<Region>,
) {
    regs.retain(|r| {
        let rlen = mi.seqs[r.rid as usize].len as i32;
        let s = r.qs < max_ovh || r.rs < max_ovh;
        let e = r.qe + max_ovh > qlen || r.re + max_ovh > rlen;
        (s && e) || ((s || e) && r.qe - r.qs >= min_intl && r.re - r.rs >= min_intl)
    });
}

/// Estimate per-region divergence from the hit pileup.
///
/// Computes the average k-mer span of the sketch, runs a pileup per region
/// and derives `div = 1 - (n_match / n_tot)^(1 / avg_k)`, charging up to
/// two synthetic misses for unmatched tails long enough to have held a
/// minimizer. Hit counts accumulate into the sketch's `y` scratch for
/// downstream coverage pruning. Regions whose chain head cannot be located
/// keep an undefined divergence.
pub fn est_err(
    mi: &SketchIndex,
    min_cnt: i32,
    qlen: i32,
    regs: &mut [Region],
    a: &[Mini],
    mv: &mut [Mini],
    ivh_idx: &mut [IvhIdx],
) {
    let n = mv.len();
    if n == 0 {
        return;
    }
    let mut sum_k = 0u64;
    for m in mv.iter_mut() {
        sum_k += m.x & 0xff;
        m.y = m.y as u32 as u64;
    }
    let avg_k = sum_k as f32 / n as f32;

    for r in regs.iter_mut() {
        r.div = -1.0;
        if r.cnt == 0 {
            continue;
        }
        r.aux = -1;
        let chain = &a[r.a_off..r.a_off + r.cnt as usize];
        let head = if r.rev { &chain[r.cnt as usize - 1] } else { &chain[0] };
        let Some(st) = mini_idx_of(qlen, head, mv) else {
            warn!("logic inconsistency: chain head has no sketch entry; divergence left undefined");
            continue;
        };
        r.aux = st as i32;
        let l_ref = mi.seqs[r.rid as usize].len as i32;
        let Some(c) = comp_hits_pileup(min_cnt, r.rev, qlen, chain, mv, ivh_idx) else {
            continue;
        };
        r.frac_flt = c.n_flt as f32 / (c.n_flt + c.n_tot) as f32;
        r.frac_hit = c.n_match as f32 / (c.n_flt + c.n_tot) as f32;

        let mut n_tot = c.n_tot;
        if r.qs as f32 > avg_k && r.rs as f32 > avg_k {
            n_tot += 1;
        }
        if (qlen - r.qs) as f32 > avg_k && (l_ref - r.re) as f32 > avg_k {
            n_tot += 1;
        }
        r.div = if c.n_match >= n_tot {
            0.0
        } else {
            (1.0 - (c.n_match as f64 / n_tot as f64).powf(1.0 / avg_k as f64)) as f32
        };
    }
}

/// Subsample overlaps per reference: normalize each region's score by the
/// shorter overlap side, keep at most `best_n` regions per reference, and
/// of those only the ones within `pri_ratio` of the per-reference best.
pub fn select_sub_indv(
    mi: &SketchIndex,
    max_ovh: i32,
    pri_ratio: f32,
    best_n: i32,
    qlen: i32,
    regs: &mut Vec<Region>,
) {
    let n = regs.len();
    if n == 0 {
        return;
    }
    let best_n = if best_n > 0 { best_n - 1 } else { best_n } as i64;

    let mut a = Vec::with_capacity(n);
    for (i, r) in regs.iter().enumerate() {
        let rlen = mi.seqs[r.rid as usize].len as i32;
        let qs = if r.qs < max_ovh { 0 } else { r.qs - max_ovh };
        let qe = if r.qe + max_ovh > qlen { qlen } else { r.qe + max_ovh };
        let rs = if r.rs < max_ovh { 0 } else { r.rs - max_ovh };
        let re = if r.re + max_ovh > rlen { rlen } else { r.re + max_ovh };
        let l = min(qe - qs, re - rs);
        let score = (r.dp_score.unwrap_or(r.score) as f32 * 10000.0 / l as f32 + 0.4999) as i32;
        a.push(((r.rid as u64) << 32 | score as u32 as u64, i));
    }
    radsort::sort_by_key(&mut a, |&(key, _)| key);

    let mut j = 0;
    for i in 0..n {
        if i == n - 1 || a[i].0 >> 32 != a[i + 1].0 >> 32 {
            let s = if (j as i64) + best_n < i as i64 { i as i64 - best_n } else { j as i64 };
            let top = (a[i].0 as u32 as i32) as f32;
            let mut k = i as i64;
            while k >= s {
                if ((a[k as usize].0 as u32 as i32) as f32) < pri_ratio * top {
                    break;
                }
                k -= 1;
            }
            while k >= j as i64 {
                regs[a[k as usize].1].cnt = 0;
                k -= 1;
            }
            j = i + 1;
        }
    }
    regs.retain(|r| r.cnt != 0);
}

/// Debug listing of collected anchors, grouped per reference/strand run.
/// Anchors are expected sorted by reference position.
pub fn dump_seeds(mi: &SketchIndex, qname: &str, qlen: i32, a: &[Mini]) {
    let mut prev = None;
    for s in a {
        let dir_rid = s.x >> 32;
        let rid = (dir_rid & 0x7fff_ffff) as usize;
        if prev != Some(dir_rid) {
            debug!("#ref\t{}\t{}", mi.seqs[rid].name, mi.seqs[rid].len);
            debug!("#query\t{}\t{}", qname, qlen);
            prev = Some(dir_rid);
        }
        debug!(
            "{}\t{}\t{}\t{}\t{}",
            mi.seqs[rid].name,
            s.x as u32 as i32,
            if s.x >> 63 != 0 { '-' } else { '+' },
            qname,
            s.y as u32 as i32
        );
    }
}
