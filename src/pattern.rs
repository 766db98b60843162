//! Pattern synthesis: windowed gap minima and the 24-bit interval hash.
//!
//! Every minimizer gets a signature computed from a strand-oriented window
//! of quantized gaps to its group neighbors. The signature is
//! locality-sensitive: small perturbations of the gaps leave most window
//! positions unchanged, and a minimizer hashes identically to its reverse
//! complement.

use crate::index::SketchIndex;
use crate::sketch::MAX_WING;

/// Sentinel `min_iv`: bit 31 set, low two bits select the boundary class.
pub(crate) const IV_SENTINEL: u32 = 1 << 31;
/// Sentinel class: too close to a query boundary.
pub(crate) const BND_QRY: u32 = 1;
/// Sentinel class: too close to a target boundary.
pub(crate) const BND_TGT: u32 = 2;

/// Boundary margin in units of the windowed minimum gap.
pub(crate) const BND_MARGIN: u32 = 3;

/// Per-position mixing constants, indexed by the quantized gap. Entries
/// correspond to gap ratios 1.0 through 9.0 in steps of 0.25; the values
/// are frozen, since they define the on-disk hash format.
static HASH: [u64; 33] = [
    0x58ea1ee2, 0x41fc3e80, 0x3462e86b, 0x4cbf6848, 0x7bf817f0, 0x19b6c2ea,
    0x69d22ca3, 0x5c49da04, 0x0ad06df1, 0x2161a558, 0x297f67ac, 0x32c2ea11,
    0x2d5b49ac, 0x155f803c, 0x1584e4b5, 0x7431ccd0, 0x23faf39d, 0x1f1f17ac,
    0x57064bd2, 0x0f00cf1c, 0x43390b8b, 0x36cee8a8, 0x173a7857, 0x1862821e,
    0x4c669812, 0x7643748c, 0x4d550e1c, 0x7a1d81ba, 0x675497e1, 0x16ede062,
    0x1b6d09a3, 0x2fe1504d, 0x2fa2328b,
];

/// Substitute hashes for sentinel minima: singleton, query boundary,
/// target boundary. Frozen like [`HASH`].
static BND: [u64; 3] = [0, 0xfd2adec3, 0xba102f14];

/// Synthesis view of one minimizer while its pattern is being computed.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct IvCell {
    pub is_rev: bool,
    /// Gap to the next minimizer in the group; 0 marks a window break.
    pub iv: u32,
    /// Windowed minimum gap, bit 31 flagging a sentinel; overwritten with
    /// the 24-bit pattern hash by [`pattern_hash`].
    pub min_iv: u32,
}

impl IvCell {
    pub(crate) fn new(is_rev: bool, iv: u32) -> Self {
        IvCell {
            is_rev,
            iv,
            min_iv: IV_SENTINEL,
        }
    }
}

/// Sliding minimum of `iv` over windows of `2 * wing` elements, stopping at
/// window breaks. A new minimum is propagated back onto the current window;
/// evicting the minimum rescans the window. Cells at a break keep the
/// running minimum, and a fresh window starts behind them; windows that
/// never see a gap (singleton groups) are left at the sentinel.
pub(crate) fn window_min(v: &mut [IvCell], wing: u32) {
    let n = v.len();
    if n == 0 {
        return;
    }
    let w1 = 2 * wing as usize;
    let mut min = IV_SENTINEL;
    let mut j = 0;
    for i in 0..n - 1 {
        if v[i].iv == 0 {
            v[i].min_iv = min;
            min = IV_SENTINEL;
            j = i + 1;
        } else if v[i].iv < min {
            min = v[i].iv;
            if j + w1 + 1 <= i {
                j += 1;
            }
            let skip_first = (j + w1 == i) as usize;
            for k in j + skip_first..=i {
                if min < v[k].min_iv {
                    v[k].min_iv = min;
                }
            }
        } else {
            if j + w1 + 1 <= i {
                if v[j].iv == min {
                    min = IV_SENTINEL;
                    for k in j + 1..=i {
                        if v[k].iv < min {
                            min = v[k].iv;
                        }
                    }
                }
                j += 1;
            }
            v[i].min_iv = min;
        }
    }
    v[n - 1].min_iv = min;
}

/// Reduce each cell's gap window to a 24-bit hash, written back over
/// `min_iv`.
///
/// Gaps are quantized against the cell's windowed minimum (quarter units,
/// rounded; the unsigned underflow for gaps below the minimum clamps to the
/// top table entry) and XOR-mixed with per-position constants. The shift
/// origin runs from the window edge nearer the group start on the forward
/// strand and mirrors on the reverse strand, so a minimizer and its reverse
/// complement hash identically. Sentinel cells take a fixed boundary hash
/// instead.
pub(crate) fn pattern_hash(v: &mut [IvCell], wing: u32) {
    let n = v.len();
    let w2 = wing as usize;
    let (mut b, mut e) = (0, 0);
    for i in 0..n {
        let is_rev = v[i].is_rev;
        let d = (v[i].min_iv >> 2) as u64;
        let rc = d >> 1;
        let mut h = 0u64;

        while e < i + w2 && e < n && v[e].iv != 0 {
            e += 1;
        }
        if b + w2 < i {
            b += 1;
        }
        let mut s = (if !is_rev { b + w2 - i } else { i + w2 - e }) as u32;
        if v[i].min_iv >> 31 == 0 {
            let mut q = [0u64; 2 * MAX_WING as usize];
            for j in 0..e - b {
                q[j] = if d > 0 {
                    ((v[b + j].iv as u64 + rc) / d).wrapping_sub(4)
                } else {
                    0
                };
            }
            for j in 0..e - b {
                let p = q[if is_rev { e - b - j - 1 } else { j }];
                h ^= HASH[if p > 31 { 31 } else { p as usize }].wrapping_shl(s);
                s += 1;
            }
        } else {
            h = BND[(v[i].min_iv & 3) as usize];
        }
        v[i].min_iv = (h & 0xffffff) as u32; // min_iv field reused for the hash

        if v[i].iv == 0 {
            b = i + 1;
            e = i + 1;
        }
    }
}

/// Compute pattern hashes for a position array `y` (entries packed as
/// `seq_id << 32 | pos << 1 | strand`, position-sorted per sequence) and
/// count the distinct hash values.
///
/// `out` receives one word per position, `hash << 32 | original_index`,
/// sorted. Gaps longer than `max_ivh_span` (including jumps between
/// sequences) break the window. With fewer than two positions or
/// `wing == 0` this is a no-op returning 1.
pub fn compute_hash(
    mi: &SketchIndex,
    y: &[u64],
    wing: u32,
    max_ivh_span: u32,
    k: u32,
    out: &mut Vec<u64>,
) -> usize {
    let n = y.len();
    if n < 2 || wing == 0 {
        return 1;
    }
    let wing = wing.min(MAX_WING);

    let mut v = Vec::with_capacity(n);
    for i in 0..n - 1 {
        let b = (y[i] >> 1) as i64;
        let e = (y[i + 1] >> 1) as i64 - k as i64;
        let mut dist = e - b;
        if dist < 0 {
            dist = 0;
        }
        if dist > max_ivh_span as i64 {
            dist = 0;
        }
        v.push(IvCell::new(y[i] & 1 != 0, dist as u32));
    }
    v.push(IvCell::new(y[n - 1] & 1 != 0, 0));
    window_min(&mut v, wing);
    if mi.skip_bnd {
        // suppress hashes too close to the sequence ends; such windows are
        // truncated and would otherwise collide across unrelated reads
        for i in 0..n {
            let e = (y[i] as u32) >> 1;
            let qlen = mi.seqs[(y[i] >> 32) as usize].len;
            let mut mlen = BND_MARGIN.wrapping_mul(v[i].min_iv);
            if mlen > max_ivh_span / 2 {
                mlen = max_ivh_span / 2;
            }
            if e < mlen || e + mlen > qlen {
                v[i].min_iv = IV_SENTINEL | BND_TGT;
            }
        }
    }
    pattern_hash(&mut v, wing);

    out.clear();
    out.extend((0..n).map(|i| (v[i].min_iv as u64) << 32 | i as u64));
    radsort::sort(out);
    let mut n_hash = 0;
    for i in 0..n {
        if i == n - 1 || out[i] >> 32 != out[i + 1] >> 32 {
            n_hash += 1;
        }
    }
    n_hash
}

#[cfg(test)]
mod test {
    use super::*;

    fn cells(gaps: &[u32], rev: bool) -> Vec<IvCell> {
        gaps.iter().map(|&g| IvCell::new(rev, g)).collect()
    }

    fn minima(gaps: &[u32], wing: u32) -> Vec<u32> {
        let mut v = cells(gaps, false);
        window_min(&mut v, wing);
        v.iter().map(|c| c.min_iv).collect()
    }

    /// Bound the two-pointer pass is checked against: a cell's final
    /// minimum never exceeds any gap within `wing` cells on either side of
    /// it, inside its own window run.
    fn check_bounds(gaps: &[u32], wing: u32) {
        let n = gaps.len();
        let got = minima(gaps, wing);
        let w = wing as usize;
        let mut start = 0;
        for i in 0..n {
            if got[i] >> 31 == 0 {
                let lo = i.saturating_sub(w).max(start);
                for j in lo..i {
                    assert!(got[i] <= gaps[j], "minimum {} above gap {} at {j} (center {i})", got[i], gaps[j]);
                }
                for j in i..=(i + w).min(n - 1) {
                    if gaps[j] == 0 {
                        break;
                    }
                    assert!(got[i] <= gaps[j], "minimum {} above gap {} at {j} (center {i})", got[i], gaps[j]);
                }
            }
            if gaps[i] == 0 {
                start = i + 1;
            }
        }
    }

    #[test]
    fn uniform_gaps() {
        // five minimizers 50 bases apart
        assert_eq!(minima(&[50, 50, 50, 50, 0], 2), [50; 5]);
    }

    #[test]
    fn spike_in_the_middle() {
        assert_eq!(minima(&[10, 100, 10, 0], 1), [10; 4]);
    }

    #[test]
    fn eviction_rescans() {
        // the initial minimum leaves the window at cell 3, forcing a
        // rescan; the later drop to 5 propagates back into the window
        assert_eq!(minima(&[10, 100, 100, 100, 5, 0], 1), [10, 10, 10, 5, 5, 5]);
    }

    #[test]
    fn singleton_keeps_sentinel() {
        assert_eq!(minima(&[0], 2), [IV_SENTINEL]);
        assert_eq!(minima(&[0, 0, 0], 2), [IV_SENTINEL; 3]);
    }

    #[test]
    fn window_bound_holds_on_random_gaps() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let n = rng.gen_range(2..40);
            let mut gaps: Vec<u32> = (0..n - 1)
                .map(|_| if rng.gen_bool(0.1) { 0 } else { rng.gen_range(1..500) })
                .collect();
            gaps.push(0);
            for wing in [1, 2, 4] {
                check_bounds(&gaps, wing);
            }
        }
    }

    #[test]
    fn uniform_group_hashes() {
        let mut v = cells(&[50, 50, 50, 50, 0], false);
        window_min(&mut v, 2);
        pattern_hash(&mut v, 2);
        // every gap quantizes to 0; only the window shape varies per cell
        let h0 = HASH[0];
        let exp = |shifts: &[u32]| {
            (shifts.iter().fold(0u64, |h, &s| h ^ h0 << s) & 0xffffff) as u32
        };
        assert_eq!(v[0].min_iv, exp(&[2, 3]));
        assert_eq!(v[1].min_iv, exp(&[1, 2, 3]));
        assert_eq!(v[2].min_iv, exp(&[0, 1, 2, 3]));
        assert_eq!(v[3].min_iv, exp(&[0, 1, 2]));
        assert_eq!(v[4].min_iv, exp(&[0, 1]));
    }

    #[test]
    fn strand_flip_mirrors_hashes() {
        // a reverse-complemented read sees the same gaps in reverse order,
        // so cell i must hash like forward cell n-1-i. Gaps are chosen so
        // the windowed minima are themselves mirror-symmetric.
        let fwd_gaps = [80u32, 40, 80, 0];
        let rev_gaps = [80u32, 40, 80, 0]; // the reversal of [80, 40, 80]
        for wing in [1u32, 2, 3] {
            let mut f = cells(&fwd_gaps, false);
            window_min(&mut f, wing);
            pattern_hash(&mut f, wing);
            let mut r = cells(&rev_gaps, true);
            window_min(&mut r, wing);
            pattern_hash(&mut r, wing);
            let n = f.len();
            for i in 0..n {
                assert_eq!(f[i].min_iv, r[n - 1 - i].min_iv, "wing {wing} cell {i}");
            }
        }
    }

    #[test]
    fn sub_minimum_gap_clamps_high() {
        // a gap far below the windowed minimum quantizes under 4; the
        // unsigned underflow must clamp to the top table entry, not wrap
        // into the table
        let mut v = cells(&[400, 400, 3, 0], false);
        for c in v.iter_mut() {
            c.min_iv = 400;
        }
        pattern_hash(&mut v, 1);
        // cell 2's window spans gaps {400, 3} with shifts starting at 0
        let (d, rc) = (400u64 >> 2, 400u64 >> 3);
        assert_eq!(((400 + rc) / d).wrapping_sub(4), 0);
        assert!(((3 + rc) / d).wrapping_sub(4) > 31);
        let exp = (HASH[0] ^ HASH[31] << 1) & 0xffffff;
        assert_eq!(v[2].min_iv as u64, exp);
    }

    #[test]
    fn sentinel_takes_boundary_hash() {
        let mut v = cells(&[50, 50, 0], false);
        v[1].min_iv = IV_SENTINEL | BND_QRY;
        v[0].min_iv = 50;
        v[2].min_iv = 50;
        pattern_hash(&mut v, 1);
        assert_eq!(v[1].min_iv as u64, BND[1] & 0xffffff);
    }
}
