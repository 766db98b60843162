//! Sketch patching: fingerprint grouping, interval extraction, the in-place
//! embedding of pattern signatures, and the IVH index build.

use crate::pattern::{pattern_hash, window_min, IvCell, BND_MARGIN, BND_QRY, IV_SENTINEL};
use crate::sketch::{IvhIdx, IvhOpts, Mini, EMB_SIG_SHIFT, MAX_WING, Y_FLT};

/// Sort key ordering by fingerprint with the span byte demoted: the low 32
/// fingerprint bits take priority over the high 24 (where the pattern
/// signature gets embedded), the span byte comes last. Equal-fingerprint
/// records stay contiguous regardless of span.
#[inline]
fn group_key(x: u64) -> u64 {
    let hl = (x >> 8) as u32 as u64;
    let hu = x >> 40;
    let l = x & 0xff;
    hl << 32 | hu << 8 | l
}

/// Augment a sketched minimizer vector in place and build its IVH index.
///
/// Minimizers are grouped by fingerprint and position-sorted within each
/// group; each group member's 24-bit pattern hash is XORed into the high
/// fingerprint bits of `x`, the high half of `y` is rewritten to point at
/// the member's record in the returned index, and the index records the
/// wing extents used to derive the pattern. A second pass over the patched
/// fingerprint groups marks locally over-dense minimizers with [`Y_FLT`].
/// The sketch comes back sorted by position.
///
/// With fewer than two minimizers the sketch is left untouched and the
/// index is blank.
pub fn patch_sketch(mv: &mut [Mini], qlen: u32, opts: &IvhOpts) -> Vec<IvhIdx> {
    let n = mv.len();
    if n < 2 {
        return vec![IvhIdx::default(); n];
    }
    let wing = opts.wing.min(MAX_WING);

    // remember each record's position-order slot before the group sort
    for (i, m) in mv.iter_mut().enumerate() {
        m.y |= (i as u64) << 32;
    }
    radsort::sort_by_key(mv, |m| group_key(m.x));

    let mut iv = vec![IvCell::default(); n];
    let mut idx = vec![IvhIdx::default(); n];

    let mut last_i = 0;
    for i in 0..n {
        if i == n - 1 || mv[i].x >> 8 != mv[i + 1].x >> 8 {
            let n2 = i + 1 - last_i;
            let mv2 = &mut mv[last_i..=i];
            let idx2 = &mut idx[last_i..=i];
            if n2 >= 2 {
                radsort::sort_by_key(mv2, |m| m.y as u32);
                let v2 = &mut iv[last_i..=i];
                for j in 0..n2 - 1 {
                    let b = mv2[j].qend() as i64;
                    let e = mv2[j + 1].qbeg() as i64;
                    let mut dist = e - b;
                    if dist < 0 {
                        dist = 0;
                    }
                    if dist > opts.max_ivh_span as i64 {
                        dist = 0;
                    }
                    v2[j] = IvCell::new(mv2[j].is_rev(), dist as u32);
                }
                v2[n2 - 1] = IvCell::new(mv2[n2 - 1].is_rev(), 0);
                window_min(v2, wing);
                if opts.skip_bnd {
                    // no hash augmentation close to the query ends; applied
                    // on the query side only, so truncated windows cannot
                    // produce false hits around read boundaries
                    for j in 0..n2 {
                        let b = mv2[j].qbeg() as u32;
                        let e = mv2[j].qend() as u32;
                        let mut mlen = BND_MARGIN.wrapping_mul(v2[j].min_iv);
                        if mlen > opts.max_ivh_span / 2 {
                            mlen = opts.max_ivh_span / 2;
                        }
                        if b < mlen || e + mlen > qlen {
                            v2[j].min_iv = IV_SENTINEL | BND_QRY;
                        }
                    }
                }
                pattern_hash(v2, wing);
                update_hash_and_idx(last_i, mv2, v2, idx2, wing);
            } else {
                blank_idx(last_i, mv2, idx2);
            }
            last_i = i + 1;
        }
    }

    // the frequency filter groups on the patched fingerprints, the same
    // granularity index lookups will see
    radsort::sort_by_key(mv, |m| m.x);
    let mut last_i = 0;
    for i in 0..n {
        if i == n - 1 || mv[i].x >> 8 != mv[i + 1].x >> 8 {
            if i + 1 - last_i >= 2 {
                let mv2 = &mut mv[last_i..=i];
                radsort::sort_by_key(mv2, |m| m.y as u32);
                mark_local_rep(mv2, opts.rep_flt_span, opts.max_rep);
            }
            last_i = i + 1;
        }
    }

    radsort::sort_by_key(mv, |m| m.y as u32); // back to position order
    idx
}

/// Patch one position-sorted fingerprint group and fill its index records.
/// `v` carries the pattern hashes in `min_iv`; the wing pointers rerun the
/// window scan of the hash pass so `fc`/`rc` cover exactly the cells that
/// fed each pattern.
fn update_hash_and_idx(base: usize, mv: &mut [Mini], v: &[IvCell], idx: &mut [IvhIdx], wing: u32) {
    let n = mv.len();
    let wing = wing as usize;
    let (mut s, mut e) = (0, 0);
    for i in 0..n {
        let orig = mv[i].y >> 32;
        let is_brk = v[i].iv == 0;
        while i + wing > e && e < n && v[e].iv != 0 {
            e += 1;
        }
        if s + wing < i {
            s += 1;
        }

        mv[i].x ^= (v[i].min_iv as u64) << EMB_SIG_SHIFT;
        mv[i].y = ((base + i) as u64) << 32 | mv[i].y as u32 as u64;

        idx[i] = IvhIdx {
            fc: (i - s) as u32,
            rc: (e - i) as u32,
            iv: v[i].iv,
            mini_idx: orig as u32,
            is_first: i == 0,
            aux: 0,
        };
        if is_brk {
            s = i + 1;
            e = i + 1;
        }
    }
}

/// Singleton groups carry no pattern; only the back-pointers are kept.
fn blank_idx(base: usize, mv: &mut [Mini], idx: &mut [IvhIdx]) {
    for (i, m) in mv.iter_mut().enumerate() {
        let orig = m.y >> 32;
        m.y = ((base + i) as u64) << 32 | m.y as u32 as u64;
        idx[i] = IvhIdx {
            mini_idx: orig as u32,
            is_first: i == 0,
            ..Default::default()
        };
    }
}

/// Mark members of one position-sorted group whose neighborhood packs
/// `max_rep` or more group members within `rep_flt_span` bases.
fn mark_local_rep(mv: &mut [Mini], rep_flt_span: u32, max_rep: u32) {
    let half = (rep_flt_span / 2) as i32;
    let n = mv.len();
    let (mut s, mut e) = (0, 0);
    for p in 0..n {
        while s < p && mv[s].qbeg() + half <= mv[p].qbeg() {
            s += 1;
        }
        while e < n && mv[p].qend() + half > mv[e].qend() {
            e += 1;
        }
        if (e - s) as u32 >= max_rep {
            mv[p].y |= Y_FLT;
        }
    }
}

/// Drop entries of a position-sorted array whose local density reaches
/// `max_rep` within `rep_flt_span` bases. Entries are packed
/// `pos << 1 | strand` words; order is preserved. A no-op for fewer than
/// two entries or a zero span.
pub fn flt_rep(y: &mut Vec<u64>, rep_flt_span: u32, max_rep: u32) {
    let n = y.len();
    if n < 2 || rep_flt_span == 0 {
        return;
    }
    #[inline]
    fn pos(v: u64) -> u64 {
        v << 1 >> 2
    }
    let half = (rep_flt_span / 2) as u64;
    let (mut s, mut e) = (0, 0);
    for p in 0..n {
        while s < p && pos(y[s]) + half <= pos(y[p]) {
            s += 1;
        }
        while e < n && pos(y[p]) + half > pos(y[e]) {
            e += 1;
        }
        if (e - s) as u32 >= max_rep {
            y[p] |= 1 << 63;
        }
    }
    y.retain(|&v| v >> 63 == 0);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::{pattern_hash, window_min, IvCell};

    /// A sketch of one fingerprint group at the given trailing positions.
    fn group_sketch(fprint: u64, span: u8, ends: &[u32], rev: bool) -> Vec<Mini> {
        ends.iter().map(|&p| Mini::new(fprint, span, p, rev)).collect()
    }

    fn opts(wing: u32) -> IvhOpts {
        IvhOpts {
            wing,
            max_ivh_span: 500,
            rep_flt_span: 0,
            skip_bnd: false,
            ..Default::default()
        }
    }

    #[test]
    fn degenerate_sketches_are_untouched() {
        let mut empty: Vec<Mini> = vec![];
        assert!(patch_sketch(&mut empty, 1000, &opts(2)).is_empty());

        let mut single = group_sketch(7, 15, &[100], false);
        let orig = single.clone();
        let idx = patch_sketch(&mut single, 1000, &opts(2));
        assert_eq!(single, orig);
        assert_eq!(idx, vec![IvhIdx::default()]);
    }

    #[test]
    fn patch_embeds_the_group_patterns() {
        // positions 50 bases apart with span 15 leave 36-base gaps
        let ends = [100u32, 150, 200, 250, 300];
        let mut mv = group_sketch(42, 15, &ends, false);
        let orig = mv.clone();
        patch_sketch(&mut mv, 10_000, &opts(2));

        let mut v: Vec<IvCell> = (0..4).map(|_| IvCell::new(false, 36)).collect();
        v.push(IvCell::new(false, 0));
        window_min(&mut v, 2);
        pattern_hash(&mut v, 2);

        for i in 0..5 {
            assert_eq!(mv[i].x ^ orig[i].x, (v[i].min_iv as u64) << EMB_SIG_SHIFT);
            assert_eq!(mv[i].x & 0xff_ffff_ffff, orig[i].x & 0xff_ffff_ffff);
        }
    }

    #[test]
    fn wing_extents_and_back_pointers() {
        let ends = [100u32, 150, 200, 250, 300];
        let mut mv = group_sketch(42, 15, &ends, false);
        let idx = patch_sketch(&mut mv, 10_000, &opts(2));

        let fc: Vec<u32> = idx.iter().map(|r| r.fc).collect();
        let rc: Vec<u32> = idx.iter().map(|r| r.rc).collect();
        assert_eq!(fc, [0, 1, 2, 2, 2]);
        assert_eq!(rc, [2, 2, 2, 1, 0]);
        assert!(idx[0].is_first && !idx[1].is_first);

        // y's high half points into the index, which points back
        for (j, r) in idx.iter().enumerate() {
            assert_eq!(mv[r.mini_idx as usize].y >> 32, j as u64);
        }
        // position order survives the patch
        assert!(mv.windows(2).all(|w| w[0].qend() <= w[1].qend()));
    }

    #[test]
    fn patch_is_deterministic() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(99);
        let mut pos = 200u32;
        let mut mv: Vec<Mini> = (0..300)
            .map(|_| {
                pos += rng.gen_range(5..120);
                Mini::new(rng.gen_range(0..40u64), 15, pos, rng.gen_bool(0.5))
            })
            .collect();
        let mut mv2 = mv.clone();
        let o = IvhOpts {
            rep_flt_span: 200,
            max_rep: 3,
            skip_bnd: true,
            ..opts(3)
        };
        let idx = patch_sketch(&mut mv, pos + 200, &o);
        let idx2 = patch_sketch(&mut mv2, pos + 200, &o);
        assert_eq!(mv, mv2);
        assert_eq!(idx, idx2);
    }

    #[test]
    fn oversized_gaps_break_the_window() {
        // the 400-base gap exceeds max_ivh_span and splits the group into
        // two independent pattern runs
        let ends = [100u32, 150, 650, 700];
        let mut mv = group_sketch(9, 15, &ends, false);
        let idx = patch_sketch(
            &mut mv,
            10_000,
            &IvhOpts {
                max_ivh_span: 300,
                ..opts(2)
            },
        );
        let rc: Vec<u32> = idx.iter().map(|r| r.rc).collect();
        let fc: Vec<u32> = idx.iter().map(|r| r.fc).collect();
        assert_eq!(rc, [1, 0, 1, 0]);
        assert_eq!(fc, [0, 1, 0, 1]);
    }

    #[test]
    fn dense_group_members_get_masked() {
        // eight members of one group 2 bases apart: everything within a
        // 10-base window is over the cap of 3
        let ends: Vec<u32> = (0..8).map(|i| 100 + 2 * i).collect();
        let mut mv = group_sketch(5, 15, &ends, false);
        let o = IvhOpts {
            rep_flt_span: 10,
            max_rep: 3,
            ..opts(2)
        };
        patch_sketch(&mut mv, 10_000, &o);
        assert!(mv.iter().all(|m| m.y & Y_FLT != 0));

        // spread the same group out and nothing is masked
        let ends: Vec<u32> = (0..8).map(|i| 100 + 40 * i).collect();
        let mut mv = group_sketch(5, 15, &ends, false);
        patch_sketch(&mut mv, 10_000, &o);
        assert!(mv.iter().all(|m| m.y & Y_FLT == 0));
    }

    #[test]
    fn flt_rep_drops_dense_runs() {
        let y = |positions: &[u64]| positions.iter().map(|&p| p << 1).collect::<Vec<_>>();

        let mut a = y(&[0, 2, 4, 6, 8]);
        flt_rep(&mut a, 10, 3);
        assert!(a.is_empty());

        let mut b = y(&[0, 5, 10, 15, 20]);
        flt_rep(&mut b, 10, 3);
        assert_eq!(b, y(&[0, 5, 10, 15, 20]));

        // no-ops
        let mut c = y(&[0, 2]);
        flt_rep(&mut c, 0, 1);
        assert_eq!(c.len(), 2);
        let mut d = y(&[0]);
        flt_rep(&mut d, 10, 1);
        assert_eq!(d.len(), 1);
    }

    #[test]
    fn flt_rep_is_monotone_in_its_knobs() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(3);
        let mut pos = 0u64;
        let base: Vec<u64> = (0..200)
            .map(|_| {
                pos += rng.gen_range(1..30);
                pos << 1 | rng.gen_bool(0.5) as u64
            })
            .collect();

        let survivors = |span: u32, max_rep: u32| {
            let mut v = base.clone();
            flt_rep(&mut v, span, max_rep);
            v.len()
        };
        // tightening the cap only removes entries
        assert!(survivors(100, 2) <= survivors(100, 4));
        assert!(survivors(100, 4) <= survivors(100, 8));
        // widening the window only removes entries
        assert!(survivors(200, 4) <= survivors(100, 4));
        assert!(survivors(400, 4) <= survivors(200, 4));
    }
}
