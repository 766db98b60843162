//! A minimal sketch index: the reference sequence table plus k-mer
//! occurrence buckets built from a patched reference sketch.
//!
//! Because the bucket keys are *patched* fingerprints, a lookup implicitly
//! requires the query minimizer's pattern signature to agree with the
//! reference's. The index is read-only once built.

use itertools::Itertools;

use crate::prelude::HashMap;
use crate::sketch::Mini;

/// One indexed reference sequence.
#[derive(Clone, Debug)]
pub struct SeqInfo {
    pub name: String,
    pub len: u32,
}

pub struct SketchIndex {
    pub seqs: Vec<SeqInfo>,
    /// Suppress pattern hashing near sequence boundaries on the target
    /// side.
    pub skip_bnd: bool,
    /// K-mer length the sketches were built with.
    pub k: u32,
    /// Fingerprint to its `pos` range.
    idx: HashMap<u64, (u32, u32)>,
    /// Packed `y` words of all indexed minimizers, grouped by fingerprint
    /// and position-sorted within each group.
    pos: Vec<u64>,
}

impl SketchIndex {
    /// Index a patched reference sketch.
    ///
    /// In three steps: collect `(fingerprint, y)` pairs, radix-sort them by
    /// position then fingerprint, and map each fingerprint to its slice.
    pub fn build(seqs: Vec<SeqInfo>, k: u32, skip_bnd: bool, mv: &[Mini]) -> Self {
        let mut kmers = mv.iter().map(|m| (m.fprint(), m.y)).collect_vec();
        radsort::sort_by_key(&mut kmers, |&(_, y)| y as u32);
        radsort::sort_by_key(&mut kmers, |&(f, _)| f);

        let mut idx = HashMap::default();
        idx.reserve(kmers.len());
        let mut start = 0u32;
        for (key, group) in &kmers.iter().group_by(|&&(f, _)| f) {
            let cnt = group.count() as u32;
            idx.insert(key, (start, start + cnt));
            start += cnt;
        }
        let pos = kmers.into_iter().map(|(_, y)| y).collect_vec();
        SketchIndex {
            seqs,
            skip_bnd,
            k,
            idx,
            pos,
        }
    }

    /// An empty index over the given sequence table; useful when only the
    /// sequence lengths matter.
    pub fn new(seqs: Vec<SeqInfo>, k: u32, skip_bnd: bool) -> Self {
        Self::build(seqs, k, skip_bnd, &[])
    }

    /// The packed `y` words of a fingerprint's occurrences, position-sorted.
    pub fn occ(&self, fprint: u64) -> &[u64] {
        match self.idx.get(&fprint) {
            Some(&(s, e)) => &self.pos[s as usize..e as usize],
            None => &[],
        }
    }

    pub fn n_mini(&self) -> usize {
        self.pos.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn seqs() -> Vec<SeqInfo> {
        vec![SeqInfo {
            name: "ref0".into(),
            len: 10_000,
        }]
    }

    #[test]
    fn buckets_group_and_sort_occurrences() {
        let mv = [
            Mini::new(7, 15, 500, false),
            Mini::new(3, 15, 100, false),
            Mini::new(7, 15, 200, true),
            Mini::new(7, 15, 900, false),
        ];
        let mi = SketchIndex::build(seqs(), 15, false, &mv);
        assert_eq!(mi.n_mini(), 4);
        assert_eq!(mi.occ(3).to_vec(), vec![100u64 << 1]);
        let sevens = mi.occ(7);
        assert_eq!(sevens.len(), 3);
        assert!(sevens.windows(2).all(|w| w[0] as u32 <= w[1] as u32));
        assert!(mi.occ(999).is_empty());
    }

    #[test]
    fn empty_index_answers_lookups() {
        let mi = SketchIndex::new(seqs(), 15, true);
        assert_eq!(mi.n_mini(), 0);
        assert!(mi.occ(0).is_empty());
        assert!(mi.skip_bnd);
    }
}
