//! Dynamic range-point index: point keys queried by a half-open rank range.
//!
//! Same skeleton as the stabbing tree with the roles of intervals and points
//! swapped: a key `k` is stored in every node on its leaf-to-root path, and
//! a query `[l, r)` decomposes into a canonical cover of disjoint nodes.
//! Each key inside the range sits in exactly one cover bucket (despite being
//! stored on all of its ancestors), so bucket sizes over the cover both
//! count the range exactly and drive uniform sampling: pick a bucket with
//! probability proportional to its size, then a uniform entry inside it.
//!
//! The cover is materialized left-to-right so report order is deterministic.

use super::{leaf_span, log2_pow2, EmptySelection};
use crate::rng::Rng;

const INVALID_RANK: u32 = u32::MAX;

/// Upper bound on canonical cover size (`2*log2(p) + 2`).
const MAX_COVER: usize = 128;

#[derive(Clone, Copy, Debug)]
struct Entry {
    handle: u32,
    /// Level on the leaf-to-root path (0 = leaf); the node index is implicit
    /// from the stored rank and the level.
    backref: u32,
}

/// Dynamic multiset of rank keys with range count / report / sample.
#[derive(Clone, Debug, Default)]
pub struct RangePointTree {
    num_handles: u32,
    m: u32,
    p: u32,
    max_refs: u32,

    buckets: Vec<Vec<Entry>>,
    pos_in_node: Vec<u32>,
    placement_len: Vec<u32>,
    rank_of_handle: Vec<u32>,
}

impl RangePointTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the skeleton for `num_handles` handles over ranks `[0, m)`.
    pub fn init(&mut self, num_handles: u32, num_ranks: u32) {
        self.num_handles = num_handles;
        self.m = num_ranks;
        self.p = leaf_span(num_ranks);

        self.buckets.clear();
        self.buckets.resize_with(2 * self.p as usize, Vec::new);

        // Leaf-to-root path length, root inclusive.
        self.max_refs = log2_pow2(self.p) + 1;

        self.placement_len = vec![0; num_handles as usize];
        self.pos_in_node = vec![0; num_handles as usize * self.max_refs as usize];
        self.rank_of_handle = vec![INVALID_RANK; num_handles as usize];
    }

    /// Drops all active keys but keeps the skeleton.
    pub fn reset_active(&mut self) {
        for b in &mut self.buckets {
            b.clear();
        }
        self.placement_len.fill(0);
        self.rank_of_handle.fill(INVALID_RANK);
    }

    /// Inserts key `rank` for `handle`; the handle must not be active.
    pub fn insert(&mut self, handle: u32, rank: u32) {
        debug_assert!(handle < self.num_handles);
        debug_assert!(rank < self.m);
        debug_assert_eq!(self.placement_len[handle as usize], 0);

        self.rank_of_handle[handle as usize] = rank;

        let mut backref = 0u32;
        let mut idx = rank + self.p;
        while idx > 0 {
            let bucket = &mut self.buckets[idx as usize];
            let pos = bucket.len() as u32;
            bucket.push(Entry { handle, backref });
            self.pos_in_node[handle as usize * self.max_refs as usize + backref as usize] = pos;
            backref += 1;
            idx >>= 1;
        }
        debug_assert!(backref <= self.max_refs);
        self.placement_len[handle as usize] = backref;
    }

    /// Removes `handle` from its whole leaf-to-root path.
    pub fn erase(&mut self, handle: u32) {
        debug_assert!(handle < self.num_handles);
        let len = self.placement_len[handle as usize];
        if len == 0 {
            return;
        }

        let rank = self.rank_of_handle[handle as usize];
        debug_assert!(rank != INVALID_RANK && rank < self.m);

        let mut idx = rank + self.p;
        for backref in 0..len {
            let pos =
                self.pos_in_node[handle as usize * self.max_refs as usize + backref as usize];
            self.remove_from_node(idx, pos);
            idx >>= 1;
        }

        self.placement_len[handle as usize] = 0;
        self.rank_of_handle[handle as usize] = INVALID_RANK;
    }

    /// Exact number of active keys in `[l, r)` (clamped into `[0, m]`).
    pub fn count_range(&self, l: u32, r: u32) -> u64 {
        if self.m == 0 || r <= l {
            return 0;
        }
        let l = l.min(self.m);
        let r = r.min(self.m);
        if r <= l {
            return 0;
        }

        let mut lo = l + self.p;
        let mut hi = r + self.p;
        let mut total = 0u64;
        while lo < hi {
            if lo & 1 == 1 {
                total += self.buckets[lo as usize].len() as u64;
                lo += 1;
            }
            if hi & 1 == 1 {
                hi -= 1;
                total += self.buckets[hi as usize].len() as u64;
            }
            lo >>= 1;
            hi >>= 1;
        }
        total
    }

    /// Appends every active handle with key in `[l, r)`, cover buckets
    /// left-to-right, insertion order inside each bucket.
    pub fn report_range(&self, l: u32, r: u32, out: &mut Vec<u32>) {
        if self.m == 0 || r <= l {
            return;
        }
        let l = l.min(self.m);
        let r = r.min(self.m);
        if r <= l {
            return;
        }

        let mut cover = [0u32; MAX_COVER];
        let n = self.decompose_ordered(l, r, &mut cover);
        for &node in &cover[..n] {
            for e in &self.buckets[node as usize] {
                out.push(e.handle);
            }
        }
    }

    /// Draws `k` handles i.i.d. uniform over the keys in `[l, r)`.
    ///
    /// Fails iff the range holds no keys while `k > 0`.
    pub fn sample_range(
        &self,
        l: u32,
        r: u32,
        k: u32,
        rng: &mut Rng,
        out: &mut Vec<u32>,
    ) -> Result<(), EmptySelection> {
        out.clear();
        if k == 0 {
            return Ok(());
        }
        if self.m == 0 || r <= l {
            return Err(EmptySelection);
        }
        let l = l.min(self.m);
        let r = r.min(self.m);
        if r <= l {
            return Err(EmptySelection);
        }
        out.reserve(k as usize);

        let mut cover = [0u32; MAX_COVER];
        let cover_n = self.decompose_ordered(l, r, &mut cover);

        // Keep only non-empty buckets.
        let mut nodes = [0u32; MAX_COVER];
        let mut weights = [0u64; MAX_COVER];
        let mut n = 0usize;
        let mut total = 0u64;
        for &node in &cover[..cover_n] {
            let w = self.buckets[node as usize].len() as u64;
            if w == 0 {
                continue;
            }
            nodes[n] = node;
            weights[n] = w;
            total += w;
            n += 1;
        }
        if total == 0 {
            return Err(EmptySelection);
        }

        for _ in 0..k {
            let x = rng.uniform_u64(total);
            let mut cum = 0u64;
            let mut bi = 0usize;
            while bi < n {
                cum += weights[bi];
                if x < cum {
                    break;
                }
                bi += 1;
            }
            if bi >= n {
                bi = n - 1;
            }
            let bucket = &self.buckets[nodes[bi] as usize];
            let pos = rng.uniform_u32(bucket.len() as u32) as usize;
            out.push(bucket[pos].handle);
        }
        Ok(())
    }

    /// Canonical cover of `[l, r)`, disjoint and ordered left-to-right.
    fn decompose_ordered(&self, l: u32, r: u32, out: &mut [u32; MAX_COVER]) -> usize {
        debug_assert!(l < r);

        let mut lo = l + self.p;
        let mut hi = r + self.p;

        let mut left = [0u32; MAX_COVER];
        let mut right = [0u32; MAX_COVER];
        let mut ln = 0usize;
        let mut rn = 0usize;

        while lo < hi {
            if lo & 1 == 1 {
                left[ln] = lo;
                ln += 1;
                lo += 1;
            }
            if hi & 1 == 1 {
                hi -= 1;
                right[rn] = hi;
                rn += 1;
            }
            lo >>= 1;
            hi >>= 1;
        }

        debug_assert!(ln + rn <= MAX_COVER);
        out[..ln].copy_from_slice(&left[..ln]);
        for i in 0..rn {
            out[ln + i] = right[rn - 1 - i];
        }
        ln + rn
    }

    fn remove_from_node(&mut self, node: u32, pos: u32) {
        let bucket = &mut self.buckets[node as usize];
        debug_assert!((pos as usize) < bucket.len());

        let last = bucket.len() - 1;
        if pos as usize != last {
            let moved = bucket[last];
            bucket[pos as usize] = moved;
            self.pos_in_node
                [moved.handle as usize * self.max_refs as usize + moved.backref as usize] = pos;
        }
        bucket.pop();
    }
}
