//! Dynamic stabbing index: intervals queried by a point.
//!
//! A complete binary segment tree over `p = next_pow2(m)` leaves. Inserting
//! an interval `[l, r)` appends a `(handle, backref)` entry to the bucket of
//! every node in its canonical O(log m) cover; the entry's position inside
//! each bucket is mirrored in a per-handle side table so erase can
//! swap-delete from the same buckets without searching. A point query `q`
//! walks the leaf-to-root path of leaf `q`: exactly the nodes whose cover
//! could contain `q`, so summing bucket sizes yields the exact stabbing
//! count.
//!
//! Sampling draws a bucket on that path with probability proportional to its
//! size (prefix-sum walk over at most `MAX_PATH` buckets) and then a uniform
//! entry inside the bucket, which makes every stabbing interval equally
//! likely per draw, independently across draws.

use super::{leaf_span, log2_pow2, EmptySelection};
use crate::rng::Rng;

const INVALID_RANK: u32 = u32::MAX;

/// Upper bound on leaf-to-root path length (`log2(p) + 1`, p fits in u32).
const MAX_PATH: usize = 64;

#[derive(Clone, Copy, Debug)]
struct Entry {
    handle: u32,
    backref: u32,
}

/// Dynamic set of half-open rank intervals with point-stab queries.
#[derive(Clone, Debug, Default)]
pub struct StabbingTree {
    num_handles: u32,
    m: u32,
    p: u32,
    max_refs: u32,

    /// Bucket per node; nodes are 1-based, leaves at `p..p+m`.
    buckets: Vec<Vec<Entry>>,
    /// Position of `(handle, backref)` inside its node bucket.
    pos_in_node: Vec<u32>,
    /// Number of cover nodes each handle currently occupies (0 = inactive).
    placement_len: Vec<u32>,
    /// Stored endpoints, needed to recompute the cover on erase.
    lo_rank: Vec<u32>,
    hi_rank: Vec<u32>,
}

impl StabbingTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the skeleton for `num_handles` handles over ranks `[0, m)`.
    pub fn init(&mut self, num_handles: u32, num_ranks: u32) {
        self.num_handles = num_handles;
        self.m = num_ranks;
        self.p = leaf_span(num_ranks);

        self.buckets.clear();
        self.buckets
            .resize_with(2 * self.p as usize, Vec::new);

        // An interval decomposes into at most 2*log2(p) cover nodes.
        self.max_refs = 2 * log2_pow2(self.p) + 4;

        self.placement_len = vec![0; num_handles as usize];
        self.pos_in_node = vec![0; num_handles as usize * self.max_refs as usize];
        self.lo_rank = vec![INVALID_RANK; num_handles as usize];
        self.hi_rank = vec![INVALID_RANK; num_handles as usize];
    }

    /// Drops all active intervals but keeps the skeleton.
    pub fn reset_active(&mut self) {
        for b in &mut self.buckets {
            b.clear();
        }
        self.placement_len.fill(0);
        self.lo_rank.fill(INVALID_RANK);
        self.hi_rank.fill(INVALID_RANK);
    }

    /// Inserts interval `[l, r)` (clamped into `[0, m]`) for `handle`.
    ///
    /// The handle must not already be active.
    pub fn insert(&mut self, handle: u32, l: u32, r: u32) {
        debug_assert!(handle < self.num_handles);
        debug_assert_eq!(self.placement_len[handle as usize], 0);

        if self.m == 0 {
            return;
        }
        let l = l.min(self.m);
        let r = r.min(self.m);
        if r <= l {
            return;
        }

        self.lo_rank[handle as usize] = l;
        self.hi_rank[handle as usize] = r;

        let mut lo = l + self.p;
        let mut hi = r + self.p;
        while lo < hi {
            if lo & 1 == 1 {
                self.add_to_node(handle, lo);
                lo += 1;
            }
            if hi & 1 == 1 {
                hi -= 1;
                self.add_to_node(handle, hi);
            }
            lo >>= 1;
            hi >>= 1;
        }
    }

    /// Removes `handle` from every cover bucket in O(log m).
    pub fn erase(&mut self, handle: u32) {
        debug_assert!(handle < self.num_handles);
        let len = self.placement_len[handle as usize];
        if len == 0 {
            return;
        }

        let l = self.lo_rank[handle as usize];
        let r = self.hi_rank[handle as usize];
        debug_assert!(l != INVALID_RANK && r != INVALID_RANK && l < r);

        // Walk the same cover in the same order as insert; backrefs were
        // assigned in that order.
        let mut lo = l + self.p;
        let mut hi = r + self.p;
        let mut backref = 0u32;
        while lo < hi {
            if lo & 1 == 1 {
                let pos = self.pos_in_node[self.placement_index(handle, backref)];
                self.remove_from_node(lo, pos);
                backref += 1;
                lo += 1;
            }
            if hi & 1 == 1 {
                hi -= 1;
                let pos = self.pos_in_node[self.placement_index(handle, backref)];
                self.remove_from_node(hi, pos);
                backref += 1;
            }
            lo >>= 1;
            hi >>= 1;
        }
        debug_assert_eq!(backref, len);

        self.placement_len[handle as usize] = 0;
        self.lo_rank[handle as usize] = INVALID_RANK;
        self.hi_rank[handle as usize] = INVALID_RANK;
    }

    /// Exact number of active intervals containing rank `q`.
    pub fn count(&self, q: u32) -> u64 {
        if self.m == 0 || q >= self.m {
            return 0;
        }
        let mut total = 0u64;
        let mut idx = q + self.p;
        while idx > 0 {
            total += self.buckets[idx as usize].len() as u64;
            idx >>= 1;
        }
        total
    }

    /// Appends every active handle containing `q` to `out`.
    ///
    /// Order: leaf-to-root over path nodes, insertion order within each
    /// bucket. Deterministic for a fixed insert/erase history.
    pub fn report(&self, q: u32, out: &mut Vec<u32>) {
        if self.m == 0 || q >= self.m {
            return;
        }
        let mut idx = q + self.p;
        while idx > 0 {
            for e in &self.buckets[idx as usize] {
                out.push(e.handle);
            }
            idx >>= 1;
        }
    }

    /// Draws `k` handles i.i.d. uniform over the intervals stabbing `q`.
    ///
    /// Fails iff the stabbed set is empty while `k > 0`.
    pub fn sample(
        &self,
        q: u32,
        k: u32,
        rng: &mut Rng,
        out: &mut Vec<u32>,
    ) -> Result<(), EmptySelection> {
        out.clear();
        if k == 0 {
            return Ok(());
        }
        if self.m == 0 || q >= self.m {
            return Err(EmptySelection);
        }
        out.reserve(k as usize);

        // Collect non-empty buckets on the path, allocation-free.
        let mut nodes = [0u32; MAX_PATH];
        let mut weights = [0u64; MAX_PATH];
        let mut n = 0usize;
        let mut total = 0u64;

        let mut idx = q + self.p;
        while idx > 0 {
            let w = self.buckets[idx as usize].len() as u64;
            if w > 0 {
                debug_assert!(n < MAX_PATH);
                nodes[n] = idx;
                weights[n] = w;
                total += w;
                n += 1;
            }
            idx >>= 1;
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

    #[inline]
    fn placement_index(&self, handle: u32, backref: u32) -> usize {
        handle as usize * self.max_refs as usize + backref as usize
    }

    fn add_to_node(&mut self, handle: u32, node: u32) {
        let backref = self.placement_len[handle as usize];
        debug_assert!(backref < self.max_refs);

        let bucket = &mut self.buckets[node as usize];
        let pos = bucket.len() as u32;
        bucket.push(Entry { handle, backref });

        self.pos_in_node[handle as usize * self.max_refs as usize + backref as usize] = pos;
        self.placement_len[handle as usize] = backref + 1;
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
