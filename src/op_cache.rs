//! Crate `op_cache` provides the direct-mapped operation cache that
//! memoizes recursive apply results and, in proof mode, the clause that
//! justifies each entry.
//!
//! Slot/eviction bookkeeping is grounded on the teacher's `cdb/watch.rs`
//! (`WatchDBIF::register`/`detach`, a single-vector-slot discipline); the
//! smallest-prime-≥-N sizing is native to the specification (§4.3).
use crate::proof::ProofWriter;
use crate::types::{ClauseId, NodeId, OpCode};

#[derive(Clone, Copy)]
struct CacheEntry {
    a: NodeId,
    b: NodeId,
    c: NodeId,
    op: OpCode,
    result: NodeId,
    justification: Option<ClauseId>,
}

pub struct OpCache {
    table: Vec<Option<CacheEntry>>,
    size: usize,
}

/// Smallest prime ≥ `n`, used to size the direct-mapped table so the
/// triple-pair hash spreads across slots instead of aliasing on powers of
/// two.
pub fn bdd_prime_gte(n: usize) -> usize {
    fn is_prime(x: usize) -> bool {
        if x < 2 {
            return false;
        }
        if x % 2 == 0 {
            return x == 2;
        }
        let mut d = 3;
        while d * d <= x {
            if x % d == 0 {
                return false;
            }
            d += 2;
        }
        true
    }
    let mut x = n.max(2);
    while !is_prime(x) {
        x += 1;
    }
    x
}

impl OpCache {
    pub fn new(requested: usize) -> OpCache {
        let size = bdd_prime_gte(requested.max(8));
        OpCache {
            table: vec![None; size],
            size,
        }
    }

    fn hash(a: NodeId, b: NodeId, c: NodeId, op: OpCode) -> u64 {
        let op_tag = op as u64;
        let mut h = a as u64;
        h = h.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(b as u64);
        h = h.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(c as u64);
        h = h.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(op_tag);
        h
    }

    fn slot(&self, a: NodeId, b: NodeId, c: NodeId, op: OpCode) -> usize {
        (Self::hash(a, b, c, op) % self.size as u64) as usize
    }

    /// Looks up `(a, b, c, op)`; returns the memoized result and, when
    /// present, the clause ID that justifies it.
    pub fn lookup(&self, a: NodeId, b: NodeId, c: NodeId, op: OpCode) -> Option<(NodeId, Option<ClauseId>)> {
        let s = self.slot(a, b, c, op);
        match self.table[s] {
            Some(e) if e.a == a && e.b == b && e.c == c && e.op == op => Some((e.result, e.justification)),
            _ => None,
        }
    }

    /// Insert a result, evicting whatever collided in this slot. The
    /// evicted entry's justifying clause (if any) is deferred for deletion
    /// rather than deleted immediately — it may still be in use as a hint
    /// by an in-flight RUP check.
    pub fn insert(
        &mut self,
        a: NodeId,
        b: NodeId,
        c: NodeId,
        op: OpCode,
        result: NodeId,
        justification: Option<ClauseId>,
        proof: Option<&mut ProofWriter>,
    ) {
        let s = self.slot(a, b, c, op);
        if let Some(victim) = self.table[s].take() {
            if let (Some(j), Some(pw)) = (victim.justification, proof) {
                pw.defer_delete(j);
            }
        }
        self.table[s] = Some(CacheEntry {
            a,
            b,
            c,
            op,
            result,
            justification,
        });
    }

    /// Invalidate every entry (e.g. on node-store resize), deferring
    /// deletion of any justifying clauses.
    pub fn reset(&mut self, mut proof: Option<&mut ProofWriter>) {
        for slot in self.table.iter_mut() {
            if let Some(e) = slot.take() {
                if let (Some(j), Some(pw)) = (e.justification, proof.as_deref_mut()) {
                    pw.defer_delete(j);
                }
            }
        }
    }

    /// Node IDs referenced by still-live entries: GC roots the store has
    /// no other way to discover, since the cache is a performance hint,
    /// not part of the owned graph.
    pub fn live_node_refs(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for e in self.table.iter().flatten() {
            out.push(e.a);
            out.push(e.b);
            out.push(e.c);
            out.push(e.result);
        }
        out
    }
}
