//! Crate `node_store` provides the hash-consed BDD node table: creation,
//! reference counting, mark-and-sweep garbage collection, and dynamic
//! resizing.
//!
//! Grounded on the teacher's `clause_manage.rs` (free-list reuse discipline)
//! and on the `ite`/`add_node`/`purge_retain` shape of OBDDimal's
//! `bdd_manager.rs` in the retrieval pack for the cofactor/GC structure.
use bitflags::bitflags;

use crate::error::{EngineError, EngineResult};
use crate::proof::ProofWriter;
use crate::types::{ClauseId, NodeId, VarId, FALSE_NODE, TRUE_NODE};

/// Saturating cap on a node's reference count.
pub const MAX_REF: u16 = 1023;

/// Sentinel "no next" hash-chain link.
const NIL: NodeId = NodeId::MAX;

/// Terminal nodes are given a level past any real variable, so invariant
/// I2 ("children have a strictly larger level than their parent") holds
/// uniformly without special-casing terminals in comparisons.
const TERMINAL_LEVEL: VarId = VarId::MAX;

bitflags! {
    #[derive(Clone, Copy)]
    pub struct NodeFlag: u8 {
        const MARKED = 0b0000_0001;
        const FREE   = 0b0000_0010;
    }
}

/// Which of a node's four Shannon-expansion defining clauses is meant.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DefiningClause {
    /// `n ∨ ¬v ∨ ¬xvar(high)`
    HighUp,
    /// `n ∨ v ∨ ¬xvar(low)`
    LowUp,
    /// `¬n ∨ ¬v ∨ xvar(high)`
    HighDown,
    /// `¬n ∨ v ∨ xvar(low)`
    LowDown,
}

impl DefiningClause {
    fn offset(self) -> u64 {
        match self {
            DefiningClause::HighUp => 0,
            DefiningClause::LowUp => 1,
            DefiningClause::HighDown => 2,
            DefiningClause::LowDown => 3,
        }
    }
}

#[derive(Clone)]
struct Node {
    level: VarId,
    low: NodeId,
    high: NodeId,
    refcount: u16,
    flags: NodeFlag,
    next: NodeId,
    /// Extension variable naming this node's function; 0 when proof
    /// generation is disabled.
    xvar: VarId,
    /// First of four consecutive defining-clause IDs; 0 when absent.
    dclause: ClauseId,
}

impl Node {
    fn terminal() -> Node {
        Node {
            level: TERMINAL_LEVEL,
            low: NIL,
            high: NIL,
            refcount: MAX_REF,
            flags: NodeFlag::empty(),
            next: NIL,
            xvar: 0,
            dclause: 0,
        }
    }
}

pub struct NodeStore {
    nodes: Vec<Node>,
    hash_table: Vec<NodeId>,
    table_mask: u32,
    free_list: Vec<NodeId>,
    next_fresh: NodeId,
    capacity: usize,
    max_nodes: usize,
    growth_factor: f64,
    gc_dead_fraction: f64,
}

impl NodeStore {
    pub fn new(initial_nodes: usize, growth_factor: f64, max_nodes: usize, gc_dead_fraction: f64) -> NodeStore {
        let capacity = initial_nodes.max(4);
        let mut nodes = Vec::with_capacity(capacity);
        nodes.push(Node::terminal()); // FALSE
        nodes.push(Node::terminal()); // TRUE
        let table_size = capacity.next_power_of_two().max(8);
        NodeStore {
            nodes,
            hash_table: vec![NIL; table_size],
            table_mask: (table_size - 1) as u32,
            free_list: Vec::new(),
            next_fresh: 2,
            capacity,
            max_nodes,
            growth_factor,
            gc_dead_fraction,
        }
    }

    pub fn level(&self, id: NodeId) -> VarId {
        self.nodes[id as usize].level
    }

    pub fn low(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].low
    }

    pub fn high(&self, id: NodeId) -> NodeId {
        self.nodes[id as usize].high
    }

    pub fn is_terminal(&self, id: NodeId) -> bool {
        id == FALSE_NODE || id == TRUE_NODE
    }

    pub fn xvar(&self, id: NodeId) -> VarId {
        self.nodes[id as usize].xvar
    }

    pub fn defining_clause(&self, id: NodeId, which: DefiningClause) -> ClauseId {
        let base = self.nodes[id as usize].dclause;
        debug_assert_ne!(base, 0, "node has no defining clauses (proof disabled?)");
        base + which.offset()
    }

    pub fn add_ref(&mut self, id: NodeId) {
        let n = &mut self.nodes[id as usize];
        if n.refcount < MAX_REF {
            n.refcount += 1;
        }
    }

    pub fn del_ref(&mut self, id: NodeId) {
        let n = &mut self.nodes[id as usize];
        if n.refcount > 0 && n.refcount < MAX_REF {
            n.refcount -= 1;
        }
    }

    pub fn refcount(&self, id: NodeId) -> u16 {
        self.nodes[id as usize].refcount
    }

    fn hash_key(level: VarId, low: NodeId, high: NodeId) -> u64 {
        // A simple odd-constant mixing hash, in the spirit of the
        // golden-ratio multiplicative hashing used by varisat's proof hasher.
        let mut h = level as u64;
        h = h.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(low as u64);
        h = h.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(high as u64);
        h ^ (h >> 29)
    }

    fn slot(&self, level: VarId, low: NodeId, high: NodeId) -> usize {
        (Self::hash_key(level, low, high) as u32 & self.table_mask) as usize
    }

    /// Probes the hash-cons table without allocating. Callers that need to
    /// emit proof artifacts only upon a genuine allocation (extension
    /// variable, defining clauses) should probe first and skip that work
    /// entirely on a hit.
    pub fn probe(&self, level: VarId, low: NodeId, high: NodeId) -> Option<NodeId> {
        if low == high {
            return Some(low);
        }
        self.find(level, low, high)
    }

    fn find(&self, level: VarId, low: NodeId, high: NodeId) -> Option<NodeId> {
        let mut cur = self.hash_table[self.slot(level, low, high)];
        while cur != NIL {
            let n = &self.nodes[cur as usize];
            if n.level == level && n.low == low && n.high == high {
                return Some(cur);
            }
            cur = n.next;
        }
        None
    }

    fn insert_chain(&mut self, id: NodeId) {
        let s = self.slot(self.nodes[id as usize].level, self.nodes[id as usize].low, self.nodes[id as usize].high);
        self.nodes[id as usize].next = self.hash_table[s];
        self.hash_table[s] = id;
    }

    fn remove_chain(&mut self, id: NodeId) {
        let n = &self.nodes[id as usize];
        let s = self.slot(n.level, n.low, n.high);
        let mut cur = self.hash_table[s];
        if cur == id {
            self.hash_table[s] = n.next;
            return;
        }
        while cur != NIL {
            let next = self.nodes[cur as usize].next;
            if next == id {
                self.nodes[cur as usize].next = self.nodes[id as usize].next;
                return;
            }
            cur = next;
        }
    }

    fn dead_fraction(&self) -> f64 {
        if self.next_fresh <= 2 {
            return 0.0;
        }
        let allocated = (self.next_fresh - 2) as f64;
        self.free_list.len() as f64 / allocated
    }

    /// Attempt to find a free slot, running GC and then resizing as needed.
    /// `extra_roots` are node IDs that must survive GC despite a zero
    /// refcount (the apply save stack and live operation-cache entries).
    fn reserve_slot(
        &mut self,
        extra_roots: &[NodeId],
        proof: Option<&mut ProofWriter>,
    ) -> EngineResult<NodeId> {
        if let Some(id) = self.free_list.pop() {
            return Ok(id);
        }
        if (self.next_fresh as usize) < self.capacity {
            let id = self.next_fresh;
            self.next_fresh += 1;
            return Ok(id);
        }
        // Table full: try GC first.
        let collected = self.collect_garbage(extra_roots, proof);
        log::debug!("node_store: gc collected {collected} nodes");
        if let Some(id) = self.free_list.pop() {
            return Ok(id);
        }
        // Still full: grow.
        let new_capacity = ((self.capacity as f64) * self.growth_factor).ceil() as usize;
        if new_capacity > self.max_nodes {
            log::error!("node_store: cannot grow past max_nodes={}", self.max_nodes);
            return Err(EngineError::NodeNum);
        }
        self.resize(new_capacity);
        log::debug!("node_store: resized to {new_capacity} nodes");
        let id = self.next_fresh;
        self.next_fresh += 1;
        Ok(id)
    }

    fn resize(&mut self, new_capacity: usize) {
        self.capacity = new_capacity;
        let table_size = new_capacity.next_power_of_two().max(8);
        self.hash_table = vec![NIL; table_size];
        self.table_mask = (table_size - 1) as u32;
        // Rebuild every chain under the new table size.
        let ids: Vec<NodeId> = (2..self.next_fresh)
            .filter(|&id| !self.nodes[id as usize].flags.contains(NodeFlag::FREE))
            .collect();
        for id in ids {
            self.insert_chain(id);
        }
    }

    /// Create (or find) the node for `(level, low, high)`. If `low == high`
    /// the apply reduction rule applies and that shared child is returned
    /// directly rather than allocating. `proof_alloc`, when proof
    /// generation is enabled, supplies the already-allocated extension
    /// variable and the ID of the first of the four defining clauses that
    /// the caller has already written to the proof stream for this node.
    pub fn make_node(
        &mut self,
        level: VarId,
        low: NodeId,
        high: NodeId,
        proof_alloc: Option<(VarId, ClauseId)>,
        extra_roots: &[NodeId],
        proof: Option<&mut ProofWriter>,
    ) -> EngineResult<NodeId> {
        if low == high {
            return Ok(low);
        }
        debug_assert!(
            self.is_terminal(low) || self.level(low) > level,
            "I2 violated: low child must have a larger level"
        );
        debug_assert!(
            self.is_terminal(high) || self.level(high) > level,
            "I2 violated: high child must have a larger level"
        );
        if let Some(id) = self.find(level, low, high) {
            return Ok(id);
        }
        let id = self.reserve_slot(extra_roots, proof)?;
        let (xvar, dclause) = proof_alloc.unwrap_or((0, 0));
        self.nodes[id as usize] = Node {
            level,
            low,
            high,
            refcount: 0,
            flags: NodeFlag::empty(),
            next: NIL,
            xvar,
            dclause,
        };
        self.insert_chain(id);
        Ok(id)
    }

    fn mark_reachable(&mut self, root: NodeId) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if self.is_terminal(id) {
                continue;
            }
            let n = &mut self.nodes[id as usize];
            if n.flags.contains(NodeFlag::MARKED) {
                continue;
            }
            n.flags.insert(NodeFlag::MARKED);
            stack.push(n.low);
            stack.push(n.high);
        }
    }

    /// Mark-and-sweep collection. Roots are every node with a positive
    /// refcount plus `extra_roots` (apply's save stack and live cache
    /// entries, supplied by the engine since the store has no visibility
    /// into either). Defining clauses of collected nodes are queued for
    /// deferred deletion through `proof`, never deleted immediately (a
    /// hint in use by an in-flight RUP check must not vanish mid-apply).
    pub fn collect_garbage(&mut self, extra_roots: &[NodeId], proof: Option<&mut ProofWriter>) -> usize {
        for n in self.nodes.iter_mut() {
            n.flags.remove(NodeFlag::MARKED);
        }
        let roots: Vec<NodeId> = (2..self.next_fresh)
            .filter(|&id| {
                let n = &self.nodes[id as usize];
                !n.flags.contains(NodeFlag::FREE) && n.refcount > 0
            })
            .collect();
        for r in roots {
            self.mark_reachable(r);
        }
        for &r in extra_roots {
            self.mark_reachable(r);
        }
        let dead: Vec<NodeId> = (2..self.next_fresh)
            .filter(|&id| {
                let n = &self.nodes[id as usize];
                !n.flags.contains(NodeFlag::FREE) && !n.flags.contains(NodeFlag::MARKED)
            })
            .collect();
        let mut proof = proof;
        for &id in &dead {
            self.remove_chain(id);
            let dclause = self.nodes[id as usize].dclause;
            if dclause != 0 {
                if let Some(pw) = proof.as_deref_mut() {
                    for off in 0..4 {
                        pw.defer_delete(dclause + off);
                    }
                }
            }
            self.nodes[id as usize].flags.insert(NodeFlag::FREE);
            self.free_list.push(id);
        }
        dead.len()
    }

    pub fn live_node_count(&self) -> usize {
        (self.next_fresh as usize) - 2 - self.free_list.len()
    }

    /// Whether the dead-node fraction has crossed the configured
    /// proactive-GC threshold (§4.2: "gc() runs when dead-node fraction
    /// exceeds a threshold").
    pub fn should_collect(&self) -> bool {
        self.dead_fraction() >= self.gc_dead_fraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> NodeStore {
        NodeStore::new(64, 2.0, 1 << 20, 0.25)
    }

    #[test]
    fn make_node_is_hash_consed() {
        let mut s = store();
        let a = s.make_node(5, FALSE_NODE, TRUE_NODE, None, &[], None).unwrap();
        let b = s.make_node(5, FALSE_NODE, TRUE_NODE, None, &[], None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn make_node_reduces_equal_children() {
        let mut s = store();
        let id = s.make_node(5, TRUE_NODE, TRUE_NODE, None, &[], None).unwrap();
        assert_eq!(id, TRUE_NODE);
    }

    #[test]
    fn distinct_triples_get_distinct_ids() {
        let mut s = store();
        let a = s.make_node(5, FALSE_NODE, TRUE_NODE, None, &[], None).unwrap();
        let b = s.make_node(4, FALSE_NODE, a, None, &[], None).unwrap();
        assert_ne!(a, b);
        assert_eq!(s.level(b), 4);
        assert_eq!(s.high(b), a);
    }

    #[test]
    fn gc_reclaims_unreferenced_nodes() {
        let mut s = store();
        let a = s.make_node(5, FALSE_NODE, TRUE_NODE, None, &[], None).unwrap();
        s.add_ref(a);
        let _b = s.make_node(4, FALSE_NODE, a, None, &[], None).unwrap();
        // b has refcount 0 and is not in extra_roots: collectible.
        let collected = s.collect_garbage(&[], None);
        assert_eq!(collected, 1);
        assert_eq!(s.live_node_count(), 1);
    }

    #[test]
    fn gc_keeps_extra_roots_alive() {
        let mut s = store();
        let a = s.make_node(5, FALSE_NODE, TRUE_NODE, None, &[], None).unwrap();
        let b = s.make_node(4, FALSE_NODE, a, None, &[], None).unwrap();
        let collected = s.collect_garbage(&[b], None);
        assert_eq!(collected, 0);
        assert_eq!(s.live_node_count(), 2);
    }
}
