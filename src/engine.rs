//! Crate `engine` owns every piece of mutable state the BDD engine needs:
//! the node store, the operation cache, the proof writer, and the
//! extension-variable counter. Per the specification's design notes, none
//! of these are process singletons — a single `Engine` value threads them
//! explicitly through every method, in the manner the teacher threads
//! `&mut AssignStack`/`&mut ClauseDB` through its `*IF` trait methods
//! rather than through module-level statics.
use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::node_store::NodeStore;
use crate::op_cache::OpCache;
use crate::proof::{self, ProofWriter, EXT_VAR_BASE};
use crate::types::{ClauseId, NodeId, VarId, FALSE_NODE, TRUE_NODE};

pub struct Engine {
    pub(crate) nodes: NodeStore,
    pub(crate) cache: OpCache,
    pub(crate) proof: Option<ProofWriter>,
    /// GC save stack: intermediate BDD results an in-flight apply
    /// recursion must keep alive despite a zero refcount.
    pub(crate) save_stack: Vec<NodeId>,
    next_xvar: VarId,
    next_clause_counter: ClauseId,
    var_order: Vec<VarId>,
    num_variables: u32,
    /// Recursion depth of the current top-level apply; deferred clause
    /// deletions are flushed only when this returns to zero (§4.4, §5).
    apply_depth: usize,
    /// Shared reference counts on TBDD unit clauses (§4.6): the side table
    /// a `Tbdd`'s `rc_index` refers to, keyed directly by clause ID rather
    /// than by a separate index since clause IDs are already the table's
    /// natural key.
    tbdd_refs: HashMap<ClauseId, u32>,
    xor_seed: u64,
}

impl Engine {
    /// `input_clauses` seeds the proof with the CNF's own clauses (each
    /// becomes clause IDs `2..=input_clauses.len()+1`), matching the
    /// specification's `init` contract (§6): `input_clauses[i-1]` is the
    /// literals of clause `i+1`. Clause `1` is always the reserved axiom
    /// `[TRUE_LIT]` (see below `TERMINAL_VAR`) that every defining clause
    /// mentioning a terminal child ultimately rests on.
    pub fn new(
        config: EngineConfig,
        out: Box<dyn std::io::Write>,
        input_clauses: &[Vec<crate::types::Lit>],
        num_variables: u32,
    ) -> EngineResult<Engine> {
        if num_variables >= EXT_VAR_BASE {
            return Err(EngineError::Var(num_variables));
        }
        let mut proof = config
            .generate_proof
            .then(|| ProofWriter::new(out, config.proof_format, config.binary));
        let mut next_clause_counter: ClauseId = 1;
        if let Some(pw) = proof.as_mut() {
            let axiom = pw
                .add_clause(&[TRUE_LIT], &[])?
                .expect("[TRUE_LIT] is a unit clause, never tautological");
            debug_assert_eq!(axiom, next_clause_counter);
            next_clause_counter += 1;
            for clause in input_clauses {
                let id = pw
                    .add_clause(clause, &[])?
                    .ok_or_else(|| EngineError::Proof("input clause was tautological".into()))?;
                debug_assert_eq!(id, next_clause_counter);
                next_clause_counter += 1;
            }
        } else {
            next_clause_counter += 1 + input_clauses.len() as ClauseId;
        }
        Ok(Engine {
            nodes: NodeStore::new(
                config.initial_nodes,
                config.growth_factor,
                config.max_nodes,
                config.gc_dead_fraction,
            ),
            cache: OpCache::new(config.cache_size),
            proof,
            save_stack: Vec::new(),
            next_xvar: EXT_VAR_BASE + 1,
            next_clause_counter,
            var_order: config.var_order,
            num_variables,
            apply_depth: 0,
            tbdd_refs: HashMap::new(),
            xor_seed: config.xor_seed,
        })
    }

    pub fn xor_seed(&self) -> u64 {
        self.xor_seed
    }

    /// Record one more owner of the TBDD unit clause `id` (§4.6: "their
    /// destructor decrements the shared refcount").
    pub fn tbdd_retain(&mut self, id: ClauseId) {
        *self.tbdd_refs.entry(id).or_insert(0) += 1;
    }

    /// Drop one owner of `id`; on the last one, queue the unit clause for
    /// deletion rather than deleting it immediately, matching every other
    /// deferred-deletion path in the engine.
    pub fn tbdd_release(&mut self, id: ClauseId) {
        if let Some(count) = self.tbdd_refs.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.tbdd_refs.remove(&id);
                self.defer_delete(id);
            }
        }
    }

    /// Entered on every apply/quantify call, including recursive ones.
    pub fn enter_apply(&mut self) {
        self.apply_depth += 1;
    }

    /// Exited on every apply/quantify return. Flushes deferred clause
    /// deletions only once the outermost call returns.
    pub fn exit_apply(&mut self) -> EngineResult<()> {
        self.apply_depth -= 1;
        if self.apply_depth == 0 {
            self.process_deferred()?;
            self.maybe_collect_garbage();
        }
        Ok(())
    }

    pub fn var_counter(&self) -> VarId {
        self.next_xvar
    }

    pub fn clause_counter(&self) -> ClauseId {
        self.next_clause_counter
    }

    pub fn level_of(&self, v: VarId) -> u64 {
        if self.var_order.is_empty() {
            v as u64
        } else {
            self.var_order.get((v as usize).saturating_sub(1)).copied().unwrap_or(v) as u64
        }
    }

    pub fn rank_of(&self, lit: crate::types::Lit) -> u64 {
        proof::literal_rank(lit, |v| self.level_of(v))
    }

    /// The extra GC roots the node store cannot discover on its own: the
    /// apply save stack plus whatever the operation cache still points at.
    fn extra_roots(&self) -> Vec<NodeId> {
        let mut roots = self.save_stack.clone();
        roots.extend(self.cache.live_node_refs());
        roots
    }

    /// Create (or find) the node for `(level, low, high)`. Probes the
    /// hash-cons table first; only on a genuine miss does this allocate a
    /// fresh extension variable and emit the node's four Shannon-expansion
    /// defining clauses, before the node is linked into the store,
    /// satisfying invariant I5 (defining clauses precede any clause
    /// mentioning the node's `xvar`). A hit returns the existing node
    /// untouched: the whole point of hash-consing is that structurally
    /// identical apply results share one extension variable, not one per
    /// call site.
    pub fn make_node(&mut self, level: VarId, low: NodeId, high: NodeId) -> EngineResult<NodeId> {
        if let Some(id) = self.nodes.probe(level, low, high) {
            return Ok(id);
        }
        let proof_alloc = if self.proof.is_some() {
            let xvar = self.next_xvar;
            self.next_xvar += 1;
            let first = self.emit_defining_clauses(xvar, level, low, high)?;
            Some((xvar, first))
        } else {
            None
        };
        let extra_roots = self.extra_roots();
        self.nodes.make_node(level, low, high, proof_alloc, &extra_roots, self.proof.as_mut())
    }

    fn emit_defining_clauses(
        &mut self,
        n: VarId,
        v: VarId,
        low: NodeId,
        high: NodeId,
    ) -> EngineResult<ClauseId> {
        use crate::types::VarIdEncoding;
        let high_lit = node_xvar_lit(self, high);
        let low_lit = node_xvar_lit(self, low);
        let n_pos = n.pos_lit();
        let n_neg = n.neg_lit();
        let v_pos = v.pos_lit();
        let v_neg = v.neg_lit();

        let pw = self.proof.as_mut().expect("proof enabled");
        // HU: n ∨ ¬v ∨ ¬xvar(high)
        let hu = pw
            .add_clause(&[n_pos, v_neg, negate(high_lit)], &[])?
            .expect("HU is never tautological: n, v, high's xvar are three distinct variables");
        // LU: n ∨ v ∨ ¬xvar(low)
        pw.add_clause(&[n_pos, v_pos, negate(low_lit)], &[])?;
        // HD: ¬n ∨ ¬v ∨ xvar(high)
        pw.add_clause(&[n_neg, v_neg, high_lit], &[])?;
        // LD: ¬n ∨ v ∨ xvar(low)
        pw.add_clause(&[n_neg, v_pos, low_lit], &[])?;
        Ok(hu)
    }

    pub fn push_save(&mut self, id: NodeId) {
        self.save_stack.push(id);
    }

    pub fn pop_save(&mut self) {
        self.save_stack.pop();
    }

    pub fn save_stack_mark(&self) -> usize {
        self.save_stack.len()
    }

    pub fn save_stack_restore(&mut self, mark: usize) {
        self.save_stack.truncate(mark);
    }

    /// Run garbage collection now, regardless of the proactive threshold.
    pub fn collect_garbage(&mut self) -> usize {
        let extra = self.extra_roots();
        self.nodes.collect_garbage(&extra, self.proof.as_mut())
    }

    pub fn maybe_collect_garbage(&mut self) {
        if self.nodes.should_collect() {
            let n = self.collect_garbage();
            log::debug!("engine: proactive gc collected {n} nodes");
        }
    }

    /// Flush deferred clause deletions. Called at every top-level apply
    /// return (§4.4, §5).
    pub fn process_deferred(&mut self) -> EngineResult<()> {
        if let Some(pw) = self.proof.as_mut() {
            pw.process_deferred()?;
        }
        Ok(())
    }

    pub fn finalize_proof(&mut self) -> EngineResult<()> {
        if let Some(pw) = self.proof.as_mut() {
            pw.finalize()?;
        }
        Ok(())
    }

    pub fn num_variables(&self) -> u32 {
        self.num_variables
    }

    pub fn node_low(&self, id: NodeId) -> NodeId {
        self.nodes.low(id)
    }

    pub fn node_high(&self, id: NodeId) -> NodeId {
        self.nodes.high(id)
    }

    pub fn node_level(&self, id: NodeId) -> VarId {
        self.nodes.level(id)
    }

    pub fn node_xvar(&self, id: NodeId) -> VarId {
        self.nodes.xvar(id)
    }

    pub fn add_ref(&mut self, id: NodeId) {
        self.nodes.add_ref(id);
    }

    pub fn del_ref(&mut self, id: NodeId) {
        self.nodes.del_ref(id);
    }

    pub fn node_store_ref(&self) -> &NodeStore {
        &self.nodes
    }

    pub fn proof_enabled(&self) -> bool {
        self.proof.is_some()
    }

    pub fn proof_mut(&mut self) -> Option<&mut ProofWriter> {
        self.proof.as_mut()
    }

    pub fn proof_add_clause(
        &mut self,
        lits: &[crate::types::Lit],
        hints: &[ClauseId],
    ) -> EngineResult<Option<ClauseId>> {
        match self.proof.as_mut() {
            Some(pw) => pw.add_clause(lits, hints),
            None => Ok(None),
        }
    }

    pub fn proof_clause_literals(&self, id: ClauseId) -> Option<Vec<crate::types::Lit>> {
        self.proof.as_ref().and_then(|pw| pw.clause_literals(id))
    }

    /// ID of the reserved `[TRUE_LIT]` axiom every RUP check must carry as
    /// a hint whenever one of its premises mentions a terminal's literal
    /// (`TRUE_LIT`/`FALSE_LIT` otherwise name an unconstrained variable to
    /// the checker). `None` when proof generation is disabled.
    pub fn terminal_axiom_id(&self) -> Option<ClauseId> {
        self.proof.as_ref().map(|_| 1)
    }

    pub fn defer_delete(&mut self, id: ClauseId) {
        if let Some(pw) = self.proof.as_mut() {
            pw.defer_delete(id);
        }
    }
}

fn negate(lit: crate::types::Lit) -> crate::types::Lit {
    use crate::types::LiteralEncoding;
    lit.negate()
}

/// The literal naming `node`'s function. `TRUE_NODE`/`FALSE_NODE` have no
/// extension variable of their own (no node was ever allocated for them),
/// so they're named by the reserved `TRUE_LIT`/`FALSE_LIT` constants below
/// instead of an `xvar` lookup.
fn node_xvar_lit(engine: &Engine, node: NodeId) -> crate::types::Lit {
    use crate::types::VarIdEncoding;
    if node == TRUE_NODE {
        TRUE_LIT
    } else if node == FALSE_NODE {
        FALSE_LIT
    } else {
        engine.nodes.xvar(node).pos_lit()
    }
}

/// A reserved extension variable whose positive literal is definitionally
/// true, used so the TRUE/FALSE terminals can be named by a literal like
/// any other node without a special case at every call site.
pub const TERMINAL_VAR: VarId = EXT_VAR_BASE;
pub const TRUE_LIT: crate::types::Lit = (TERMINAL_VAR << 1) as crate::types::Lit;
pub const FALSE_LIT: crate::types::Lit = TRUE_LIT ^ 1;
