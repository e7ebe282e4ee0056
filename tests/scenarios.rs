//! End-to-end scenarios exercising the public API across module
//! boundaries: building TBDDs from CNF clauses, conjoining them,
//! detecting unsatisfiability, XOR-chain infeasibility, the defining-clause
//! discipline, GC correctness, and the apply justification machinery.
use std::collections::HashSet;

use tbuddy_core::apply::{apply_and, exists};
use tbuddy_core::config::EngineConfig;
use tbuddy_core::engine::Engine;
use tbuddy_core::node_store::DefiningClause;
use tbuddy_core::tbdd::Tbdd;
use tbuddy_core::types::{VarIdEncoding, FALSE_NODE, TRUE_NODE};
use tbuddy_core::xor::{XorConstraint, XorSet};

fn engine_with(clauses: &[Vec<u32>], num_variables: u32) -> Engine {
    Engine::new(EngineConfig::new(), Box::new(Vec::new()), clauses, num_variables).unwrap()
}

/// Scenario 1: `{(1 2), (-1 2)}` conjoined yields the BDD for `x2`, and the
/// unit clause the conjunction asserts is exactly `[2]` (dimacs: positive
/// occurrence of variable 2).
#[test]
fn scenario_single_clause_conjunction_yields_x2() {
    let mut e = engine_with(&[vec![2, 4], vec![3, 4]], 2);
    let t1 = Tbdd::from_clause_id(&mut e, 2).unwrap();
    let t2 = Tbdd::from_clause_id(&mut e, 3).unwrap();
    let conj = Tbdd::and(&mut e, &t1, &t2).unwrap();

    let canonical_x2 = e.make_node(2, FALSE_NODE, TRUE_NODE).unwrap();
    assert_eq!(conj.root, canonical_x2);

    let id = conj.clause_id.expect("conjunction asserts a unit clause");
    let lits = e.proof_clause_literals(id).unwrap();
    assert_eq!(lits, vec![4]); // int2lit(2) == 4: positive occurrence of x2

    t1.release(&mut e);
    t2.release(&mut e);
    conj.release(&mut e);
    e.finalize_proof().unwrap();
}

/// Scenario 2: `{(1), (-1)}` is unsatisfiable. Conjoining the two TBDDs
/// yields `FALSE` and asserts the empty clause, the standard end-of-proof
/// marker.
#[test]
fn scenario_unsatisfiable_cnf_derives_empty_clause() {
    let mut e = engine_with(&[vec![2], vec![3]], 1);
    let t1 = Tbdd::from_clause_id(&mut e, 2).unwrap();
    let t2 = Tbdd::from_clause_id(&mut e, 3).unwrap();
    let conj = Tbdd::and(&mut e, &t1, &t2).unwrap();

    assert_eq!(conj.root, FALSE_NODE);
    let id = conj.clause_id.expect("contradiction asserts a clause");
    assert_eq!(e.proof_clause_literals(id), Some(Vec::new()));
    assert!(e.proof_mut().unwrap().empty_clause_id().is_some());

    t1.release(&mut e);
    t2.release(&mut e);
    conj.release(&mut e);
    e.finalize_proof().unwrap();
}

/// Scenario 3: four XOR constraints over eight variables, chosen so their
/// sum cancels every variable and leaves `0 = 1`.
#[test]
fn scenario_xor_chain_sums_to_infeasible() {
    let mut e = engine_with(&[], 8);

    let unit_xor = |e: &mut Engine, vars: &[u32], phase: u8| -> XorConstraint {
        let hints: Vec<_> = vars
            .iter()
            .filter_map(|&v| e.proof_add_clause(&[v.pos_lit()], &[]).unwrap())
            .collect();
        let validation = Tbdd::from_xor(e, vars, phase, &hints).unwrap();
        XorConstraint { variables: vars.to_vec(), phase, validation }
    };

    let c1 = unit_xor(&mut e, &[1, 2], 1);
    let c2 = unit_xor(&mut e, &[3, 4], 1);
    let c3 = unit_xor(&mut e, &[1, 3, 5], 0);
    let c4 = unit_xor(&mut e, &[2, 4, 5], 1);

    let set = XorSet::new(vec![c1, c2, c3, c4]);
    let summed = set.sum(&mut e).unwrap();

    assert!(summed.variables.is_empty());
    assert_eq!(summed.phase, 1);

    let infeasible_set = XorSet::new(vec![XorConstraint {
        variables: summed.variables.clone(),
        phase: summed.phase,
        validation: summed.validation.share(&mut e),
    }]);
    assert!(infeasible_set.is_infeasible());

    summed.release(&mut e);
    infeasible_set.release(&mut e);
    e.finalize_proof().unwrap();
}

/// Scenario 4: building two nested nodes allocates exactly eight defining
/// clauses, consecutive within each node.
#[test]
fn scenario_defining_clause_discipline() {
    let mut e = engine_with(&[], 3);
    let n_a = e.make_node(3, FALSE_NODE, TRUE_NODE).unwrap();
    let n_b = e.make_node(2, FALSE_NODE, n_a).unwrap();

    let a_base = e.node_store_ref().defining_clause(n_a, DefiningClause::HighUp);
    let b_base = e.node_store_ref().defining_clause(n_b, DefiningClause::HighUp);

    // Each node's four defining clauses are consecutive IDs.
    assert_eq!(e.node_store_ref().defining_clause(n_a, DefiningClause::LowDown), a_base + 3);
    assert_eq!(e.node_store_ref().defining_clause(n_b, DefiningClause::LowDown), b_base + 3);
    // n_a was built first, so its block precedes n_b's.
    assert!(b_base >= a_base + 4);
    // Exactly eight clauses were allocated for these two nodes (no sharing,
    // no gaps): b_base is a_base's block plus exactly one more block.
    assert_eq!(b_base, a_base + 4);
}

/// Scenario 5: building 10,000 nodes that never accumulate a reference
/// (each is reachable only through the previous node, none of them via
/// `add_ref`) and forcing a GC returns the live node count to baseline.
#[test]
fn scenario_gc_reclaims_unreferenced_nodes() {
    let mut e = engine_with(&[], 20_000);
    let baseline = e.node_store_ref().live_node_count();

    let mut prev = TRUE_NODE;
    for v in (1..=10_000u32).rev() {
        // Strictly decreasing `v` keeps each new node's children at a
        // larger level than itself, satisfying I2.
        prev = e.make_node(v, FALSE_NODE, prev).unwrap();
    }
    assert_eq!(e.node_store_ref().live_node_count(), baseline + 10_000);

    let collected = e.collect_garbage();
    assert_eq!(collected, 10_000);
    let after = e.node_store_ref().live_node_count();
    assert!((after as i64 - baseline as i64).abs() <= 2, "expected near-baseline, got {after}");
}

/// Scenario 6: apply's justification machinery closes correctly across a
/// multi-level conjunction (forcing recursion through several split
/// variables, the same machinery the split-proof fallback in
/// `apply::justify_two_operand` backstops when a single RUP pass alone
/// isn't enough).
#[test]
fn scenario_apply_multi_level_and_is_justified() {
    let mut e = engine_with(&[], 4);
    // x1 ∧ x2
    let x1 = e.make_node(1, FALSE_NODE, TRUE_NODE).unwrap();
    let x2 = e.make_node(2, FALSE_NODE, TRUE_NODE).unwrap();
    let x3 = e.make_node(3, FALSE_NODE, TRUE_NODE).unwrap();
    let j12 = apply_and(&mut e, x1, x2).unwrap();
    assert!(j12.clause.is_some());
    let j123 = apply_and(&mut e, j12.node, x3).unwrap();
    let clause = j123.clause.expect("multi-level AND is justified");
    let lits = e.proof_clause_literals(clause).unwrap();
    // ¬xvar(j12) ∨ ¬xvar(x3) ∨ xvar(j123), cleaned and rank-sorted.
    assert_eq!(lits.len(), 3);

    // Quantifying x3 back out of the triple conjunction returns to the
    // pairwise result, exercising justify_quantify_step's result-node hint.
    let mut vars = HashSet::new();
    vars.insert(3);
    let requantified = exists(&mut e, j123.node, &vars).unwrap();
    assert_eq!(requantified.node, j12.node);
}

/// Scenario 6b: forces `apply::justify_two_operand`'s single RUP pass to
/// fail outright, so the two-step split-proof fallback actually runs.
///
/// `p = (level 2, low=a, high=b)` and `q = (level 2, low=b, high=a)` are
/// swapped-cofactor siblings built from two deeper variables (`a` at level
/// 4, `b` at level 3). `p`'s and `a∧b` (`ab`) are pre-warmed into the
/// operation cache, so both of `p ∧ q`'s recursive cofactor pairs
/// (`a∧b` and `b∧a`, identical once sorted) hit the cache and `p ∧ q`
/// collapses to `ab` via the node store's low==high reduction, with no new
/// node allocated. Since `ab`'s own level (3) doesn't match this step's
/// split variable (2), `ab`'s defining clauses never enter the hint set,
/// and the remaining hints (`p`'s and `q`'s own defining clauses) leave
/// every clause two literals short of unit until the split variable is
/// pinned — which the single forward pass alone cannot do. The fallback
/// pins it via `target ∨ ¬split`, then closes the real target from that
/// plus the low-side hints, queueing the intermediate for deletion.
#[test]
fn scenario_split_proof_fallback_is_exercised() {
    let mut e = engine_with(&[], 8);
    let a = e.make_node(4, FALSE_NODE, TRUE_NODE).unwrap();
    let b = e.make_node(3, FALSE_NODE, TRUE_NODE).unwrap();
    let ab = apply_and(&mut e, a, b).unwrap();

    let p = e.make_node(2, a, b).unwrap();
    let q = e.make_node(2, b, a).unwrap();
    let before = e.node_store_ref().defining_clause(q, DefiningClause::LowDown);

    let j = apply_and(&mut e, p, q).unwrap();
    assert_eq!(j.node, ab.node);
    let final_clause = j.clause.expect("p ∧ q is justified via the split-step fallback");

    // Two new clauses were recorded for this one AND step (the fallback's
    // intermediate `target ∨ ¬split`, then the real target), not the one a
    // direct single-pass derivation would have produced.
    assert_eq!(final_clause, before + 2);
    let intermediate = before + 1;
    assert!(e.proof_clause_literals(intermediate).is_none(), "intermediate must be deferred-deleted");

    let lits = e.proof_clause_literals(final_clause).unwrap();
    assert_eq!(lits.len(), 3); // ¬xvar(p) ∨ ¬xvar(q) ∨ xvar(ab), cleaned
}
