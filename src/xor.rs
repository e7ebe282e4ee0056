//! Crate `xor` layers parity (XOR) constraints and Gauss-Jordan
//! elimination on top of the trusted-BDD layer (`tbdd`). There is no
//! direct teacher analog for this component (splr has no XOR reasoning);
//! it is expressed with the plain `Vec`/`BTreeSet` idiom the rest of this
//! crate already uses rather than importing a separate linear-algebra
//! crate, since the "matrix" here is a sparse set of variable indices.
use std::collections::BTreeSet;

use crate::engine::Engine;
use crate::error::EngineResult;
use crate::tbdd::Tbdd;
use crate::types::{ClauseId, VarId};

/// `⊕variables = phase`, paired with the `Tbdd` proving the CNF entails
/// it.
pub struct XorConstraint {
    /// Sorted, deduplicated positive variable IDs.
    pub variables: Vec<VarId>,
    pub phase: u8,
    pub validation: Tbdd,
}

impl XorConstraint {
    pub fn release(self, engine: &mut Engine) {
        self.validation.release(engine);
    }
}

fn symmetric_difference(a: &[VarId], b: &[VarId]) -> Vec<VarId> {
    let set_a: BTreeSet<VarId> = a.iter().copied().collect();
    let set_b: BTreeSet<VarId> = b.iter().copied().collect();
    set_a.symmetric_difference(&set_b).copied().collect()
}

/// Merges two constraints into the one obtained by XOR-summing them: the
/// variable sets cancel on their intersection (`a ⊕ a = 0`), leaving the
/// symmetric difference, and the phases XOR together.
fn merge(engine: &mut Engine, a: &XorConstraint, b: &XorConstraint) -> EngineResult<XorConstraint> {
    let variables = symmetric_difference(&a.variables, &b.variables);
    let phase = a.phase ^ b.phase;
    let hints: Vec<ClauseId> = [a.validation.clause_id, b.validation.clause_id].into_iter().flatten().collect();
    let validation = Tbdd::from_xor(engine, &variables, phase, &hints)?;
    Ok(XorConstraint { variables, phase, validation })
}

/// A multiset of XOR constraints pending elimination.
pub struct XorSet {
    constraints: Vec<XorConstraint>,
}

/// Minimal Lehmer (Park-Miller) LCG: `state' = state * 48271 mod (2^31-1)`.
fn lehmer_next(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(48_271) % ((1u64 << 31) - 1);
    *state
}

impl XorSet {
    pub fn new(constraints: Vec<XorConstraint>) -> XorSet {
        XorSet { constraints }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Releases every constraint's validation `Tbdd` still held in the set.
    pub fn release(self, engine: &mut Engine) {
        for c in self.constraints {
            c.release(engine);
        }
    }

    /// `true` if any constraint is `⊕{} = 1` — an equation with no
    /// variables that still demands odd parity, i.e. `0 = 1`.
    pub fn is_infeasible(&self) -> bool {
        self.constraints.iter().any(|c| c.variables.is_empty() && c.phase == 1)
    }

    /// Reduces every constraint in the set to a single one via repeated
    /// pairwise XOR-summing, each time picking the pair whose merge
    /// yields the smallest resulting support (a cost-minimizing
    /// graph-contraction heuristic), breaking ties with a seeded Lehmer
    /// LCG (`EngineConfig::xor_seed`).
    pub fn sum(mut self, engine: &mut Engine) -> EngineResult<XorConstraint> {
        let mut rng = engine.xor_seed() | 1;
        while self.constraints.len() > 1 {
            let n = self.constraints.len();
            let mut best: Option<(usize, usize, usize)> = None;
            for i in 0..n {
                for j in (i + 1)..n {
                    let cost = symmetric_difference(&self.constraints[i].variables, &self.constraints[j].variables).len();
                    let take = match best {
                        None => true,
                        Some((_, _, best_cost)) if cost < best_cost => true,
                        Some((_, _, best_cost)) if cost == best_cost => lehmer_next(&mut rng) % 2 == 0,
                        _ => false,
                    };
                    if take {
                        best = Some((i, j, cost));
                    }
                }
            }
            let (i, j, _) = best.expect("constraints.len() > 1 guarantees at least one pair");
            let b = self.constraints.remove(j);
            let a = self.constraints.remove(i);
            let merged = merge(engine, &a, &b)?;
            a.release(engine);
            b.release(engine);
            self.constraints.push(merged);
        }
        Ok(self.constraints.pop().expect("loop invariant: at least one constraint remains"))
    }
}

/// Eliminates variables from `eset` (equations over variables the caller
/// treats as externally visible) and `iset` (equations purely over
/// `internal_vars`) in order of increasing pivot cost — the number of
/// equations a variable still appears in, plus a large penalty for
/// variables outside `internal_vars` so internal variables are always
/// eliminated first. Each pivot step XORs the chosen pivot row into every
/// other row still containing that variable (reduced row-echelon form);
/// returns the pivot sequence.
pub fn gauss_jordan(
    engine: &mut Engine,
    internal_vars: &[VarId],
    eset: &mut Vec<XorConstraint>,
    iset: &mut Vec<XorConstraint>,
) -> EngineResult<Vec<VarId>> {
    const EXTERNAL_PENALTY: usize = 1_000_000;
    let internal: BTreeSet<VarId> = internal_vars.iter().copied().collect();
    let mut pivots = Vec::new();

    loop {
        let mut counts: std::collections::BTreeMap<VarId, usize> = std::collections::BTreeMap::new();
        for eq in eset.iter().chain(iset.iter()) {
            for &v in &eq.variables {
                *counts.entry(v).or_insert(0) += 1;
            }
        }
        if counts.is_empty() {
            break;
        }
        let pivot_var = counts
            .into_iter()
            .map(|(v, c)| {
                let penalty = if internal.contains(&v) { 0 } else { EXTERNAL_PENALTY };
                (c + penalty, v)
            })
            .min()
            .map(|(_, v)| v)
            .expect("counts was checked non-empty above");

        let pivot_row = take_row_with_var(iset, pivot_var).or_else(|| take_row_with_var(eset, pivot_var));
        let Some(pivot_eq) = pivot_row else {
            // No row actually carries the chosen variable (shouldn't
            // happen given it came from `counts`); stop rather than loop.
            break;
        };

        for set in [&mut *eset, &mut *iset] {
            let mut i = 0;
            while i < set.len() {
                if set[i].variables.contains(&pivot_var) {
                    let row = set.remove(i);
                    let merged = merge(engine, &row, &pivot_eq)?;
                    row.release(engine);
                    set.insert(i, merged);
                } else {
                    i += 1;
                }
            }
        }
        if internal.contains(&pivot_var) {
            iset.push(pivot_eq);
        } else {
            eset.push(pivot_eq);
        }
        pivots.push(pivot_var);
    }
    Ok(pivots)
}

fn take_row_with_var(set: &mut Vec<XorConstraint>, v: VarId) -> Option<XorConstraint> {
    set.iter().position(|eq| eq.variables.contains(&v)).map(|i| set.remove(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::types::VarIdEncoding;

    fn engine() -> Engine {
        Engine::new(EngineConfig::new(), Box::new(Vec::new()), &[], 16).unwrap()
    }

    fn unit_xor(engine: &mut Engine, vars: &[VarId], phase: u8) -> XorConstraint {
        let mut hints = Vec::new();
        for &v in vars {
            let id = engine.proof_add_clause(&[v.pos_lit()], &[]).unwrap();
            hints.extend(id);
        }
        let validation = Tbdd::from_xor(engine, vars, phase, &hints).unwrap();
        XorConstraint { variables: vars.to_vec(), phase, validation }
    }

    #[test]
    fn sum_of_two_disjoint_constraints_unions_variables() {
        let mut e = engine();
        let a = unit_xor(&mut e, &[1, 2], 1);
        let b = unit_xor(&mut e, &[3, 4], 0);
        let set = XorSet::new(vec![a, b]);
        let summed = set.sum(&mut e).unwrap();
        assert_eq!(summed.variables, vec![1, 2, 3, 4]);
        assert_eq!(summed.phase, 1);
        summed.release(&mut e);
    }

    #[test]
    fn sum_cancels_shared_variable() {
        let mut e = engine();
        let a = unit_xor(&mut e, &[1, 2], 1);
        let b = unit_xor(&mut e, &[2, 3], 1);
        let set = XorSet::new(vec![a, b]);
        let summed = set.sum(&mut e).unwrap();
        assert_eq!(summed.variables, vec![1, 3]); // var 2 cancels
        assert_eq!(summed.phase, 0);
        summed.release(&mut e);
    }

    #[test]
    fn infeasible_chain_detected_after_summing() {
        // x1⊕x2=1, x3⊕x4=1, x1⊕x3⊕x5=0, x2⊕x4⊕x5=1: summing all four
        // cancels every variable, leaving 0 = 1.
        let mut e = engine();
        let c1 = unit_xor(&mut e, &[1, 2], 1);
        let c2 = unit_xor(&mut e, &[3, 4], 1);
        let c3 = unit_xor(&mut e, &[1, 3, 5], 0);
        let c4 = unit_xor(&mut e, &[2, 4, 5], 1);
        let set = XorSet::new(vec![c1, c2, c3, c4]);
        let summed = set.sum(&mut e).unwrap();
        assert!(summed.variables.is_empty());
        assert_eq!(summed.phase, 1);
        let infeasible = XorSet::new(vec![]).is_infeasible(); // empty set: not infeasible by itself
        assert!(!infeasible);
        let wrapped = XorSet::new(vec![XorConstraint {
            variables: summed.variables.clone(),
            phase: summed.phase,
            validation: summed.validation.share(&mut e),
        }]);
        assert!(wrapped.is_infeasible());
        summed.release(&mut e);
        wrapped.constraints.into_iter().next().unwrap().release(&mut e);
    }

    #[test]
    fn gauss_jordan_eliminates_internal_variable() {
        let mut e = engine();
        let mut iset = vec![unit_xor(&mut e, &[1, 2], 1)];
        let mut eset = vec![unit_xor(&mut e, &[1, 3], 0)];
        let pivots = gauss_jordan(&mut e, &[1], &mut eset, &mut iset).unwrap();
        assert_eq!(pivots, vec![1]);
        // var 1 eliminated from eset's row: now ⊕{2,3}=1.
        assert!(!eset[0].variables.contains(&1));
        for c in eset.drain(..) {
            c.release(&mut e);
        }
        for c in iset.drain(..) {
            c.release(&mut e);
        }
    }
}
