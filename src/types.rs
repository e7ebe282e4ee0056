//! Basic types shared across the engine.
use std::fmt;
use std::ops::Neg;

/// Propositional variable, both original CNF variables and extension
/// variables allocated for BDD nodes share this index space.
pub type VarId = u32;

/// Node identifier in the node store. `0` and `1` are the terminals.
pub type NodeId = u32;

pub const FALSE_NODE: NodeId = 0;
pub const TRUE_NODE: NodeId = 1;

/// Clause identifier in the proof stream. Monotonically increasing.
pub type ClauseId = u64;

/// a dummy clause index, never emitted.
pub const NULL_CLAUSE: ClauseId = 0;

/// Literal encoded on an unsigned integer: `2*v` for the positive
/// occurrence, `2*v+1` for the negative occurrence.
///
/// ```
/// use tbuddy_core::types::*;
/// assert_eq!(2, int2lit(1) as i64);
/// assert_eq!(3, int2lit(-1) as i64);
/// assert_eq!(1, int2lit(1).int());
/// assert_eq!(-1, int2lit(-1).int());
/// ```
pub type Lit = u32;

pub const NULL_LIT: Lit = 0;

pub fn int2lit(x: i32) -> Lit {
    (if x < 0 { -2 * x + 1 } else { 2 * x }) as Lit
}

/// Converters between `int`, [`Lit`] and [`VarId`].
pub trait LiteralEncoding {
    fn vi(&self) -> VarId;
    fn int(&self) -> i32;
    fn positive(&self) -> bool;
    fn negate(&self) -> Lit;
}

impl LiteralEncoding for Lit {
    fn vi(&self) -> VarId {
        self >> 1
    }
    fn int(&self) -> i32 {
        if self & 1 == 0 {
            (*self >> 1) as i32
        } else {
            ((*self >> 1) as i32).neg()
        }
    }
    fn positive(&self) -> bool {
        self % 2 == 0
    }
    fn negate(&self) -> Lit {
        self ^ 1
    }
}

/// converter from [`VarId`] to a positive/negative [`Lit`].
pub trait VarIdEncoding {
    fn pos_lit(&self) -> Lit;
    fn neg_lit(&self) -> Lit;
}

impl VarIdEncoding for VarId {
    fn pos_lit(&self) -> Lit {
        self << 1
    }
    fn neg_lit(&self) -> Lit {
        (self << 1) | 1
    }
}

/// BDD operation codes, used as part of the operation-cache key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OpCode {
    And,
    ImpTst,
    AndImpTst,
    Exists,
    Or,
}

/// One of the three supported clausal proof formats.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProofFormat {
    Lrat,
    Drat,
    Frat,
}

impl fmt::Display for ProofFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ProofFormat::Lrat => write!(f, "LRAT"),
            ProofFormat::Drat => write!(f, "DRAT"),
            ProofFormat::Frat => write!(f, "FRAT"),
        }
    }
}

/// data about a problem, mirrors the front-end's CNF description.
#[derive(Debug, Clone)]
pub struct CnfDescription {
    pub num_of_variables: usize,
    pub num_of_clauses: usize,
}

impl fmt::Display for CnfDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "CNF(vars: {}, clauses: {})",
            self.num_of_variables, self.num_of_clauses
        )
    }
}
