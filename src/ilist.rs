//! Crate `ilist` provides a small resizable vector of signed integers,
//! used to represent clauses, proof hints, and variable sets.
//!
//! The original design packs a length and a signed max-length ahead of the
//! data buffer, with the sign of the max-length distinguishing a caller-owned
//! static buffer (growth past max-length is an error) from a dynamically
//! grown one, plus two sentinel addresses that represent "tautology" and
//! "false cube" without ever being dereferenced. None of that has a natural
//! Rust expression as pointer tricks, so the same caller-visible behavior is
//! expressed with two small enums instead.
use crate::error::{EngineError, EngineResult};

/// Whether an [`IList`]'s storage may grow past its initial request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Backing {
    /// Caller-owned: growth past `max_len` is an error.
    Static { max_len: usize },
    /// Grows geometrically, delegating to `Vec`'s own amortized growth.
    Dynamic,
}

/// Distinguishes the two proof-domain sentinels from a normal list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IListKind {
    Normal,
    Tautology,
    FalseCube,
}

/// A resizable vector of signed integers.
#[derive(Clone, Debug)]
pub struct IList {
    data: Vec<i32>,
    backing: Backing,
    kind: IListKind,
}

impl IList {
    pub fn new(backing: Backing) -> IList {
        IList {
            data: Vec::new(),
            backing,
            kind: IListKind::Normal,
        }
    }

    pub fn tautology() -> IList {
        IList {
            data: Vec::new(),
            backing: Backing::Dynamic,
            kind: IListKind::Tautology,
        }
    }

    pub fn false_cube() -> IList {
        IList {
            data: Vec::new(),
            backing: Backing::Dynamic,
            kind: IListKind::FalseCube,
        }
    }

    pub fn from_slice(xs: &[i32]) -> IList {
        IList {
            data: xs.to_vec(),
            backing: Backing::Dynamic,
            kind: IListKind::Normal,
        }
    }

    pub fn is_tautology(&self) -> bool {
        self.kind == IListKind::Tautology
    }

    pub fn is_false_cube(&self) -> bool {
        self.kind == IListKind::FalseCube
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn push(&mut self, x: i32) -> EngineResult<()> {
        if let Backing::Static { max_len } = self.backing {
            if self.data.len() >= max_len {
                return Err(EngineError::Memory);
            }
        }
        self.data.push(x);
        Ok(())
    }

    /// Append `n` copies of `x`, `n` in `1..=4` (defining-clause fill-in).
    pub fn fill_n(&mut self, x: i32, n: usize) -> EngineResult<()> {
        debug_assert!((1..=4).contains(&n));
        for _ in 0..n {
            self.push(x)?;
        }
        Ok(())
    }

    pub fn contains(&self, x: i32) -> bool {
        self.data.contains(&x)
    }

    pub fn sort_ascending(&mut self) {
        self.data.sort_unstable();
    }

    pub fn reverse(&mut self) {
        self.data.reverse();
    }

    pub fn resize(&mut self, additional: usize) -> EngineResult<()> {
        if let Backing::Static { max_len } = self.backing {
            if self.data.len() + additional > max_len {
                return Err(EngineError::Memory);
            }
        }
        self.data.reserve(additional);
        Ok(())
    }
}

impl std::fmt::Display for IList {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.kind {
            IListKind::Tautology => write!(f, "<tautology>"),
            IListKind::FalseCube => write!(f, "<false-cube>"),
            IListKind::Normal => write!(f, "{:?}", self.data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_backing_rejects_overflow() {
        let mut l = IList::new(Backing::Static { max_len: 2 });
        l.push(1).unwrap();
        l.push(2).unwrap();
        assert!(matches!(l.push(3), Err(EngineError::Memory)));
    }

    #[test]
    fn dynamic_backing_grows_freely() {
        let mut l = IList::new(Backing::Dynamic);
        for i in 0..100 {
            l.push(i).unwrap();
        }
        assert_eq!(l.len(), 100);
    }

    #[test]
    fn sentinels_do_not_indirect() {
        let t = IList::tautology();
        let f = IList::false_cube();
        assert!(t.is_tautology());
        assert!(f.is_false_cube());
        assert!(!t.is_false_cube());
    }

    #[test]
    fn fill_n_appends_copies() {
        let mut l = IList::new(Backing::Dynamic);
        l.fill_n(-7, 4).unwrap();
        assert_eq!(l.as_slice(), &[-7, -7, -7, -7]);
    }
}
