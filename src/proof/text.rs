//! Line-oriented text rendering of proof records, DIMACS-flavoured like the
//! teacher's own CNF line format and splr's `Config::proof_filename` output.
use std::io::{self, Write};

fn write_terminated_ints(out: &mut impl Write, xs: &[i64]) -> io::Result<()> {
    for x in xs {
        write!(out, "{x} ")?;
    }
    writeln!(out, "0")
}

/// `<id> <lits> 0 l <hints> 0` (LRAT addition).
pub fn write_lrat_add(out: &mut impl Write, id: u64, lits: &[i64], hints: &[i64]) -> io::Result<()> {
    write!(out, "{id} ")?;
    write_terminated_ints(out, lits)?;
    write!(out, "l ")?;
    write_terminated_ints(out, hints)
}

/// `<last_id> d <ids> 0` (LRAT deletion).
pub fn write_lrat_delete(out: &mut impl Write, last_id: u64, ids: &[u64]) -> io::Result<()> {
    write!(out, "{last_id} d ")?;
    let ids: Vec<i64> = ids.iter().map(|&x| x as i64).collect();
    write_terminated_ints(out, &ids)
}

/// `<lits> 0` (DRAT addition).
pub fn write_drat_add(out: &mut impl Write, lits: &[i64]) -> io::Result<()> {
    write_terminated_ints(out, lits)
}

/// `d <lits> 0` (DRAT deletion).
pub fn write_drat_delete(out: &mut impl Write, lits: &[i64]) -> io::Result<()> {
    write!(out, "d ")?;
    write_terminated_ints(out, lits)
}

/// `a <id> <lits> 0 l <hints> 0` (FRAT addition).
pub fn write_frat_add(out: &mut impl Write, id: u64, lits: &[i64], hints: &[i64]) -> io::Result<()> {
    write!(out, "a {id} ")?;
    write_terminated_ints(out, lits)?;
    write!(out, "l ")?;
    write_terminated_ints(out, hints)
}

/// `d <id> <lits> 0` (FRAT deletion).
pub fn write_frat_delete(out: &mut impl Write, id: u64, lits: &[i64]) -> io::Result<()> {
    write!(out, "d {id} ")?;
    write_terminated_ints(out, lits)
}

/// `f <id> <lits> 0` (FRAT finalization of the empty clause).
pub fn write_frat_finalize(out: &mut impl Write, id: u64, lits: &[i64]) -> io::Result<()> {
    write!(out, "f {id} ")?;
    write_terminated_ints(out, lits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lrat_add_matches_expected_shape() {
        let mut buf = Vec::new();
        write_lrat_add(&mut buf, 3, &[2, -1], &[1, 2]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "3 2 -1 0 l 1 2 0\n");
    }

    #[test]
    fn drat_delete_matches_expected_shape() {
        let mut buf = Vec::new();
        write_drat_delete(&mut buf, &[2, -1]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "d 2 -1 0\n");
    }
}
