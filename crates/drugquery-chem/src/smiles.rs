//! SMILES line notation → molecular graph.
//!
//! Covers the organic subset, bracket atoms (isotope, chirality, hydrogen
//! count, charge, atom class), explicit bond symbols, branches, ring closures
//! (`1`-`9` and `%nn`) and dot-disconnected components. Stereo markers are
//! accepted and dropped; they do not affect 2D fingerprints.

use std::collections::HashMap;
use thiserror::Error;

use drugquery_common::DrugQueryError;

use crate::molecule::{atomic_number, Bond, BondOrder, MolAtom, Molecule};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmilesError {
    #[error("empty SMILES string")]
    Empty,

    #[error("unexpected character {ch:?} at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unknown element {symbol:?} at position {pos}")]
    UnknownElement { symbol: String, pos: usize },

    #[error("unclosed bracket atom starting at position {0}")]
    UnclosedBracket(usize),

    #[error("unmatched ')' at position {0}")]
    UnmatchedParen(usize),

    #[error("branch opened but never closed")]
    UnclosedBranch,

    #[error("ring bond {0} is never closed")]
    UnclosedRing(u16),

    #[error("bond at position {0} is not between two atoms")]
    DanglingBond(usize),

    #[error("invalid ring closure {ring} at position {pos}")]
    InvalidRingClosure { ring: u16, pos: usize },

    #[error("atom {atom} has impossible valence {valence}")]
    ExcessValence { atom: usize, valence: u16 },
}

impl From<SmilesError> for DrugQueryError {
    fn from(err: SmilesError) -> Self {
        DrugQueryError::InvalidQueryStructure(err.to_string())
    }
}

/// Parse a SMILES string. Anything after the first whitespace is treated as
/// a title and ignored.
pub fn parse_smiles(input: &str) -> Result<Molecule, SmilesError> {
    let token = input.split_whitespace().next().ok_or(SmilesError::Empty)?;
    let mut parser = Parser::new(token);
    parser.run()?;
    parser.finish()
}

struct PendingRing {
    atom: usize,
    order: Option<BondOrder>,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    atoms: Vec<MolAtom>,
    /// Organic-subset atoms get implicit hydrogens; bracket atoms do not.
    organic: Vec<bool>,
    bonds: Vec<Bond>,
    prev: Option<usize>,
    pending_bond: Option<(BondOrder, usize)>,
    branches: Vec<(Option<usize>, usize)>,
    rings: HashMap<u16, PendingRing>,
}

impl Parser {
    fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
            atoms: Vec::new(),
            organic: Vec::new(),
            bonds: Vec::new(),
            prev: None,
            pending_bond: None,
            branches: Vec::new(),
            rings: HashMap::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(&mut self) -> Result<(), SmilesError> {
        while let Some(ch) = self.peek() {
            let pos = self.pos;
            match ch {
                '-' | '=' | '#' | ':' | '/' | '\\' => {
                    if self.prev.is_none() || self.pending_bond.is_some() {
                        return Err(SmilesError::DanglingBond(pos));
                    }
                    let order = match ch {
                        '=' => BondOrder::Double,
                        '#' => BondOrder::Triple,
                        ':' => BondOrder::Aromatic,
                        _ => BondOrder::Single,
                    };
                    self.pending_bond = Some((order, pos));
                    self.pos += 1;
                }
                '(' => {
                    if self.prev.is_none() || self.pending_bond.is_some() {
                        return Err(SmilesError::UnexpectedChar { ch, pos });
                    }
                    self.branches.push((self.prev, self.atoms.len()));
                    self.pos += 1;
                }
                ')' => {
                    if let Some((_, bond_pos)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(bond_pos));
                    }
                    let (restore, atoms_at_open) =
                        self.branches.pop().ok_or(SmilesError::UnmatchedParen(pos))?;
                    if self.atoms.len() == atoms_at_open {
                        return Err(SmilesError::UnexpectedChar { ch, pos });
                    }
                    self.prev = restore;
                    self.pos += 1;
                }
                '.' => {
                    if let Some((_, bond_pos)) = self.pending_bond {
                        return Err(SmilesError::DanglingBond(bond_pos));
                    }
                    if self.prev.is_none() {
                        return Err(SmilesError::UnexpectedChar { ch, pos });
                    }
                    self.prev = None;
                    self.pos += 1;
                }
                '0'..='9' => {
                    self.pos += 1;
                    let ring = ch as u16 - '0' as u16;
                    self.ring_closure(ring, pos)?;
                }
                '%' => {
                    let d1 = self.peek_at(1).and_then(|c| c.to_digit(10));
                    let d2 = self.peek_at(2).and_then(|c| c.to_digit(10));
                    match (d1, d2) {
                        (Some(a), Some(b)) => {
                            self.pos += 3;
                            self.ring_closure((a * 10 + b) as u16, pos)?;
                        }
                        _ => return Err(SmilesError::UnexpectedChar { ch, pos }),
                    }
                }
                '[' => {
                    let atom = self.bracket_atom()?;
                    self.add_atom(atom, false);
                }
                _ => {
                    let atom = self.organic_atom()?;
                    self.add_atom(atom, true);
                }
            }
        }

        if let Some((_, bond_pos)) = self.pending_bond {
            return Err(SmilesError::DanglingBond(bond_pos));
        }
        if !self.branches.is_empty() {
            return Err(SmilesError::UnclosedBranch);
        }
        if let Some(ring) = self.rings.keys().min() {
            return Err(SmilesError::UnclosedRing(*ring));
        }
        if self.atoms.is_empty() {
            return Err(SmilesError::Empty);
        }
        Ok(())
    }

    fn organic_atom(&mut self) -> Result<MolAtom, SmilesError> {
        let pos = self.pos;
        let ch = self.peek().ok_or(SmilesError::Empty)?;
        let (symbol, aromatic, len) = match (ch, self.peek_at(1)) {
            ('C', Some('l')) => ("Cl", false, 2),
            ('B', Some('r')) => ("Br", false, 2),
            ('B' | 'C' | 'N' | 'O' | 'P' | 'S' | 'F' | 'I', _) => (organic_symbol(ch), false, 1),
            ('b' | 'c' | 'n' | 'o' | 'p' | 's', _) => (organic_symbol(ch.to_ascii_uppercase()), true, 1),
            ('*', _) => ("*", false, 1),
            _ => return Err(SmilesError::UnexpectedChar { ch, pos }),
        };
        self.pos += len;
        let atomic_number = atomic_number(symbol).ok_or_else(|| SmilesError::UnknownElement {
            symbol: symbol.to_string(),
            pos,
        })?;
        Ok(MolAtom {
            atomic_number,
            formal_charge: 0,
            isotope: None,
            is_aromatic: aromatic,
            implicit_hydrogens: 0,
        })
    }

    fn bracket_atom(&mut self) -> Result<MolAtom, SmilesError> {
        let open = self.pos;
        let close = self.chars[open..]
            .iter()
            .position(|&c| c == ']')
            .map(|offset| open + offset)
            .ok_or(SmilesError::UnclosedBracket(open))?;
        self.pos += 1;

        // isotope
        let mut isotope = None;
        while let Some(d) = self.peek().filter(|_| self.pos < close).and_then(|c| c.to_digit(10)) {
            isotope = Some(isotope.unwrap_or(0u16).saturating_mul(10).saturating_add(d as u16));
            self.pos += 1;
        }

        // element symbol
        let sym_pos = self.pos;
        let first = self
            .peek()
            .filter(|_| self.pos < close)
            .ok_or(SmilesError::UnexpectedChar { ch: ']', pos: close })?;
        let (atomic, aromatic) = if first.is_ascii_lowercase() {
            let two: String = [first, self.peek_at(1).unwrap_or(' ')].iter().collect();
            if matches!(two.as_str(), "se" | "as") {
                self.pos += 2;
                let upper = format!("{}{}", two[..1].to_ascii_uppercase(), &two[1..]);
                (atomic_number(&upper), true)
            } else {
                self.pos += 1;
                (atomic_number(&first.to_ascii_uppercase().to_string()), true)
            }
        } else if first.is_ascii_uppercase() || first == '*' {
            let two = self
                .peek_at(1)
                .filter(|c| c.is_ascii_lowercase() && self.pos + 1 < close)
                .map(|c| format!("{first}{c}"))
                .and_then(|s| atomic_number(&s).map(|n| (s, n)));
            match two {
                Some((_, n)) => {
                    self.pos += 2;
                    (Some(n), false)
                }
                None => {
                    self.pos += 1;
                    (atomic_number(&first.to_string()), false)
                }
            }
        } else {
            return Err(SmilesError::UnexpectedChar { ch: first, pos: sym_pos });
        };
        let atomic_number = atomic.ok_or_else(|| SmilesError::UnknownElement {
            symbol: self.chars[sym_pos..self.pos].iter().collect(),
            pos: sym_pos,
        })?;

        // chirality
        while self.pos < close && self.peek() == Some('@') {
            self.pos += 1;
        }

        // hydrogen count
        let mut hydrogens = 0u8;
        if self.pos < close && self.peek() == Some('H') {
            self.pos += 1;
            hydrogens = 1;
            if let Some(d) = self.peek().filter(|_| self.pos < close).and_then(|c| c.to_digit(10)) {
                hydrogens = d as u8;
                self.pos += 1;
            }
        }

        // charge
        let mut charge: i8 = 0;
        if let Some(sign @ ('+' | '-')) = self.peek().filter(|_| self.pos < close) {
            let unit: i8 = if sign == '+' { 1 } else { -1 };
            self.pos += 1;
            charge = unit;
            if let Some(d) = self.peek().filter(|_| self.pos < close).and_then(|c| c.to_digit(10)) {
                charge = unit * d as i8;
                self.pos += 1;
            } else {
                while self.pos < close && self.peek() == Some(sign) {
                    charge = charge.saturating_add(unit);
                    self.pos += 1;
                }
            }
        }

        // atom class
        if self.pos < close && self.peek() == Some(':') {
            self.pos += 1;
            while self.pos < close && self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
        }

        if self.pos != close {
            let ch = self.chars[self.pos];
            return Err(SmilesError::UnexpectedChar { ch, pos: self.pos });
        }
        self.pos = close + 1;

        Ok(MolAtom {
            atomic_number,
            formal_charge: charge,
            isotope,
            is_aromatic: aromatic,
            implicit_hydrogens: hydrogens,
        })
    }

    fn add_atom(&mut self, atom: MolAtom, organic: bool) {
        let idx = self.atoms.len();
        self.atoms.push(atom);
        self.organic.push(organic);
        if let Some(prev) = self.prev {
            let explicit = self.pending_bond.take().map(|(order, _)| order);
            let order = explicit.unwrap_or_else(|| self.implicit_order(prev, idx));
            self.bonds.push(Bond { atom1: prev, atom2: idx, order });
        }
        self.prev = Some(idx);
    }

    fn implicit_order(&self, a: usize, b: usize) -> BondOrder {
        if self.atoms[a].is_aromatic && self.atoms[b].is_aromatic {
            BondOrder::Aromatic
        } else {
            BondOrder::Single
        }
    }

    fn ring_closure(&mut self, ring: u16, pos: usize) -> Result<(), SmilesError> {
        let current = self.prev.ok_or(SmilesError::DanglingBond(pos))?;
        let explicit = self.pending_bond.take().map(|(order, _)| order);

        match self.rings.remove(&ring) {
            None => {
                self.rings.insert(ring, PendingRing { atom: current, order: explicit });
            }
            Some(open) => {
                let duplicate = self.bonds.iter().any(|b| {
                    (b.atom1 == open.atom && b.atom2 == current)
                        || (b.atom1 == current && b.atom2 == open.atom)
                });
                if open.atom == current || duplicate {
                    return Err(SmilesError::InvalidRingClosure { ring, pos });
                }
                let order = match (open.order, explicit) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(SmilesError::InvalidRingClosure { ring, pos })
                    }
                    (Some(a), _) | (None, Some(a)) => a,
                    (None, None) => self.implicit_order(open.atom, current),
                };
                self.bonds.push(Bond { atom1: open.atom, atom2: current, order });
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Molecule, SmilesError> {
        let mut bond_sum = vec![0u16; self.atoms.len()];
        for bond in &self.bonds {
            let valence = u16::from(bond.order.valence());
            bond_sum[bond.atom1] = bond_sum[bond.atom1].saturating_add(valence);
            bond_sum[bond.atom2] = bond_sum[bond.atom2].saturating_add(valence);
        }
        for (i, atom) in self.atoms.iter_mut().enumerate() {
            let valence = bond_sum[i];
            if self.organic[i] {
                let max = standard_valences(atom.atomic_number).last().copied().unwrap_or(0);
                if valence > u16::from(max) {
                    return Err(SmilesError::ExcessValence { atom: i, valence });
                }
                // bounded by the check above
                let used = valence as u8 + u8::from(atom.is_aromatic);
                atom.implicit_hydrogens = implicit_hydrogens(atom.atomic_number, used);
            } else if valence.saturating_add(u16::from(atom.implicit_hydrogens)) > MAX_BRACKET_VALENCE {
                return Err(SmilesError::ExcessValence { atom: i, valence });
            }
        }
        Ok(Molecule::new(self.atoms, self.bonds))
    }
}

/// Octet-expanded ceiling for bracket atoms, which carry no valence model.
const MAX_BRACKET_VALENCE: u16 = 8;

fn organic_symbol(ch: char) -> &'static str {
    match ch {
        'B' => "B",
        'C' => "C",
        'N' => "N",
        'O' => "O",
        'P' => "P",
        'S' => "S",
        'F' => "F",
        _ => "I",
    }
}

fn standard_valences(atomic_number: u8) -> &'static [u8] {
    match atomic_number {
        5 => &[3],
        6 => &[4],
        7 => &[3, 5],
        8 => &[2],
        15 => &[3, 5],
        16 => &[2, 4, 6],
        9 | 17 | 35 | 53 => &[1],
        _ => &[],
    }
}

/// Lowest standard valence that accommodates `used`, minus `used`.
pub(crate) fn implicit_hydrogens(atomic_number: u8, used: u8) -> u8 {
    standard_valences(atomic_number)
        .iter()
        .find(|&&v| v >= used)
        .map(|&v| v - used)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ethanol() {
        let mol = parse_smiles("CCO").unwrap();
        assert_eq!(mol.atom_count(), 3);
        assert_eq!(mol.bond_count(), 2);
        let hs: Vec<u8> = mol.atoms.iter().map(|a| a.implicit_hydrogens).collect();
        assert_eq!(hs, vec![3, 2, 1]);
    }

    #[test]
    fn test_benzene_is_aromatic_ring() {
        let mol = parse_smiles("c1ccccc1").unwrap();
        assert_eq!(mol.atom_count(), 6);
        assert_eq!(mol.bond_count(), 6);
        assert!(mol.bonds.iter().all(|b| b.order == BondOrder::Aromatic));
        assert!(mol.atoms.iter().all(|a| a.implicit_hydrogens == 1));
        assert!(mol.ring_atoms().iter().all(|&r| r));
    }

    #[test]
    fn test_aspirin_branches() {
        let mol = parse_smiles("CC(=O)Oc1ccccc1C(=O)O").unwrap();
        assert_eq!(mol.atom_count(), 13);
        assert_eq!(mol.bond_count(), 13);
        let doubles = mol.bonds.iter().filter(|b| b.order == BondOrder::Double).count();
        assert_eq!(doubles, 2);
    }

    #[test]
    fn test_bracket_atoms() {
        let mol = parse_smiles("[NH4+].[Cl-]").unwrap();
        assert_eq!(mol.atom_count(), 2);
        assert_eq!(mol.bond_count(), 0);
        assert_eq!(mol.atoms[0].formal_charge, 1);
        assert_eq!(mol.atoms[0].implicit_hydrogens, 4);
        assert_eq!(mol.atoms[1].atomic_number, 17);
        assert_eq!(mol.atoms[1].formal_charge, -1);

        let pyrrole = parse_smiles("c1cc[nH]c1").unwrap();
        assert_eq!(pyrrole.atoms[3].atomic_number, 7);
        assert!(pyrrole.atoms[3].is_aromatic);
        assert_eq!(pyrrole.atoms[3].implicit_hydrogens, 1);

        let labelled = parse_smiles("[13CH3:1][C@@H](N)O").unwrap();
        assert_eq!(labelled.atoms[0].isotope, Some(13));
        assert_eq!(labelled.atoms[0].implicit_hydrogens, 3);
    }

    #[test]
    fn test_two_digit_ring_closure() {
        let mol = parse_smiles("C%10CCCC%10").unwrap();
        assert_eq!(mol.bond_count(), 5);
    }

    #[test]
    fn test_title_is_ignored() {
        let mol = parse_smiles("  CCN ethylamine").unwrap();
        assert_eq!(mol.atom_count(), 3);
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(parse_smiles("   ").unwrap_err(), SmilesError::Empty);
        assert_eq!(parse_smiles("C1CC").unwrap_err(), SmilesError::UnclosedRing(1));
        assert_eq!(parse_smiles("CC)C").unwrap_err(), SmilesError::UnmatchedParen(2));
        assert_eq!(parse_smiles("CC(C").unwrap_err(), SmilesError::UnclosedBranch);
        assert_eq!(parse_smiles("CC=").unwrap_err(), SmilesError::DanglingBond(2));
        assert_eq!(parse_smiles("[CH3").unwrap_err(), SmilesError::UnclosedBracket(0));
        assert!(matches!(parse_smiles("C$C"), Err(SmilesError::UnexpectedChar { ch: '$', .. })));
        assert!(matches!(parse_smiles("[Xx]"), Err(SmilesError::UnknownElement { .. })));
        assert!(matches!(parse_smiles("C11"), Err(SmilesError::InvalidRingClosure { .. })));
        assert!(matches!(parse_smiles("not a molecule"), Err(SmilesError::UnexpectedChar { .. })));
        assert_eq!(
            parse_smiles("C(C)(C)(C)(C)C").unwrap_err(),
            SmilesError::ExcessValence { atom: 0, valence: 5 }
        );
        assert!(matches!(parse_smiles("[CH4](C)(C)(C)(C)C"), Err(SmilesError::ExcessValence { .. })));
    }

    #[test]
    fn test_many_ring_bonds_on_one_atom_are_rejected() {
        // 86 triple ring bonds on a single aromatic carbon
        let mut query = String::from("c");
        for ring in 10..96 {
            query.push_str(&format!("#%{ring}"));
        }
        for ring in 10..96 {
            query.push_str(&format!(".C%{ring}"));
        }
        assert_eq!(
            parse_smiles(&query).unwrap_err(),
            SmilesError::ExcessValence { atom: 0, valence: 258 }
        );
    }

    #[test]
    fn test_valence_limits_keep_real_molecules() {
        for smiles in ["c1ccoc1", "CS(=O)(=O)C", "CN(=O)=O", "FS(F)(F)(F)(F)F", "[O-][N+](=O)c1ccccc1"] {
            assert!(parse_smiles(smiles).is_ok(), "{smiles}");
        }
    }

    #[test]
    fn test_error_maps_to_invalid_query() {
        let err: DrugQueryError = parse_smiles("C(").unwrap_err().into();
        assert!(matches!(err, DrugQueryError::InvalidQueryStructure(_)));
    }
}
