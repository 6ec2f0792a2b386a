//! Canonical SMILES.
//!
//! Atoms are ranked by their invariants, then the ranking is refined with
//! neighbor ranks until it stops splitting. Symmetric atoms that still tie
//! are separated one at a time. Each component is written depth first from
//! its lowest ranked atom, visiting neighbors in rank order, so every
//! spelling of a molecule comes out as the same string.
//!
//! There is no aromaticity perception: a Kekulé ring and its aromatic
//! spelling stay distinct.

use crate::fingerprint::atom_invariants;
use crate::molecule::{BondOrder, MolAtom, Molecule};
use crate::smiles::{implicit_hydrogens, parse_smiles, SmilesError};

/// Parse `smiles` and write it back in canonical form.
pub fn canonicalize(smiles: &str) -> Result<String, SmilesError> {
    Ok(canonical_smiles(&parse_smiles(smiles)?))
}

pub fn canonical_smiles(mol: &Molecule) -> String {
    let ranks = canonical_ranks(mol);
    let mut writer = Writer::new(mol, &ranks);

    let mut by_rank: Vec<usize> = (0..mol.atom_count()).collect();
    by_rank.sort_by_key(|&atom| ranks[atom]);

    let mut out = String::new();
    for start in by_rank {
        if writer.visited[start] {
            continue;
        }
        if !out.is_empty() {
            out.push('.');
        }
        writer.discover(start);
        writer.write(start, &mut out);
    }
    out
}

/// A distinct rank per atom that depends only on the graph.
fn canonical_ranks(mol: &Molecule) -> Vec<usize> {
    let mut ranks = refine(mol, dense_rank(&atom_invariants(mol)));
    while let Some(tied) = first_tie(&ranks) {
        let mut split: Vec<usize> = ranks.iter().map(|&r| 2 * r + 1).collect();
        split[tied] -= 1;
        ranks = refine(mol, dense_rank(&split));
    }
    ranks
}

/// Position of each key among the distinct keys, in order.
fn dense_rank<T: Ord>(keys: &[T]) -> Vec<usize> {
    let mut distinct: Vec<&T> = keys.iter().collect();
    distinct.sort();
    distinct.dedup();
    keys.iter()
        .map(|key| distinct.partition_point(|d| *d < key))
        .collect()
}

fn class_count(ranks: &[usize]) -> usize {
    ranks.iter().max().map_or(0, |&max| max + 1)
}

fn refine(mol: &Molecule, mut ranks: Vec<usize>) -> Vec<usize> {
    loop {
        let keys: Vec<(usize, Vec<(usize, u8)>)> = (0..mol.atom_count())
            .map(|atom| {
                let mut around: Vec<(usize, u8)> = mol.adjacency[atom]
                    .iter()
                    .map(|&(nb, bond)| (ranks[nb], mol.bonds[bond].order.mol_code()))
                    .collect();
                around.sort_unstable();
                (ranks[atom], around)
            })
            .collect();
        let next = dense_rank(&keys);
        if class_count(&next) == class_count(&ranks) {
            return next;
        }
        ranks = next;
    }
}

/// First atom of the lowest ranked class with more than one member.
fn first_tie(ranks: &[usize]) -> Option<usize> {
    let mut members = vec![0usize; ranks.len()];
    for &rank in ranks {
        members[rank] += 1;
    }
    let tied = members.iter().position(|&count| count > 1)?;
    ranks.iter().position(|&rank| rank == tied)
}

enum Step {
    Atom { atom: usize, via: Option<usize> },
    Open,
    Close,
}

struct Writer<'a> {
    mol: &'a Molecule,
    /// (neighbor, bond) per atom, lowest rank first
    neighbors: Vec<Vec<(usize, usize)>>,
    valence: Vec<u16>,
    visited: Vec<bool>,
    bond_used: Vec<bool>,
    children: Vec<Vec<(usize, usize)>>,
    ring_opens: Vec<Vec<usize>>,
    ring_closes: Vec<Vec<usize>>,
    /// ring digit → bond currently using it; slot 0 is never handed out
    digits: Vec<Option<usize>>,
}

impl<'a> Writer<'a> {
    fn new(mol: &'a Molecule, ranks: &[usize]) -> Self {
        let n = mol.atom_count();
        let neighbors = mol
            .adjacency
            .iter()
            .map(|adj| {
                let mut sorted = adj.clone();
                sorted.sort_by_key(|&(nb, _)| ranks[nb]);
                sorted
            })
            .collect();
        let mut valence = vec![0u16; n];
        for bond in &mol.bonds {
            let order = u16::from(bond.order.valence());
            valence[bond.atom1] = valence[bond.atom1].saturating_add(order);
            valence[bond.atom2] = valence[bond.atom2].saturating_add(order);
        }
        Writer {
            mol,
            neighbors,
            valence,
            visited: vec![false; n],
            bond_used: vec![false; mol.bond_count()],
            children: vec![Vec::new(); n],
            ring_opens: vec![Vec::new(); n],
            ring_closes: vec![Vec::new(); n],
            digits: vec![None],
        }
    }

    /// Split the component's bonds into tree edges and ring closures.
    fn discover(&mut self, start: usize) {
        self.visited[start] = true;
        let mut stack = vec![(start, 0usize)];
        while let Some((atom, cursor)) = stack.last_mut() {
            let atom = *atom;
            let Some(&(nb, bond)) = self.neighbors[atom].get(*cursor) else {
                stack.pop();
                continue;
            };
            *cursor += 1;
            if self.bond_used[bond] {
                continue;
            }
            self.bond_used[bond] = true;
            if self.visited[nb] {
                // back edge: opens at the ancestor, which is written first
                self.ring_opens[nb].push(bond);
                self.ring_closes[atom].push(bond);
            } else {
                self.visited[nb] = true;
                self.children[atom].push((nb, bond));
                stack.push((nb, 0));
            }
        }
    }

    fn write(&mut self, start: usize, out: &mut String) {
        let mut steps = vec![Step::Atom { atom: start, via: None }];
        while let Some(step) = steps.pop() {
            let (atom, via) = match step {
                Step::Open => {
                    out.push('(');
                    continue;
                }
                Step::Close => {
                    out.push(')');
                    continue;
                }
                Step::Atom { atom, via } => (atom, via),
            };
            if let Some(bond) = via {
                out.push_str(self.bond_symbol(bond));
            }
            out.push_str(&atom_token(&self.mol.atoms[atom], self.valence[atom]));
            self.write_ring_digits(atom, out);

            // every child but the last goes in a branch
            if let Some((&(last, last_bond), rest)) = self.children[atom].split_last() {
                steps.push(Step::Atom { atom: last, via: Some(last_bond) });
                for &(child, bond) in rest.iter().rev() {
                    steps.push(Step::Close);
                    steps.push(Step::Atom { atom: child, via: Some(bond) });
                    steps.push(Step::Open);
                }
            }
        }
    }

    fn write_ring_digits(&mut self, atom: usize, out: &mut String) {
        let closing: Vec<usize> = self.ring_closes[atom]
            .iter()
            .filter_map(|&bond| self.digits.iter().position(|slot| *slot == Some(bond)))
            .collect();
        for &digit in &closing {
            push_ring_digit(out, digit);
        }

        let opens = self.ring_opens[atom].clone();
        for bond in opens {
            let digit = self.allocate_digit(bond);
            out.push_str(self.bond_symbol(bond));
            push_ring_digit(out, digit);
        }

        for digit in closing {
            self.digits[digit] = None;
        }
    }

    fn allocate_digit(&mut self, bond: usize) -> usize {
        match self.digits.iter().skip(1).position(Option::is_none) {
            Some(free) => {
                self.digits[free + 1] = Some(bond);
                free + 1
            }
            None => {
                self.digits.push(Some(bond));
                self.digits.len() - 1
            }
        }
    }

    fn bond_symbol(&self, bond: usize) -> &'static str {
        let bond = &self.mol.bonds[bond];
        let aromatic_ends =
            self.mol.atoms[bond.atom1].is_aromatic && self.mol.atoms[bond.atom2].is_aromatic;
        match bond.order {
            BondOrder::Single if aromatic_ends => "-",
            BondOrder::Single => "",
            BondOrder::Double => "=",
            BondOrder::Triple => "#",
            BondOrder::Aromatic if aromatic_ends => "",
            BondOrder::Aromatic => ":",
        }
    }
}

fn push_ring_digit(out: &mut String, digit: usize) {
    if digit < 10 {
        out.push_str(&digit.to_string());
    } else {
        out.push_str(&format!("%{digit}"));
    }
}

fn in_organic_subset(atom: &MolAtom) -> bool {
    match atom.atomic_number {
        5 | 6 | 7 | 8 | 15 | 16 => true,
        9 | 17 | 35 | 53 => !atom.is_aromatic,
        _ => false,
    }
}

fn atom_token(atom: &MolAtom, valence: u16) -> String {
    let symbol = if atom.is_aromatic {
        atom.symbol().to_ascii_lowercase()
    } else {
        atom.symbol().to_string()
    };

    if in_organic_subset(atom) && atom.formal_charge == 0 && atom.isotope.is_none() {
        let used = u8::try_from(valence)
            .unwrap_or(u8::MAX)
            .saturating_add(u8::from(atom.is_aromatic));
        if implicit_hydrogens(atom.atomic_number, used) == atom.implicit_hydrogens {
            return symbol;
        }
    }

    let mut token = String::from("[");
    if let Some(isotope) = atom.isotope {
        token.push_str(&isotope.to_string());
    }
    token.push_str(&symbol);
    match atom.implicit_hydrogens {
        0 => {}
        1 => token.push('H'),
        n => token.push_str(&format!("H{n}")),
    }
    let sign = if atom.formal_charge > 0 { '+' } else { '-' };
    match atom.formal_charge.unsigned_abs() {
        0 => {}
        1 => token.push(sign),
        n @ 2..=9 => token.push_str(&format!("{sign}{n}")),
        n => token.extend(std::iter::repeat(sign).take(usize::from(n))),
    }
    token.push(']');
    token
}
