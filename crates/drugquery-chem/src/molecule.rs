//! Molecular graph representation.

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Valence contribution; aromatic bonds count 1 here and aromatic atoms
    /// get one extra unit subtracted when filling implicit hydrogens.
    pub fn valence(self) -> u8 {
        match self {
            BondOrder::Single | BondOrder::Aromatic => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        }
    }

    /// Bond type code used in MOL files.
    pub fn mol_code(self) -> u8 {
        match self {
            BondOrder::Single => 1,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Aromatic => 4,
        }
    }
}

/// An atom in a molecular graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    pub implicit_hydrogens: u8,
}

impl MolAtom {
    pub fn symbol(&self) -> &'static str {
        element_symbol(self.atomic_number)
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Molecule { atoms, bonds, adjacency }
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Per-bond flag: does the bond lie on a cycle?
    ///
    /// A bond is a ring bond iff its endpoints stay connected once it is removed.
    pub fn ring_bonds(&self) -> Vec<bool> {
        (0..self.bonds.len())
            .map(|bi| {
                let bond = &self.bonds[bi];
                self.connected_without(bond.atom1, bond.atom2, bi)
            })
            .collect()
    }

    /// Per-atom flag: is the atom part of any ring?
    pub fn ring_atoms(&self) -> Vec<bool> {
        let mut in_ring = vec![false; self.atoms.len()];
        for (bond, is_ring) in self.bonds.iter().zip(self.ring_bonds()) {
            if is_ring {
                in_ring[bond.atom1] = true;
                in_ring[bond.atom2] = true;
            }
        }
        in_ring
    }

    fn connected_without(&self, from: usize, to: usize, skip_bond: usize) -> bool {
        let mut seen = vec![false; self.atoms.len()];
        let mut stack = vec![from];
        seen[from] = true;
        while let Some(atom) = stack.pop() {
            if atom == to {
                return true;
            }
            for &(next, bi) in &self.adjacency[atom] {
                if bi != skip_bond && !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        false
    }
}

const SYMBOLS: [&str; 54] = [
    "*", "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S",
    "Cl", "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge",
    "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd",
    "In", "Sn", "Sb", "Te", "I",
];

/// Atomic number for an element symbol (case-sensitive), up to iodine.
pub fn atomic_number(symbol: &str) -> Option<u8> {
    SYMBOLS.iter().position(|s| *s == symbol).map(|n| n as u8)
}

pub fn element_symbol(atomic_number: u8) -> &'static str {
    SYMBOLS.get(atomic_number as usize).copied().unwrap_or("*")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carbon() -> MolAtom {
        MolAtom {
            atomic_number: 6,
            formal_charge: 0,
            isotope: None,
            is_aromatic: false,
            implicit_hydrogens: 0,
        }
    }

    #[test]
    fn test_ring_detection() {
        // cyclopropane with a methyl tail
        let atoms = vec![carbon(), carbon(), carbon(), carbon()];
        let bonds = vec![
            Bond { atom1: 0, atom2: 1, order: BondOrder::Single },
            Bond { atom1: 1, atom2: 2, order: BondOrder::Single },
            Bond { atom1: 2, atom2: 0, order: BondOrder::Single },
            Bond { atom1: 2, atom2: 3, order: BondOrder::Single },
        ];
        let mol = Molecule::new(atoms, bonds);
        assert_eq!(mol.ring_bonds(), vec![true, true, true, false]);
        assert_eq!(mol.ring_atoms(), vec![true, true, true, false]);
        assert_eq!(mol.degree(2), 3);
    }

    #[test]
    fn test_element_table() {
        assert_eq!(atomic_number("C"), Some(6));
        assert_eq!(atomic_number("Cl"), Some(17));
        assert_eq!(atomic_number("Br"), Some(35));
        assert_eq!(atomic_number("I"), Some(53));
        assert_eq!(atomic_number("Xx"), None);
        assert_eq!(element_symbol(8), "O");
    }
}
