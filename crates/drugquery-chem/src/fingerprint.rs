//! Circular (Morgan) fingerprints folded into a fixed-width bit set.
//!
//! Every atom starts from a hash of its local invariants. Each round mixes in
//! the neighbors' identifiers together with the connecting bond, so after `r`
//! rounds an identifier describes the atom's radius-`r` environment. All
//! identifiers from all rounds are folded into the bit set.

use std::hash::{Hash, Hasher};

use crate::molecule::Molecule;

/// Atom properties that do not depend on input order.
///
/// Shared by fingerprinting and canonical atom ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomInvariant {
    pub atomic_number: u8,
    pub degree: u8,
    pub hydrogens: u8,
    pub formal_charge: i8,
    pub isotope: u16,
    pub in_ring: bool,
    pub aromatic: bool,
}

pub fn atom_invariants(mol: &Molecule) -> Vec<AtomInvariant> {
    let in_ring = mol.ring_atoms();
    mol.atoms
        .iter()
        .enumerate()
        .map(|(i, atom)| AtomInvariant {
            atomic_number: atom.atomic_number,
            degree: u8::try_from(mol.degree(i)).unwrap_or(u8::MAX),
            hydrogens: atom.implicit_hydrogens,
            formal_charge: atom.formal_charge,
            isotope: atom.isotope.unwrap_or(0),
            in_ring: in_ring[i],
            aromatic: atom.is_aromatic,
        })
        .collect()
}

/// 64-bit FNV-1a. Stable across platforms and toolchains, unlike
/// `DefaultHasher`.
struct Fnv64(u64);

impl Default for Fnv64 {
    fn default() -> Self {
        Fnv64(0xcbf2_9ce4_8422_2325)
    }
}

impl Hasher for Fnv64 {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 ^ u64::from(b)).wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn finish(&self) -> u64 {
        self.0
    }
}

fn fnv<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Fnv64::default();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A fixed-width bit set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    words: Vec<u64>,
    nbits: usize,
}

impl Fingerprint {
    /// An all-zero fingerprint of `nbits` bits.
    pub fn new(nbits: usize) -> Self {
        Fingerprint {
            words: vec![0; nbits.div_ceil(64)],
            nbits,
        }
    }

    /// Set the bit an identifier folds onto.
    pub fn insert(&mut self, identifier: u64) {
        if let Some(bit) = self.fold(identifier) {
            self.words[bit / 64] |= 1 << (bit % 64);
        }
    }

    pub fn contains(&self, identifier: u64) -> bool {
        self.fold(identifier)
            .is_some_and(|bit| self.words[bit / 64] & (1 << (bit % 64)) != 0)
    }

    pub fn count_ones(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }

    pub fn nbits(&self) -> usize {
        self.nbits
    }

    /// Tanimoto coefficient: shared bits over bits set in either.
    ///
    /// `None` when the widths differ, since folded identifiers land on
    /// unrelated bits. Two empty fingerprints count as identical.
    pub fn tanimoto(&self, other: &Fingerprint) -> Option<f64> {
        if self.nbits != other.nbits {
            return None;
        }
        let (shared, either) = self
            .words
            .iter()
            .zip(&other.words)
            .fold((0u32, 0u32), |(shared, either), (a, b)| {
                (shared + (a & b).count_ones(), either + (a | b).count_ones())
            });
        if either == 0 {
            return Some(1.0);
        }
        Some(f64::from(shared) / f64::from(either))
    }

    fn fold(&self, identifier: u64) -> Option<usize> {
        (self.nbits > 0).then(|| (identifier % self.nbits as u64) as usize)
    }
}

/// Morgan fingerprint of `mol` after `radius` rounds (2 ≈ ECFP4).
pub fn morgan_fingerprint(mol: &Molecule, radius: usize, nbits: usize) -> Fingerprint {
    let mut fp = Fingerprint::new(nbits);
    let mut identifiers: Vec<u64> = atom_invariants(mol).iter().map(fnv).collect();
    identifiers.iter().for_each(|&id| fp.insert(id));

    for _ in 0..radius {
        identifiers = (0..mol.atom_count())
            .map(|atom| extend_environment(mol, &identifiers, atom))
            .collect();
        identifiers.iter().for_each(|&id| fp.insert(id));
    }
    fp
}

/// Identifier of `atom` grown by one bond.
fn extend_environment(mol: &Molecule, identifiers: &[u64], atom: usize) -> u64 {
    let mut neighbors: Vec<(u8, u64)> = mol.adjacency[atom]
        .iter()
        .map(|&(nb, bond)| (mol.bonds[bond].order.mol_code(), identifiers[nb]))
        .collect();
    // neighbor order must not leak input order
    neighbors.sort_unstable();
    fnv(&(identifiers[atom], neighbors))
}

/// Tanimoto similarity of two fingerprints of the same width.
pub fn tanimoto_similarity(a: &Fingerprint, b: &Fingerprint) -> Option<f64> {
    a.tanimoto(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    fn fp(smiles: &str) -> Fingerprint {
        morgan_fingerprint(&parse_smiles(smiles).unwrap(), 2, 2048)
    }

    fn sim(a: &Fingerprint, b: &Fingerprint) -> f64 {
        tanimoto_similarity(a, b).unwrap()
    }

    #[test]
    fn test_insert_folds_identifiers() {
        let mut fp = Fingerprint::new(128);
        assert!(!fp.contains(42));
        fp.insert(42);
        fp.insert(42 + 128);
        assert!(fp.contains(42));
        assert_eq!(fp.count_ones(), 1);
        fp.insert(100);
        assert_eq!(fp.count_ones(), 2);
    }

    #[test]
    fn test_zero_width_fingerprint_stays_empty() {
        let mut fp = Fingerprint::new(0);
        fp.insert(7);
        assert_eq!(fp.count_ones(), 0);
        assert_eq!(sim(&fp, &Fingerprint::new(0)), 1.0);
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(fp("CC(=O)Oc1ccccc1C(=O)O"), fp("CC(=O)Oc1ccccc1C(=O)O"));
    }

    #[test]
    fn test_atom_order_independent() {
        assert_eq!(fp("OCC"), fp("CCO"));
        assert_eq!(fp("c1ccccc1O"), fp("Oc1ccccc1"));
    }

    #[test]
    fn test_isotope_changes_the_fingerprint() {
        assert_ne!(fp("[13CH4]"), fp("C"));
    }

    #[test]
    fn test_self_similarity_is_one() {
        let a = fp("c1ccccc1");
        assert!((sim(&a, &a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_similarity_symmetric_and_bounded() {
        let a = fp("CCO");
        let b = fp("CCCO");
        let ab = sim(&a, &b);
        assert!((ab - sim(&b, &a)).abs() < 1e-12);
        assert!(ab > 0.0 && ab < 1.0, "tanimoto = {ab}");
    }

    #[test]
    fn test_different_widths_are_not_comparable() {
        let mol = parse_smiles("CCO").unwrap();
        let narrow = morgan_fingerprint(&mol, 2, 64);
        let wide = morgan_fingerprint(&mol, 2, 2048);
        assert_eq!(tanimoto_similarity(&narrow, &wide), None);
        assert_eq!(tanimoto_similarity(&wide, &narrow), None);
    }

    #[test]
    fn test_related_molecules_rank_above_unrelated() {
        let phenol = fp("Oc1ccccc1");
        let cresol = fp("Cc1ccc(O)cc1");
        let hexane = fp("CCCCCC");
        assert!(sim(&phenol, &cresol) > sim(&phenol, &hexane));
    }
}
