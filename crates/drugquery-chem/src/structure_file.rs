//! Canonical structure file output (MDL MOL V2000, 2D connectivity only).
//!
//! Coordinates are written as zeros; the file carries the graph, charges and
//! isotopes, which is what downstream tools need to regenerate geometry.

use std::fmt::Write;

use crate::molecule::Molecule;

/// Render `mol` as a MOL block titled `title`, terminated by `$$$$` so it
/// is also a valid single-record SDF.
pub fn to_mol_block(mol: &Molecule, title: &str) -> String {
    let mut out = String::new();

    // Write to a String cannot fail
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "  DrugQuery");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>3}{:>3}  0  0  0  0           0999 V2000",
        mol.atom_count(),
        mol.bond_count()
    );

    for atom in &mol.atoms {
        let _ = writeln!(
            out,
            "{:>10.4}{:>10.4}{:>10.4} {:<2}  0  0  0  0  0  0  0  0  0  0",
            0.0,
            0.0,
            0.0,
            atom.symbol()
        );
    }

    for bond in &mol.bonds {
        let _ = writeln!(
            out,
            "{:>3}{:>3}{:>3}  0  0  0  0",
            bond.atom1 + 1,
            bond.atom2 + 1,
            bond.order.mol_code()
        );
    }

    let charged: Vec<(usize, i8)> = mol
        .atoms
        .iter()
        .enumerate()
        .filter(|(_, a)| a.formal_charge != 0)
        .map(|(i, a)| (i + 1, a.formal_charge))
        .collect();
    // at most 8 entries per property line
    for chunk in charged.chunks(8) {
        let _ = write!(out, "M  CHG{:>3}", chunk.len());
        for (idx, charge) in chunk {
            let _ = write!(out, "{idx:>4}{charge:>4}");
        }
        let _ = writeln!(out);
    }

    let labelled: Vec<(usize, u16)> = mol
        .atoms
        .iter()
        .enumerate()
        .filter_map(|(i, a)| a.isotope.map(|iso| (i + 1, iso)))
        .collect();
    for chunk in labelled.chunks(8) {
        let _ = write!(out, "M  ISO{:>3}", chunk.len());
        for (idx, iso) in chunk {
            let _ = write!(out, "{idx:>4}{iso:>4}");
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "M  END");
    let _ = writeln!(out, "$$$$");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smiles::parse_smiles;

    #[test]
    fn test_mol_block_layout() {
        let mol = parse_smiles("CC(=O)[O-]").unwrap();
        let block = to_mol_block(&mol, "acetate");
        let lines: Vec<&str> = block.lines().collect();

        assert_eq!(lines[0], "acetate");
        assert!(lines[3].starts_with("  4  3"));
        assert!(lines[3].ends_with("V2000"));
        assert!(lines[4].contains(" C "));
        // double bond between atoms 2 and 3
        assert_eq!(lines[9], "  2  3  2  0  0  0  0");
        assert_eq!(lines[11], "M  CHG  1   4  -1");
        assert_eq!(lines[12], "M  END");
        assert_eq!(lines[13], "$$$$");
    }
}
