//! DrugQuery Chem - 2D structure handling for compound similarity search.
//!
//! 1. Parsing SMILES line notation into a molecular graph
//! 2. Canonical SMILES, the key compounds are stored under
//! 3. Morgan (ECFP-like) circular fingerprints
//! 4. Tanimoto similarity and corpus-wide ranking
//! 5. Writing canonical structure files (MOL V2000 blocks)

pub mod canonical;
pub mod fingerprint;
pub mod molecule;
pub mod similarity;
pub mod smiles;
pub mod structure_file;

pub use canonical::{canonical_smiles, canonicalize};
pub use fingerprint::{morgan_fingerprint, tanimoto_similarity, Fingerprint};
pub use molecule::{Bond, BondOrder, MolAtom, Molecule};
pub use similarity::{SimilarityHit, SimilaritySearchEngine};
pub use smiles::{parse_smiles, SmilesError};
pub use structure_file::to_mol_block;
