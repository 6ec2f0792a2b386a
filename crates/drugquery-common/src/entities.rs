/// Core entity types for docking results and their ancestry.
/// The ancestry chain is Docking → Pocket → Target → ProteinStructure → Gene;
/// every link is a reference by id, never ownership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

pub type GeneId = i64;
pub type StructureId = i64;
pub type TargetId = i64;
pub type PocketId = i64;
pub type CompoundId = i64;
pub type DockingId = i64;
pub type UploadId = i64;

// ---------------------------------------------------------------------------
// Gene / structure / target / pocket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    pub id: GeneId,
    pub name: String,
}

/// One resolved 3D structure ("Pdb"), belonging to exactly one gene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProteinStructure {
    pub id: StructureId,
    pub gene_id: GeneId,
    pub pdb_code: String,
}

/// A druggable region of a structure. `name` doubles as an export
/// directory name, so it has to be a single path component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub structure_id: StructureId,
    pub name: String,
    /// Reference structure file, relative to the media root.
    pub target_file: PathBuf,
}

impl Target {
    /// Is `name` usable as a single directory name?
    pub fn has_filesystem_safe_name(&self) -> bool {
        is_filesystem_safe(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pocket {
    pub id: PocketId,
    pub target_id: TargetId,
    pub index: u32,
}

// ---------------------------------------------------------------------------
// Docking
// ---------------------------------------------------------------------------

/// Result of docking one compound into one pocket. Lower `top_score` is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Docking {
    pub id: DockingId,
    pub compound_id: CompoundId,
    pub pocket_id: PocketId,
    pub top_score: f64,
    /// Result artifact, relative to the media root.
    pub docking_file: PathBuf,
}

// ---------------------------------------------------------------------------
// Best-result snapshot
// ---------------------------------------------------------------------------

/// Fully resolved ancestry of a compound's best docking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResultSnapshot {
    pub docking: Docking,
    pub pocket: Pocket,
    pub target: Target,
    pub structure: ProteinStructure,
    pub gene: Gene,
}

/// Memoized best result cached on a compound.
///
/// The tagged form replaces five independently nullable fields, so a
/// partially populated snapshot cannot be represented.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BestResult {
    #[default]
    Unresolved,
    NoDockings,
    Resolved(Box<BestResultSnapshot>),
}

impl BestResult {
    pub fn is_unresolved(&self) -> bool {
        matches!(self, BestResult::Unresolved)
    }

    pub fn snapshot(&self) -> Option<&BestResultSnapshot> {
        match self {
            BestResult::Resolved(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Does the snapshot point at the given docking?
    pub fn references_docking(&self, docking_id: DockingId) -> bool {
        self.snapshot()
            .map(|s| s.docking.id == docking_id)
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Compound
// ---------------------------------------------------------------------------

/// A unique small molecule, keyed by canonical SMILES.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub id: CompoundId,
    pub smiles: String,
    pub name: Option<String>,
    #[serde(default)]
    pub best: BestResult,
    /// Prediction score table, relative to the media root.
    pub score_file: Option<PathBuf>,
    /// Canonical structure file (MOL block), relative to the media root.
    pub structure_file: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl Compound {
    pub fn new(id: CompoundId, smiles: &str) -> Self {
        Self {
            id,
            smiles: smiles.trim().to_string(),
            name: None,
            best: BestResult::Unresolved,
            score_file: None,
            structure_file: None,
            created_at: Utc::now(),
        }
    }

    /// Name used for files derived from this compound. Falls back to the
    /// id and replaces anything that is not safe in a file name.
    pub fn file_stem(&self) -> String {
        let raw = match &self.name {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => format!("compound_{}", self.id),
        };
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Job / Upload
// ---------------------------------------------------------------------------

/// Work-queue record asking the external worker to dock a compound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub compound_id: CompoundId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn new(compound_id: CompoundId, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            compound_id,
            email: email.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// A user-submitted molecule awaiting deduplication against stored compounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub smiles: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// True when `name` is a single, non-special path component.
pub fn is_filesystem_safe(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.chars().any(|c| matches!(c, '/' | '\\' | '\0' | ':'))
}
