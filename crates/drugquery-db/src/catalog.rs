//! JSON catalog used to seed and persist an in-memory repository.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use drugquery_common::{Compound, Docking, Gene, Job, Pocket, ProteinStructure, Target, Upload};

use crate::error::Result;

/// Flat dump of every entity table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub genes: Vec<Gene>,
    #[serde(default)]
    pub structures: Vec<ProteinStructure>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub pockets: Vec<Pocket>,
    #[serde(default)]
    pub compounds: Vec<Compound>,
    #[serde(default)]
    pub dockings: Vec<Docking>,
    #[serde(default)]
    pub uploads: Vec<Upload>,
    #[serde(default)]
    pub jobs: Vec<Job>,
}

impl Catalog {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        info!(
            path = %path.display(),
            compounds = catalog.compounds.len(),
            dockings = catalog.dockings.len(),
            "Loaded catalog"
        );
        Ok(catalog)
    }

    /// Write the catalog atomically (temp file + rename).
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let tmp = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "Saved catalog");
        Ok(())
    }
}
