//! Shared fixtures: a seeded in-memory repository plus a media tree in a
//! temporary directory.
//!
//! The default fixture is compound C (`c1ccccc1O`, "phenol") docked against
//! two targets: "T1" (scores 3.2 and 1.1) and "T2" (score 5.0).

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use drugquery_common::{Compound, Config, Docking, Gene, Pocket, Target};
use drugquery_db::{InMemoryRepository, Repository};

pub struct Fixture {
    /// Keeps the scratch tree alive for the fixture's lifetime.
    pub dir: TempDir,
    pub config: Config,
    pub repo: Arc<InMemoryRepository>,
    pub compound: Compound,
    pub gene: Gene,
    pub t1: Target,
    pub t2: Target,
    pub pockets: Vec<Pocket>,
    /// In insertion order: T1 3.2, T1 1.1, T2 5.0.
    pub dockings: Vec<Docking>,
}

impl Fixture {
    pub fn media_root(&self) -> &Path {
        &self.config.storage.media_root
    }

    pub fn tmp_root(&self) -> &Path {
        &self.config.storage.tmp_root
    }

    /// Write `contents` to `relative` under the media root.
    pub fn write_media(&self, relative: impl AsRef<Path>, contents: &str) -> Result<PathBuf> {
        write_file(self.media_root(), relative.as_ref(), contents)?;
        Ok(relative.as_ref().to_path_buf())
    }

    /// Repository handle as the trait object the services take.
    pub fn dyn_repo(&self) -> Arc<dyn Repository> {
        self.repo.clone()
    }
}

/// Config rooted at `dir`: `dir/media` and `dir/tmp`.
pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::default();
    config.storage.media_root = dir.join("media");
    config.storage.tmp_root = dir.join("tmp");
    config
}

/// An empty repository with an empty media tree.
pub fn empty() -> Result<(TempDir, Config, Arc<InMemoryRepository>)> {
    let dir = tempfile::tempdir()?;
    let config = config_in(dir.path());
    std::fs::create_dir_all(&config.storage.media_root)?;
    Ok((dir, config, Arc::new(InMemoryRepository::new())))
}

/// Compound C with dockings against T1 and T2, and all referenced files on disk.
pub async fn example_compound() -> Result<Fixture> {
    let (dir, config, repo) = empty()?;
    let media = config.storage.media_root.clone();

    let gene = repo.insert_gene("EGFR").await?;
    let structure = repo.insert_structure(gene.id, "1M17").await?;

    let t1 = seed_target(&repo, &media, structure.id, "T1").await?;
    let t2 = seed_target(&repo, &media, structure.id, "T2").await?;
    let p1 = repo.insert_pocket(t1.id, 1).await?;
    let p2 = repo.insert_pocket(t2.id, 1).await?;

    let compound = repo.insert_compound("c1ccccc1O", Some("phenol")).await?;

    let mut dockings = Vec::new();
    for (pocket, score) in [(&p1, 3.2), (&p1, 1.1), (&p2, 5.0)] {
        let file = PathBuf::from(format!("dockings/phenol_{}_{}.pdbqt", pocket.id, dockings.len()));
        write_file(&media, &file, &format!("REMARK score {score}\n"))?;
        dockings.push(repo.insert_docking(compound.id, pocket.id, score, file).await?);
    }

    Ok(Fixture {
        dir,
        config,
        repo,
        compound,
        gene,
        t1,
        t2,
        pockets: vec![p1, p2],
        dockings,
    })
}

async fn seed_target(
    repo: &InMemoryRepository,
    media: &Path,
    structure_id: i64,
    name: &str,
) -> Result<Target> {
    let file = PathBuf::from(format!("targets/{name}.pdb"));
    write_file(media, &file, &format!("HEADER {name}\nEND\n"))?;
    Ok(repo.insert_target(structure_id, name, file).await?)
}

fn write_file(root: &Path, relative: &Path, contents: &str) -> Result<()> {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}
