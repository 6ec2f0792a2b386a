//! Best-result resolution against a seeded repository.

use std::path::PathBuf;

use drugquery_common::{BestResult, DrugQueryError};
use drugquery_db::Repository;
use drugquery_ranker::BestResultResolver;
use drugquery_test_utils::example_compound;

#[tokio::test]
async fn test_resolves_minimum_score_and_ancestry() {
    let fx = example_compound().await.unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());

    let best = resolver.resolve_id(fx.compound.id).await.unwrap();
    let snapshot = best.snapshot().expect("resolved snapshot");

    assert_eq!(snapshot.docking.top_score, 1.1);
    assert_eq!(snapshot.docking.id, fx.dockings[1].id);
    assert_eq!(snapshot.target.name, "T1");
    assert_eq!(snapshot.pocket.id, fx.pockets[0].id);
    assert_eq!(snapshot.gene.name, "EGFR");
    assert_eq!(snapshot.structure.pdb_code, "1M17");

    let stored = fx.repo.compound(fx.compound.id).await.unwrap();
    assert_eq!(stored.best, best);
}

#[tokio::test]
async fn test_second_resolve_performs_no_write() {
    let fx = example_compound().await.unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());

    resolver.resolve_id(fx.compound.id).await.unwrap();
    assert_eq!(fx.repo.snapshot_write_count(), 1);

    let again = resolver.resolve_id(fx.compound.id).await.unwrap();
    assert_eq!(fx.repo.snapshot_write_count(), 1);
    assert_eq!(again.snapshot().map(|s| s.docking.top_score), Some(1.1));
}

#[tokio::test]
async fn test_cached_snapshot_is_kept_when_better_docking_arrives() {
    let fx = example_compound().await.unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());
    resolver.resolve_id(fx.compound.id).await.unwrap();

    fx.repo
        .insert_docking(fx.compound.id, fx.pockets[1].id, -2.0, PathBuf::from("dockings/new.pdbqt"))
        .await
        .unwrap();

    // cache fill, not refresh
    let stale = resolver.resolve_id(fx.compound.id).await.unwrap();
    assert_eq!(stale.snapshot().map(|s| s.docking.top_score), Some(1.1));

    fx.repo.clear_best_result(fx.compound.id).await.unwrap();
    let fresh = resolver.resolve_id(fx.compound.id).await.unwrap();
    assert_eq!(fresh.snapshot().map(|s| s.docking.top_score), Some(-2.0));
    assert_eq!(fresh.snapshot().map(|s| s.target.name.as_str()), Some("T2"));
}

#[tokio::test]
async fn test_compound_without_dockings() {
    let fx = example_compound().await.unwrap();
    let lonely = fx.repo.insert_compound("CCO", Some("ethanol")).await.unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());

    let best = resolver.resolve(&lonely).await.unwrap();
    assert_eq!(best, BestResult::NoDockings);
    assert!(best.snapshot().is_none());
    assert_eq!(fx.repo.snapshot_write_count(), 1);

    let stored = fx.repo.compound(lonely.id).await.unwrap();
    resolver.resolve(&stored).await.unwrap();
    assert_eq!(fx.repo.snapshot_write_count(), 1);
}

#[tokio::test]
async fn test_deleting_best_docking_forces_reresolution() {
    let fx = example_compound().await.unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());
    resolver.resolve_id(fx.compound.id).await.unwrap();

    fx.repo.delete_docking(fx.dockings[1].id).await.unwrap();
    let stored = fx.repo.compound(fx.compound.id).await.unwrap();
    assert!(stored.best.is_unresolved());

    let best = resolver.resolve(&stored).await.unwrap();
    assert_eq!(best.snapshot().map(|s| s.docking.top_score), Some(3.2));
}

#[tokio::test]
async fn test_orphaned_pocket_is_broken_ancestry() {
    let fx = example_compound().await.unwrap();
    let orphan = fx.repo.insert_pocket(9999, 4).await.unwrap();
    fx.repo
        .insert_docking(fx.compound.id, orphan.id, -20.0, PathBuf::from("dockings/orphan.pdbqt"))
        .await
        .unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());

    let err = resolver.resolve_id(fx.compound.id).await.unwrap_err();
    match err {
        DrugQueryError::BrokenAncestry { missing, .. } => assert_eq!(missing, "target"),
        other => panic!("unexpected error: {other}"),
    }
    // nothing persisted on failure
    assert_eq!(fx.repo.snapshot_write_count(), 0);
    assert!(fx.repo.compound(fx.compound.id).await.unwrap().best.is_unresolved());
}

#[tokio::test]
async fn test_unknown_compound_is_not_found() {
    let fx = example_compound().await.unwrap();
    let resolver = BestResultResolver::new(fx.dyn_repo());
    assert!(matches!(
        resolver.resolve_id(424242).await.unwrap_err(),
        DrugQueryError::NotFound(_)
    ));
}
