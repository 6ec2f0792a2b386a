//! Request-level behaviour of the service over the example fixture.

use pretty_assertions::assert_eq;
use std::path::PathBuf;

use drugquery_agent::{user_message, DrugQueryService};
use drugquery_chem::canonicalize;
use drugquery_common::{BestResult, DrugQueryError};
use drugquery_db::Repository;
use drugquery_ranker::Predictions;
use drugquery_test_utils::{empty, example_compound, Fixture};

fn service(fx: &Fixture) -> DrugQueryService {
    DrugQueryService::new(fx.config.clone(), fx.dyn_repo())
}

#[tokio::test]
async fn test_stats_count_every_table() {
    let fx = example_compound().await.unwrap();
    let stats = service(&fx).stats().await.unwrap();
    assert_eq!((stats.genes, stats.targets, stats.pockets, stats.compounds), (1, 2, 2, 1));
}

#[tokio::test]
async fn test_compound_detail_resolves_and_reads_scores() {
    let fx = example_compound().await.unwrap();
    let scores = fx
        .write_media("scores/phenol.txt", "target score\nT1 -8.1\nT2 -6.0\n")
        .unwrap();
    fx.repo.set_score_file(fx.compound.id, scores).await.unwrap();

    let detail = service(&fx).compound_detail(fx.compound.id).await.unwrap();
    assert_eq!(detail.best.snapshot().map(|s| s.docking.top_score), Some(1.1));
    assert_eq!(detail.compound.best, detail.best);
    assert_eq!(detail.predictions.rows().len(), 2);
    assert_eq!(detail.predictions.rows()[0].target, "T1");
}

#[tokio::test]
async fn test_corrupt_scores_degrade_on_detail_but_not_on_scores() {
    let fx = example_compound().await.unwrap();
    let scores = fx.write_media("scores/phenol.txt", "T1 -8.1\nT2 oops\n").unwrap();
    fx.repo.set_score_file(fx.compound.id, scores).await.unwrap();
    let service = service(&fx);

    let detail = service.compound_detail(fx.compound.id).await.unwrap();
    assert_eq!(detail.predictions, Predictions::NoPredictions);

    assert!(matches!(
        service.scores(fx.compound.id).await.unwrap_err(),
        DrugQueryError::CorruptScoreFile { .. }
    ));
}

#[tokio::test]
async fn test_binary_score_file_degrades_on_detail() {
    let fx = example_compound().await.unwrap();
    let path = fx.media_root().join("scores/phenol.bin");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, [0xff, 0xfe, b' ', b'1', b'\n']).unwrap();
    fx.repo
        .set_score_file(fx.compound.id, PathBuf::from("scores/phenol.bin"))
        .await
        .unwrap();
    let service = service(&fx);

    let detail = service.compound_detail(fx.compound.id).await.unwrap();
    assert_eq!(detail.predictions, Predictions::NoPredictions);
    assert!(matches!(
        service.scores(fx.compound.id).await.unwrap_err(),
        DrugQueryError::CorruptScoreFile { .. }
    ));
}

#[tokio::test]
async fn test_search_ranks_the_stored_corpus() {
    let fx = example_compound().await.unwrap();
    fx.repo.insert_compound("CCCCCC", Some("hexane")).await.unwrap();
    fx.repo.insert_compound("Cc1ccc(O)cc1", Some("p-cresol")).await.unwrap();

    let hits = service(&fx).search_compounds("Oc1ccccc1").await.unwrap();
    let names: Vec<Option<&str>> = hits.iter().map(|h| h.compound.name.as_deref()).collect();
    assert_eq!(names, vec![Some("phenol"), Some("p-cresol"), Some("hexane")]);
}

#[tokio::test]
async fn test_invalid_search_query_gets_a_user_message() {
    let fx = example_compound().await.unwrap();
    let err = service(&fx).search_compounds("c1ccc(").await.unwrap_err();
    assert!(matches!(err, DrugQueryError::InvalidQueryStructure(_)));
    assert_eq!(user_message(&err), "Error: query is not a valid SMILES string");
}

#[tokio::test]
async fn test_overloaded_atom_query_is_rejected_not_ranked() {
    let fx = example_compound().await.unwrap();
    let mut query = String::from("c");
    for ring in 10..96 {
        query.push_str(&format!("#%{ring}"));
    }
    for ring in 10..96 {
        query.push_str(&format!(".C%{ring}"));
    }

    let err = service(&fx).search_compounds(&query).await.unwrap_err();
    assert!(matches!(err, DrugQueryError::InvalidQueryStructure(_)));
    assert_eq!(user_message(&err), "Error: query is not a valid SMILES string");
}

#[tokio::test]
async fn test_upload_creates_compound_structure_file_and_job() {
    let (_dir, config, repo) = empty().unwrap();
    let service = DrugQueryService::new(config.clone(), repo.clone());

    let outcome = service.submit_upload("CC(=O)O", "chemist@example.org").await.unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.job.email, "chemist@example.org");
    assert_eq!(outcome.job.compound_id, outcome.compound.id);

    let structure = outcome.compound.structure_file.clone().unwrap();
    let block = std::fs::read_to_string(config.storage.media_root.join(&structure)).unwrap();
    assert_eq!(outcome.compound.smiles, canonicalize("OC(C)=O").unwrap());
    assert!(block.starts_with(&format!("{}\n", outcome.compound.smiles)));
    assert!(block.contains("M  END"));

    let stored = repo.compound(outcome.compound.id).await.unwrap();
    assert_eq!(stored.structure_file, Some(structure));
}

#[tokio::test]
async fn test_duplicate_upload_reuses_compound() {
    let fx = example_compound().await.unwrap();
    let service = service(&fx);

    let outcome = service.submit_upload("  c1ccccc1O ", "second@example.org").await.unwrap();
    assert!(!outcome.created);
    assert_eq!(outcome.compound.id, fx.compound.id);
    assert_eq!(fx.repo.compounds().await.unwrap().len(), 1);
    assert_eq!(service.jobs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_upload_of_another_spelling_reuses_compound() {
    let (_dir, config, repo) = empty().unwrap();
    let service = DrugQueryService::new(config, repo.clone());

    let first = service.submit_upload("c1ccccc1O", "a@example.org").await.unwrap();
    let second = service.submit_upload("Oc1ccccc1", "b@example.org").await.unwrap();
    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.compound.id, first.compound.id);
    assert_eq!(repo.compounds().await.unwrap().len(), 1);
    assert_eq!(service.jobs().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_invalid_upload_creates_nothing() {
    let fx = example_compound().await.unwrap();
    let service = service(&fx);

    let err = service.submit_upload("C1CC", "x@example.org").await.unwrap_err();
    assert!(matches!(err, DrugQueryError::InvalidQueryStructure(_)));
    assert_eq!(fx.repo.compounds().await.unwrap().len(), 1);
    assert!(service.jobs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_redock_uses_placeholder_contact_and_jobs_are_newest_first() {
    let fx = example_compound().await.unwrap();
    let service = service(&fx);

    let first = service.redock_compound(fx.compound.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = service.redock_compound(fx.compound.id).await.unwrap();
    assert_eq!(first.email, "none@none.com");

    let ids: Vec<_> = service.jobs().await.unwrap().iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    assert!(matches!(
        service.redock_compound(9999).await.unwrap_err(),
        DrugQueryError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_genes_sorted_and_gene_detail() {
    let fx = example_compound().await.unwrap();
    fx.repo.insert_gene("BRAF").await.unwrap();
    fx.repo.insert_gene("ALK").await.unwrap();
    let service = service(&fx);

    let names: Vec<String> = service.genes().await.unwrap().into_iter().map(|g| g.name).collect();
    assert_eq!(names, vec!["ALK", "BRAF", "EGFR"]);

    let detail = service.gene_detail("EGFR").await.unwrap();
    let targets: Vec<&str> = detail.targets.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(targets, vec!["T1", "T2"]);
    assert!(service.gene_detail("BRAF").await.unwrap().targets.is_empty());
}

#[tokio::test]
async fn test_downloads() {
    let fx = example_compound().await.unwrap();
    let scores = fx.write_media("scores/phenol_scores.txt", "T1 -8.1\n").unwrap();
    fx.repo.set_score_file(fx.compound.id, scores).await.unwrap();
    let service = service(&fx);

    let response = service.download_scores(fx.compound.id).await.unwrap();
    assert_eq!(response.content_type, "application/force-download");
    assert_eq!(response.content_disposition, "attachment; filename=\"phenol_scores.txt\"");
    assert_eq!(response.into_bytes().await.unwrap(), b"T1 -8.1\n");

    // no structure file recorded for the fixture compound
    assert!(matches!(
        service.download_structure(fx.compound.id).await.unwrap_err(),
        DrugQueryError::NotFound(_)
    ));

    let archive = service.download_top_dockings(fx.compound.id).await.unwrap();
    assert!(archive.filename.starts_with("phenol__"));
    assert!(archive.filename.ends_with(".zip"));
}

#[tokio::test]
async fn test_resolve_through_service_is_memoized() {
    let fx = example_compound().await.unwrap();
    let service = service(&fx);
    let lonely = fx.repo.insert_compound("CCO", None).await.unwrap();

    assert_eq!(service.resolve(lonely.id).await.unwrap(), BestResult::NoDockings);
    service.resolve(fx.compound.id).await.unwrap();
    service.resolve(fx.compound.id).await.unwrap();
    assert_eq!(fx.repo.snapshot_write_count(), 2);

    fx.repo
        .insert_docking(lonely.id, fx.pockets[1].id, -1.0, PathBuf::from("dockings/eth.pdbqt"))
        .await
        .unwrap();
    let best = service.resolve(lonely.id).await.unwrap();
    assert_eq!(best.snapshot().map(|s| s.target.name.as_str()), Some("T2"));
}
