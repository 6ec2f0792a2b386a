use std::path::Path;

use drugquery_common::config::ScoresConfig;
use drugquery_common::DrugQueryError;
use drugquery_ranker::{Predictions, ScoreTableParser};

fn parser(media: &Path) -> ScoreTableParser {
    ScoreTableParser::new(ScoresConfig::default(), media)
}

#[tokio::test]
async fn test_150_row_file_returns_first_100_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let mut content = String::from("target score\n");
    for i in 0..150 {
        content.push_str(&format!("target_{i:03} {}\n", -10.0 + i as f64 * 0.05));
    }
    std::fs::create_dir_all(dir.path().join("scores")).unwrap();
    std::fs::write(dir.path().join("scores/phenol.txt"), content).unwrap();

    let predictions = parser(dir.path())
        .parse(Some(Path::new("scores/phenol.txt")))
        .await
        .unwrap();

    let rows = predictions.rows();
    assert_eq!(rows.len(), 100);
    assert_eq!(rows[0].target, "target_000");
    assert_eq!(rows[99].target, "target_099");
    assert!(rows.windows(2).all(|w| w[0].target < w[1].target));
}

#[tokio::test]
async fn test_missing_file_is_no_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let parser = parser(dir.path());

    assert_eq!(parser.parse(None).await.unwrap(), Predictions::NoPredictions);
    assert_eq!(
        parser.parse(Some(Path::new("scores/absent.txt"))).await.unwrap(),
        Predictions::NoPredictions
    );
}

#[tokio::test]
async fn test_corrupt_file_reports_path_and_line() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bad.txt"), "T1 -7.0\nT2 -6.5\nT3 n/a\n").unwrap();

    let err = parser(dir.path())
        .parse(Some(Path::new("bad.txt")))
        .await
        .unwrap_err();
    match err {
        DrugQueryError::CorruptScoreFile { path, line, .. } => {
            assert_eq!(line, 3);
            assert!(path.ends_with("bad.txt"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_configured_row_limit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("s.txt"), "A 1\nB 2\nC 3\n").unwrap();
    let parser = ScoreTableParser::new(ScoresConfig { max_rows: 2 }, dir.path());

    let predictions = parser.parse(Some(Path::new("s.txt"))).await.unwrap();
    assert_eq!(predictions.rows().len(), 2);
}

#[tokio::test]
async fn test_undecodable_bytes_are_a_corrupt_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("binary.txt"), [0xff, 0xfe, b' ', b'1', b'\n']).unwrap();
    std::fs::write(dir.path().join("late.txt"), b"T1 -7.0\nT2 \xe9\n").unwrap();
    let parser = parser(dir.path());

    let err = parser.parse(Some(Path::new("binary.txt"))).await.unwrap_err();
    assert!(matches!(err, DrugQueryError::CorruptScoreFile { line: 1, .. }));

    match parser.parse(Some(Path::new("late.txt"))).await.unwrap_err() {
        DrugQueryError::CorruptScoreFile { line, reason, .. } => {
            assert_eq!(line, 2);
            assert_eq!(reason, "not valid UTF-8");
        }
        other => panic!("unexpected error: {other}"),
    }
}
