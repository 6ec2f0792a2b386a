//! Prediction score table parsing.
//!
//! A score file is plain text with one row per line and whitespace-separated
//! columns: a target identifier followed by one or more numeric scores. An
//! optional header line (recognised by a non-numeric second column) names
//! the columns. Rows are returned in file order, never re-sorted.

use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use drugquery_common::config::ScoresConfig;
use drugquery_common::{DrugQueryError, Result};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRow {
    pub target: String,
    pub score: f64,
    /// Score columns after the first, if any.
    pub extra: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreTable {
    pub columns: Option<Vec<String>>,
    pub rows: Vec<ScoreRow>,
}

/// Outcome of reading a compound's score file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Predictions {
    /// No score file has been computed for the compound yet.
    NoPredictions,
    Table(ScoreTable),
}

impl Predictions {
    pub fn rows(&self) -> &[ScoreRow] {
        match self {
            Predictions::NoPredictions => &[],
            Predictions::Table(table) => &table.rows,
        }
    }
}

pub struct ScoreTableParser {
    config: ScoresConfig,
    media_root: PathBuf,
}

impl ScoreTableParser {
    pub fn new(config: ScoresConfig, media_root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            media_root: media_root.into(),
        }
    }

    /// Read and parse `score_file` (relative paths resolve under the media
    /// root). A missing reference or a missing file yields `NoPredictions`.
    pub async fn parse(&self, score_file: Option<&Path>) -> Result<Predictions> {
        let Some(relative) = score_file else {
            return Ok(Predictions::NoPredictions);
        };
        let path = self.media_root.join(relative);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Score file not present");
                return Ok(Predictions::NoPredictions);
            }
            Err(e) => return Err(e.into()),
        };
        let content = decode(bytes, &path)?;

        let table = parse_table(&content, &path, self.config.max_rows)?;
        debug!(path = %path.display(), rows = table.rows.len(), "Parsed score table");
        Ok(Predictions::Table(table))
    }
}

/// Score files are text; undecodable bytes make the file corrupt, reported
/// at the line holding the first bad byte.
fn decode(bytes: Vec<u8>, path: &Path) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        let valid = &e.as_bytes()[..e.utf8_error().valid_up_to()];
        DrugQueryError::CorruptScoreFile {
            path: path.to_path_buf(),
            line: valid.iter().filter(|&&b| b == b'\n').count() + 1,
            reason: "not valid UTF-8".to_string(),
        }
    })
}

/// Parse `content` fully, then keep the first `max_rows` data rows. A bad
/// row anywhere in the file fails the whole parse.
pub fn parse_table(content: &str, path: &Path, max_rows: usize) -> Result<ScoreTable> {
    let corrupt = |line: usize, reason: String| DrugQueryError::CorruptScoreFile {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty())
        .peekable();

    let mut columns = None;
    let mut width = None;
    if let Some((_, first)) = lines.peek() {
        let fields: Vec<&str> = first.split_whitespace().collect();
        if fields.len() >= 2 && fields[1].parse::<f64>().is_err() {
            width = Some(fields.len());
            columns = Some(fields.iter().map(|f| f.to_string()).collect());
            lines.next();
        }
    }

    let mut rows = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(corrupt(line_no, format!("expected at least 2 columns, found {}", fields.len())));
        }
        let expected = *width.get_or_insert(fields.len());
        if fields.len() != expected {
            return Err(corrupt(
                line_no,
                format!("expected {expected} columns, found {}", fields.len()),
            ));
        }

        let mut scores = Vec::with_capacity(fields.len() - 1);
        for field in &fields[1..] {
            let value: f64 = field
                .parse()
                .map_err(|_| corrupt(line_no, format!("non-numeric score {field:?}")))?;
            scores.push(value);
        }
        let score = scores.remove(0);

        if rows.len() < max_rows {
            rows.push(ScoreRow {
                target: fields[0].to_string(),
                score,
                extra: scores,
            });
        }
    }

    Ok(ScoreTable { columns, rows })
}
