//! drugquery-ranker: Best docking resolution and prediction score tables.

pub mod resolver;
pub mod score_table;

pub use resolver::BestResultResolver;
pub use score_table::{Predictions, ScoreRow, ScoreTable, ScoreTableParser};
