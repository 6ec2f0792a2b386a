//! Fingerprint similarity search over the stored compound corpus.
//!
//! The search is a linear scan: every compound's fingerprint is compared with
//! the query. Corpus fingerprints are memoized per compound id (and checked
//! against the compound's SMILES) so repeated queries only pay for the query.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

use drugquery_common::config::SearchConfig;
use drugquery_common::{Compound, CompoundId, Result};

use crate::fingerprint::{morgan_fingerprint, tanimoto_similarity, Fingerprint};
use crate::smiles::parse_smiles;

/// One ranked search result.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityHit {
    pub compound: Compound,
    pub similarity: f64,
}

struct CachedFingerprint {
    smiles: String,
    fingerprint: Fingerprint,
}

pub struct SimilaritySearchEngine {
    config: SearchConfig,
    cache: RwLock<HashMap<CompoundId, CachedFingerprint>>,
}

impl SimilaritySearchEngine {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Fingerprint a SMILES string with the configured radius and size.
    pub fn fingerprint(&self, smiles: &str) -> Result<Fingerprint> {
        let mol = parse_smiles(smiles)?;
        Ok(morgan_fingerprint(
            &mol,
            self.config.fingerprint_radius,
            self.config.fingerprint_bits,
        ))
    }

    /// Rank `corpus` by similarity to `query`, most similar first.
    ///
    /// An unparsable query fails with `InvalidQueryStructure` before any
    /// comparison is made. Ties keep corpus order. Corpus entries whose own
    /// SMILES cannot be parsed are skipped with a warning.
    pub fn search(&self, query: &str, corpus: &[Compound]) -> Result<Vec<SimilarityHit>> {
        let query_fp = self.fingerprint(query).inspect_err(|e| {
            warn!(query, error = %e, "Rejected similarity query");
        })?;

        let mut hits: Vec<SimilarityHit> = corpus
            .iter()
            .filter_map(|compound| {
                let fp = self.corpus_fingerprint(compound)?;
                // engine fingerprints share one configured width
                let similarity = tanimoto_similarity(&query_fp, &fp)?;
                (similarity >= self.config.min_similarity).then(|| SimilarityHit {
                    compound: compound.clone(),
                    similarity,
                })
            })
            .collect();

        // sort_by is stable, so equal scores keep corpus order
        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(Ordering::Equal));

        if let Some(max) = self.config.max_results {
            hits.truncate(max);
        }

        debug!(query, corpus = corpus.len(), hits = hits.len(), "Similarity search complete");
        Ok(hits)
    }

    fn corpus_fingerprint(&self, compound: &Compound) -> Option<Fingerprint> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = cache.get(&compound.id) {
                if cached.smiles == compound.smiles {
                    return Some(cached.fingerprint.clone());
                }
            }
        }

        let fingerprint = match self.fingerprint(&compound.smiles) {
            Ok(fp) => fp,
            Err(e) => {
                warn!(compound_id = compound.id, error = %e, "Skipping compound with unparsable SMILES");
                return None;
            }
        };

        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(
            compound.id,
            CachedFingerprint {
                smiles: compound.smiles.clone(),
                fingerprint: fingerprint.clone(),
            },
        );
        Some(fingerprint)
    }

    /// Number of memoized corpus fingerprints.
    pub fn cached_fingerprints(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or_else(|e| e.into_inner().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drugquery_common::DrugQueryError;

    fn corpus(smiles: &[&str]) -> Vec<Compound> {
        smiles
            .iter()
            .enumerate()
            .map(|(i, s)| Compound::new(i as i64 + 1, s))
            .collect()
    }

    fn engine() -> SimilaritySearchEngine {
        SimilaritySearchEngine::new(SearchConfig::default())
    }

    #[test]
    fn test_empty_corpus_gives_empty_ranking() {
        let hits = engine().search("c1ccccc1O", &[]).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_invalid_query_is_an_error() {
        let compounds = corpus(&["CCO"]);
        let err = engine().search("C1CC(", &compounds).unwrap_err();
        assert!(matches!(err, DrugQueryError::InvalidQueryStructure(_)));
    }

    #[test]
    fn test_ranking_is_descending_and_exact_match_first() {
        let compounds = corpus(&["CCCCCC", "Cc1ccc(O)cc1", "Oc1ccccc1"]);
        let hits = engine().search("Oc1ccccc1", &compounds).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].compound.smiles, "Oc1ccccc1");
        assert!((hits[0].similarity - 1.0).abs() < 1e-12);
        assert!(hits.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(hits[1].compound.smiles, "Cc1ccc(O)cc1");
    }

    #[test]
    fn test_ties_keep_corpus_order() {
        let mut compounds = corpus(&["CCN", "CCN"]);
        compounds[1].id = 99;
        compounds[1].smiles = "NCC".to_string();
        let hits = engine().search("CCN", &compounds).unwrap();
        assert_eq!(hits[0].compound.id, 1);
        assert_eq!(hits[1].compound.id, 99);
    }

    #[test]
    fn test_threshold_and_limit() {
        let compounds = corpus(&["Oc1ccccc1", "CCCCCC", "Cc1ccc(O)cc1"]);
        let engine = SimilaritySearchEngine::new(SearchConfig {
            min_similarity: 0.99,
            ..SearchConfig::default()
        });
        let hits = engine.search("Oc1ccccc1", &compounds).unwrap();
        assert_eq!(hits.len(), 1);

        let engine = SimilaritySearchEngine::new(SearchConfig {
            max_results: Some(2),
            ..SearchConfig::default()
        });
        assert_eq!(engine.search("Oc1ccccc1", &compounds).unwrap().len(), 2);
    }

    #[test]
    fn test_unparsable_corpus_entry_skipped_and_cache_filled() {
        let compounds = corpus(&["CCO", "C1CC", "CCN"]);
        let engine = engine();
        let hits = engine.search("CCO", &compounds).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(engine.cached_fingerprints(), 2);
    }
}
