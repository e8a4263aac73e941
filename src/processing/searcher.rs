//! Multi-collection retrieval and weighted reciprocal rank fusion.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::RRF_DAMPING;
use crate::domain::property::PropertyRecord;
use crate::domain::search::{FusedCandidate, Modality, PropertyFilters, SearchMode};
use crate::error::{Error, Result};
use crate::processing::filters::{AmenityMatcher, DescriptionMatcher, apply_filters};
use crate::repository::{ScoredPoint, VectorStore};

/// Per-modality fusion weights for one search mode. Weights sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModalityWeights {
    pub location: f64,
    pub features: f64,
    pub visual: f64,
}

impl ModalityWeights {
    fn get(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Location => self.location,
            Modality::Features => self.features,
            Modality::Visual => self.visual,
        }
    }

    fn sum(&self) -> f64 {
        self.location + self.features + self.visual
    }
}

/// Weight table over every search mode, validated for totality and per-mode
/// weight sums when constructed, so a misconfigured mode fails at startup
/// rather than at query time.
#[derive(Debug, Clone)]
pub struct ModeWeights {
    table: HashMap<SearchMode, ModalityWeights>,
}

impl ModeWeights {
    pub fn new(table: HashMap<SearchMode, ModalityWeights>) -> Result<Self> {
        for mode in SearchMode::ALL {
            let weights = table
                .get(&mode)
                .ok_or_else(|| Error::InvalidMode(format!("no weights defined for {mode}")))?;
            if (weights.sum() - 1.0).abs() > 1e-6 {
                return Err(Error::InvalidMode(format!(
                    "weights for {mode} sum to {}, expected 1.0",
                    weights.sum()
                )));
            }
        }
        Ok(Self { table })
    }

    pub fn builtin() -> Self {
        let table = HashMap::from([
            (
                SearchMode::Balanced,
                ModalityWeights {
                    location: 0.4,
                    features: 0.4,
                    visual: 0.2,
                },
            ),
            (
                SearchMode::VisualFocus,
                ModalityWeights {
                    location: 0.1,
                    features: 0.1,
                    visual: 0.8,
                },
            ),
            (
                SearchMode::FeaturesFocus,
                ModalityWeights {
                    location: 0.1,
                    features: 0.8,
                    visual: 0.1,
                },
            ),
            (
                SearchMode::LocationFocus,
                ModalityWeights {
                    location: 0.8,
                    features: 0.1,
                    visual: 0.1,
                },
            ),
            (
                SearchMode::BalancedWithoutVisual,
                ModalityWeights {
                    location: 0.5,
                    features: 0.5,
                    visual: 0.0,
                },
            ),
        ]);
        Self::new(table).expect("builtin weight table is total")
    }

    pub fn get(&self, mode: SearchMode) -> Result<ModalityWeights> {
        self.table
            .get(&mode)
            .copied()
            .ok_or_else(|| Error::InvalidMode(format!("no weights defined for {mode}")))
    }
}

/// Merge per-collection rankings with weighted reciprocal rank fusion.
///
/// Each entry at zero-based rank `r` in a collection's list adds
/// `w * 1/(κ + r + 1)` to its candidate's score, κ = [`RRF_DAMPING`].
/// Candidates absent from a list contribute nothing for it. The result is
/// ordered by score descending with ties broken by ascending id, so a
/// fused ranking is fully deterministic.
pub fn weighted_rrf_merge(
    rankings: &[(Modality, Vec<ScoredPoint>)],
    weights: ModalityWeights,
) -> Vec<FusedCandidate> {
    let mut scores: HashMap<u64, f64> = HashMap::new();
    for (modality, hits) in rankings {
        let weight = weights.get(*modality);
        for (rank, hit) in hits.iter().enumerate() {
            *scores.entry(hit.id).or_insert(0.0) += weight * (1.0 / (RRF_DAMPING + rank as f64 + 1.0));
        }
    }

    let mut fused: Vec<FusedCandidate> = scores
        .into_iter()
        .map(|(id, score)| FusedCandidate { id, score })
        .collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    fused
}

/// Finds listings similar to an anchor listing across the modality
/// collections and applies hard constraints to the fused ranking.
pub struct PropertySearcher {
    store: Arc<dyn VectorStore>,
    weights: ModeWeights,
    matcher: Box<dyn AmenityMatcher>,
    include_visual: bool,
}

impl PropertySearcher {
    pub fn new(store: Arc<dyn VectorStore>, weights: ModeWeights) -> Self {
        Self {
            store,
            weights,
            matcher: Box::new(DescriptionMatcher),
            include_visual: false,
        }
    }

    /// Also retrieve and fuse the visual collection per query. Off by
    /// default: the baseline fusion uses the two text collections even
    /// though indexing always populates all three.
    pub fn with_visual(mut self, include_visual: bool) -> Self {
        self.include_visual = include_visual;
        self
    }

    pub fn with_amenity_matcher(mut self, matcher: Box<dyn AmenityMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    fn query_modalities(&self) -> Vec<Modality> {
        if self.include_visual {
            vec![Modality::Location, Modality::Features, Modality::Visual]
        } else {
            vec![Modality::Location, Modality::Features]
        }
    }

    /// Returns up to `top_k` payloads of the best-ranked candidates passing
    /// the filters, best first. The anchor's own sale/lease value replaces
    /// whatever the caller put in `filters.sale_lease`.
    pub async fn find_similar(
        &self,
        query_id: u64,
        mode: SearchMode,
        filters: Option<PropertyFilters>,
        top_k: usize,
    ) -> Result<Vec<PropertyRecord>> {
        let weights = self.weights.get(mode)?;

        let mut anchor_payload: Option<PropertyRecord> = None;
        let mut rankings: Vec<(Modality, Vec<ScoredPoint>)> = Vec::new();
        for modality in self.query_modalities() {
            let collection = modality.collection();
            let want_payload = anchor_payload.is_none();
            let anchor = self
                .store
                .retrieve(collection, &[query_id], true, want_payload)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::NotFound(format!("property {query_id} not found in {collection}"))
                })?;
            let vector = anchor.vector.ok_or_else(|| {
                Error::NotFound(format!("property {query_id} has no vector in {collection}"))
            })?;
            if anchor_payload.is_none() {
                anchor_payload = anchor.payload;
            }

            let hits = self.store.search(collection, &vector, top_k * 2).await?;
            log::debug!("{collection} returned {} neighbors for {query_id}", hits.len());
            rankings.push((modality, hits));
        }

        let fused = weighted_rrf_merge(&rankings, weights);

        let shortlist: Vec<u64> = fused.iter().take(top_k * 5).map(|c| c.id).collect();
        let resolved = self
            .store
            .retrieve(Modality::Location.collection(), &shortlist, false, true)
            .await?;
        let mut payloads: HashMap<u64, PropertyRecord> = resolved
            .into_iter()
            .filter_map(|point| Some((point.id, point.payload?)))
            .collect();

        // A property is never its own neighbor; candidates keep fused order.
        let candidates: Vec<PropertyRecord> = shortlist
            .iter()
            .filter(|id| **id != query_id)
            .filter_map(|id| payloads.remove(id))
            .collect();

        let mut filters = filters.unwrap_or_default();
        filters.sale_lease = anchor_payload.and_then(|payload| payload.sale_lease);

        let mut kept = apply_filters(&candidates, &filters, self.matcher.as_ref());
        kept.truncate(top_k);
        Ok(kept)
    }
}

/// Query-level wrapper: failures are logged and reported as an explicit
/// empty result instead of propagating to the caller. An optional deadline
/// bounds the whole query.
pub async fn process_similarity_query(
    searcher: &PropertySearcher,
    query_id: u64,
    mode: SearchMode,
    filters: Option<PropertyFilters>,
    top_k: usize,
    deadline: Option<Duration>,
) -> Vec<PropertyRecord> {
    log::info!("Received similarity query for property {query_id} in {mode} mode");

    let query = searcher.find_similar(query_id, mode, filters, top_k);
    let outcome = match deadline {
        Some(deadline) => match tokio::time::timeout(deadline, query).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::TransientIo(format!(
                "similarity query for {query_id} exceeded {deadline:?}"
            ))),
        },
        None => query.await,
    };

    match outcome {
        Ok(results) => {
            log::info!(
                "Finished similarity query for property {query_id}: {} results",
                results.len()
            );
            results
        }
        Err(e) => {
            log::error!("Error searching for properties similar to {query_id}: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{ModalityWeights, ModeWeights, weighted_rrf_merge};
    use crate::domain::search::{Modality, SearchMode};
    use crate::error::Error;
    use crate::repository::ScoredPoint;

    fn hits(ids: &[u64]) -> Vec<ScoredPoint> {
        ids.iter()
            .enumerate()
            .map(|(rank, id)| ScoredPoint {
                id: *id,
                score: 1.0 - rank as f32 * 0.1,
            })
            .collect()
    }

    #[test]
    fn rrf_scores_follow_the_exact_formula() {
        // Location ranks [A, B, C]; features ranks [B, A, D]; A=1 B=2 C=3 D=4.
        let rankings = vec![
            (Modality::Location, hits(&[1, 2, 3])),
            (Modality::Features, hits(&[2, 1, 4])),
        ];
        let weights = ModalityWeights {
            location: 0.4,
            features: 0.4,
            visual: 0.2,
        };

        let fused = weighted_rrf_merge(&rankings, weights);

        let score_of = |id: u64| {
            fused
                .iter()
                .find(|c| c.id == id)
                .expect("candidate present")
                .score
        };
        assert!((score_of(2) - (0.4 / 61.0 + 0.4 / 61.0)).abs() < 1e-12);
        assert!((score_of(1) - (0.4 / 61.0 + 0.4 / 62.0)).abs() < 1e-12);
        assert!((score_of(3) - 0.4 / 63.0).abs() < 1e-12);

        // B outranks A because its features rank is better.
        assert_eq!(fused[0].id, 2);
        assert_eq!(fused[1].id, 1);
    }

    #[test]
    fn equal_scores_break_ties_by_ascending_id() {
        let rankings = vec![
            (Modality::Location, hits(&[9, 4])),
            (Modality::Features, hits(&[4, 9])),
        ];
        let weights = ModalityWeights {
            location: 0.5,
            features: 0.5,
            visual: 0.0,
        };

        let fused = weighted_rrf_merge(&rankings, weights);
        assert_eq!(fused[0].id, 4);
        assert_eq!(fused[1].id, 9);
        assert_eq!(fused[0].score, fused[1].score);
    }

    #[test]
    fn candidates_missing_from_a_list_contribute_nothing_for_it() {
        let rankings = vec![(Modality::Location, hits(&[1]))];
        let weights = ModalityWeights {
            location: 0.4,
            features: 0.4,
            visual: 0.2,
        };

        let fused = weighted_rrf_merge(&rankings, weights);
        assert_eq!(fused.len(), 1);
        assert!((fused[0].score - 0.4 / 61.0).abs() < 1e-12);
    }

    #[test]
    fn builtin_weight_table_is_total_and_normalized() {
        let weights = ModeWeights::builtin();
        for mode in SearchMode::ALL {
            let entry = weights.get(mode).expect("mode defined");
            assert!((entry.sum() - 1.0).abs() < 1e-6, "weights of {mode} sum to 1");
        }
    }

    #[test]
    fn partial_weight_tables_are_rejected_at_construction() {
        let table = HashMap::from([(
            SearchMode::Balanced,
            ModalityWeights {
                location: 0.5,
                features: 0.5,
                visual: 0.0,
            },
        )]);
        assert!(matches!(ModeWeights::new(table), Err(Error::InvalidMode(_))));
    }

    #[test]
    fn unnormalized_weights_are_rejected_at_construction() {
        let mut table = HashMap::new();
        for mode in SearchMode::ALL {
            table.insert(
                mode,
                ModalityWeights {
                    location: 0.5,
                    features: 0.5,
                    visual: 0.5,
                },
            );
        }
        assert!(matches!(ModeWeights::new(table), Err(Error::InvalidMode(_))));
    }
}
