//! Whole-corpus similarity sweep with per-property dynamic filters.

use std::sync::Arc;

use crate::domain::property::PropertyRecord;
use crate::domain::search::{Modality, PropertyFilters, SearchMode};
use crate::error::Result;
use crate::processing::searcher::{PropertySearcher, process_similarity_query};
use crate::repository::VectorStore;

const SCROLL_PAGE_SIZE: usize = 100;

/// Margins used to derive per-property filter bounds from the property's
/// own price and bedroom count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamicFilterSpec {
    pub price_margin: f64,
    pub bedroom_margin: i64,
}

impl Default for DynamicFilterSpec {
    fn default() -> Self {
        Self {
            price_margin: 5_000.0,
            bedroom_margin: 2,
        }
    }
}

/// Bounds centered on the property's own attributes, clamped at zero.
pub fn derive_filters(record: &PropertyRecord, spec: &DynamicFilterSpec) -> PropertyFilters {
    let price = record.list_price.unwrap_or(0.0);
    let bedrooms = record.bedrooms.unwrap_or(0);

    PropertyFilters {
        min_price: Some((price - spec.price_margin).max(0.0)),
        max_price: Some(price + spec.price_margin),
        min_bedrooms: Some((bedrooms - spec.bedroom_margin).max(0)),
        max_bedrooms: Some(bedrooms + spec.bedroom_margin),
        ..Default::default()
    }
}

/// One sweep result: the anchor and the ids ranked similar to it.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRow {
    pub property_id: u64,
    pub listing_id: String,
    pub similar_ids: Vec<u64>,
}

/// Runs the similarity query for every indexed property, deriving filters
/// from each property's own attributes. Pages through the location
/// collection; per-property query failures yield an empty row rather than
/// aborting the sweep.
pub async fn similar_for_all(
    store: &Arc<dyn VectorStore>,
    searcher: &PropertySearcher,
    mode: SearchMode,
    top_k: usize,
    spec: &DynamicFilterSpec,
) -> Result<Vec<SweepRow>> {
    let collection = Modality::Location.collection();
    let mut rows = Vec::new();
    let mut offset = None;

    loop {
        let (page, next_offset) = store.scroll(collection, offset, SCROLL_PAGE_SIZE).await?;
        for point in page {
            let Some(payload) = point.payload else {
                log::warn!("Point {} has no payload, skipping in sweep", point.id);
                continue;
            };
            let filters = derive_filters(&payload, spec);
            let similar = process_similarity_query(
                searcher,
                point.id,
                mode,
                Some(filters),
                top_k,
                None,
            )
            .await;

            rows.push(SweepRow {
                property_id: point.id,
                listing_id: payload.listing_id,
                similar_ids: similar.into_iter().map(|record| record.id).collect(),
            });
        }

        match next_offset {
            Some(_) => offset = next_offset,
            None => break,
        }
    }

    log::info!("Similarity sweep covered {} properties", rows.len());
    Ok(rows)
}
