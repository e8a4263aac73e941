mod common;

use std::sync::Arc;

use propmatch::domain::property::PropertyRecord;
use propmatch::domain::search::{Modality, PropertyFilters, SearchMode};
use propmatch::error::Error;
use propmatch::processing::searcher::{ModeWeights, PropertySearcher, process_similarity_query};
use propmatch::processing::sweep::{DynamicFilterSpec, similar_for_all};
use propmatch::repository::VectorStore;
use propmatch::repository::memory::InMemoryVectorStore;

use common::{create_modality_collections, sample_property, seed_point};

/// Anchor 1 plus candidates 2..=5. Both text collections rank candidates by
/// id distance from the anchor; the visual collection ranks candidate 4
/// closest instead.
async fn seeded_store<F>(mut payload_of: F) -> Arc<InMemoryVectorStore>
where
    F: FnMut(u64) -> PropertyRecord,
{
    let store = Arc::new(InMemoryVectorStore::new());
    create_modality_collections(&store).await;

    let text_angles = [(1u64, 0.0f32), (2, 0.1), (3, 0.2), (4, 0.3), (5, 0.4)];
    let visual_angles = [(1u64, 0.0f32), (4, 0.05), (3, 0.3), (5, 0.5), (2, 0.8)];

    for (id, theta) in text_angles {
        seed_point(&store, Modality::Location, id, theta, payload_of(id)).await;
        seed_point(&store, Modality::Features, id, theta, payload_of(id)).await;
    }
    for (id, theta) in visual_angles {
        seed_point(&store, Modality::Visual, id, theta, payload_of(id)).await;
    }
    store
}

fn searcher(store: &Arc<InMemoryVectorStore>) -> PropertySearcher {
    let store: Arc<dyn VectorStore> = store.clone();
    PropertySearcher::new(store, ModeWeights::builtin())
}

fn ids(records: &[PropertyRecord]) -> Vec<u64> {
    records.iter().map(|r| r.id).collect()
}

#[tokio::test]
async fn results_are_ranked_and_never_contain_the_anchor() {
    let store = seeded_store(sample_property).await;
    let results = searcher(&store)
        .find_similar(1, SearchMode::Balanced, None, 3)
        .await
        .expect("query should succeed");

    assert_eq!(ids(&results), vec![2, 3, 4]);
    assert!(!ids(&results).contains(&1), "a property is never its own neighbor");
}

#[tokio::test]
async fn sale_lease_always_follows_the_anchor() {
    let store = seeded_store(|id| {
        let mut payload = sample_property(id);
        if id == 2 {
            payload.sale_lease = Some("lease".into());
        }
        payload
    })
    .await;

    // The caller asks for leases; the anchor is a sale, so the override wins.
    let filters = PropertyFilters {
        sale_lease: Some("lease".into()),
        ..Default::default()
    };
    let results = searcher(&store)
        .find_similar(1, SearchMode::Balanced, Some(filters), 3)
        .await
        .expect("query should succeed");

    assert_eq!(ids(&results), vec![3, 4, 5]);
}

#[tokio::test]
async fn missing_anchor_is_not_found() {
    let store = seeded_store(sample_property).await;
    let result = searcher(&store)
        .find_similar(999, SearchMode::Balanced, None, 3)
        .await;
    assert!(matches!(result, Err(Error::NotFound(_))));

    // The query wrapper degrades the same failure to an empty result.
    let results =
        process_similarity_query(&searcher(&store), 999, SearchMode::Balanced, None, 3, None)
            .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn hard_bounds_filter_the_fused_ranking() {
    let store = seeded_store(|id| {
        let mut payload = sample_property(id);
        if id == 3 {
            payload.bedrooms = Some(5);
        }
        payload
    })
    .await;

    let filters = PropertyFilters {
        min_bedrooms: Some(4),
        ..Default::default()
    };
    let results = searcher(&store)
        .find_similar(1, SearchMode::Balanced, Some(filters), 3)
        .await
        .expect("query should succeed");

    assert_eq!(ids(&results), vec![3]);
}

#[tokio::test]
async fn required_amenities_are_matched_in_the_description() {
    let store = seeded_store(|id| {
        let mut payload = sample_property(id);
        if id == 2 {
            payload.description = Some("spacious unit, no extras listed".into());
        }
        payload
    })
    .await;

    let filters = PropertyFilters {
        must_have_amenities: vec!["parking".into()],
        ..Default::default()
    };
    let results = searcher(&store)
        .find_similar(1, SearchMode::Balanced, Some(filters), 3)
        .await
        .expect("query should succeed");

    assert_eq!(ids(&results), vec![3, 4, 5]);
}

#[tokio::test]
async fn visual_retrieval_is_an_explicit_toggle() {
    let store = seeded_store(sample_property).await;

    let text_only = searcher(&store)
        .find_similar(1, SearchMode::VisualFocus, None, 3)
        .await
        .expect("query should succeed");
    assert_eq!(text_only[0].id, 2, "without visual the text ranking decides");

    let with_visual = searcher(&store)
        .with_visual(true)
        .find_similar(1, SearchMode::VisualFocus, None, 3)
        .await
        .expect("query should succeed");
    assert_eq!(
        with_visual[0].id, 4,
        "with visual enabled the visually closest candidate wins"
    );
}

#[tokio::test]
async fn sweep_queries_every_property_with_derived_filters() {
    let store = seeded_store(sample_property).await;
    let dyn_store: Arc<dyn VectorStore> = store.clone();
    let searcher = searcher(&store);

    let rows = similar_for_all(
        &dyn_store,
        &searcher,
        SearchMode::Balanced,
        2,
        &DynamicFilterSpec::default(),
    )
    .await
    .expect("sweep should succeed");

    assert_eq!(rows.len(), 5);
    for row in &rows {
        assert!(
            !row.similar_ids.contains(&row.property_id),
            "sweep rows never include their own anchor"
        );
    }
    assert_eq!(rows[0].property_id, 1);
    assert_eq!(rows[0].listing_id, "L1");
    assert_eq!(rows[0].similar_ids, vec![2, 3]);
}
