use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use propmatch::encoders::{ClipImageEncoder, MiniLmTextEncoder};
use propmatch::ingest;
use propmatch::models::config::AppConfig;
use propmatch::processing::embedding::{EmbeddingGenerator, HttpPhotoFetcher};
use propmatch::processing::indexer::{PropertyIndexer, process_index_batch};
use propmatch::processing::searcher::{ModeWeights, PropertySearcher, process_similarity_query};
use propmatch::repository::VectorStore;
use propmatch::repository::qdrant::QdrantVectorStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let store = match QdrantVectorStore::new(
        &config.qdrant_url,
        config.qdrant_api_key.clone(),
        Duration::from_secs(config.store_timeout_secs),
    ) {
        Ok(store) => Arc::new(store) as Arc<dyn VectorStore>,
        Err(e) => {
            log::error!("Failed to create vector store client: {e}");
            std::process::exit(1);
        }
    };

    let text_encoder = match MiniLmTextEncoder::new() {
        Ok(encoder) => Arc::new(encoder),
        Err(e) => {
            log::error!("Failed to initialize text encoder: {e}");
            std::process::exit(1);
        }
    };
    let image_encoder = match ClipImageEncoder::new() {
        Ok(encoder) => Arc::new(encoder),
        Err(e) => {
            log::error!("Failed to initialize image encoder: {e}");
            std::process::exit(1);
        }
    };
    let photo_fetcher = match HttpPhotoFetcher::new(Duration::from_secs(config.photo_timeout_secs))
    {
        Ok(fetcher) => Arc::new(fetcher),
        Err(e) => {
            log::error!("Failed to create photo fetcher: {e}");
            std::process::exit(1);
        }
    };

    let generator = EmbeddingGenerator::new(text_encoder, image_encoder, photo_fetcher)
        .with_photo_limit(config.photo_limit);
    let indexer = PropertyIndexer::new(Arc::clone(&store), generator);

    if let Err(e) = indexer.initialize_collections().await {
        log::error!("Failed to initialize collections: {e}");
        std::process::exit(1);
    }

    if let Some(path) = &config.records_path {
        match ingest::read_jsonl(Path::new(path)) {
            Ok(records) => {
                process_index_batch(&indexer, &records, config.index_concurrency).await;
            }
            Err(e) => log::error!("Failed to load records from {path}: {e}"),
        }
    }

    let searcher = PropertySearcher::new(Arc::clone(&store), ModeWeights::builtin())
        .with_visual(config.search.include_visual);

    if let Some(query_id) = config.search.query_id {
        let results = process_similarity_query(
            &searcher,
            query_id,
            config.search.mode,
            Some(config.search.filters.clone()),
            config.search.top_k,
            config.search_deadline_secs.map(Duration::from_secs),
        )
        .await;

        for (rank, record) in results.iter().enumerate() {
            log::info!(
                "Rank {}: property {} ({})",
                rank + 1,
                record.id,
                record.full_address
            );
        }
    }
}
