use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use braid_domain::{hash, result::SearchResult, ttl};
use braid_providers::store::{self, CacheRow};

pub const RESULT_LIMIT: usize = 5;
pub const CACHED_CONFIDENCE: f32 = 0.9;
pub const CACHED_CATEGORY: &str = "Cached";

/// Internal taxonomy of the similarity gateway. Every variant collapses to
/// an empty result at the caller; the codes only exist for the logs.
#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
	#[error("CACHE-404: no similar query surfaced within {attempts} polls.")]
	PollTimeout { attempts: u32 },
	#[error("CACHE-500: similarity store read failed: {0}")]
	StoreRead(braid_providers::Error),
	#[error("WEBHOOK-500: similarity ingress rejected the query: {0}")]
	Ingress(braid_providers::Error),
	#[error("Similarity lookup cancelled.")]
	Cancelled,
}

/// Two-tier semantic lookup: announce the query to the ingress, then poll
/// the store for a prior sighting of `(user_id, SHA-512(query))` with
/// exponential backoff. Returns at most [`RESULT_LIMIT`] cached results.
pub async fn find(
	similarity: &braid_config::Similarity,
	store_cfg: &braid_config::Store,
	query: &str,
	user_id: &str,
	cancel: &CancellationToken,
) -> Result<Vec<SearchResult>, SimilarityError> {
	let query_hash = hash::sha512_hex(query);

	braid_providers::similarity::notify_ingress(similarity, query, user_id, &query_hash)
		.await
		.map_err(SimilarityError::Ingress)?;

	for attempt in 0..similarity.poll_max_attempts {
		let exp = attempt.min(16);
		let delay = Duration::from_millis(similarity.poll_base_ms.saturating_mul(1_u64 << exp));

		tokio::select! {
			_ = cancel.cancelled() => return Err(SimilarityError::Cancelled),
			_ = sleep(delay) => {},
		}

		let rows = tokio::select! {
			_ = cancel.cancelled() => return Err(SimilarityError::Cancelled),
			rows = store::fetch_cached_query_rows(store_cfg, user_id, &query_hash) => {
				rows.map_err(SimilarityError::StoreRead)?
			},
		};

		if rows.is_empty() {
			debug!(attempt, "No similarity hit yet.");

			continue;
		}

		let cache_ids: Vec<i64> = rows.iter().map(|row| row.cache_id).collect();
		let joined = tokio::select! {
			_ = cancel.cancelled() => return Err(SimilarityError::Cancelled),
			joined = store::fetch_cache_join(store_cfg, &cache_ids, RESULT_LIMIT) => {
				joined.map_err(SimilarityError::StoreRead)?
			},
		};

		return Ok(project(joined, query));
	}

	Err(SimilarityError::PollTimeout { attempts: similarity.poll_max_attempts })
}

fn project(rows: Vec<CacheRow>, query: &str) -> Vec<SearchResult> {
	let now = ttl::now_ms();

	rows.into_iter()
		.take(RESULT_LIMIT)
		.map(|row| {
			let id = format!("cached-{}", row.id);
			let user_result = row.user_results.into_iter().next();
			let title = row
				.title
				.or_else(|| user_result.as_ref().and_then(|result| result.title.clone()))
				.or(row.query)
				.unwrap_or_else(|| query.to_string());
			let content = user_result
				.as_ref()
				.and_then(|result| result.content.clone())
				.or(row.content)
				.unwrap_or_default();
			let sources = user_result
				.and_then(|result| result.sources)
				.or(row.sources)
				.unwrap_or_default();

			SearchResult {
				id: id.clone(),
				root_id: id,
				parent_id: None,
				follow_up_query: None,
				title,
				content,
				sources,
				confidence: CACHED_CONFIDENCE,
				category: CACHED_CATEGORY.to_string(),
				timestamp: now,
				replies: Vec::new(),
				is_cached: true,
			}
		})
		.collect()
}
