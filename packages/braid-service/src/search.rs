use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use braid_config::Config;
use braid_domain::{
	content, hash,
	result::{Reply, SearchHistoryItem, SearchResult},
	ttl,
};
use braid_storage::db::PageStore;

use crate::{SyncSink, prompts, similarity};

pub const ERROR_CATEGORY: &str = "Error";
pub const FALLBACK_MESSAGE: &str =
	"Search is temporarily unavailable. Please try again in a moment.";

pub struct SearchRequest {
	pub query: String,
	pub parent: Option<SearchResult>,
	pub user_id: Option<String>,
}

pub struct Service {
	pub config: Arc<Config>,
	pub store: Arc<PageStore>,
	pub sync: Arc<dyn SyncSink>,
}
impl Service {
	/// The full query path: local exact tier, remote semantic tier, then the
	/// live LLM call. Always yields at least one result; total failure
	/// surfaces as a single fallback result, never as an error.
	pub async fn search(
		&self,
		request: SearchRequest,
		cancel: &CancellationToken,
	) -> Vec<SearchResult> {
		let cache_key = request
			.parent
			.as_ref()
			.map(|parent| parent.id.clone())
			.unwrap_or_else(|| hash::root_key(&request.query));

		if let Some(hit) = self.local_lookup(&request, &cache_key).await {
			info!(id = %hit.id, "Serving locally stored result.");

			return vec![hit];
		}

		if let Some(user_id) = request.user_id.as_deref() {
			let found = similarity::find(
				&self.config.similarity,
				&self.config.store,
				&request.query,
				user_id,
				cancel,
			)
			.await;

			match found {
				Ok(results) if !results.is_empty() => return results,
				Ok(_) => {},
				Err(err) => {
					warn!(error = %err, "Similarity lookup failed; continuing to live search.");
				},
			}
		}

		self.live_search(&request, &cache_key, cancel).await
	}

	async fn local_lookup(&self, request: &SearchRequest, cache_key: &str) -> Option<SearchResult> {
		match request.parent.as_ref() {
			Some(parent) => {
				let thread = self.store.get_thread(&parent.id).await?;

				thread.replies.into_iter().find_map(|reply| match reply {
					Reply::Full(child)
						if child.follow_up_query.as_deref() == Some(request.query.as_str()) =>
						Some(*child),
					_ => None,
				})
			},
			None => self.store.get_thread(cache_key).await,
		}
	}

	async fn live_search(
		&self,
		request: &SearchRequest,
		cache_key: &str,
		cancel: &CancellationToken,
	) -> Vec<SearchResult> {
		let system_prompt = match request.parent.as_ref() {
			Some(parent) => prompts::follow_up_prompt(&parent.content),
			None => prompts::INITIAL_PROMPT.to_string(),
		};
		let answers = tokio::select! {
			_ = cancel.cancelled() => {
				warn!("Live search cancelled by the caller.");

				return vec![fallback(&request.query, ttl::now_ms())];
			},
			answers = braid_providers::llm::complete(
				&self.config.llm,
				&request.query,
				&system_prompt,
			) => answers,
		};
		let now = ttl::now_ms();
		let first = match answers {
			Ok(results) => match results.into_iter().next() {
				Some(first) => first,
				None => {
					warn!("LLM returned an empty result set.");

					return vec![fallback(&request.query, now)];
				},
			},
			Err(err) => {
				warn!(error = %err, "LLM call failed.");

				return vec![fallback(&request.query, now)];
			},
		};
		let (body, sources) = content::split_sources(&first.content);
		let result = match request.parent.as_ref() {
			Some(parent) => SearchResult {
				id: format!("{}-{now}", parent.id),
				root_id: parent.root_id.clone(),
				parent_id: Some(parent.id.clone()),
				follow_up_query: Some(request.query.clone()),
				title: first.title,
				content: body,
				sources,
				confidence: first.confidence,
				category: first.category,
				timestamp: now,
				replies: Vec::new(),
				is_cached: false,
			},
			None => SearchResult {
				id: cache_key.to_string(),
				root_id: cache_key.to_string(),
				parent_id: None,
				follow_up_query: None,
				title: first.title,
				content: body,
				sources,
				confidence: first.confidence,
				category: first.category,
				timestamp: now,
				replies: Vec::new(),
				is_cached: false,
			},
		};

		self.store.save(&result).await;

		if result.is_root() {
			let item = SearchHistoryItem {
				id: result.id.clone(),
				query: request.query.clone(),
				timestamp: now,
				result_id: result.id.clone(),
			};

			self.store.history_save(&item).await;
		}

		self.hand_off_sync(&result, request.user_id.clone()).await;

		vec![result]
	}

	// Fire-and-forget: the page never waits on delivery.
	async fn hand_off_sync(&self, result: &SearchResult, user_id: Option<String>) {
		let fingerprint_id = self.store.fingerprint_id().await;
		let body = json!({
			"webhookUrl": self.config.sync.webhook_url,
			"payload": {
				"results": [result],
				"userId": user_id,
				"fingerprintId": fingerprint_id,
			},
		});

		tokio::spawn(self.sync.submit(body));
	}
}

fn fallback(query: &str, now: i64) -> SearchResult {
	SearchResult {
		id: format!("error-{now}"),
		root_id: format!("error-{now}"),
		parent_id: None,
		follow_up_query: None,
		title: query.to_string(),
		content: FALLBACK_MESSAGE.to_string(),
		sources: Vec::new(),
		confidence: 0.0,
		category: ERROR_CATEGORY.to_string(),
		timestamp: now,
		replies: Vec::new(),
		is_cached: false,
	}
}
