use std::{
	sync::{Arc, Mutex},
	time::Duration,
};

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use braid_domain::hash;
use braid_service::{BoxFuture, SearchRequest, Service, SyncSink, search};

const ANSWER: &str = "Persisted queries reduce payloads [1].\n\nSources:\n1. https://example.com";

struct RecordingSink {
	bodies: Arc<Mutex<Vec<Value>>>,
}
impl SyncSink for RecordingSink {
	fn submit(&self, body: Value) -> BoxFuture<'static, ()> {
		let bodies = self.bodies.clone();

		Box::pin(async move {
			bodies.lock().unwrap_or_else(|err| err.into_inner()).push(body);
		})
	}
}

struct Harness {
	service: Service,
	bodies: Arc<Mutex<Vec<Value>>>,
	llm: braid_testkit::LlmServer,
	similarity: braid_testkit::SimilarityServer,
	_dir: tempfile::TempDir,
}

async fn harness() -> Harness {
	let dir = braid_testkit::temp_dir();
	let llm = braid_testkit::start_llm_server(ANSWER).await;
	let similarity = braid_testkit::start_similarity_server().await;
	let bodies = Arc::new(Mutex::new(Vec::new()));
	let config = Arc::new(braid_testkit::test_config(
		&dir,
		&similarity.url,
		&llm.url,
		&similarity.ingress_url,
		"https://hooks.example.com/cache",
	));
	let store = Arc::new(braid_testkit::open_page_store(&dir).await);
	let service =
		Service { config, store, sync: Arc::new(RecordingSink { bodies: bodies.clone() }) };

	Harness { service, bodies, llm, similarity, _dir: dir }
}

fn recorded(bodies: &Arc<Mutex<Vec<Value>>>) -> Vec<Value> {
	bodies.lock().unwrap_or_else(|err| err.into_inner()).clone()
}

async fn wait_for_submissions(bodies: &Arc<Mutex<Vec<Value>>>, count: usize) {
	for _ in 0..200 {
		if recorded(bodies).len() >= count {
			return;
		}

		tokio::time::sleep(Duration::from_millis(10)).await;
	}

	panic!("Expected {count} sync submissions.");
}

#[tokio::test]
async fn a_cold_root_query_calls_the_llm_persists_and_hands_off_sync() {
	let h = harness().await;
	let cancel = CancellationToken::new();
	let query = "graphql best practices";
	let results = h
		.service
		.search(
			SearchRequest { query: query.to_string(), parent: None, user_id: None },
			&cancel,
		)
		.await;
	let root_key = hash::root_key(query);

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].id, root_key);
	assert_eq!(results[0].root_id, root_key);
	assert_eq!(results[0].content, "Persisted queries reduce payloads [1].");
	assert_eq!(results[0].sources, vec!["1. https://example.com"]);
	assert!(!results[0].is_cached);
	assert_eq!(h.llm.call_count(), 1);

	let stored = h.service.store.get_thread(&root_key).await.expect("Expected stored root.");

	assert_eq!(stored.id, root_key);

	let history = h.service.store.history_get().await;

	assert_eq!(history.len(), 1);
	assert_eq!(history[0].query, query);

	wait_for_submissions(&h.bodies, 1).await;

	let bodies = recorded(&h.bodies);

	assert_eq!(bodies[0]["webhookUrl"], "https://hooks.example.com/cache");
	assert_eq!(bodies[0]["payload"]["results"][0]["id"], root_key.as_str());
	assert!(bodies[0]["payload"]["fingerprintId"].is_string());
}

#[tokio::test]
async fn a_warm_root_query_is_served_locally_without_llm_or_sync() {
	let h = harness().await;
	let cancel = CancellationToken::new();
	let query = "graphql best practices";
	let request =
		|| SearchRequest { query: query.to_string(), parent: None, user_id: None };

	let first = h.service.search(request(), &cancel).await;

	wait_for_submissions(&h.bodies, 1).await;

	let second = h.service.search(request(), &cancel).await;

	assert_eq!(first[0].id, second[0].id);
	assert_eq!(h.llm.call_count(), 1, "The warm query must not reach the LLM.");
	assert_eq!(recorded(&h.bodies).len(), 1, "The warm query must not re-sync.");
}

#[tokio::test]
async fn a_follow_up_query_threads_under_its_parent() {
	let h = harness().await;
	let cancel = CancellationToken::new();
	let root_query = "graphql best practices";
	let roots = h
		.service
		.search(
			SearchRequest { query: root_query.to_string(), parent: None, user_id: None },
			&cancel,
		)
		.await;
	let parent = roots[0].clone();
	let replies = h
		.service
		.search(
			SearchRequest {
				query: "pagination".to_string(),
				parent: Some(parent.clone()),
				user_id: None,
			},
			&cancel,
		)
		.await;

	assert_eq!(replies.len(), 1);
	assert!(replies[0].id.starts_with(&format!("{}-", parent.id)));
	assert_eq!(replies[0].parent_id.as_deref(), Some(parent.id.as_str()));
	assert_eq!(replies[0].follow_up_query.as_deref(), Some("pagination"));
	assert_eq!(replies[0].root_id, parent.root_id);

	// The follow-up prompt embeds the opening of the parent answer.
	let requests = h.llm.requests();

	assert_eq!(requests.len(), 2);

	let prompt = requests[1]["systemPrompt"].as_str().expect("Expected a system prompt.");

	assert!(prompt.contains("Persisted queries reduce payloads"));

	let thread =
		h.service.store.get_thread(&parent.id).await.expect("Expected the stored thread.");

	assert_eq!(thread.replies.len(), 1);
	assert_eq!(thread.replies[0].id(), replies[0].id);

	// Asking the same follow-up again resolves from the thread.
	let again = h
		.service
		.search(
			SearchRequest {
				query: "pagination".to_string(),
				parent: Some(parent),
				user_id: None,
			},
			&cancel,
		)
		.await;

	assert_eq!(again[0].id, replies[0].id);
	assert_eq!(h.llm.call_count(), 2);
}

#[tokio::test]
async fn a_similarity_hit_skips_the_llm() {
	let h = harness().await;
	let cancel = CancellationToken::new();

	h.similarity.set_rows(
		vec![json!({ "cache_id": 7 })],
		vec![json!({
			"id": 7,
			"query": "graphql best practices",
			"cacheUserResults": [{ "content": "Use persisted queries." }]
		})],
		1,
	);

	let results = h
		.service
		.search(
			SearchRequest {
				query: "graphql best practices".to_string(),
				parent: None,
				user_id: Some("user-1".to_string()),
			},
			&cancel,
		)
		.await;

	assert_eq!(results.len(), 1);
	assert!(results[0].is_cached);
	assert_eq!(results[0].id, "cached-7");
	assert_eq!(h.llm.call_count(), 0, "The cached tier must satisfy the query.");
	assert!(recorded(&h.bodies).is_empty(), "Cached results are not re-synced.");
}

#[tokio::test]
async fn total_llm_failure_returns_the_single_fallback_result() {
	let h = harness().await;
	let cancel = CancellationToken::new();

	h.llm.set_status(500);

	let results = h
		.service
		.search(
			SearchRequest { query: "graphql best practices".to_string(), parent: None, user_id: None },
			&cancel,
		)
		.await;

	assert_eq!(results.len(), 1);
	assert_eq!(results[0].category, search::ERROR_CATEGORY);
	assert_eq!(results[0].confidence, 0.0);
	assert!(results[0].sources.is_empty());
	assert_eq!(results[0].content, search::FALLBACK_MESSAGE);
	assert!(recorded(&h.bodies).is_empty(), "Fallback results are not synced.");
}
