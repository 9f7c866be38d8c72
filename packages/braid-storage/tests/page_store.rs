use tempfile::TempDir;

use braid_config::Cache;
use braid_domain::{
	result::{Reply, SearchHistoryItem, SearchResult},
	ttl,
};
use braid_storage::db::PageStore;

fn sample_result(id: &str) -> SearchResult {
	SearchResult {
		id: id.to_string(),
		root_id: id.to_string(),
		parent_id: None,
		follow_up_query: None,
		title: "GraphQL".to_string(),
		content: "Use persisted queries [1].".to_string(),
		sources: vec!["1. https://example.com".to_string()],
		confidence: 95.0,
		category: "Engineering".to_string(),
		timestamp: ttl::now_ms(),
		replies: Vec::new(),
		is_cached: false,
	}
}

fn reply_to(parent: &SearchResult, id: &str, query: &str) -> SearchResult {
	let mut result = sample_result(id);
	result.root_id = parent.root_id.clone();
	result.parent_id = Some(parent.id.clone());
	result.follow_up_query = Some(query.to_string());
	result
}

async fn open_store(dir: &TempDir) -> PageStore {
	PageStore::open(&dir.path().join("page.db"), &Cache::default())
		.await
		.expect("Failed to open page store.")
}

#[tokio::test]
async fn save_then_get_round_trips() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let result = sample_result("root-1");

	store.save(&result).await;

	let found = store.get("root-1").await.expect("Expected stored root.");

	assert_eq!(found, result);
	assert!(store.get("root-2").await.is_none());
}

#[tokio::test]
async fn saving_a_reply_appends_one_stub_to_the_parent() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let root = sample_result("root-1");
	let reply = reply_to(&root, "root-1-100", "pagination");

	store.save(&root).await;
	store.save(&reply).await;
	// Idempotent re-save: the stub must not duplicate.
	store.save(&reply).await;

	let thread = store.get_thread("root-1").await.expect("Expected stored thread.");

	assert_eq!(thread.replies.len(), 1);

	match &thread.replies[0] {
		Reply::Full(child) => {
			assert_eq!(child.id, "root-1-100");
			assert_eq!(child.follow_up_query.as_deref(), Some("pagination"));
		},
		Reply::Stub(stub) => panic!("Expected a populated reply, got stub {stub:?}."),
	}
}

#[tokio::test]
async fn thread_preserves_reply_insertion_order() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let root = sample_result("root-1");

	store.save(&root).await;

	for (index, query) in ["pagination", "caching", "auth"].iter().enumerate() {
		let reply = reply_to(&root, &format!("root-1-{index}"), query);

		store.save(&reply).await;
	}

	let thread = store.get_thread("root-1").await.expect("Expected stored thread.");
	let ids: Vec<&str> = thread.replies.iter().map(|reply| reply.id()).collect();

	assert_eq!(ids, vec!["root-1-0", "root-1-1", "root-1-2"]);
}

#[tokio::test]
async fn expired_entries_are_deleted_on_read() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let result = sample_result("root-1");

	store.save(&result).await;

	sqlx::query("UPDATE cache_entries SET expires_at_ms = 1 WHERE key = 'conv_root-1'")
		.execute(&store.pool)
		.await
		.expect("Failed to expire entry.");

	assert!(store.get("root-1").await.is_none());

	let remaining: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM cache_entries")
		.fetch_one(&store.pool)
		.await
		.expect("Failed to count entries.");

	assert_eq!(remaining.0, 0);
}

#[tokio::test]
async fn expired_reply_surfaces_as_a_stub() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let root = sample_result("root-1");
	let reply = reply_to(&root, "root-1-100", "pagination");

	store.save(&root).await;
	store.save(&reply).await;

	sqlx::query("UPDATE cache_entries SET expires_at_ms = 1 WHERE key = 'conv_root-1-100'")
		.execute(&store.pool)
		.await
		.expect("Failed to expire reply.");

	let thread = store.get_thread("root-1").await.expect("Expected stored thread.");

	assert_eq!(thread.replies.len(), 1);

	match &thread.replies[0] {
		Reply::Stub(stub) => {
			assert_eq!(stub.id, "root-1-100");
			assert_eq!(stub.follow_up_query.as_deref(), Some("pagination"));
		},
		Reply::Full(child) => panic!("Expected a stub for the expired reply, got {child:?}."),
	}
}

#[tokio::test]
async fn thread_expansion_survives_a_cycle() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let root = sample_result("root-1");
	let reply = reply_to(&root, "root-1-100", "pagination");

	store.save(&root).await;
	store.save(&reply).await;

	// Re-save the root as a child of its own reply, closing a cycle.
	let mut looped = root.clone();
	looped.parent_id = Some(reply.id.clone());
	looped.replies = vec![Reply::Stub(reply.stub())];
	store.save(&looped).await;

	let thread = store.get_thread("root-1").await.expect("Expected stored thread.");

	assert_eq!(thread.replies.len(), 1);

	match &thread.replies[0] {
		Reply::Full(child) => {
			assert_eq!(child.id, "root-1-100");
			assert!(
				matches!(&child.replies[0], Reply::Stub(stub) if stub.id == "root-1"),
				"Expected the cycle edge to stay a stub."
			);
		},
		Reply::Stub(stub) => panic!("Expected a populated reply, got stub {stub:?}."),
	}
}

#[tokio::test]
async fn history_deduplicates_by_query_and_caps_at_the_limit() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;

	for index in 0..55 {
		let item = SearchHistoryItem {
			id: format!("root-{index}"),
			query: format!("query {index}"),
			timestamp: 1_000 + index,
			result_id: format!("root-{index}"),
		};

		store.history_save(&item).await;
	}

	// Re-searching an old query collapses to one entry with a new timestamp.
	let repeat = SearchHistoryItem {
		id: "root-54-repeat".to_string(),
		query: "query 54".to_string(),
		timestamp: 9_999,
		result_id: "root-54-repeat".to_string(),
	};

	store.history_save(&repeat).await;

	let items = store.history_get().await;

	assert_eq!(items.len(), 50);
	assert_eq!(items[0].query, "query 54");
	assert_eq!(items[0].timestamp, 9_999);

	let mut queries: Vec<&str> = items.iter().map(|item| item.query.as_str()).collect();
	let total = queries.len();

	queries.sort_unstable();
	queries.dedup();

	assert_eq!(queries.len(), total, "History queries must be distinct.");
}

#[tokio::test]
async fn history_clear_empties_the_index() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;
	let item = SearchHistoryItem {
		id: "root-1".to_string(),
		query: "graphql best practices".to_string(),
		timestamp: 1_000,
		result_id: "root-1".to_string(),
	};

	store.history_save(&item).await;
	store.history_clear().await;

	assert!(store.history_get().await.is_empty());
}

#[tokio::test]
async fn fingerprint_is_stable_across_reopen() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let first = {
		let store = open_store(&dir).await;

		store.fingerprint_id().await
	};
	let second = {
		let store = open_store(&dir).await;

		store.fingerprint_id().await
	};

	assert_eq!(first, second);
	assert!(!first.is_empty());
}

#[tokio::test]
async fn get_all_entries_skips_expired_rows() {
	let dir = TempDir::new().expect("Failed to create temp dir.");
	let store = open_store(&dir).await;

	store.save(&sample_result("root-1")).await;
	store.save(&sample_result("root-2")).await;

	sqlx::query("UPDATE cache_entries SET expires_at_ms = 1 WHERE key = 'conv_root-2'")
		.execute(&store.pool)
		.await
		.expect("Failed to expire entry.");

	let entries = store.get_all_entries().await;

	assert_eq!(entries.len(), 1);
	assert_eq!(entries[0].value.id, "root-1");
}
