use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::Result;

const STORE_TIMEOUT_MS: u64 = 10_000;

/// One row of the `cachedQueryResults` relation: a prior sighting of a
/// query hash for a session.
#[derive(Debug, Deserialize)]
pub struct CachedQueryRow {
	pub cache_id: i64,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub user_query_hash: Option<String>,
}

/// One row of the `cache ⨝ cacheUserResults` join. The remote surface is
/// opaque, so every projected column is optional.
#[derive(Debug, Deserialize)]
pub struct CacheRow {
	pub id: i64,
	#[serde(default)]
	pub query: Option<String>,
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub sources: Option<Vec<String>>,
	#[serde(default, rename = "cacheUserResults")]
	pub user_results: Vec<CacheUserResultRow>,
}

#[derive(Debug, Deserialize)]
pub struct CacheUserResultRow {
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub sources: Option<Vec<String>>,
}

/// Rows matching `(user_id, user_query_hash)`, the poll target of the
/// similarity gateway.
pub async fn fetch_cached_query_rows(
	cfg: &braid_config::Store,
	user_id: &str,
	query_hash: &str,
) -> Result<Vec<CachedQueryRow>> {
	let client = store_client()?;
	let url = format!("{}/rest/v1/cachedQueryResults", cfg.url);
	let rows = client
		.get(url)
		.headers(crate::store_headers(&cfg.key)?)
		.query(&[
			("select", "cache_id,user_id,user_query_hash".to_string()),
			("user_id", format!("eq.{user_id}")),
			("user_query_hash", format!("eq.{query_hash}")),
		])
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	Ok(rows)
}

/// The `cache` rows for the given ids with their `cacheUserResults`
/// embedded, capped at `limit`.
pub async fn fetch_cache_join(
	cfg: &braid_config::Store,
	cache_ids: &[i64],
	limit: usize,
) -> Result<Vec<CacheRow>> {
	let client = store_client()?;
	let url = format!("{}/rest/v1/cache", cfg.url);
	let ids = cache_ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",");
	let rows = client
		.get(url)
		.headers(crate::store_headers(&cfg.key)?)
		.query(&[
			("select", "*,cacheUserResults(*)".to_string()),
			("id", format!("in.({ids})")),
			("limit", limit.to_string()),
		])
		.send()
		.await?
		.error_for_status()?
		.json()
		.await?;

	Ok(rows)
}

fn store_client() -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(STORE_TIMEOUT_MS)).build()?)
}
