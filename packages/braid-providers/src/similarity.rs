use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize)]
struct IngressRequest<'a> {
	query: &'a str,
	content: &'a str,
	user_id: &'a str,
	query_hash: &'a str,
}

/// Announces a query to the similarity ingress so the remote pipeline can
/// embed it and surface prior hits. A non-2xx is a hard failure here; the
/// caller decides how much that matters.
pub async fn notify_ingress(
	cfg: &braid_config::Similarity,
	query: &str,
	user_id: &str,
	query_hash: &str,
) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

	client
		.post(&cfg.ingress_url)
		.header("x-api-key", &cfg.api_key)
		.json(&IngressRequest { query, content: query, user_id, query_hash })
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}
