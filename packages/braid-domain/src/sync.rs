use serde::{Deserialize, Serialize};

use crate::result::SearchResult;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayload {
	pub results: Vec<SearchResult>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	pub fingerprint_id: String,
}

/// One element of the durable outbound queue. Retained until the webhook
/// accepts it with a 2xx or the retention window lapses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSubmission {
	pub webhook_url: String,
	pub payload: SyncPayload,
	#[serde(default)]
	pub enqueue_time: i64,
}

/// Reply to an intercepted submission. The page always receives one of
/// these regardless of what happened on the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
	#[serde(rename = "Sync successful")]
	Delivered,
	#[serde(rename = "Request queued for sync")]
	Queued,
}
impl SyncStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Delivered => "Sync successful",
			Self::Queued => "Request queued for sync",
		}
	}
}
