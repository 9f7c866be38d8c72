use serde::{Deserialize, Serialize};

/// One node in a conversation tree. A root has `id == root_id` and no
/// `parent_id`; every other node points at an existing stored parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
	pub id: String,
	pub root_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub parent_id: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub follow_up_query: Option<String>,
	pub title: String,
	pub content: String,
	#[serde(default)]
	pub sources: Vec<String>,
	pub confidence: f32,
	pub category: String,
	pub timestamp: i64,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub replies: Vec<Reply>,
	#[serde(default)]
	pub is_cached: bool,
}
impl SearchResult {
	pub fn is_root(&self) -> bool {
		self.parent_id.is_none()
	}

	pub fn stub(&self) -> ReplyStub {
		ReplyStub { id: self.id.clone(), follow_up_query: self.follow_up_query.clone() }
	}
}

/// A reply slot under a parent. Parents are persisted with stubs only;
/// thread expansion replaces resolvable stubs with full nodes and leaves
/// missing or expired children as stubs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
	Full(Box<SearchResult>),
	Stub(ReplyStub),
}
impl Reply {
	pub fn id(&self) -> &str {
		match self {
			Self::Full(result) => &result.id,
			Self::Stub(stub) => &stub.id,
		}
	}

	pub fn stub(&self) -> ReplyStub {
		match self {
			Self::Full(result) => result.stub(),
			Self::Stub(stub) => stub.clone(),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyStub {
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub follow_up_query: Option<String>,
}

/// Store envelope around a [`SearchResult`]. `expires_at` is the write time
/// plus the configured TTL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
	pub value: SearchResult,
	pub timestamp: i64,
	pub expires_at: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHistoryItem {
	pub id: String,
	pub query: String,
	pub timestamp: i64,
	pub result_id: String,
}
