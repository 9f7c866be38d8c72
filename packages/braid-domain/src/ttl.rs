use time::OffsetDateTime;

pub const DEFAULT_TTL_HOURS: i64 = 24;
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

pub fn now_ms() -> i64 {
	(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn expires_at(written_at_ms: i64, ttl_hours: i64) -> i64 {
	written_at_ms + hours_to_ms(ttl_hours)
}

pub fn is_expired(expires_at_ms: i64, now_ms: i64) -> bool {
	now_ms >= expires_at_ms
}

pub fn hours_to_ms(hours: i64) -> i64 {
	hours.saturating_mul(60 * 60 * 1_000)
}
