pub const PAGE_SCHEMA: &str = include_str!("../sql/page.sql");
pub const WORKER_SCHEMA: &str = include_str!("../sql/worker.sql");
