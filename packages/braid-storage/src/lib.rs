pub mod artifacts;
pub mod cursor;
pub mod db;
pub mod fingerprint;
pub mod history;
pub mod models;
pub mod queue;
pub mod schema;

mod error;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
