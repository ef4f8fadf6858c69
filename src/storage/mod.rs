mod cache;
mod kv;
mod schema;
mod types;

pub use cache::{decode_articles, encode_articles, CacheError, DEFAULT_CACHE_KEY};
pub use kv::KeyValueStore;
pub use schema::Database;
pub use types::{Article, DatabaseError};
