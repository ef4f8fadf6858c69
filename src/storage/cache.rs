//! Article list codec for the persistent cache.
//!
//! The list is stored as a JSON array. A missing author is written as
//! `null`, so it never collapses into an empty name on the way back.

use thiserror::Error;

use super::types::Article;

/// Key the article list is stored under unless configured otherwise.
pub const DEFAULT_CACHE_KEY: &str = "cachedArticles";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to encode article cache: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Cached articles are unreadable: {0}")]
    Decode(#[source] serde_json::Error),
}

pub fn encode_articles(articles: &[Article]) -> Result<Vec<u8>, CacheError> {
    serde_json::to_vec(articles).map_err(CacheError::Encode)
}

pub fn decode_articles(bytes: &[u8]) -> Result<Vec<Article>, CacheError> {
    serde_json::from_slice(bytes).map_err(CacheError::Decode)
}
