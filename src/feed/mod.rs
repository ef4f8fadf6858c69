//! Feed retrieval and Atom parsing.
//!
//! - [`parser`]: single-pass Atom parser built on `quick-xml` pull events
//! - [`fetcher`]: the [`FeedSource`] seam and its HTTP implementation
//!
//! # Example
//!
//! ```ignore
//! use announcer::feed::{parse_feed, FeedSource, HttpFetcher};
//!
//! let bytes = HttpFetcher::new(reqwest::Client::new()).fetch(url).await?;
//! let articles = parse_feed(&bytes)?;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedSource, FetchError, HttpFetcher, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT};
pub use parser::{parse_feed, ParseError};
