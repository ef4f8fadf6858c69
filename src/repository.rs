//! Cache-then-fetch article repository with single-flight refresh.
//!
//! The repository is owned by one task (the app loop) and only mutated there.
//! A refresh runs fetch and parse in a spawned task which reports back through
//! the [`AppEvent`] channel, tagged with the generation it was started under.
//! Starting another refresh aborts the running task and bumps the generation,
//! and [`ArticleRepository::complete_refresh`] drops any result whose
//! generation is no longer current before touching the articles or the cache.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::app::AppEvent;
use crate::feed::{parse_feed, FeedSource, FetchError, ParseError};
use crate::filter::tag_universe;
use crate::storage::{decode_articles, encode_articles, Article, KeyValueStore, DEFAULT_CACHE_KEY};

/// Why a refresh produced no new article list.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// The fetched document is not well-formed XML.
    #[error("Error parsing feed: {0}")]
    MalformedDocument(String),
    /// Transport failure, bad status, timeout or invalid endpoint.
    #[error("Error fetching feed: {0}")]
    FetchFailure(String),
    /// Superseded by a newer refresh. Never shown to the user.
    #[error("Refresh superseded by a newer request")]
    Cancelled,
}

impl From<FetchError> for RefreshError {
    fn from(err: FetchError) -> Self {
        RefreshError::FetchFailure(err.to_string())
    }
}

impl From<ParseError> for RefreshError {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::MalformedDocument(reason) => RefreshError::MalformedDocument(reason),
        }
    }
}

/// What [`ArticleRepository::load`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The cached list was committed; carries its length.
    Cached(usize),
    /// Nothing usable was cached, so a refresh was started under this generation.
    Refreshing(u64),
}

pub struct ArticleRepository<S: FeedSource, K: KeyValueStore> {
    source: S,
    store: K,
    endpoint: String,
    cache_key: String,
    articles: Vec<Article>,
    available_tags: Vec<String>,
    /// Single user-visible error slot; a newer error replaces an unacknowledged one.
    error: Option<String>,
    loading: bool,
    /// Bumped on every refresh and cancel. Completions carrying an older
    /// value are discarded.
    refresh_generation: u64,
    refresh_handle: Option<JoinHandle<()>>,
}

impl<S: FeedSource, K: KeyValueStore> ArticleRepository<S, K> {
    pub fn new(source: S, store: K, endpoint: impl Into<String>) -> Self {
        Self {
            source,
            store,
            endpoint: endpoint.into(),
            cache_key: DEFAULT_CACHE_KEY.to_string(),
            articles: Vec::new(),
            available_tags: Vec::new(),
            error: None,
            loading: false,
            refresh_generation: 0,
            refresh_handle: None,
        }
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = key.into();
        self
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    /// Sorted tag universe of the full article list.
    pub fn available_tags(&self) -> &[String] {
        &self.available_tags
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Acknowledge and clear the current error.
    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Generation of the most recent refresh or cancel.
    pub fn generation(&self) -> u64 {
        self.refresh_generation
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    /// Show the cached list if there is one, otherwise start a refresh.
    ///
    /// A cache entry that cannot be read or decoded counts as missing.
    pub async fn load(&mut self, event_tx: &mpsc::Sender<AppEvent>) -> LoadOutcome {
        match self.read_cache().await {
            Some(articles) => {
                let count = articles.len();
                self.replace_articles(articles);
                tracing::info!(count, key = %self.cache_key, "Loaded articles from cache");
                LoadOutcome::Cached(count)
            }
            None => LoadOutcome::Refreshing(self.refresh(event_tx)),
        }
    }

    async fn read_cache(&self) -> Option<Vec<Article>> {
        match self.store.get(&self.cache_key).await {
            Ok(Some(bytes)) => match decode_articles(&bytes) {
                Ok(articles) => Some(articles),
                Err(e) => {
                    tracing::warn!(key = %self.cache_key, error = %e, "Ignoring unreadable article cache");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!(key = %self.cache_key, "No cached articles");
                None
            }
            Err(e) => {
                tracing::warn!(key = %self.cache_key, error = %e, "Failed to read article cache");
                None
            }
        }
    }

    /// Start fetching and parsing the endpoint in the background.
    ///
    /// Any refresh still in flight is aborted and its generation retired.
    /// The result arrives as [`AppEvent::RefreshCompleted`] and must be passed
    /// to [`complete_refresh`](Self::complete_refresh). Returns the new generation.
    pub fn refresh(&mut self, event_tx: &mpsc::Sender<AppEvent>) -> u64 {
        if let Some(handle) = self.refresh_handle.take() {
            handle.abort();
            tracing::debug!(
                superseded = self.refresh_generation,
                "Aborted in-flight refresh"
            );
        }

        self.refresh_generation += 1;
        let generation = self.refresh_generation;
        self.loading = true;

        let source = self.source.clone();
        let endpoint = self.endpoint.clone();
        let event_tx = event_tx.clone();
        tracing::debug!(generation, endpoint = %endpoint, "Starting refresh");

        self.refresh_handle = Some(tokio::spawn(async move {
            let result = fetch_and_parse(&source, &endpoint).await;
            if let Err(e) = event_tx
                .send(AppEvent::RefreshCompleted { generation, result })
                .await
            {
                tracing::debug!(generation, error = %e, "Refresh result dropped (receiver closed)");
            }
        }));

        generation
    }

    /// Apply a refresh result in the owning context.
    ///
    /// A result from a retired generation is discarded untouched and reported
    /// as [`RefreshError::Cancelled`]. Otherwise a successful list replaces
    /// the cache and the displayed articles; a failure fills the error slot
    /// and leaves both as they were.
    pub async fn complete_refresh(
        &mut self,
        generation: u64,
        result: Result<Vec<Article>, RefreshError>,
    ) -> Result<usize, RefreshError> {
        if generation != self.refresh_generation {
            tracing::debug!(
                expected = self.refresh_generation,
                got = generation,
                "Ignoring stale refresh result (generation mismatch)"
            );
            return Err(RefreshError::Cancelled);
        }

        self.loading = false;
        self.refresh_handle = None;

        match result {
            Ok(articles) => {
                self.write_cache(&articles).await;
                let count = articles.len();
                self.replace_articles(articles);
                tracing::info!(generation, count, "Refresh committed");
                Ok(count)
            }
            Err(RefreshError::Cancelled) => Err(RefreshError::Cancelled),
            Err(e) => {
                tracing::warn!(generation, error = %e, "Refresh failed");
                self.error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Abort the in-flight refresh, if any, so its result is never applied.
    pub fn cancel_refresh(&mut self) {
        if let Some(handle) = self.refresh_handle.take() {
            handle.abort();
            tracing::debug!(generation = self.refresh_generation, "Cancelled refresh");
        }
        self.refresh_generation += 1;
        self.loading = false;
    }

    /// Forget the cached list. The articles on display are kept.
    pub async fn clear_cache(&self) -> anyhow::Result<bool> {
        self.store.delete(&self.cache_key).await
    }

    async fn write_cache(&self, articles: &[Article]) {
        let bytes = match encode_articles(articles) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode article cache");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.cache_key, &bytes).await {
            tracing::warn!(key = %self.cache_key, error = %e, "Failed to write article cache");
        }
    }

    fn replace_articles(&mut self, articles: Vec<Article>) {
        self.available_tags = tag_universe(&articles);
        self.articles = articles;
    }
}

impl<S: FeedSource, K: KeyValueStore> Drop for ArticleRepository<S, K> {
    fn drop(&mut self) {
        if self.refresh_handle.is_some() {
            tracing::debug!("Aborting refresh task on repository drop");
        }
        self.cancel_refresh();
    }
}

async fn fetch_and_parse<S: FeedSource>(
    source: &S,
    endpoint: &str,
) -> Result<Vec<Article>, RefreshError> {
    let bytes = source.fetch(endpoint).await?;
    let articles = parse_feed(&bytes)?;
    Ok(articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Serves canned documents in order, each after an optional delay.
    #[derive(Clone)]
    struct ScriptedSource {
        responses: Arc<Vec<(Duration, Result<&'static str, u16>)>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(responses: Vec<(Duration, Result<&'static str, u16>)>) -> Self {
            Self {
                responses: Arc::new(responses),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl FeedSource for ScriptedSource {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, response) = self.responses[call.min(self.responses.len() - 1)];
            tokio::time::sleep(delay).await;
            response
                .map(|body| body.as_bytes().to_vec())
                .map_err(FetchError::HttpStatus)
        }
    }

    const FEED_A: &str =
        r#"<feed><entry><id>a</id><title>Alpha</title><category term="x"/></entry></feed>"#;
    const FEED_B: &str = r#"<feed><entry><id>b1</id><category term="z"/><category term="y"/></entry><entry><id>b2</id></entry></feed>"#;

    async fn repo(source: ScriptedSource) -> ArticleRepository<ScriptedSource, Database> {
        let db = Database::open(":memory:").await.unwrap();
        ArticleRepository::new(source, db, "https://example.com/feed")
    }

    async fn next_completion(rx: &mut mpsc::Receiver<AppEvent>) -> (u64, Result<Vec<Article>, RefreshError>) {
        match rx.recv().await {
            Some(AppEvent::RefreshCompleted { generation, result }) => (generation, result),
            _ => panic!("expected RefreshCompleted"),
        }
    }

    #[tokio::test]
    async fn test_refresh_commits_articles_tags_and_cache() {
        let mut repo = repo(ScriptedSource::new(vec![(Duration::ZERO, Ok(FEED_B))])).await;
        let (tx, mut rx) = mpsc::channel(8);

        let generation = repo.refresh(&tx);
        assert!(repo.is_loading());
        let (got, result) = next_completion(&mut rx).await;
        assert_eq!(got, generation);

        assert_eq!(repo.complete_refresh(got, result).await, Ok(2));
        assert!(!repo.is_loading());
        assert_eq!(repo.articles().len(), 2);
        assert_eq!(repo.available_tags(), ["y", "z"]);

        let cached = repo.store().get(DEFAULT_CACHE_KEY).await.unwrap().unwrap();
        assert_eq!(decode_articles(&cached).unwrap(), repo.articles());
    }

    #[tokio::test]
    async fn test_stale_generation_is_discarded() {
        let mut repo = repo(ScriptedSource::new(vec![(Duration::ZERO, Ok(FEED_A))])).await;
        let (tx, mut rx) = mpsc::channel(8);

        let first = repo.refresh(&tx);
        let second = repo.refresh(&tx);
        assert!(second > first);

        let (got, result) = next_completion(&mut rx).await;
        assert_eq!(got, second);
        repo.complete_refresh(got, result).await.unwrap();

        let late = vec![Article {
            id: "late".into(),
            title: String::new(),
            link: String::new(),
            content: String::new(),
            published: String::new(),
            author: None,
            categories: vec![],
        }];
        let outcome = repo.complete_refresh(first, Ok(late)).await;
        assert_eq!(outcome, Err(RefreshError::Cancelled));
        assert_eq!(repo.articles()[0].id, "a");
        assert!(repo.error().is_none());
    }

    #[tokio::test]
    async fn test_failure_fills_error_slot_and_keeps_articles() {
        let mut repo = repo(ScriptedSource::new(vec![
            (Duration::ZERO, Ok(FEED_A)),
            (Duration::ZERO, Ok("<feed><entry>")),
            (Duration::ZERO, Err(503)),
        ]))
        .await;
        let (tx, mut rx) = mpsc::channel(8);

        repo.refresh(&tx);
        let (g, r) = next_completion(&mut rx).await;
        repo.complete_refresh(g, r).await.unwrap();

        repo.refresh(&tx);
        let (g, r) = next_completion(&mut rx).await;
        let err = repo.complete_refresh(g, r).await.unwrap_err();
        assert!(matches!(err, RefreshError::MalformedDocument(_)));
        assert!(repo.error().unwrap().starts_with("Error parsing feed"));
        assert_eq!(repo.articles()[0].id, "a");

        // A newer error replaces the unacknowledged one.
        repo.refresh(&tx);
        let (g, r) = next_completion(&mut rx).await;
        let err = repo.complete_refresh(g, r).await.unwrap_err();
        assert!(matches!(err, RefreshError::FetchFailure(_)));
        assert_eq!(repo.take_error().as_deref(), Some("Error fetching feed: HTTP error: status 503"));
        assert!(repo.error().is_none());
        assert_eq!(repo.articles()[0].id, "a");
    }

    #[tokio::test]
    async fn test_load_prefers_cache() {
        let source = ScriptedSource::new(vec![(Duration::ZERO, Ok(FEED_B))]);
        let calls = source.calls.clone();
        let mut repo = repo(source).await;
        let cached = parse_feed(FEED_A.as_bytes()).unwrap();
        repo.store()
            .set(DEFAULT_CACHE_KEY, &encode_articles(&cached).unwrap())
            .await
            .unwrap();
        let (tx, _rx) = mpsc::channel(8);

        assert_eq!(repo.load(&tx).await, LoadOutcome::Cached(1));
        assert_eq!(repo.articles(), cached.as_slice());
        assert_eq!(repo.available_tags(), ["x"]);
        assert!(!repo.is_loading());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_load_without_cache_refreshes() {
        let mut repo = repo(ScriptedSource::new(vec![(Duration::ZERO, Ok(FEED_A))])).await;
        let (tx, mut rx) = mpsc::channel(8);

        let LoadOutcome::Refreshing(generation) = repo.load(&tx).await else {
            panic!("expected a refresh");
        };
        let (got, result) = next_completion(&mut rx).await;
        assert_eq!(got, generation);
        assert_eq!(repo.complete_refresh(got, result).await, Ok(1));
    }

    #[tokio::test]
    async fn test_corrupt_cache_triggers_refresh() {
        let mut repo = repo(ScriptedSource::new(vec![(Duration::ZERO, Ok(FEED_A))])).await;
        repo.store().set(DEFAULT_CACHE_KEY, b"{broken").await.unwrap();
        let (tx, _rx) = mpsc::channel(8);

        assert!(matches!(repo.load(&tx).await, LoadOutcome::Refreshing(_)));
    }

    #[tokio::test]
    async fn test_cancel_refresh_discards_result() {
        let mut repo = repo(ScriptedSource::new(vec![(Duration::from_millis(20), Ok(FEED_A))])).await;
        let (tx, mut rx) = mpsc::channel(8);

        let generation = repo.refresh(&tx);
        assert_eq!(repo.generation(), generation);
        repo.cancel_refresh();
        assert!(!repo.is_loading());
        assert!(repo.generation() > generation);

        // The task was aborted, so nothing arrives.
        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(received.is_err());
        assert_eq!(
            repo.complete_refresh(generation, Ok(vec![])).await,
            Err(RefreshError::Cancelled)
        );
        assert!(repo.articles().is_empty());
    }

    #[tokio::test]
    async fn test_custom_cache_key() {
        let mut repo = repo(ScriptedSource::new(vec![(Duration::ZERO, Ok(FEED_A))]))
            .await
            .with_cache_key("otherKey");
        let (tx, mut rx) = mpsc::channel(8);

        repo.refresh(&tx);
        let (g, r) = next_completion(&mut rx).await;
        repo.complete_refresh(g, r).await.unwrap();

        assert!(repo.store().get("otherKey").await.unwrap().is_some());
        assert!(repo.store().get(DEFAULT_CACHE_KEY).await.unwrap().is_none());
        assert!(repo.clear_cache().await.unwrap());
        assert!(repo.store().get("otherKey").await.unwrap().is_none());
    }
}
