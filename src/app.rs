use tokio::sync::mpsc;

use crate::feed::FeedSource;
use crate::filter::{visible, FilterState};
use crate::repository::{ArticleRepository, LoadOutcome, RefreshError};
use crate::storage::{Article, KeyValueStore};

// ============================================================================
// Events
// ============================================================================

/// User-level commands that can arrive from anywhere in the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drop every selected tag and the search text.
    ClearAllFilters,
    /// Fetch the feed again, superseding any refresh in flight.
    Refresh,
}

/// Messages delivered to the owning task over the app channel.
#[derive(Debug)]
pub enum AppEvent {
    Command(Command),
    /// A background refresh finished.
    ///
    /// Fields:
    /// - `generation`: the refresh generation when the task was spawned
    /// - `result`: the parsed articles or why there are none
    RefreshCompleted {
        generation: u64,
        result: Result<Vec<Article>, RefreshError>,
    },
}

/// What handling an event changed, for the front end to report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    FiltersCleared,
    RefreshStarted(u64),
    Refreshed(usize),
    RefreshFailed(String),
    /// A stale or cancelled refresh result was dropped.
    Discarded,
}

// ============================================================================
// Application State
// ============================================================================

pub struct App<S: FeedSource, K: KeyValueStore> {
    pub repository: ArticleRepository<S, K>,
    pub filter: FilterState,
    /// Id of the article in the detail view.
    selected: Option<String>,
}

impl<S: FeedSource, K: KeyValueStore> App<S, K> {
    pub fn new(repository: ArticleRepository<S, K>) -> Self {
        Self {
            repository,
            filter: FilterState::default(),
            selected: None,
        }
    }

    /// Cache-then-fetch startup.
    pub async fn load(&mut self, event_tx: &mpsc::Sender<AppEvent>) -> LoadOutcome {
        self.repository.load(event_tx).await
    }

    pub fn visible_articles(&self) -> Vec<&Article> {
        visible(self.repository.articles(), &self.filter)
    }

    pub fn selected_article(&self) -> Option<&Article> {
        let id = self.selected.as_deref()?;
        self.repository.articles().iter().find(|a| a.id == id)
    }

    /// Select the `index`th visible article (zero-based).
    pub fn select(&mut self, index: usize) -> Option<&Article> {
        let id = self.visible_articles().get(index)?.id.clone();
        self.selected = Some(id);
        self.selected_article()
    }

    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        self.filter.toggle_tag(tag)
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.filter.set_search(text);
    }

    /// Apply one event. This is the only place articles or filters change.
    pub async fn handle_event(
        &mut self,
        event: AppEvent,
        event_tx: &mpsc::Sender<AppEvent>,
    ) -> Outcome {
        match event {
            AppEvent::Command(Command::ClearAllFilters) => {
                self.filter.clear();
                Outcome::FiltersCleared
            }
            AppEvent::Command(Command::Refresh) => {
                Outcome::RefreshStarted(self.repository.refresh(event_tx))
            }
            AppEvent::RefreshCompleted { generation, result } => {
                match self.repository.complete_refresh(generation, result).await {
                    Ok(count) => {
                        self.drop_missing_selection();
                        Outcome::Refreshed(count)
                    }
                    Err(RefreshError::Cancelled) => {
                        tracing::debug!(
                            generation,
                            current = self.repository.generation(),
                            "Discarded refresh result"
                        );
                        Outcome::Discarded
                    }
                    Err(e) => Outcome::RefreshFailed(e.to_string()),
                }
            }
        }
    }

    fn drop_missing_selection(&mut self) {
        if self.selected.is_some() && self.selected_article().is_none() {
            tracing::debug!(id = ?self.selected, "Selected article no longer exists");
            self.selected = None;
        }
    }
}
