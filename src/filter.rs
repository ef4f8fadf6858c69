//! Tag and search filtering over the article list.
//!
//! Everything here is derived: filtering borrows the full list and never
//! changes it, and the tag universe is always computed from the full list,
//! not from what is currently visible.

use std::collections::BTreeSet;

use crate::storage::Article;

/// Tag selection plus free-text search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub selected_tags: BTreeSet<String>,
    pub search: String,
}

impl FilterState {
    /// Select `tag` if it is not selected, deselect it otherwise.
    /// Returns whether the tag is selected afterwards.
    pub fn toggle_tag(&mut self, tag: &str) -> bool {
        if self.selected_tags.remove(tag) {
            false
        } else {
            self.selected_tags.insert(tag.to_string());
            true
        }
    }

    pub fn set_search(&mut self, text: impl Into<String>) {
        self.search = text.into();
    }

    /// "Clear all filters": drop every selected tag and the search text.
    pub fn clear(&mut self) {
        self.selected_tags.clear();
        self.search.clear();
    }

    pub fn is_active(&self) -> bool {
        !self.selected_tags.is_empty() || !self.search.is_empty()
    }

    fn matches_tags(&self, article: &Article) -> bool {
        self.selected_tags.is_empty()
            || article
                .categories
                .iter()
                .any(|category| self.selected_tags.contains(category))
    }

    fn matches_search(&self, article: &Article) -> bool {
        if self.search.is_empty() {
            return true;
        }
        let needle = self.search.to_lowercase();
        let contains = |haystack: &str| haystack.to_lowercase().contains(&needle);
        contains(&article.title)
            || article.author.as_deref().is_some_and(contains)
            || article.categories.iter().any(|c| contains(c))
    }

    pub fn matches(&self, article: &Article) -> bool {
        self.matches_tags(article) && self.matches_search(article)
    }
}

/// The articles that pass `filter`, in their original order.
pub fn visible<'a>(articles: &'a [Article], filter: &FilterState) -> Vec<&'a Article> {
    articles.iter().filter(|a| filter.matches(a)).collect()
}

/// Sorted, de-duplicated union of every article's categories.
pub fn tag_universe(articles: &[Article]) -> Vec<String> {
    articles
        .iter()
        .flat_map(|a| a.categories.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
