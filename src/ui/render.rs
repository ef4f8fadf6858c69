use chrono::DateTime;
use std::borrow::Cow;
use std::fmt::Write;

use crate::app::App;
use crate::feed::FeedSource;
use crate::filter::FilterState;
use crate::storage::{Article, KeyValueStore};
use crate::util::{single_line, strip_control_chars, truncate_to_width};

/// Columns available to one article row.
const ROW_WIDTH: usize = 76;

/// Indent of the second row line, lining up with the title.
const INDENT: &str = "     ";

pub const HELP: &str = "\
Commands:
  l           list articles
  <n>         show article n
  o <n>       open article n in the browser
  t <tag>     toggle a tag filter
  tags        list tags (* = selected)
  / <text>    search titles, authors and tags (/ alone clears)
  c           clear all filters
  r           refresh from the feed
  ?           this help
  q           quit";

/// Feed text made safe and compact for a single terminal line.
fn clean_line(s: &str) -> String {
    single_line(&strip_control_chars(s)).into_owned()
}

/// Display form of an entry's `published` value.
///
/// RFC 3339 timestamps are shown as e.g. `Mar 5, 2024 14:30` in their own
/// offset; anything else is shown as given.
pub fn format_published(raw: &str) -> Cow<'_, str> {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => Cow::Owned(dt.format("%b %-d, %Y %H:%M").to_string()),
        Err(_) => Cow::Borrowed(raw),
    }
}

/// Two-line list row: numbered title, then author, date and tags.
pub fn format_row(number: usize, article: &Article) -> String {
    let prefix = format!("{number:>3}. ");
    let title = clean_line(&article.title);
    let title = if title.is_empty() { "(untitled)".to_string() } else { title };
    let title = truncate_to_width(&title, ROW_WIDTH.saturating_sub(prefix.len()));

    let mut meta = Vec::new();
    if let Some(author) = article.author.as_deref().map(clean_line) {
        if !author.is_empty() {
            meta.push(author);
        }
    }
    if !article.published.is_empty() {
        meta.push(clean_line(&format_published(&article.published)));
    }
    if !article.categories.is_empty() {
        let tags: Vec<String> = article.categories.iter().map(|c| clean_line(c)).collect();
        meta.push(format!("[{}]", tags.join(", ")));
    }

    let mut row = format!("{prefix}{title}");
    if !meta.is_empty() {
        let meta = meta.join(" | ");
        let meta = truncate_to_width(&meta, ROW_WIDTH.saturating_sub(INDENT.len()));
        let _ = write!(row, "\n{INDENT}{meta}");
    }
    row
}

/// Full view of one article. Content is shown raw, markup included.
pub fn format_detail(article: &Article) -> String {
    let mut out = String::new();
    let title = clean_line(&article.title);
    let _ = writeln!(out, "{}", if title.is_empty() { "(untitled)" } else { title.as_str() });
    if let Some(author) = &article.author {
        let _ = writeln!(out, "By: {}", clean_line(author));
    }
    if !article.published.is_empty() {
        let _ = writeln!(out, "Published: {}", clean_line(&format_published(&article.published)));
    }
    if !article.categories.is_empty() {
        let tags: Vec<String> = article.categories.iter().map(|c| clean_line(c)).collect();
        let _ = writeln!(out, "Tags: {}", tags.join(", "));
    }
    if !article.link.is_empty() {
        let _ = writeln!(out, "Link: {}", clean_line(&article.link));
    }
    if !article.content.is_empty() {
        let _ = writeln!(out, "\n{}", strip_control_chars(article.content.trim()));
    }
    out.truncate(out.trim_end().len());
    out
}

/// Every known tag, selected ones marked with `*`.
pub fn format_tags(tags: &[String], filter: &FilterState) -> String {
    if tags.is_empty() {
        return "No tags.".to_string();
    }
    tags.iter()
        .map(|tag| {
            let mark = if filter.selected_tags.contains(tag) { '*' } else { ' ' };
            format!(" {mark} {}", clean_line(tag))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_filter(filter: &FilterState) -> Option<String> {
    if !filter.is_active() {
        return None;
    }
    let mut parts = Vec::new();
    if !filter.selected_tags.is_empty() {
        let tags: Vec<&str> = filter.selected_tags.iter().map(String::as_str).collect();
        parts.push(format!("tags: {}", tags.join(", ")));
    }
    if !filter.search.is_empty() {
        parts.push(format!("search: \"{}\"", filter.search));
    }
    Some(parts.join("; "))
}

/// The filtered article list with a summary header.
pub fn render_list<S: FeedSource, K: KeyValueStore>(app: &App<S, K>) -> String {
    let visible = app.visible_articles();
    let total = app.repository.articles().len();

    let mut out = match describe_filter(&app.filter) {
        Some(filter) => format!("{} of {total} articles ({filter})", visible.len()),
        None => format!("{total} articles"),
    };
    if app.repository.is_loading() {
        out.push_str(" - refreshing...");
    }
    for (i, article) in visible.iter().enumerate() {
        let _ = write!(out, "\n{}", format_row(i + 1, article));
    }
    if visible.is_empty() && total > 0 {
        out.push_str("\nNo articles match. Use 'c' to clear filters.");
    }
    out
}
