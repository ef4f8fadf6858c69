use anyhow::Result;
use tokio::sync::mpsc;

use super::loop_runner::Action;
use super::render::{format_detail, format_tags, render_list, HELP};
use crate::app::{App, AppEvent, Command};
use crate::feed::FeedSource;
use crate::storage::KeyValueStore;
use crate::util::validate_url_for_open;

const ERR_ARTICLE_NO_URL: &str = "This article has no link";

/// One line of user input, parsed.
///
/// Article numbers are as shown in the list, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Refresh,
    ClearFilters,
    ToggleTag(String),
    /// Replace the search text; empty clears it.
    Search(String),
    Show(usize),
    Open(usize),
    Tags,
    List,
    Help,
    Quit,
    Empty,
    Unknown(String),
}

pub fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if let Some(query) = line.strip_prefix('/') {
        return Input::Search(query.trim().to_string());
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    match (word, rest) {
        ("", _) => Input::Empty,
        ("q" | "quit", "") => Input::Quit,
        ("r" | "refresh", "") => Input::Refresh,
        ("c" | "clear", "") => Input::ClearFilters,
        ("l" | "ls" | "list", "") => Input::List,
        ("tags", "") => Input::Tags,
        ("?" | "h" | "help", "") => Input::Help,
        ("t" | "tag", tag) if !tag.is_empty() => Input::ToggleTag(tag.to_string()),
        ("o" | "open", n) => n.parse().map_or_else(|_| Input::Unknown(line.to_string()), Input::Open),
        (n, "") => n.parse().map_or_else(|_| Input::Unknown(line.to_string()), Input::Show),
        _ => Input::Unknown(line.to_string()),
    }
}

/// Carry out one input line. Printing is the only output.
pub async fn handle_input<S: FeedSource, K: KeyValueStore>(
    app: &mut App<S, K>,
    input: Input,
    event_tx: &mpsc::Sender<AppEvent>,
) -> Result<Action> {
    match input {
        Input::Quit => return Ok(Action::Quit),
        Input::Empty => {}
        Input::Refresh => event_tx.send(AppEvent::Command(Command::Refresh)).await?,
        Input::ClearFilters => {
            event_tx
                .send(AppEvent::Command(Command::ClearAllFilters))
                .await?
        }
        Input::ToggleTag(tag) => {
            if !app.repository.available_tags().contains(&tag)
                && !app.filter.selected_tags.contains(&tag)
            {
                println!("No such tag: {tag} (type 'tags' to list them)");
            } else {
                let selected = app.toggle_tag(&tag);
                tracing::debug!(tag = %tag, selected, "Toggled tag filter");
                println!("{}", render_list(app));
            }
        }
        Input::Search(query) => {
            app.set_search(query);
            println!("{}", render_list(app));
        }
        Input::Show(n) => match n.checked_sub(1).and_then(|i| app.select(i)) {
            Some(article) => println!("{}", format_detail(article)),
            None => println!("No article #{n}"),
        },
        Input::Open(n) => open_article(app, n),
        Input::Tags => println!("{}", format_tags(app.repository.available_tags(), &app.filter)),
        Input::List => println!("{}", render_list(app)),
        Input::Help => println!("{HELP}"),
        Input::Unknown(line) => println!("Unknown command: {line} (? for help)"),
    }
    Ok(Action::Continue)
}

fn open_article<S: FeedSource, K: KeyValueStore>(app: &mut App<S, K>, n: usize) {
    let Some(article) = n.checked_sub(1).and_then(|i| app.select(i)) else {
        println!("No article #{n}");
        return;
    };
    if article.link.is_empty() {
        println!("{ERR_ARTICLE_NO_URL}");
        return;
    }
    // Validate before open::that() so feed-supplied links cannot reach a shell handler.
    if let Err(e) = validate_url_for_open(&article.link) {
        println!("{e}");
    } else if let Err(e) = open::that(&article.link) {
        println!("Failed to open browser: {e}");
    } else {
        tracing::info!(link = %article.link, "Opened article in browser");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse_input("r"), Input::Refresh);
        assert_eq!(parse_input("  c  "), Input::ClearFilters);
        assert_eq!(parse_input("tags"), Input::Tags);
        assert_eq!(parse_input("l"), Input::List);
        assert_eq!(parse_input("?"), Input::Help);
        assert_eq!(parse_input("q"), Input::Quit);
        assert_eq!(parse_input(""), Input::Empty);
        assert_eq!(parse_input("   "), Input::Empty);
    }

    #[test]
    fn test_tag_keeps_inner_spaces() {
        assert_eq!(parse_input("t Student Life"), Input::ToggleTag("Student Life".into()));
        assert_eq!(parse_input("t"), Input::Unknown("t".into()));
    }

    #[test]
    fn test_search() {
        assert_eq!(parse_input("/ sports day"), Input::Search("sports day".into()));
        assert_eq!(parse_input("/exam"), Input::Search("exam".into()));
        assert_eq!(parse_input("/"), Input::Search(String::new()));
    }

    #[test]
    fn test_article_numbers() {
        assert_eq!(parse_input("3"), Input::Show(3));
        assert_eq!(parse_input("o 2"), Input::Open(2));
        assert_eq!(parse_input("o"), Input::Unknown("o".into()));
        assert_eq!(parse_input("o two"), Input::Unknown("o two".into()));
        assert_eq!(parse_input("-1"), Input::Unknown("-1".into()));
    }

    #[test]
    fn test_unknown() {
        assert_eq!(parse_input("refresh now"), Input::Unknown("refresh now".into()));
        assert_eq!(parse_input("xyzzy"), Input::Unknown("xyzzy".into()));
    }
}
