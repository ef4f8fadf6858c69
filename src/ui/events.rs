//! Application event handling.
//!
//! Applies commands and refresh completions to the app and reports what
//! changed on stdout.

use tokio::sync::mpsc;

use super::render::render_list;
use crate::app::{App, AppEvent, Outcome};
use crate::feed::FeedSource;
use crate::storage::KeyValueStore;

pub(super) async fn handle_app_event<S: FeedSource, K: KeyValueStore>(
    app: &mut App<S, K>,
    event: AppEvent,
    event_tx: &mpsc::Sender<AppEvent>,
) {
    match app.handle_event(event, event_tx).await {
        Outcome::FiltersCleared => {
            println!("Filters cleared.");
            println!("{}", render_list(app));
        }
        Outcome::RefreshStarted(generation) => {
            tracing::debug!(generation, "Refresh requested");
            println!("Refreshing {}...", app.repository.endpoint());
        }
        Outcome::Refreshed(count) => {
            println!("Loaded {count} articles.");
            println!("{}", render_list(app));
        }
        Outcome::RefreshFailed(_) => {
            // Showing the error acknowledges it.
            if let Some(error) = app.repository.take_error() {
                println!("{error}");
            }
        }
        Outcome::Discarded => {}
    }
}
