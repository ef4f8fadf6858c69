//! Main event loop for the line interface.
//!
//! Multiplexes stdin lines, background task events and shutdown signals.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use super::events::handle_app_event;
use super::input::{handle_input, parse_input};
use super::render::render_list;
use crate::app::{App, AppEvent};
use crate::feed::FeedSource;
use crate::storage::KeyValueStore;

/// Result of handling one input line.
pub enum Action {
    /// Keep reading input.
    Continue,
    /// Leave the loop.
    Quit,
}

/// Runs the interactive loop until `q`, end of input or a shutdown signal.
///
/// Background results are drained before each read so a completed refresh is
/// shown even while the user keeps typing.
pub async fn run<S: FeedSource, K: KeyValueStore>(
    app: &mut App<S, K>,
    event_tx: mpsc::Sender<AppEvent>,
    mut event_rx: mpsc::Receiver<AppEvent>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;
    #[cfg(unix)]
    let mut sigint = signal(SignalKind::interrupt())?;

    println!("{}", render_list(app));
    println!("Type ? for help.");

    loop {
        while let Ok(event) = event_rx.try_recv() {
            handle_app_event(app, event, &event_tx).await;
        }

        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        #[cfg(unix)]
        let sigint_fut = sigint.recv();
        #[cfg(not(unix))]
        let sigint_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down");
                break;
            }

            _ = sigint_fut => {
                tracing::info!("Received SIGINT, shutting down");
                break;
            }

            line = lines.next_line() => {
                let Some(line) = line? else {
                    tracing::debug!("End of input");
                    break;
                };
                match handle_input(app, parse_input(&line), &event_tx).await {
                    Ok(Action::Quit) => break,
                    Ok(Action::Continue) => {}
                    Err(e) => println!("Error: {e}"),
                }
            }

            Some(event) = event_rx.recv() => {
                handle_app_event(app, event, &event_tx).await;
            }
        }
    }

    Ok(())
}
