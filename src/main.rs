use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use announcer::app::{App, AppEvent};
use announcer::config::Config;
use announcer::feed::{FeedSource, HttpFetcher};
use announcer::repository::{ArticleRepository, LoadOutcome};
use announcer::storage::{Database, DatabaseError, KeyValueStore};
use announcer::ui;

/// Maximum redirects followed when fetching the feed.
const MAX_REDIRECTS: usize = 5;

/// Get the config directory path (~/.config/announcer/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("announcer"))
}

#[derive(Parser, Debug)]
#[command(name = "announcer", about = "Terminal reader for an Atom announcements feed")]
struct Args {
    /// Config file (default: ~/.config/announcer/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Feed URL, overriding the config file
    #[arg(long)]
    url: Option<String>,

    /// Fetch the feed even if cached articles exist
    #[arg(long)]
    refresh: bool,

    /// Delete the cached articles before starting
    #[arg(long)]
    reset_cache: bool,

    /// Print the article list and exit
    #[arg(long)]
    list: bool,

    /// Only show articles with this tag (repeatable)
    #[arg(long, value_name = "TAG")]
    tag: Vec<String>,

    /// Only show articles whose title, author or tags contain this text
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout belongs to the interface.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        tracing::info!(path = %config_dir.display(), "Created config directory");
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
                let mut perms = metadata.permissions();
                perms.set_mode(0o700);
                if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                    tracing::warn!(
                        path = %config_dir.display(),
                        error = %e,
                        "Failed to set config directory permissions to 0700"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if let Some(url) = &args.url {
        config.feed_url = url.clone();
    }

    let db_path = config_dir.join("announcer.db");
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of announcer appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = HttpFetcher::new(client)
        .with_timeout(config.request_timeout())
        .with_max_bytes(config.max_feed_bytes);

    let repository =
        ArticleRepository::new(fetcher, db, &config.feed_url).with_cache_key(&config.cache_key);

    if args.reset_cache {
        let removed = repository
            .clear_cache()
            .await
            .context("Failed to reset the article cache")?;
        println!("{}", if removed { "Cache cleared." } else { "Cache was already empty." });
    }

    let mut app = App::new(repository);
    for tag in &args.tag {
        app.toggle_tag(tag);
    }
    if let Some(search) = &args.search {
        app.set_search(search.as_str());
    }

    let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(32);

    let outcome = if args.refresh {
        LoadOutcome::Refreshing(app.repository.refresh(&event_tx))
    } else {
        app.load(&event_tx).await
    };
    tracing::debug!(?outcome, url = %config.feed_url, "Startup load");

    if args.list {
        print_once(&mut app, &event_tx, &mut event_rx).await;
        return Ok(());
    }

    ui::run(&mut app, event_tx, event_rx).await?;
    Ok(())
}

/// Wait for any startup refresh, then print the filtered list.
async fn print_once<S: FeedSource, K: KeyValueStore>(
    app: &mut App<S, K>,
    event_tx: &mpsc::Sender<AppEvent>,
    event_rx: &mut mpsc::Receiver<AppEvent>,
) {
    while app.repository.is_loading() {
        let Some(event) = event_rx.recv().await else {
            break;
        };
        app.handle_event(event, event_tx).await;
    }
    if let Some(error) = app.repository.take_error() {
        eprintln!("{error}");
    }
    println!("{}", ui::render_list(app));
}
