mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use bookbridge_core::extract::{find_isbn, title_from_heading};
use bookbridge_core::{Config, Detection, HtmlPage};
use bookbridge_host::{Navigation, Pipeline, SessionController, SlotPresenter};
use bookbridge_store::{Cache, JsonFileStore, KvStore, MemoryStore};
use bookbridge_sync::{HttpTransport, Transport};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "bookbridge", version, about = "Douban ratings for Kongfz book pages")]
struct Cli {
    /// JSON config file; missing keys take their defaults.
    #[arg(long, env = "BOOKBRIDGE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Persistent cache file. Without it the cache lives only for this run.
    #[arg(long, env = "BOOKBRIDGE_CACHE", global = true)]
    cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Look up a book by ISBN or title.
    Lookup {
        /// ISBN, or a title when no ISBN can be read from the text.
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Replay a saved detail page as if it had just been navigated to.
    Page {
        file: PathBuf,
        /// Address the page was saved from.
        #[arg(long)]
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("bookbridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };
    let cache = open_cache(cli.cache.as_deref());
    let transport: Arc<dyn Transport> = Arc::new(
        HttpTransport::new(config.http_timeout()).context("building HTTP client")?,
    );

    match cli.command {
        Command::Lookup { query } => lookup(&query.join(" "), config, transport, cache).await,
        Command::Page { file, url } => replay(&file, &url, config, transport, cache).await,
    }
}

fn open_cache(path: Option<&Path>) -> Cache {
    let store: Arc<dyn KvStore> = match path {
        Some(path) => Arc::new(JsonFileStore::open(path)),
        None => Arc::new(MemoryStore::new()),
    };
    Cache::new(store)
}

async fn lookup(
    query: &str,
    config: Config,
    transport: Arc<dyn Transport>,
    cache: Cache,
) -> anyhow::Result<()> {
    let isbn = find_isbn(query);
    let detection = Detection {
        title: isbn.is_none().then(|| title_from_heading(query)).flatten(),
        isbn,
    };
    if detection.key().is_none() {
        bail!("{query:?} is neither an ISBN nor a usable title");
    }

    let pipeline = Pipeline::new(config, transport, cache)?;
    let slots = Arc::new(SlotPresenter::new());
    let outcome = pipeline.lookup(&detection, slots.clone()).await;
    tracing::debug!(?outcome, "lookup finished");

    display::print_slots(&slots.snapshot());
    Ok(())
}

async fn replay(
    file: &Path,
    url: &str,
    config: Config,
    transport: Arc<dyn Transport>,
    cache: Cache,
) -> anyhow::Result<()> {
    let html = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let slots = Arc::new(SlotPresenter::new());
    let controller = SessionController::new(config, transport, cache, slots.clone())?;

    match controller.on_navigation(url, Arc::new(HtmlPage::new(html))) {
        Navigation::Started(run) => {
            let outcome = run.await?;
            tracing::debug!(?outcome, "replay finished");
        }
        Navigation::Unchanged => {}
        Navigation::Cleared => bail!("{url} is not a book detail page"),
    }

    display::print_slots(&slots.snapshot());
    Ok(())
}
