//! memoctl - drive the memo cache against Redis or an in-process store

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use memocache::{
    decode_float, decode_integer, decode_text, replay_history, Cache, HttpFetcher, MemoryStore,
    RedisStore, Storage, StorageAdapter, Trace, Value, WebCache, WebCacheConfig,
    DEFAULT_PAGE_TTL, STORE_IDENTITY,
};
use memostore::DEFAULT_REDIS_URL;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Redis connection string
    #[arg(short, long, default_value = DEFAULT_REDIS_URL)]
    redis_url: String,

    /// Use an in-process store instead of Redis (state lasts one invocation)
    #[arg(long)]
    memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store values, read them back and replay the store history.
    /// Flushes the selected database first.
    Store {
        /// Values to store
        #[arg(required = true)]
        values: Vec<String>,

        /// How each value is interpreted
        #[arg(short, long, value_enum, default_value_t = Kind::Text)]
        kind: Kind,

        /// Print the replay trace as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the value stored under a key
    Get {
        /// Key returned by `store`
        key: String,

        /// How the stored bytes are decoded
        #[arg(long = "as", value_enum, default_value_t = Kind::Text)]
        format: Kind,
    },

    /// Print the recorded history of `store` without touching the data
    Replay {
        /// Print the trace as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch a page through the expiring web cache
    Page {
        /// Page address
        url: String,

        /// Number of requests to make
        #[arg(short = 'n', long, default_value_t = 1)]
        repeat: u32,

        /// Page lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_PAGE_TTL.as_secs())]
        ttl: u64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Kind {
    Text,
    Int,
    Float,
    #[value(alias = "raw")]
    Bytes,
}

impl Kind {
    fn parse(self, raw: &str) -> Result<Value> {
        Ok(match self {
            Kind::Text => Value::from(raw),
            Kind::Int => Value::Integer(
                raw.parse()
                    .with_context(|| format!("{:?} is not an integer", raw))?,
            ),
            Kind::Float => Value::Float(
                raw.parse()
                    .with_context(|| format!("{:?} is not a number", raw))?,
            ),
            Kind::Bytes => Value::Bytes(raw.as_bytes().to_vec()),
        })
    }

    /// Decode stored bytes for display
    fn render(self, raw: Vec<u8>) -> Result<String> {
        Ok(match self {
            Kind::Text => decode_text(raw)?,
            Kind::Int => decode_integer(raw)?.to_string(),
            Kind::Float => Value::Float(decode_float(raw)?).to_string(),
            Kind::Bytes => Value::Bytes(raw).repr(),
        })
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let adapter = open_adapter(&cli)?;
    run(cli.command, adapter, &mut io::stdout().lock())
}

fn open_adapter(cli: &Cli) -> Result<Arc<dyn StorageAdapter>> {
    if cli.memory {
        info!("Using in-process store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = RedisStore::connect(&cli.redis_url)
        .with_context(|| format!("Failed to open storage at {}", cli.redis_url))?;
    Ok(Arc::new(store))
}

/// Run one subcommand, then close the adapter whether it succeeded or not
fn run(command: Command, adapter: Arc<dyn StorageAdapter>, out: &mut impl Write) -> Result<()> {
    let outcome = match command {
        Command::Store { values, kind, json } => run_store(&adapter, &values, kind, json, out),
        Command::Get { key, format } => run_get(&adapter, &key, format, out),
        Command::Replay { json } => run_replay(&adapter, json, out),
        Command::Page { url, repeat, ttl } => run_page(&adapter, &url, repeat, ttl, out),
    };

    adapter.close().context("Failed to close storage")?;
    outcome
}

fn write_trace(trace: &Trace, json: bool, out: &mut impl Write) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, trace)?;
        writeln!(out)?;
    } else {
        trace.write_to(out)?;
    }
    Ok(())
}

fn run_store(
    adapter: &Arc<dyn StorageAdapter>,
    values: &[String],
    kind: Kind,
    json: bool,
    out: &mut impl Write,
) -> Result<()> {
    let cache = Cache::new(Arc::clone(adapter)).context("Failed to initialise cache")?;

    for raw in values {
        let key = cache.store(kind.parse(raw)?)?;
        let stored = cache.retrieve(&key)?.context("Stored value disappeared")?;
        writeln!(out, "{} -> {}", key, kind.render(stored)?)?;
    }

    write_trace(&cache.replay()?, json, out)?;
    cache.close()?;
    Ok(())
}

fn run_get(
    adapter: &Arc<dyn StorageAdapter>,
    key: &str,
    format: Kind,
    out: &mut impl Write,
) -> Result<()> {
    let raw = adapter
        .get(key)?
        .with_context(|| format!("No value stored under {}", key))?;
    writeln!(out, "{}", format.render(raw)?)?;
    Ok(())
}

fn run_replay(adapter: &Arc<dyn StorageAdapter>, json: bool, out: &mut impl Write) -> Result<()> {
    let storage = Storage::Live(Arc::clone(adapter));
    let trace = replay_history(STORE_IDENTITY, &storage)?
        .unwrap_or_else(|| Trace::empty(STORE_IDENTITY));
    write_trace(&trace, json, out)
}

fn run_page(
    adapter: &Arc<dyn StorageAdapter>,
    url: &str,
    repeat: u32,
    ttl: u64,
    out: &mut impl Write,
) -> Result<()> {
    let config = WebCacheConfig::default().ttl(Duration::from_secs(ttl));
    let cache = WebCache::with_fetcher(Arc::clone(adapter), HttpFetcher::new(), config)
        .context("Invalid page cache configuration")?;

    for request in 1..=repeat {
        let content = cache
            .get_page(url)
            .with_context(|| format!("Failed to get {}", url))?;
        info!(request, bytes = content.len(), "Served page");
        if request == 1 {
            writeln!(out, "{}", content)?;
        }
    }

    let stats = cache.stats().snapshot();
    writeln!(
        out,
        "{} requested {} times (hits: {}, misses: {}, fetches: {})",
        url,
        cache.access_count(url)?,
        stats.hits,
        stats.misses,
        stats.fetches
    )?;
    Ok(())
}
