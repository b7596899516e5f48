//! thumbcache - fetch the photo feed and load thumbnails through the two-tier cache
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use thumbcache::{CacheManager, Config, HttpSource, ThumbnailLoader, Tier, VERSION};

/// Thumbnails loaded when `--limit` is not given
const DEFAULT_LIMIT: usize = 20;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging (RUST_LOG=debug for verbose output)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match parse_args()? {
        Command::Albums { limit } => {
            let config = Config::load()?;
            albums_cli(&config, limit).await
        }
        Command::Maintain => {
            let config = Config::load()?;
            maintain_cli(&config)
        }
        Command::Stats => {
            let config = Config::load()?;
            stats_cli(&config)
        }
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Version => {
            println!("thumbcache {VERSION}");
            Ok(())
        }
    }
}

/// CLI commands
enum Command {
    Albums { limit: usize },
    Maintain,
    Stats,
    Help,
    Version,
}

fn parse_args() -> Result<Command> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() == 1 {
        return Ok(Command::Albums {
            limit: DEFAULT_LIMIT,
        });
    }

    match args[1].as_str() {
        "-h" | "--help" | "help" => Ok(Command::Help),
        "-v" | "--version" | "version" => Ok(Command::Version),
        "maintain" => Ok(Command::Maintain),
        "stats" => Ok(Command::Stats),

        "albums" => {
            let mut limit = DEFAULT_LIMIT;
            let mut i = 2;
            while i < args.len() {
                if args[i] == "--limit" || args[i] == "-n" {
                    if let Some(n) = args.get(i + 1) {
                        limit = n.parse().context("Invalid limit")?;
                    }
                    i += 2;
                } else {
                    i += 1;
                }
            }
            Ok(Command::Albums { limit })
        }

        other => anyhow::bail!("Unknown command: {other}. Run 'thumbcache help' for usage."),
    }
}

fn open_cache(config: &Config) -> Result<CacheManager> {
    let dir = config.resolved_cache_dir()?;
    tracing::debug!("Image cache directory: {}", dir.display());
    Ok(CacheManager::new(dir, config.cache_config()))
}

async fn albums_cli(config: &Config, limit: usize) -> Result<()> {
    let cache = open_cache(config)?;
    if config.maintain_on_start {
        cache.run_maintenance();
    }

    let source = HttpSource::new(&config.base_url, config.request_timeout());
    let loader = ThumbnailLoader::new(cache.clone(), source);

    let albums = loader
        .fetch_list()
        .await
        .context("Failed to fetch photo list")?;

    let (mut memory, mut disk, mut remote, mut failed) = (0, 0, 0, 0);
    for album in albums.iter().take(limit) {
        match loader.load(&album.thumbnail_url).await {
            Ok((image, tier)) => {
                match tier {
                    Tier::Memory => memory += 1,
                    Tier::Disk => disk += 1,
                    Tier::Remote => remote += 1,
                }
                println!(
                    "{:>5}  {:<6}  {:>4}x{:<4}  {}",
                    album.id,
                    tier,
                    image.width(),
                    image.height(),
                    album.title
                );
            }
            Err(e) => {
                failed += 1;
                println!("{:>5}  failed  {e}  {}", album.id, album.title);
            }
        }
    }

    let usage = cache.disk().usage();
    println!();
    println!(
        "{} of {} loaded: {} memory, {} disk, {} remote, {} failed",
        memory + disk + remote,
        albums.len().min(limit),
        memory,
        disk,
        remote,
        failed
    );
    println!(
        "Disk cache: {} files, {} / {} bytes",
        usage.files,
        usage.bytes,
        cache.config().max_disk_bytes
    );

    Ok(())
}

fn maintain_cli(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let reclaimed = cache.run_maintenance();
    println!(
        "Removed {} expired files ({} bytes) older than {} days",
        reclaimed.files,
        reclaimed.bytes,
        cache.config().expiry.as_secs() / 86_400
    );
    Ok(())
}

fn stats_cli(config: &Config) -> Result<()> {
    let cache = open_cache(config)?;
    let usage = cache.disk().usage();

    println!("Directory: {}", cache.disk().dir().display());
    println!("Files:     {}", usage.files);
    println!(
        "Size:      {} / {} bytes",
        usage.bytes,
        cache.config().max_disk_bytes
    );
    if let Some(oldest) = usage.oldest {
        let oldest: DateTime<Local> = oldest.into();
        println!("Oldest:    {}", oldest.format("%Y-%m-%d %H:%M:%S"));
    }
    Ok(())
}

fn print_help() {
    println!(
        r"thumbcache {VERSION}
Two-tier image cache for the photo feed

USAGE:
    thumbcache [COMMAND]

COMMANDS:
    albums [--limit N]   Fetch the feed and load the first N thumbnails (default)
    maintain             Remove cached files older than the expiry
    stats                Show disk cache usage
    help                 Show this help
    version              Show version

CONFIG:
    ~/.config/thumbcache/config.toml
        base_url, cache_dir, expiry_secs, max_disk_bytes,
        memory_capacity, request_timeout_secs, maintain_on_start

Set RUST_LOG=debug for verbose output."
    );
}
