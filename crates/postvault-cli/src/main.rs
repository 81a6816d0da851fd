use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use postvault_core::AppConfig;
use postvault_media::{format_size, MediaCache, MediaCacheConfig};

#[derive(Debug, Parser)]
#[command(name = "postvault")]
#[command(about = "Personal social-post archive: ingest, dedup, media cache")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Import a directory of scraped JSON files as one ingestion run.
    Import {
        directory: PathBuf,
        /// Skip fetching referenced media into the cache.
        #[arg(long)]
        skip_media: bool,
        /// Platform tag for newly created posts; defaults to the configured one.
        #[arg(long)]
        platform: Option<String>,
    },
    /// Show archive totals.
    Stats,
    /// List recent ingestion runs, or show one by its id.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
        /// Show a single run (e.g. run-1a2b3c4d).
        #[arg(long)]
        id: Option<String>,
    },
    /// Fetch URLs into the media cache without touching the database.
    Cache { urls: Vec<String> },
    /// Verify a cached file against its expected hash, re-downloading once
    /// if the local copy is corrupt.
    Verify { url: String, hash: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = postvault_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Import {
            directory,
            skip_media,
            platform,
        } => {
            let pool = connect(&config).await?;
            let cache = if skip_media {
                None
            } else {
                Some(media_cache(&config)?)
            };
            let platform = platform.unwrap_or_else(|| config.default_platform.clone());

            let outcome =
                postvault_ingest::import_directory(&pool, cache.as_ref(), &directory, &platform)
                    .await?;
            let stats = &outcome.stats;

            println!("Run ID:      {}", outcome.run_id);
            println!("Processed:   {}", stats.fetched);
            println!("New:         {}", stats.new);
            println!("Duplicates:  {}", stats.duplicate);
            println!("Errors:      {}", stats.errors);
            if !skip_media {
                println!(
                    "Media:       {} cached, {} failed (of {} found)",
                    stats.media_cached, stats.media_errored, stats.media_found
                );
            }
            for detail in &stats.error_details {
                println!(
                    "  error: {} ({})",
                    detail.reason,
                    detail
                        .source
                        .as_deref()
                        .or(detail.identity.as_deref())
                        .unwrap_or("unknown source")
                );
            }
        }
        Commands::Stats => {
            let pool = connect(&config).await?;
            println!("Posts:       {}", postvault_db::count_posts(&pool).await?);
            println!(
                "Marked:      {}",
                postvault_db::count_marked_posts(&pool).await?
            );
            println!(
                "Snapshots:   {}",
                postvault_db::count_snapshots(&pool).await?
            );
            println!(
                "Runs:        {}",
                postvault_db::count_ingestion_runs(&pool).await?
            );

            let cache = media_cache(&config)?;
            let cache_stats = cache.cache_stats().await?;
            println!(
                "Media cache: {} files, {}",
                cache_stats.total_files,
                format_size(cache_stats.total_bytes)
            );
            for (kind, kind_stats) in &cache_stats.by_kind {
                println!(
                    "  {:<10} {} files, {}",
                    kind.dir_name(),
                    kind_stats.files,
                    format_size(kind_stats.bytes)
                );
            }
        }
        Commands::Runs { limit, id } => {
            let pool = connect(&config).await?;
            let runs = if let Some(id) = id {
                anyhow::ensure!(
                    postvault_core::is_valid_entity_id(postvault_core::PREFIX_RUN, &id),
                    "malformed run id: {id}"
                );
                vec![postvault_db::get_ingestion_run(&pool, &id).await?]
            } else {
                postvault_db::list_ingestion_runs(&pool, limit).await?
            };
            if runs.is_empty() {
                println!("no ingestion runs yet");
            }
            for run in runs {
                println!(
                    "{}  {:<9}  started {}  fetched={} new={} duplicate={} errors={}",
                    run.run_id,
                    run.status,
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.posts_fetched,
                    run.posts_new,
                    run.posts_duplicate,
                    run.posts_errored,
                );
                if let Some(detail) = run.error_detail {
                    println!("  error: {detail}");
                }
            }
        }
        Commands::Cache { urls } => {
            let cache = media_cache(&config)?;
            let results = cache.fetch_many_default(urls).await;
            for (url, result) in results {
                match result {
                    Ok(entry) => println!(
                        "cached {} -> {} ({})",
                        url,
                        entry.local_path.display(),
                        format_size(entry.byte_size)
                    ),
                    Err(e) => println!("failed {url}: {e}"),
                }
            }
        }
        Commands::Verify { url, hash } => {
            let cache = media_cache(&config)?;
            let entry = cache.ensure_cached(&url, &hash).await?;
            println!(
                "verified {} ({})",
                entry.local_path.display(),
                format_size(entry.byte_size)
            );
        }
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = postvault_db::PoolConfig::from_app_config(config);
    let pool = postvault_db::connect_pool(&config.database_url, pool_config).await?;
    postvault_db::health_check(&pool).await?;
    let applied = postvault_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations");
    }
    Ok(pool)
}

fn media_cache(config: &AppConfig) -> anyhow::Result<MediaCache> {
    let cache_config = MediaCacheConfig {
        timeout_secs: config.media_timeout_secs,
        user_agent: config.media_user_agent.clone(),
        max_concurrency: config.media_max_concurrency,
    };
    Ok(MediaCache::new(&config.media_cache_root, &cache_config)?)
}
