//! `dondeayudo` - CLI for the Donde Ayudo aid-point map
//!
//! Syncs the public point list into the local cache, prints points for
//! offline use, and drives the admin moderation endpoints.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tracing::debug;

use dondeayudo::admin::{AdminClient, AdminFilter, NewPoint};
use dondeayudo::cli::{
    AdminCommand, CacheCommand, Cli, Command, ConfigCommand, OutputFormat, PointsCommand,
};
use dondeayudo::fallback::FallbackBundle;
use dondeayudo::normalize::{label_for, ColorMap};
use dondeayudo::{
    init_logging, CacheStore, Category, Config, DataRepository, Point, RemoteFetcher,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;
    debug!(config = ?config.redacted(), "configuration loaded");

    match cli.command {
        Command::Sync(cmd) => handle_sync(&config, cmd.json).await,
        Command::Points(cmd) => handle_points(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Cache(cmd) => handle_cache(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
        Command::Admin(cmd) => handle_admin(&config, cmd).await,
    }
}

fn open_repository(config: &Config) -> anyhow::Result<DataRepository<RemoteFetcher>> {
    let fetcher = RemoteFetcher::from_config(&config.api)?;
    let cache = CacheStore::open_or_recover(config.database_path(), config.cache.max_bytes)?;
    let fallback = FallbackBundle::from_config(&config.fallback);
    Ok(DataRepository::new(fetcher, cache, fallback)
        .include_unverified(config.api.include_unverified))
}

async fn handle_sync(config: &Config, json: bool) -> anyhow::Result<()> {
    let repository = open_repository(config)?;
    let points = repository.initialize().await;
    let stats = repository.stats();

    if json {
        let report = serde_json::json!({
            "state": repository.state(),
            "points": points.len(),
            "last_updated": repository.last_updated(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Sync result");
    println!("-----------");
    println!("Source:        {}", repository.state());
    println!("Points:        {}", points.len());
    match repository.last_updated() {
        Some(at) => println!("Last updated:  {}", at.to_rfc3339()),
        None => println!("Last updated:  never"),
    }
    println!("New this week: {}", stats.recent);
    println!();
    println!("[By category]");
    for (category, count) in &stats.by_category {
        println!("  {:<16} {count}", category.as_str());
    }
    println!();
    println!("[By state]");
    for (state, count) in &stats.by_state {
        println!("  {:<16} {count}", state.as_str());
    }
    Ok(())
}

async fn handle_points(config: &Config, cmd: &PointsCommand) -> anyhow::Result<()> {
    let repository = open_repository(config)?;
    repository.initialize().await;

    let mut points: Vec<Point> = match (cmd.category, cmd.point_type.as_deref()) {
        (Some(category), None) => repository.get_points_by_category(category.into()),
        (Some(category), Some(filter)) => {
            let category = Category::from(category);
            repository
                .get_points_by_type(filter)
                .iter()
                .filter(|point| point.category == category)
                .cloned()
                .collect()
        }
        (None, filter) => repository
            .get_points_by_type(filter.unwrap_or_default())
            .to_vec(),
    };
    if let Some(limit) = cmd.limit {
        points.truncate(limit);
    }

    match cmd.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&points)?),
        OutputFormat::Table => print_points(&points, &repository.color_map()),
    }
    Ok(())
}

fn print_points(points: &[Point], colors: &ColorMap) {
    if points.is_empty() {
        println!("No points.");
        return;
    }
    println!(
        "{:<24} {:<22} {:<10} {:<8} {:<20} NAME",
        "ID", "TYPE", "STATE", "COLOR", "CITY"
    );
    for point in points {
        println!(
            "{:<24} {:<22} {:<10} {:<8} {:<20} {}",
            point.id,
            label_for(&point.point_type),
            point.state.as_str(),
            colors.color_for(&point.point_type),
            point.city.as_deref().unwrap_or("-"),
            point.name,
        );
    }
    println!();
    println!("{} point(s)", points.len());
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let cache = CacheStore::open(config.database_path(), config.cache.max_bytes)?;
    let status = cache.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("dondeayudo status");
    println!("-----------------");
    println!("Backend:       {}", config.api.base_url);
    println!("Database:      {}", status.path.display());
    if !status.present {
        println!("Snapshot:      none");
        return Ok(());
    }
    println!(
        "Snapshot:      {}",
        if status.valid { "valid" } else { "corrupted" }
    );
    if let Some(timestamp) = status.timestamp {
        println!("Taken at:      {}", timestamp.to_rfc3339());
    }
    if let Some(points) = status.points {
        println!("Points:        {points}");
    }
    println!(
        "Size:          {} / {} bytes",
        status.size_bytes, status.quota_bytes
    );
    if let Some(digest) = &status.digest {
        println!("Digest:        {digest}");
    }
    Ok(())
}

fn handle_cache(config: &Config, cmd: &CacheCommand) -> anyhow::Result<()> {
    match cmd {
        CacheCommand::Clear => {
            let cache =
                CacheStore::open_or_recover(config.database_path(), config.cache.max_bytes)?;
            if cache.clear()? {
                println!("Cache cleared.");
            } else {
                println!("Cache was already empty.");
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            let config = config.redacted();
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!("  Base URL:           {}", config.api.base_url);
                println!("  Page size:          {}", config.api.page_size);
                println!("  Max pages:          {}", config.api.max_pages);
                println!("  Timeout (s):        {}", config.api.timeout_secs);
                println!("  Include unverified: {}", config.api.include_unverified);
                println!(
                    "  Admin token:        {}",
                    config.api.admin_token.as_deref().unwrap_or("(not set)")
                );
                println!();
                println!("[Cache]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Max bytes:          {}", config.cache.max_bytes);
                println!();
                println!("[Fallback]");
                println!("  Enabled:            {}", config.fallback.enabled);
                match &config.fallback.path {
                    Some(path) => println!("  Bundle:             {}", path.display()),
                    None => println!("  Bundle:             embedded"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

async fn handle_admin(config: &Config, cmd: AdminCommand) -> anyhow::Result<()> {
    let client = AdminClient::from_config(&config.api)?;

    match cmd {
        AdminCommand::List {
            state,
            category,
            subtype,
            city,
            page,
            limit,
            format,
        } => {
            let filter = AdminFilter {
                state: state.map(Into::into),
                category: category.map(Into::into),
                subtype,
                city,
                page,
                limit,
            };
            let result = client.list(&filter).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Table => {
                    let colors =
                        ColorMap::from_types(result.points.iter().map(|p| p.point_type.as_str()));
                    print_points(&result.points, &colors);
                    if let Some(total) = result.total {
                        println!("Page {} ({} per page), {total} total", result.page, result.limit);
                    }
                    if result.skipped > 0 {
                        println!("{} record(s) could not be read", result.skipped);
                    }
                }
            }
        }
        AdminCommand::Verify { id } => {
            let point = client.verify(&id).await?;
            println!("{} is now {}", point.id, point.state);
        }
        AdminCommand::Reject { id, reason } => {
            let point = client.reject(&id, &reason).await?;
            println!("{} is now {}", point.id, point.state);
        }
        AdminCommand::State { id, state } => {
            let point = client.set_state(&id, state.into()).await?;
            println!("{} is now {}", point.id, point.state);
        }
        AdminCommand::Delete { id, yes } => {
            if !yes {
                println!("This will permanently delete point {id}.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            client.delete(&id).await?;
            println!("Deleted {id}.");
        }
        AdminCommand::Create { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let new_point: NewPoint = serde_json::from_str(&text)
                .with_context(|| format!("invalid point in {}", file.display()))?;
            let point = client.create(&new_point).await?;
            println!("Created {} ({})", point.id, point.state);
        }
    }
    Ok(())
}
