use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use syncstore::DataStore;
use syncstore::cli::{Cli, Command, parse_filter};
use syncstore::config::Config;

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let cache_dir = cli.cache_dir.unwrap_or(config.cache_dir);

    info!("syncstore reading {}", cache_dir.display());
    let store = DataStore::open(&cache_dir).context("Failed to open mirror")?;

    match cli.command {
        Command::List { resource } => {
            let values = store.find_all(resource, &[]);
            if values.is_empty() {
                println!("No {} cached", resource);
            }
            for value in values {
                println!("{}", serde_json::to_string(&value)?);
            }
        }
        Command::Find { resource, filters, all } => {
            let mut pairs = Vec::with_capacity(filters.len());
            for raw in &filters {
                let pair = parse_filter(raw).ok_or_else(|| eyre::eyre!("Invalid filter '{}', expected field=value", raw))?;
                pairs.push(pair);
            }
            let fields: Vec<(&str, serde_json::Value)> = pairs.iter().map(|(f, v)| (f.as_str(), v.clone())).collect();

            let matches = if all {
                store.find_all(resource, &fields)
            } else {
                store.find(resource, &fields).into_iter().collect()
            };
            if matches.is_empty() {
                println!("{} No match", "✗".red());
            }
            for value in matches {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }
        Command::Tokens => {
            let mut empty = true;
            for (resource, token) in store.tokens().iter() {
                empty = false;
                let stamp = chrono::DateTime::from_timestamp(token.timestamp, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| token.timestamp.to_string());
                println!("{:<10} {} {}", resource.to_string().cyan(), token.token, stamp.dimmed());
            }
            if empty {
                println!("No sync tokens stored; next pull is a full sync");
            }
        }
    }

    Ok(())
}
