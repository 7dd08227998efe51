//! CLI argument parsing for syncstore

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::entities::ResourceType;

#[derive(Parser, Debug)]
#[command(name = "ss")]
#[command(author, version, about = "Inspect the local mirror of the remote task service", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Mirror directory (overrides config)
    #[arg(short = 'd', long)]
    pub cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every cached entity of a resource type
    List {
        /// items, projects, sections or labels
        #[arg(required = true)]
        resource: ResourceType,
    },

    /// Find entities whose fields equal the given values
    Find {
        /// items, projects, sections or labels
        #[arg(required = true)]
        resource: ResourceType,

        /// field=value pairs; values are parsed as JSON, falling back to strings
        #[arg(required = true)]
        filters: Vec<String>,

        /// Print every match instead of the first
        #[arg(short, long)]
        all: bool,
    },

    /// Show the stored sync token per resource type
    Tokens,
}

/// Split `field=value` into a lookup pair
pub fn parse_filter(raw: &str) -> Option<(String, serde_json::Value)> {
    let (field, value) = raw.split_once('=')?;
    if field.is_empty() {
        return None;
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Some((field.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_filter_string_value() {
        assert_eq!(parse_filter("name=Personal"), Some(("name".to_string(), json!("Personal"))));
    }

    #[test]
    fn test_parse_filter_json_value() {
        assert_eq!(parse_filter("is_deleted=true"), Some(("is_deleted".to_string(), json!(true))));
        assert_eq!(parse_filter("id=\"123\""), Some(("id".to_string(), json!("123"))));
    }

    #[test]
    fn test_parse_filter_rejects_malformed() {
        assert_eq!(parse_filter("nofield"), None);
        assert_eq!(parse_filter("=value"), None);
    }

    #[test]
    fn test_cli_parses_resource() {
        let cli = Cli::try_parse_from(["ss", "list", "projects"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::List {
                resource: ResourceType::Projects
            }
        ));
        assert!(Cli::try_parse_from(["ss", "list", "notes"]).is_err());
    }
}
