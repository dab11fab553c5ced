//! rscug binary
//!
//! Loads a repository fixture and answers read checks against it.
//!
//! # Usage
//!
//! ```bash
//! # Check read access for a user
//! rscug --config rscug.yaml check --fixture content.yaml --user user2 --path /content/a/b1
//!
//! # Print the nested CUG index
//! rscug index --fixture content.yaml
//!
//! # With environment variables only
//! RSCUG_CUG__ENABLED=false rscug check --fixture content.yaml --user user2 --path /content/a
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use rscug_server::handlers::batch::{BatchCheckItem, BatchCheckRequest};
use rscug_server::logging::{init_logging, LoggingConfig};
use rscug_server::{BatchReadCheckHandler, CugRepository, Fixture, ServerConfig};

/// rscug - Nested closed user group permission resolver
#[derive(Parser, Debug)]
#[command(name = "rscug")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "RSCUG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether a user may read one or more paths
    Check {
        /// Repository fixture (YAML)
        #[arg(short, long)]
        fixture: PathBuf,
        /// Id of the user or group performing the read
        #[arg(short, long)]
        user: String,
        /// Paths to check
        #[arg(short, long = "path", required = true)]
        paths: Vec<String>,
    },
    /// List the children of a path the user may read
    Children {
        #[arg(short, long)]
        fixture: PathBuf,
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        path: String,
    },
    /// Print the nested CUG markers reachable from the root
    Index {
        #[arg(short, long)]
        fixture: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::from_env()?,
    };
    init_logging(LoggingConfig::from_settings(&config.logging));
    info!(version = env!("CARGO_PKG_VERSION"), "starting rscug");

    let repository = Arc::new(CugRepository::new(&config));

    match args.command {
        Command::Check {
            fixture,
            user,
            paths,
        } => {
            Fixture::load(&fixture)?.apply(&repository).await?;
            let handler = BatchReadCheckHandler::new(repository);
            let checks = paths
                .iter()
                .map(|path| BatchCheckItem::new(user.clone(), path.clone()))
                .collect();
            let response = handler.check(BatchCheckRequest::new(checks)).await?;
            for (path, result) in paths.iter().zip(&response.results) {
                match &result.error {
                    Some(error) => println!("ERROR {path}: {error}"),
                    None if result.allowed => println!("ALLOW {path}"),
                    None => println!("DENY  {path}"),
                }
            }
        }
        Command::Children {
            fixture,
            user,
            path,
        } => {
            let head = Fixture::load(&fixture)?.apply(&repository).await?;
            for child in repository.readable_children(&head, &user, &path).await? {
                println!("{child}");
            }
        }
        Command::Index { fixture } => {
            let head = Fixture::load(&fixture)?.apply(&repository).await?;
            for (owner, nested) in repository.nested_index(&head) {
                let nested: Vec<&str> = nested.iter().map(String::as_str).collect();
                println!("{owner}: [{}]", nested.join(", "));
            }
        }
    }

    Ok(())
}
