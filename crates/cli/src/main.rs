//! mtop - resource usage from the metrics API server
//!
//! A `kubectl top` style client: shows the latest CPU and memory samples
//! for nodes and pods.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::top::{self, SortBy};
use output::OutputFormat;

/// Resource usage for nodes and pods
#[derive(Parser)]
#[command(name = "mtop")]
#[command(author, version, about = "Show node and pod resource usage from the metrics API", long_about = None)]
pub struct Cli {
    /// Metrics API server URL (can also be set via MTOP_SERVER env var)
    #[arg(long, env = "MTOP_SERVER")]
    pub server: Option<String>,

    /// API version to query (discovered from the server if not specified)
    #[arg(long)]
    pub api_version: Option<String>,

    /// Output format
    #[arg(long, short)]
    pub format: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show usage for all nodes
    Nodes {
        /// Label selector (e.g. role=worker,!gpu)
        #[arg(long, short = 'l')]
        selector: Option<String>,

        /// Sort by resource, highest first
        #[arg(long, value_enum)]
        sort_by: Option<SortBy>,
    },

    /// Show usage for pods
    Pods {
        /// Namespace (defaults to the configured namespace)
        #[arg(long, short, conflicts_with = "all_namespaces")]
        namespace: Option<String>,

        /// List pods across all namespaces
        #[arg(long, short = 'A')]
        all_namespaces: bool,

        /// Label selector (e.g. app=web)
        #[arg(long, short = 'l')]
        selector: Option<String>,

        /// Sort by resource, highest first
        #[arg(long, value_enum)]
        sort_by: Option<SortBy>,
    },

    /// Show usage for one node
    Node {
        /// Node name
        name: String,
    },

    /// Show usage for one pod
    Pod {
        /// Pod name
        name: String,

        /// Namespace (defaults to the configured namespace)
        #[arg(long, short)]
        namespace: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::load()?;

    let server = cli.server.as_deref().unwrap_or_else(|| config.server());
    let format = cli
        .format
        .or_else(|| config.default_format.as_deref().and_then(OutputFormat::from_name))
        .unwrap_or_default();

    let client = client::ApiClient::new(server)?;
    let version = match cli.api_version {
        Some(version) => version,
        None => match client.preferred_version().await {
            Ok(version) => version,
            Err(e) => {
                output::print_error(&format!("{:#}", e));
                std::process::exit(1);
            }
        },
    };

    match cli.command {
        Commands::Nodes { selector, sort_by } => {
            top::top_nodes(&client, &version, selector.as_deref(), sort_by, format).await?;
        }
        Commands::Pods {
            namespace,
            all_namespaces,
            selector,
            sort_by,
        } => {
            let namespace = match (all_namespaces, namespace) {
                (true, _) => None,
                (false, Some(ns)) => Some(ns),
                (false, None) => Some(config.namespace().to_string()),
            };
            top::top_pods(
                &client,
                &version,
                namespace.as_deref(),
                selector.as_deref(),
                sort_by,
                format,
            )
            .await?;
        }
        Commands::Node { name } => {
            top::show_node(&client, &version, &name, format).await?;
        }
        Commands::Pod { name, namespace } => {
            let namespace = namespace.unwrap_or_else(|| config.namespace().to_string());
            top::show_pod(&client, &version, &namespace, &name, format).await?;
        }
    }

    Ok(())
}
