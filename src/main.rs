//! affinity-balancer: session-affinity load balancer
//!
//! Routes requests sharing an affinity key to the same backend node while
//! it is alive, with node membership replicated across balancer instances.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

use affinity_balancer::{config::AppConfig, proxy::NodesReport, run_server};

#[derive(Parser)]
#[command(name = "affinity-balancer")]
#[command(version = "0.1.0")]
#[command(about = "Session-affinity load balancer over a replicated node registry")]
#[command(long_about = "
affinity-balancer routes requests to backend nodes by consistent hashing
on a request header, so every request of one session reaches the same node
while it is alive. Node membership is shared by all balancer instances.

Example usage:
  affinity-balancer run --config config.yaml
  affinity-balancer status --url http://127.0.0.1:5065
")]
struct Cli {
    /// Path to config file (searches config.yaml, config.yml, config/config.yaml when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Set logging level (trace, debug, info, warn, error)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the balancer
    Run {
        /// Override listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Validate configuration file
    CheckConfig,

    /// Show the node snapshot of a running balancer
    Status {
        /// Balancer base URL (defaults to the configured listen address)
        #[arg(long)]
        url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level_filter = if let Some(level) = cli.log_level {
        level.to_string()
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
            .to_string()
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&level_filter))
        .init();

    match cli.command {
        Commands::Run { port } => {
            tracing::info!("Loading configuration from {:?}", cli.config);
            let mut config = load_config_or_exit(cli.config.as_deref());
            if let Some(port) = port {
                config.server.port = port;
            }
            run_server(config).await?;
        }
        Commands::CheckConfig => {
            check_config(cli.config.as_deref());
        }
        Commands::Status { url } => {
            status(cli.config.as_deref(), url).await?;
        }
    }

    Ok(())
}

/// Validate configuration file
fn check_config(config_path: Option<&Path>) {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => {
            println!("✓ Configuration file is valid\n");
            println!("Server:");
            println!("  Listen: {}:{}", config.server.host, config.server.port);
            println!("\nBalancer:");
            println!("  Algorithm: {}", config.balancer.algorithm);
            println!("  Hash key header: {}", config.balancer.hash_key_header);
            println!("  Remote changes: {:?}", config.balancer.remote_changes);
            println!("  Rebuild retry: {}ms", config.balancer.rebuild_retry_ms);
            println!("\nRegistry:");
            println!("  Namespace: {}", config.registry.namespace);
            match config.registry.store_config {
                Some(ref path) => println!("  Store config: {}", path.display()),
                None => println!("  Store config: default settings"),
            }
            if let Some(ref id) = config.registry.instance_id {
                println!("  Instance: {}", id);
            }
            println!("\nNodes ({}):", config.nodes.len());
            for node in &config.nodes {
                println!("  {}", node);
            }
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print the node snapshot of a running balancer
async fn status(config_path: Option<&Path>, url: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let base_url = match url {
        Some(url) => url,
        None => {
            let config = load_config_or_exit(config_path);
            format!("http://{}:{}", config.server.host, config.server.port)
        }
    };
    let nodes_url = format!("{}/nodes", base_url.trim_end_matches('/'));

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()?;

    let resp = match client.get(&nodes_url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            println!("✗ Failed to connect to balancer: {}", e);
            std::process::exit(1);
        }
    };
    if !resp.status().is_success() {
        println!("✗ Balancer returned error status: {}", resp.status());
        std::process::exit(1);
    }

    let report: NodesReport = resp.json().await?;
    println!("Balancer {} ({})", report.instance_id, report.strategy);
    println!("  Snapshot stale: {}", report.stale);
    match report.last_rebuilt {
        Some(at) => println!("  Last rebuilt: {}", at.to_rfc3339()),
        None => println!("  Last rebuilt: never"),
    }
    println!("\nNodes ({}):", report.nodes.len());
    for (index, entry) in report.nodes.iter().enumerate() {
        let status = if entry.alive { "[alive]" } else { "[dead]" };
        println!("  {:>3} {:8} {}", index, status, entry.node);
    }

    Ok(())
}

/// Load configuration or exit with error
fn load_config_or_exit(config_path: Option<&Path>) -> AppConfig {
    match AppConfig::load_or_default(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            eprintln!("\nMake sure you have a config.yaml file.");
            eprintln!("You can copy config.yaml.default and modify it:");
            eprintln!("  cp config.yaml.default config.yaml");
            std::process::exit(1);
        }
    }
}
