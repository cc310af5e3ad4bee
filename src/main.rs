mod cli;

use std::path::Path;

use anyhow::{Context, Result};
use br_core::config::Config;
use br_core::Manifest;
use clap::Parser;
use cli::{Cli, Commands};

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;

    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    tracing::info!("Starting blobreel server");
    tracing::info!(
        "Server will listen on {}:{}",
        config.server.host,
        config.server.port
    );

    br_server::start(config).await?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "blobreel=trace,br_server=trace,br_player=trace,br_cache=debug,br_core=debug,tower_http=debug".to_string()
        } else {
            "blobreel=info,br_server=info,br_player=info,br_cache=info,br_core=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Inspect { descriptor, json } => inspect_descriptor(&descriptor, json),
        Commands::Version => {
            println!("blobreel {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {}", p.display());
            let contents = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            Config::from_json(&contents)?
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    let warnings = config.validate();
    if warnings.is_empty() {
        println!("✓ Configuration is valid");
    } else {
        println!("Configuration loaded with {} warning(s):", warnings.len());
        for warning in &warnings {
            println!("  - {warning}");
        }
    }
    println!("  Server: {}:{}", config.server.host, config.server.port);
    println!("  Source: {}", config.source.base_url);
    println!(
        "  Cache: {} ({})",
        if config.cache.enabled { "enabled" } else { "disabled" },
        config.cache.dir.display()
    );
    println!(
        "  Prefetch: {} (depth {})",
        config.player.prefetch, config.player.prefetch_depth
    );
    match &config.catalog {
        Some(catalog) => println!("  Catalog: {}", catalog.display()),
        None => println!("  Catalog: none"),
    }

    Ok(())
}

fn inspect_descriptor(path: &Path, json: bool) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let manifest = Manifest::from_json(&data)?;

    if json {
        let summary = serde_json::json!({
            "stream_name": manifest.stream_name,
            "suggested_file_name": manifest.suggested_file_name,
            "stream_type": manifest.stream_type,
            "chunks": manifest.chunk_count(),
            "inferred_size": manifest.inferred_size(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Stream: {}", manifest.stream_name);
        println!("Suggested file name: {}", manifest.suggested_file_name);
        println!("Type: {}", manifest.stream_type);
        println!("Chunks: {}", manifest.chunk_count());
        println!("Inferred size: {} bytes", manifest.inferred_size());
    }

    Ok(())
}
