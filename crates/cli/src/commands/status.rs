//! `memir status`: Show system status.

use super::{CommandResult, load_config, open_store};
use memir_config::AppConfig;
use memir_core::Provider;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> CommandResult {
    let config = load_config(config_path)?;
    let file = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::config_path);

    println!("M.E.M.I.R. Status");
    println!("=================");
    println!(
        "  Config file:  {} ({})",
        file.display(),
        if file.exists() { "found" } else { "defaults" }
    );
    println!("  Provider:     {}", config.default_provider);
    println!("  Chat model:   {}", config.default_model);
    println!("  Agent model:  {}", config.agent.model);
    println!(
        "  API key:      {}",
        if config.has_api_key() { "set" } else { "missing" }
    );
    println!(
        "  Agent limits: {} steps, {} repeats, {} queries",
        config.agent.max_steps,
        config.agent.max_consecutive_repeats,
        config.agent.max_distinct_queries
    );
    println!("  Memory:       {}", config.memory.backend);
    if config.memory.backend == "sqlite" {
        println!("  Memory file:  {}", config.memory.resolved_path().display());
    }
    println!(
        "  Embeddings:   {} ({} dims)",
        config.memory.embedding.provider, config.memory.embedding.dimensions
    );

    match open_store(&config).await {
        Ok(store) => match store.count().await {
            Ok(n) => println!("  Memories:     {n}"),
            Err(e) => println!("  Memories:     unavailable ({e})"),
        },
        Err(e) => println!("  Memories:     unavailable ({e})"),
    }

    let reachability = match memir_providers::build_from_config(&config).default_provider() {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => "reachable".to_string(),
            Ok(false) => "rejected the health check".to_string(),
            Err(e) => format!("unreachable ({e})"),
        },
        Err(e) => format!("not configured ({e})"),
    };
    println!("  Oracle:       {reachability}");

    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "  Weather:      {}",
        if config.weather.api_key.is_some() { "configured" } else { "no API key" }
    );

    Ok(())
}
