//! `memir serve`: Start the HTTP API server.

use super::{CommandResult, load_config};
use std::path::Path;

pub async fn run(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> CommandResult {
    let mut config = load_config(config_path)?;

    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }

    println!("M.E.M.I.R. gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.agent.model);
    println!("   Memory:    {}", config.memory.backend);

    memir_gateway::start(config).await
}
