//! `memir chat`: One-shot or interactive chat.

use super::{CommandResult, load_config};
use memir_config::AppConfig;
use memir_core::message::ConversationTurn;
use memir_gateway::AppState;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(config_path: Option<&Path>, message: Option<String>) -> CommandResult {
    let config = load_config(config_path)?;

    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    OPENROUTER_API_KEY=sk-or-v1-...   (recommended)");
        eprintln!("    OPENAI_API_KEY=sk-...");
        eprintln!("    MEMIR_API_KEY=sk-...");
        eprintln!();
        eprintln!("  Or add `api_key` to {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let state = AppState::from_config(config).await?.with_chat_channel("cli");

    if let Some(message) = message {
        let reply = state.chat.chat(&message, &[]).await?;
        println!("{}", reply.response);
        return Ok(());
    }

    println!();
    println!("  M.E.M.I.R.: interactive mode");
    println!("  Provider: {}", state.config.default_provider);
    println!("  Model:    {}", state.config.agent.model);
    println!("  Type 'exit' or 'quit' to leave.");
    println!();

    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit(input) {
            break;
        }

        match state.chat.chat(input, &history).await {
            Ok(reply) => {
                for line in reply.response.lines() {
                    println!("  M.E.M.I.R. > {line}");
                }
                println!();
                history = reply.history;
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

fn is_exit(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_words_are_case_insensitive() {
        assert!(is_exit("exit"));
        assert!(is_exit("QUIT"));
        assert!(!is_exit("exit now"));
    }
}
