//! `ragbot chat`: interactive or single-message chat mode.

use ragbot_config::AppConfig;
use ragbot_core::message::SessionId;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Shown instead of a reply when the pipeline fails.
const APOLOGY: &str = "Sorry, I couldn't produce an answer right now.";

pub async fn run(message: Option<String>, session: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early: give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    RAGBOT_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = ragbot_providers::build_from_config(&config)?;
    let registry = ragbot_agent::build_registry(&config, provider).await?;
    let session = SessionId(session);

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let result = registry.get_reply(&session, &msg).await;
        eprint!("\r              \r");
        match result {
            Ok(reply) => println!("{reply}"),
            Err(e) => {
                println!("{APOLOGY}");
                return Err(e.into());
            }
        }
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  RagBot: Interactive Mode");
    println!();
    println!("  Model:      {}", config.model);
    println!("  Budget:     {} tokens", config.token_budget());
    println!("  Memory:     {} (last {} messages)", config.memory.backend, config.memory.length);
    println!("  Knowledge:  {}", config.knowledge.backend);
    println!("  Session:    {session}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        eprint!("  ...");
        match registry.get_reply(&session, line).await {
            Ok(reply) => {
                eprint!("\r     \r");
                println!();
                for reply_line in reply.lines() {
                    println!("  Bot > {reply_line}");
                }
                println!();
            }
            Err(e) => {
                eprint!("\r     \r");
                println!("  Bot > {APOLOGY}");
                eprintln!("  [Error] {e}");
                println!();
            }
        }

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
