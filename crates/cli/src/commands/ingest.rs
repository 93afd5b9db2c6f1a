//! `ragbot ingest`: bulk-load `key|text` lines into the knowledge store.

use ragbot_config::AppConfig;
use ragbot_knowledge::parse_ingest_source;
use std::path::PathBuf;

pub async fn run(file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    ensure_persistent_backend(&config)?;

    let source = std::fs::read_to_string(&file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let items = parse_ingest_source(&source)?;

    let provider = ragbot_providers::build_from_config(&config)?;
    let knowledge = ragbot_agent::build_knowledge_base(&config, provider)
        .await?
        .ok_or("Knowledge base is disabled")?;

    println!("  Ingesting {} items from {}", items.len(), file.display());
    let report = knowledge.ingest_all(items).await?;
    println!("  Ingested:           {}", report.ingested);
    println!("  Skipped duplicates: {}", report.skipped_duplicates);

    Ok(())
}

/// Ingestion only makes sense into a store that outlives the command.
fn ensure_persistent_backend(config: &AppConfig) -> Result<(), String> {
    if !config.knowledge.is_enabled() {
        return Err("Knowledge base is disabled: set [knowledge] backend in config.toml".into());
    }
    if config.knowledge.backend == "in_memory" {
        return Err(
            "The in_memory knowledge store is discarded when this command exits: set [knowledge] backend = \"sqlite\""
                .into(),
        );
    }
    Ok(())
}
