//! CLI command: `relay models`
//!
//! Lists the models of the configured provider. Does not need an API key.

use super::manifest_for;
use crate::config::AppConfig;

/// Run the models subcommand.
pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let manifest = manifest_for(&config.provider.name)?;
    let metadata = manifest.resolve_metadata()?;
    let keys = manifest.model_keys();
    let retry = manifest.resolve_retry(Some(&config.provider.provider_config()));

    let mut rows = vec![("embeddings", keys.embeddings_key.as_str())];
    rows.push(("primary", keys.primary_completion_key.as_str()));
    if let Some(secondary) = keys.secondary_completion_key.as_deref() {
        rows.push(("secondary", secondary));
    }

    println!();
    println!("  {} ({})", manifest.provider_name, manifest.model_family);
    println!("  {}", "-".repeat(72));
    println!(
        "  {:<12} {:<22} {:<26} {:>8}",
        "Role", "Key", "Model", "Context"
    );
    println!("  {}", "-".repeat(72));
    for (role, key) in rows {
        let model = metadata.get(key)?;
        println!(
            "  {:<12} {:<22} {:<26} {:>8}",
            role, model.key, model.urn, model.max_total_tokens
        );
    }
    println!("  {}", "-".repeat(72));
    println!(
        "  Retry: {} attempts, {}-{} ms delay, {} ms timeout",
        retry.max_attempts,
        retry.min_retry_delay_millis,
        retry.min_retry_delay_millis + retry.max_retry_additional_delay_millis,
        retry.request_timeout_millis
    );
    println!();

    Ok(())
}
