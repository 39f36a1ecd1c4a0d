//! CLI module for Relay
//!
//! Provides commands:
//! - `complete`: run a prompt through the tiered router
//! - `embed`: embed a text
//! - `models`: show the configured models

use crate::config::AppConfig;
use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use relay_llm::{ProviderEnv, ProviderManifest, QualityTier, Router};
use std::io::{Read, Write};
use std::path::PathBuf;

pub mod complete;
pub mod embed;
pub mod models;

/// Relay LLM CLI
#[derive(Parser, Debug)]
#[command(name = "relay")]
#[command(about = "Tiered LLM invocations with retry, fallback and prompt cropping")]
#[command(version)]
pub struct Cli {
    /// Print the full counter table after the run
    #[arg(long, global = true)]
    pub stats_details: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a completion
    Complete(complete::CompleteArgs),
    /// Generate an embedding
    Embed(embed::EmbedArgs),
    /// Show the configured models
    Models,
}

/// Prompt or content source: inline text, a file, or stdin
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Inline text
    #[arg(conflicts_with = "file")]
    pub text: Option<String>,

    /// Read the text from a file
    #[arg(long, short)]
    pub file: Option<PathBuf>,

    /// Resource name used in logs (defaults to the file name or "stdin")
    #[arg(long)]
    pub resource: Option<String>,
}

impl InputArgs {
    /// Resolve the text and the resource name
    pub fn read(&self) -> anyhow::Result<(String, String)> {
        if let Some(text) = &self.text {
            let resource = self.resource.clone().unwrap_or_else(|| "inline".to_string());
            return Ok((text.clone(), resource));
        }

        if let Some(path) = &self.file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let resource = self
                .resource
                .clone()
                .unwrap_or_else(|| path.display().to_string());
            return Ok((text, resource));
        }

        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        let resource = self.resource.clone().unwrap_or_else(|| "stdin".to_string());
        Ok((text, resource))
    }
}

/// Quality tier as a CLI value
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityArg {
    Primary,
    Secondary,
}

impl From<QualityArg> for QualityTier {
    fn from(value: QualityArg) -> Self {
        match value {
            QualityArg::Primary => QualityTier::Primary,
            QualityArg::Secondary => QualityTier::Secondary,
        }
    }
}

/// Look up the manifest for a configured provider name
pub fn manifest_for(name: &str) -> anyhow::Result<ProviderManifest> {
    match name.to_ascii_lowercase().as_str() {
        "openai" => Ok(relay_llm::providers::openai::manifest()?),
        other => bail!("Unknown provider '{other}' (available: openai)"),
    }
}

fn build_router(config: &AppConfig) -> anyhow::Result<Router> {
    let manifest = manifest_for(&config.provider.name)?;
    let provider_config = config.provider.provider_config();
    let router = Router::from_manifest(&manifest, &ProviderEnv::from_process(), Some(&provider_config))
        .with_context(|| format!("Failed to initialize provider '{}'", config.provider.name))?;
    Ok(router)
}

/// Log the router counters and write them to `out`
fn report_stats(out: &mut impl Write, router: &Router, details: bool) -> std::io::Result<()> {
    if details {
        router.display_status_details();
        write!(out, "{}", router.status_details())
    } else {
        router.display_status_summary();
        writeln!(out, "{}", router.status_summary())
    }
}

/// Run the CLI command
pub async fn run(cli: Cli, config: AppConfig) -> anyhow::Result<()> {
    let details = cli.stats_details || config.stats.details;

    match cli.command {
        Some(Commands::Complete(args)) => {
            let router = build_router(&config)?;
            let result = complete::run(&router, args).await;
            report_stats(&mut std::io::stderr(), &router, details)?;
            router.close().await?;
            result
        }
        Some(Commands::Embed(args)) => {
            let router = build_router(&config)?;
            let result = embed::run(&router, args).await;
            report_stats(&mut std::io::stderr(), &router, details)?;
            router.close().await?;
            result
        }
        Some(Commands::Models) => models::run(&config),
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
