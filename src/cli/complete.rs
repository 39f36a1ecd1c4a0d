//! CLI command: `relay complete`

use super::{InputArgs, QualityArg};
use clap::Args;
use relay_llm::{CompletionOptions, Generated, Router};
use tracing::warn;

#[derive(Args, Debug)]
pub struct CompleteArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Expect a JSON object in the answer and print it pretty
    #[arg(long)]
    pub json: bool,

    /// Use only this tier
    #[arg(long, value_enum)]
    pub quality: Option<QualityArg>,
}

/// Run the complete subcommand.
pub async fn run(router: &Router, args: CompleteArgs) -> anyhow::Result<()> {
    let (prompt, resource) = args.input.read()?;

    let mut options = CompletionOptions::new();
    if args.json {
        options = options.json();
    }
    if let Some(quality) = args.quality {
        options = options.with_quality(quality.into());
    }

    match router.execute_completion(&resource, &prompt, options).await? {
        Some(Generated::Text(text)) => println!("{text}"),
        Some(Generated::Json(value)) => println!("{}", serde_json::to_string_pretty(&value)?),
        Some(Generated::Embeddings(_)) => anyhow::bail!("Completion returned an embedding"),
        None => warn!(resource = %resource, "No completion was produced"),
    }

    Ok(())
}
