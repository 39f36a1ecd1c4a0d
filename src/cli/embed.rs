//! CLI command: `relay embed`

use super::InputArgs;
use clap::Args;
use relay_llm::Router;
use tracing::warn;

/// Values shown in the short preview
const PREVIEW_LEN: usize = 8;

#[derive(Args, Debug)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Print the whole vector as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the embed subcommand.
pub async fn run(router: &Router, args: EmbedArgs) -> anyhow::Result<()> {
    let (content, resource) = args.input.read()?;

    let Some(vector) = router.generate_embeddings(&resource, &content, None).await? else {
        warn!(resource = %resource, "No embedding was produced");
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string(&vector)?);
        return Ok(());
    }

    let preview: Vec<String> = vector
        .iter()
        .take(PREVIEW_LEN)
        .map(|v| format!("{v:.4}"))
        .collect();
    let ellipsis = if vector.len() > PREVIEW_LEN { ", ..." } else { "" };
    println!("dimensions: {}", vector.len());
    println!("[{}{}]", preview.join(", "), ellipsis);

    Ok(())
}
