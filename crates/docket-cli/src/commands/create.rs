use docket_core::models::DocumentDraft;

use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_create(
    ctx: &AppContext,
    name: String,
    version: String,
    files: Vec<String>,
) -> Result<(), CliError> {
    let orchestrator = ctx.orchestrator(true)?;
    let request = orchestrator
        .create_document(DocumentDraft::new(name, version, files))
        .await?;
    println!("Created \"{}\" ({})", request.title, request.id);

    // The placeholder stays cached until a fetch succeeds.
    if orchestrator.refresh().await.is_err() {
        eprintln!("Document list will update on the next successful sync");
    }

    Ok(())
}
