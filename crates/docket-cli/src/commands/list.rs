use chrono::Utc;
use docket_core::models::{DocumentRecord, DocumentSort};
use docket_core::Stores;

use crate::commands::common::{
    document_to_list_item, format_document_lines, AppContext, DocumentListItem,
};
use crate::error::CliError;

pub async fn run_list(
    ctx: &AppContext,
    sort: DocumentSort,
    as_json: bool,
    offline: bool,
) -> Result<(), CliError> {
    if !offline {
        let orchestrator = ctx.orchestrator(true)?;
        if let Err(error) = orchestrator.refresh().await {
            eprintln!("Showing cached documents: {error}");
        }
    }

    let records = sorted_documents(&ctx.stores, sort).await;
    let now_ms = Utc::now().timestamp_millis();

    if as_json {
        let json_items = records
            .iter()
            .map(|record| document_to_list_item(record, now_ms))
            .collect::<Vec<DocumentListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else if records.is_empty() {
        println!("No documents");
    } else {
        for line in format_document_lines(&records, now_ms) {
            println!("{line}");
        }
    }

    Ok(())
}

/// Cached documents in display order.
pub async fn sorted_documents(stores: &Stores, sort: DocumentSort) -> Vec<DocumentRecord> {
    let mut records = stores.cache().await.items().to_vec();
    sort.apply(&mut records);
    records
}
