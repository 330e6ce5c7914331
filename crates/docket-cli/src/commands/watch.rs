use docket_core::realtime::RealtimeClient;

use crate::commands::common::AppContext;
use crate::error::CliError;

/// Connect to the realtime endpoint and run the orchestrator until Ctrl+C.
pub async fn run_watch(ctx: &AppContext, background: bool) -> Result<(), CliError> {
    let client = RealtimeClient::new(ctx.config.realtime_url()?);
    let orchestrator = ctx.orchestrator(!background)?;

    let events = client.subscribe();
    let mut states = client.watch_state();
    let state_log = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            tracing::info!("Realtime connection {state}");
        }
    });

    println!(
        "Watching {} as {} (Ctrl+C to stop)",
        client.url(),
        ctx.session.user().name
    );
    client.start().await;

    orchestrator
        .run(events, async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl+C: {error}");
                std::future::pending::<()>().await;
            }
        })
        .await;

    client.stop().await;
    state_log.abort();
    println!("Stopped");
    Ok(())
}
