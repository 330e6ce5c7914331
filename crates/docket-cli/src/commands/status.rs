use chrono::Utc;

use crate::commands::common::{format_relative_time, format_timestamp, AppContext};
use crate::error::CliError;

pub async fn run_status(ctx: &AppContext) -> Result<(), CliError> {
    let realtime_url = ctx.config.realtime_url()?;
    let now_ms = Utc::now().timestamp_millis();

    println!("API:            {}", ctx.config.api_base_url);
    println!("Realtime:       {realtime_url}");
    println!(
        "User:           {} ({})",
        ctx.session.user().name,
        ctx.session.user_id()
    );
    println!("Database:       {}", ctx.db_path.display());

    {
        let cache = ctx.stores.cache().await;
        let pending = cache
            .items()
            .iter()
            .filter(|record| record.is_temporary())
            .count();
        if pending == 0 {
            println!("Documents:      {}", cache.items().len());
        } else {
            println!(
                "Documents:      {} ({pending} pending)",
                cache.items().len()
            );
        }
        match cache.last_sync_at() {
            Some(last_sync_at) => println!(
                "Last sync:      {} ({})",
                format_timestamp(last_sync_at),
                format_relative_time(last_sync_at.timestamp_millis(), now_ms)
            ),
            None => println!("Last sync:      never"),
        }
        println!("Network:        {}", cache.network_status());
    }

    let inbox = ctx.stores.inbox().await;
    println!(
        "Notifications:  {} ({} unread)",
        inbox.items().len(),
        inbox.unread_badge()
    );

    Ok(())
}
