//! Docket CLI - terminal front-end for shared documents
//!
//! Lists the document catalogue, creates documents and prints
//! new-document notifications as they arrive.

mod cli;
mod commands;
mod error;
mod notifier;


use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_db_path, AppContext};
use crate::commands::completions::run_completions;
use crate::commands::create::run_create;
use crate::commands::inbox::run_inbox;
use crate::commands::list::run_list;
use crate::commands::status::run_status;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "docket=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    if let Commands::Completions { shell, output } = &command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path);
    let ctx = AppContext::open(&db_path, cli.api_url).await?;

    match command {
        Commands::Watch { background } => run_watch(&ctx, background).await,
        Commands::List {
            sort,
            json,
            offline,
        } => run_list(&ctx, sort.into(), json, offline).await,
        Commands::Create {
            name,
            version,
            files,
        } => run_create(&ctx, name, version, files).await,
        Commands::Inbox { command, json } => run_inbox(&ctx, command, json).await,
        Commands::Status => run_status(&ctx).await,
        Commands::Completions { .. } => Ok(()),
    }
}
