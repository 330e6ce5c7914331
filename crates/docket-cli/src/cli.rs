use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use docket_core::models::DocumentSort;

#[derive(Parser)]
#[command(name = "docket")]
#[command(about = "Browse shared documents and follow new-document notifications")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to local state database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Override the document API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stay connected and print new-document notifications
    Watch {
        /// Treat the terminal as backgrounded: schedule notifications instead of toasts
        #[arg(long)]
        background: bool,
    },
    /// List documents
    #[command(alias = "ls")]
    List {
        /// Ordering of the list
        #[arg(long, value_enum, default_value_t = SortOrder::Recent)]
        sort: SortOrder,
        /// Output as JSON
        #[arg(long)]
        json: bool,
        /// Show the cached list without contacting the server
        #[arg(long)]
        offline: bool,
    },
    /// Create a document
    #[command(alias = "new")]
    Create {
        /// Document title
        #[arg(long)]
        name: String,
        /// Document version
        #[arg(long)]
        version: String,
        /// Attachment file name (repeatable)
        #[arg(long = "file", value_name = "NAME")]
        files: Vec<String>,
    },
    /// Show and manage received notifications
    Inbox {
        #[command(subcommand)]
        command: Option<InboxCommands>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration, connection targets and local state
    Status,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum InboxCommands {
    /// Mark a notification as read
    Read {
        /// Notification ID
        #[arg(required_unless_present = "all")]
        id: Option<String>,
        /// Mark every notification as read
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
    /// Remove every notification
    Clear,
    /// Open the notification for a document
    Open {
        /// Document ID
        document_id: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SortOrder {
    /// Newest first
    Recent,
    /// Oldest first
    Oldest,
    /// Title A to Z
    Az,
    /// Title Z to A
    Za,
}

impl From<SortOrder> for DocumentSort {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Recent => Self::Recent,
            SortOrder::Oldest => Self::Oldest,
            SortOrder::Az => Self::TitleAsc,
            SortOrder::Za => Self::TitleDesc,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
