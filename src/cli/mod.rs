use crate::vcs::HistoryBackend;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "markdex")]
#[command(about = "Build listing and search indexes for a markdown blog")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default config file
    Init(InitArgs),

    /// Sync, scan and emit both JSON artifacts
    Build(BuildArgs),

    /// Copy external markdown files into the content tree
    Sync(SyncArgs),

    /// Split TOC blocks and compile each markdown file to JSON
    Toc(TocArgs),

    /// Print the plain text of a markdown file
    Strip(StripArgs),

    /// Query a search-index artifact
    Search(SearchArgs),

    /// Print the resolved last-modified date of a file
    Date(DateArgs),
}

#[derive(Args)]
pub struct InitArgs {
    /// Config file to create
    #[arg(default_value = crate::core::config::CONFIG_FILE)]
    pub path: PathBuf,
    /// Overwrite an existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Config file
    #[arg(short, long, default_value = crate::core::config::CONFIG_FILE)]
    pub config: PathBuf,
    /// Content root directory
    #[arg(long)]
    pub content: Option<PathBuf>,
    /// External markdown directory synced before scanning
    #[arg(long)]
    pub source: Option<PathBuf>,
    /// Listing artifact path
    #[arg(long)]
    pub listing: Option<PathBuf>,
    /// Search-index artifact path
    #[arg(long)]
    pub search_index: Option<PathBuf>,
    /// Commit history backend
    #[arg(long, value_enum)]
    pub history: Option<HistoryBackend>,
}

#[derive(Args)]
pub struct SyncArgs {
    /// External markdown directory
    #[arg(long)]
    pub source: PathBuf,
    /// Destination inside the content tree
    #[arg(long)]
    pub dest: PathBuf,
}

#[derive(Args)]
pub struct TocArgs {
    /// Directory of markdown files
    #[arg(long)]
    pub source: PathBuf,
    /// Output directory for JSON files
    #[arg(long)]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct StripArgs {
    /// Markdown file
    pub file: PathBuf,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Search query
    pub query: String,
    /// Search-index artifact
    #[arg(short, long, default_value = "src/assets/searchIndex.json")]
    pub index: PathBuf,
    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
    /// Match any term instead of all terms
    #[arg(long)]
    pub or: bool,
    /// Print titles as HTML with the query highlighted
    #[arg(long)]
    pub highlight: bool,
}

#[derive(Args)]
pub struct DateArgs {
    /// File to inspect
    pub file: PathBuf,
    /// Commit history backend
    #[arg(long, value_enum, default_value = "cli")]
    pub history: HistoryBackend,
}
