use super::*;
use crate::core::builder::run_build;
use crate::core::config::BuildConfig;
use crate::core::io::{ContentIo, OsIo};
use crate::core::record::format_timestamp;
use crate::core::strip::{highlight_match, strip_markdown};
use crate::core::sync::sync_content;
use crate::core::toc::compile_markdown_files;
use crate::search::{load_index, Combine, SearchEngine, TantivyIndex};
use crate::vcs::{history_for, resolve_date, DEFAULT_GIT_TIMEOUT};
use anyhow::Result;
use std::path::Path;
use tracing::info;

/// 写出默认配置文件
pub fn init(args: InitArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        anyhow::bail!("{:?} already exists, use --force to overwrite", args.path);
    }

    BuildConfig::default().save(&args.path)?;
    info!("Wrote default config to {:?}", args.path);
    println!("Config written to {}", args.path.display());
    Ok(())
}

/// 合并配置文件与命令行参数
pub fn resolve_config(args: &BuildArgs) -> Result<BuildConfig> {
    let mut config = BuildConfig::from_file(&args.config)?;

    if let Some(content) = &args.content {
        config.content_dir = content.clone();
    }
    if let Some(source) = &args.source {
        config.source_dir = Some(source.clone());
    }
    if let Some(listing) = &args.listing {
        config.listing_output = listing.clone();
    }
    if let Some(search_index) = &args.search_index {
        config.search_index_output = search_index.clone();
    }
    if let Some(history) = args.history {
        config.history = history;
    }

    Ok(config)
}

pub fn build(args: BuildArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    info!("Building indexes for {:?}", config.content_dir);

    let history = history_for(config.history, &config.content_dir, config.git_timeout());
    if !run_build(&config, &OsIo, history.as_ref()) {
        anyhow::bail!("Build failed");
    }

    println!("Listing written to {}", config.listing_output.display());
    println!("Search index written to {}", config.search_index_output.display());
    Ok(())
}

pub fn sync(args: SyncArgs) -> Result<()> {
    let report = sync_content(&args.source, &args.dest, &OsIo);

    println!("Copied: {}", report.copied.len());
    println!("Skipped: {}", report.skipped);
    for (name, error) in &report.failed {
        println!("  - {}: {}", name, error);
    }
    Ok(())
}

pub fn toc(args: TocArgs) -> Result<()> {
    let summary = compile_markdown_files(&args.source, &args.output, &OsIo)?;

    println!("Compiled {} file(s)", summary.written.len());
    if !summary.errors.is_empty() {
        println!("\nErrors:");
        for (name, error) in &summary.errors {
            println!("  - {}: {}", name, error);
        }
        anyhow::bail!("TOC compile completed with errors");
    }
    Ok(())
}

pub fn strip(args: StripArgs) -> Result<()> {
    let content = OsIo.read_to_string(&args.file)?;
    println!("{}", strip_markdown(&content));
    Ok(())
}

pub fn search(args: SearchArgs) -> Result<()> {
    let data = load_index(&args.index)?;
    let engine: SearchEngine<TantivyIndex> = SearchEngine::default();
    engine.initialize(&data);

    let combine = args.or.then_some(Combine::Or);
    let hits = engine.query_with(&args.query, combine);

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for hit in hits.iter().take(args.limit) {
        let title = hit.field("title").unwrap_or(&hit.id);
        let title = if args.highlight {
            highlight_match(title, &args.query)
        } else {
            title.to_string()
        };
        println!(
            "{:>8.3}  [{}] {}  ({})",
            hit.score,
            hit.field("category").unwrap_or_default(),
            title,
            hit.field("path").unwrap_or(&hit.id),
        );
    }
    Ok(())
}

pub fn date(args: DateArgs) -> Result<()> {
    let root = args
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let history = history_for(args.history, root, DEFAULT_GIT_TIMEOUT);
    let date = resolve_date(&args.file, history.as_ref(), &OsIo);
    println!("{}", format_timestamp(&date));
    Ok(())
}

/// 分发子命令
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init(args) => init(args),
        Commands::Build(args) => build(args),
        Commands::Sync(args) => sync(args),
        Commands::Toc(args) => toc(args),
        Commands::Strip(args) => strip(args),
        Commands::Search(args) => search(args),
        Commands::Date(args) => date(args),
    }
}
