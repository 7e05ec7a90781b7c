mod cli;
mod display;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use cli::Args;
use display::ProgressBars;
use gdrive_dl::{
    Downloader, DriveClient, DriveConfig, ProgressTracker, RemoteStore, aggregate, filter_files,
    parse_links, parse_terms, sort_files,
};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default = if verbose { "gdrive_dl=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn collect_urls(args: &Args) -> Result<Vec<String>> {
    let mut urls = args.urls.clone();
    if let Some(path) = &args.links_file {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read links file: {}", path))?;
        urls.extend(parse_links(&content));
    }
    if urls.iter().all(|u| u.trim().is_empty()) {
        return Err(anyhow!("No Google Drive folder links given (pass URLs or --links-file)"));
    }
    Ok(urls)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let urls = collect_urls(&args)?;

    let client = DriveClient::new(DriveConfig {
        api_key: args.api_key.clone(),
        access_token: args.access_token.clone(),
        proxy: args.proxy.clone(),
        ..DriveConfig::default()
    })
    .context("Failed to create Drive client")?;
    let store: Arc<dyn RemoteStore> = Arc::new(client);

    let output_dir = PathBuf::from(&args.output);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling");
                cancel.cancel();
            }
        });
    }

    println!("Listing {} folder(s)...", urls.len());
    let listed = aggregate(Arc::clone(&store), &urls, args.max_depth, &cancel).await;
    if let Some(err) = &listed.error {
        if err.is_cancelled() {
            return Err(anyhow!("Cancelled while listing folders"));
        }
        eprintln!("Warning: {}", err);
    }

    let terms = args.search.as_deref().map(parse_terms).unwrap_or_default();
    let mut files = filter_files(&listed.files, &terms);
    sort_files(&mut files, args.sort.into(), !args.desc);

    info!(listed = listed.files.len(), matched = files.len(), "files selected");

    if args.list {
        if args.json {
            println!("{}", serde_json::to_string_pretty(&files)?);
        } else {
            display::print_file_list(&files, &output_dir).await;
        }
        return Ok(());
    }

    if files.is_empty() {
        println!("No matching files found");
        return Ok(());
    }

    println!(
        "Downloading {} of {} files to {}",
        files.len(),
        listed.files.len(),
        output_dir.display()
    );

    let tracker = Arc::new(ProgressTracker::new(files.len()));
    let bars = Arc::new(ProgressBars::new(files.len(), Arc::clone(&tracker)));

    let downloader = Downloader::new(store, &output_dir, args.concurrency as usize);
    let report = downloader
        .download_all(files, bars.clone(), cancel.clone())
        .await;

    bars.finish();
    info!(
        finished = tracker.finished(),
        expected = tracker.expected(),
        "all transfers settled"
    );
    display::print_summary(&report, downloader.output_dir());

    if !report.is_success() {
        return Err(anyhow!("{} download(s) failed", report.failed.len()));
    }

    Ok(())
}
