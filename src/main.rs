use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use subarchiver::archive_writer::JsonDirWriter;
use subarchiver::configuration::Config;
use subarchiver::fetcher::Fetcher;
use subarchiver::post_archiver::PostArchiver;
use subarchiver::pushshift::PushshiftClient;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    std::fs::create_dir_all(&config.out_directory).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.out_directory.display()
        )
    })?;

    info!(
        subreddit = %config.subreddit,
        after = %config.after,
        before = %config.before,
        out_directory = %config.out_directory.display(),
        "archiving subreddit history"
    );

    let api = PushshiftClient::new(Fetcher::new(config.max_in_flight));
    let writer = JsonDirWriter::new(config.out_directory.clone());
    let archiver = PostArchiver::new(api, writer, config.subreddit.clone(), config.window_bounds());

    let summary = archiver.run().await?;

    info!(
        pages = summary.pages,
        posts = summary.posts,
        comments = summary.comments,
        day_files = summary.days_written,
        "run complete"
    );
    Ok(())
}
