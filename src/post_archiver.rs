use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::archive_writer::ArchiveWriter;
use crate::comment_resolver::resolve_page;
use crate::day_accumulator::DayAccumulator;
use crate::error::CursorStalled;
use crate::pushshift::PushshiftApi;
use crate::types::{PostArchive, utc_day};

/// Posts requested per page, newest first.
const PAGE_SIZE: usize = 1000;

/// Consecutive empty or failed page responses tolerated before giving up.
/// An empty response with no errors means nothing older exists and the run
/// ends cleanly; persistent failures abort it.
const MAX_PAGE_MISSES: u32 = 3;

const PAGE_RETRY_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub pages: u64,
    pub posts: u64,
    pub comments: u64,
    pub days_written: u64,
}

// ============================================================================
// PostArchiver
// ============================================================================

/// Drives backward pagination over one subreddit's history and hands each
/// completed day to the writer.
///
/// Pages are processed strictly one after another: a page's comment
/// resolution finishes before the next page is requested, which keeps the
/// day-boundary bookkeeping a single-owner affair.
pub struct PostArchiver<A, W> {
    api: A,
    writer: W,
    subreddit: String,
    /// Inclusive lower bound of the window, epoch seconds.
    lower_bound: i64,
    /// Inclusive upper bound of the window, epoch seconds.
    upper_bound: i64,
}

impl<A: PushshiftApi, W: ArchiveWriter> PostArchiver<A, W> {
    pub fn new(api: A, writer: W, subreddit: impl Into<String>, window: (i64, i64)) -> Self {
        let (lower_bound, upper_bound) = window;
        Self {
            api,
            writer,
            subreddit: subreddit.into(),
            lower_bound,
            upper_bound,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut accumulator = DayAccumulator::new(utc_day(self.upper_bound));
        // The upstream compares exclusively, so start one past the inclusive
        // upper bound to cover posts created in its final second.
        let mut next_before = self.upper_bound + 1;
        let mut misses = 0u32;

        while next_before > self.lower_bound {
            let mut page = match self
                .api
                .posts_before(&self.subreddit, next_before, PAGE_SIZE)
                .await
            {
                Ok(page) => page,
                Err(err) => {
                    misses += 1;
                    debug!(error = %err, attempt = misses, "page fetch failed");
                    if misses >= MAX_PAGE_MISSES {
                        return Err(anyhow::Error::from(err)
                            .context("page fetch kept failing, aborting the run"));
                    }
                    tokio::time::sleep(PAGE_RETRY_PAUSE).await;
                    continue;
                }
            };

            let Some(oldest) = page.last().map(|post| post.created_utc) else {
                misses += 1;
                if misses >= MAX_PAGE_MISSES {
                    info!(cursor = next_before, "upstream has nothing older, ending run");
                    break;
                }
                tokio::time::sleep(PAGE_RETRY_PAUSE).await;
                continue;
            };
            misses = 0;

            if oldest >= next_before {
                return Err(CursorStalled {
                    next_before,
                    oldest_created_utc: oldest,
                }
                .into());
            }

            summary.pages += 1;
            info!(
                posts = page.len(),
                cursor = next_before,
                "page fetched, resolving comments"
            );

            // The final page can reach past the window's start.
            page.retain(|post| post.created_utc >= self.lower_bound);

            let archives = resolve_page(&self.api, page).await;
            summary.posts += archives.len() as u64;
            summary.comments += archives
                .iter()
                .map(|archive| archive.comments.len() as u64)
                .sum::<u64>();
            accumulator.push_page(archives);

            next_before = oldest;
            for (day, archives) in accumulator.advance_to(utc_day(next_before)) {
                self.write_unit(day, &archives, &mut summary).await?;
            }
        }

        for (day, archives) in accumulator.finish() {
            self.write_unit(day, &archives, &mut summary).await?;
        }

        Ok(summary)
    }

    async fn write_unit(
        &self,
        day: NaiveDate,
        archives: &[PostArchive],
        summary: &mut RunSummary,
    ) -> Result<()> {
        self.writer.write_day(day, archives).await?;
        summary.days_written += 1;
        let comments: usize = archives.iter().map(|archive| archive.comments.len()).sum();
        info!(%day, posts = archives.len(), comments, "wrote day archive");
        Ok(())
    }
}
