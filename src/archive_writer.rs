use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;

use crate::types::PostArchive;

// ============================================================================
// ArchiveWriter trait
// ============================================================================

/// Sink for one completed day of archives. No business logic lives here; the
/// accumulator decides what a day contains and when it is complete.
#[allow(async_fn_in_trait)]
pub trait ArchiveWriter: Send + Sync {
    async fn write_day(&self, day: NaiveDate, archives: &[PostArchive]) -> Result<()>;
}

impl<T: ArchiveWriter> ArchiveWriter for &T {
    async fn write_day(&self, day: NaiveDate, archives: &[PostArchive]) -> Result<()> {
        (**self).write_day(day, archives).await
    }
}

// ============================================================================
// JsonDirWriter — one pretty-printed JSON file per day
// ============================================================================

pub struct JsonDirWriter {
    out_dir: PathBuf,
}

#[derive(Serialize)]
struct DayFile<'a> {
    posts: &'a [PostArchive],
}

impl JsonDirWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn day_path(&self, day: NaiveDate) -> PathBuf {
        self.out_dir.join(format!("{}.json", datestamp(day)))
    }
}

impl ArchiveWriter for JsonDirWriter {
    async fn write_day(&self, day: NaiveDate, archives: &[PostArchive]) -> Result<()> {
        let body = serde_json::to_vec_pretty(&DayFile { posts: archives })
            .context("Failed to serialize day archive")?;
        let path = self.day_path(day);
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}

fn datestamp(day: NaiveDate) -> String {
    day.format("%F").to_string()
}

// ============================================================================
// Test utilities — RecordingWriter for in-crate tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use std::sync::Mutex;

    /// Captures flush units instead of touching the filesystem.
    #[derive(Default)]
    pub(crate) struct RecordingWriter {
        pub(crate) flushes: Mutex<Vec<(NaiveDate, Vec<PostArchive>)>>,
    }

    impl ArchiveWriter for RecordingWriter {
        async fn write_day(&self, day: NaiveDate, archives: &[PostArchive]) -> Result<()> {
            self.flushes.lock().unwrap().push((day, archives.to_vec()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pushshift::test_utils::make_post;

    fn sample_archives() -> Vec<PostArchive> {
        vec![
            PostArchive {
                post: make_post("b", 1_578_614_500),
                comments: Vec::new(),
            },
            PostArchive {
                post: make_post("a", 1_578_614_400),
                comments: Vec::new(),
            },
        ]
    }

    #[tokio::test]
    async fn writes_day_file_named_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonDirWriter::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2020, 1, 10).unwrap();

        writer.write_day(day, &sample_archives()).await.unwrap();

        let path = dir.path().join("2020-01-10.json");
        let body: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        let posts = body["posts"].as_array().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0]["post"]["id"], "b");
    }

    #[tokio::test]
    async fn rewriting_the_same_unit_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonDirWriter::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2020, 1, 10).unwrap();
        let archives = sample_archives();
        let path = writer.day_path(day);

        writer.write_day(day, &archives).await.unwrap();
        let first = std::fs::read(&path).unwrap();
        writer.write_day(day, &archives).await.unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
    }
}
