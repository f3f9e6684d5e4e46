use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single submission as returned by the archive API.
///
/// Only the fields the pipeline needs are typed; everything else the upstream
/// sends is carried in `extra` and written back out unmodified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(deserialize_with = "epoch_seconds")]
    pub created_utc: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Post {
    /// UTC calendar day this post was created on. Day files are keyed by this.
    pub fn created_day(&self) -> NaiveDate {
        utc_day(self.created_utc)
    }
}

/// A single comment body. `link_id` is the fullname of the parent submission
/// (e.g. `t3_abc12`), kept for lookup only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A post whose comment ids are known but whose comment bodies are not yet
/// fetched. Ids are de-duplicated at construction, first occurrence wins.
#[derive(Debug, Clone)]
pub struct UnresolvedArchive {
    pub post: Post,
    pub comment_ids: Vec<String>,
}

impl UnresolvedArchive {
    pub fn new(post: Post, ids: impl IntoIterator<Item = String>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let comment_ids = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        Self { post, comment_ids }
    }
}

/// A fully resolved post: the unit written to a day file. The upstream may
/// omit bodies for deleted comments, so `comments` can be shorter than the
/// id list it was resolved from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostArchive {
    pub post: Post,
    pub comments: Vec<Comment>,
}

pub(crate) fn utc_day(epoch_seconds: i64) -> NaiveDate {
    DateTime::from_timestamp(epoch_seconds, 0)
        .unwrap_or_default()
        .date_naive()
}

/// The archive historically served `created_utc` as either an integer or a
/// float; accept both and truncate to whole seconds.
fn epoch_seconds<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw as i64)
}
