use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::types::{Comment, Post};

const BASE_URL: &str = "https://api.pushshift.io/reddit";

/// Every search endpoint wraps its results the same way.
#[derive(Deserialize)]
struct Envelope<T> {
    data: Vec<T>,
}

// ============================================================================
// PushshiftApi trait
// ============================================================================

/// The three read-only queries the pipeline needs from the archive API.
#[allow(async_fn_in_trait)]
pub trait PushshiftApi: Send + Sync {
    /// Posts for `subreddit` created strictly before `before`, newest first,
    /// at most `size` of them.
    async fn posts_before(
        &self,
        subreddit: &str,
        before: i64,
        size: usize,
    ) -> Result<Vec<Post>, FetchError>;

    /// All comment ids attached to one post.
    async fn comment_ids(&self, post_id: &str) -> Result<Vec<String>, FetchError>;

    /// Comment bodies for a set of ids. The upstream caps how many ids fit in
    /// one call; respecting that cap is the caller's job. Missing or deleted
    /// comments are simply absent from the result.
    async fn comments(&self, ids: &[String]) -> Result<Vec<Comment>, FetchError>;
}

impl<T: PushshiftApi> PushshiftApi for &T {
    async fn posts_before(
        &self,
        subreddit: &str,
        before: i64,
        size: usize,
    ) -> Result<Vec<Post>, FetchError> {
        (**self).posts_before(subreddit, before, size).await
    }

    async fn comment_ids(&self, post_id: &str) -> Result<Vec<String>, FetchError> {
        (**self).comment_ids(post_id).await
    }

    async fn comments(&self, ids: &[String]) -> Result<Vec<Comment>, FetchError> {
        (**self).comments(ids).await
    }
}

// ============================================================================
// PushshiftClient — HTTP implementation
// ============================================================================

pub struct PushshiftClient {
    fetcher: Fetcher,
    base_url: String,
}

impl PushshiftClient {
    pub fn new(fetcher: Fetcher) -> Self {
        Self::with_base_url(fetcher, BASE_URL)
    }

    pub fn with_base_url(fetcher: Fetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }

    async fn get_data<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, FetchError> {
        let body = self.fetcher.get_text(url).await?;
        let envelope: Envelope<T> = serde_json::from_str(&body)?;
        Ok(envelope.data)
    }
}

impl PushshiftApi for PushshiftClient {
    async fn posts_before(
        &self,
        subreddit: &str,
        before: i64,
        size: usize,
    ) -> Result<Vec<Post>, FetchError> {
        let url = format!(
            "{}/search/submission/?subreddit={}&before={}&size={}&sort=desc&sort_type=created_utc",
            self.base_url,
            urlencoding::encode(subreddit),
            before,
            size
        );
        self.get_data(&url).await
    }

    async fn comment_ids(&self, post_id: &str) -> Result<Vec<String>, FetchError> {
        let url = format!("{}/submission/comment_ids/{}", self.base_url, post_id);
        self.get_data(&url).await
    }

    async fn comments(&self, ids: &[String]) -> Result<Vec<Comment>, FetchError> {
        let url = format!("{}/search/comment/?ids={}", self.base_url, ids.join(","));
        self.get_data(&url).await
    }
}

// ============================================================================
// Test utilities — shared FakeApi for in-crate tests
// ============================================================================

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;
    use serde_json::Map;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Mutex;

    pub(crate) fn make_post(id: &str, created_utc: i64) -> Post {
        Post {
            id: id.to_string(),
            created_utc,
            extra: Map::new(),
        }
    }

    /// Scripted upstream: serves pre-canned pages in order and fabricates one
    /// comment body per requested id. Records enough about the calls made to
    /// assert on pagination and batching behavior.
    #[derive(Default)]
    pub(crate) struct FakeApi {
        pub(crate) pages: Mutex<VecDeque<Vec<Post>>>,
        pub(crate) comment_ids: HashMap<String, Vec<String>>,
        /// When set, every page request fails.
        pub(crate) fail_page_fetches: bool,
        /// Post ids whose comment-id listing fails with a transport-shaped error.
        pub(crate) fail_comment_ids_for: HashSet<String>,
        /// Any comment batch containing one of these ids fails.
        pub(crate) fail_batches_containing: HashSet<String>,
        /// Ids the upstream silently omits bodies for.
        pub(crate) missing_bodies: HashSet<String>,
        /// `before` argument of every page request, in order.
        pub(crate) page_cursors: Mutex<Vec<i64>>,
        /// Size of every comment-body request, in order of completion.
        pub(crate) batch_sizes: Mutex<Vec<usize>>,
    }

    impl FakeApi {
        pub(crate) fn with_pages(pages: Vec<Vec<Post>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                ..Self::default()
            }
        }

        pub(crate) fn comment_ids_for(mut self, post_id: &str, count: usize) -> Self {
            let ids = (0..count).map(|i| format!("{post_id}-c{i}")).collect();
            self.comment_ids.insert(post_id.to_string(), ids);
            self
        }

        fn parse_failure() -> FetchError {
            FetchError::Parse(serde_json::from_str::<serde_json::Value>("not json").unwrap_err())
        }
    }

    impl PushshiftApi for FakeApi {
        async fn posts_before(
            &self,
            _subreddit: &str,
            before: i64,
            _size: usize,
        ) -> Result<Vec<Post>, FetchError> {
            self.page_cursors.lock().unwrap().push(before);
            if self.fail_page_fetches {
                return Err(Self::parse_failure());
            }
            Ok(self.pages.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn comment_ids(&self, post_id: &str) -> Result<Vec<String>, FetchError> {
            if self.fail_comment_ids_for.contains(post_id) {
                return Err(Self::parse_failure());
            }
            Ok(self.comment_ids.get(post_id).cloned().unwrap_or_default())
        }

        async fn comments(&self, ids: &[String]) -> Result<Vec<Comment>, FetchError> {
            if ids.iter().any(|id| self.fail_batches_containing.contains(id)) {
                return Err(Self::parse_failure());
            }
            self.batch_sizes.lock().unwrap().push(ids.len());
            Ok(ids
                .iter()
                .filter(|id| !self.missing_bodies.contains(*id))
                .map(|id| Comment {
                    id: id.clone(),
                    link_id: None,
                    extra: Map::new(),
                })
                .collect())
        }
    }
}
