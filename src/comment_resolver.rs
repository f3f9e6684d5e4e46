use futures::StreamExt;
use futures::future::join_all;
use futures::stream;
use indicatif::ProgressBar;
use tracing::{debug, info};

use crate::progress;
use crate::pushshift::PushshiftApi;
use crate::types::{Comment, Post, PostArchive, UnresolvedArchive};

/// Below this many ids the bodies fit in a single request.
const SINGLE_REQUEST_CEILING: usize = 273;

/// Chunk size used once a post's id list exceeds the single-request ceiling.
const CHUNK_SIZE: usize = 270;

/// At most this many chunk requests in flight for one post.
const MAX_CHUNKS_IN_FLIGHT: usize = 5;

/// Resolve one page of posts end to end: comment ids, then comment bodies.
pub async fn resolve_page<A: PushshiftApi>(api: &A, posts: Vec<Post>) -> Vec<PostArchive> {
    let bar = progress::page_bar(posts.len() as u64, "comment ids");
    let unresolved = resolve_comment_ids(api, posts, &bar).await;
    bar.finish_and_clear();

    let total_ids: usize = unresolved.iter().map(|u| u.comment_ids.len()).sum();
    info!(
        posts = unresolved.len(),
        comment_ids = total_ids,
        "resolving comment bodies"
    );

    let bar = progress::page_bar(unresolved.len() as u64, "comment bodies");
    let archives = join_all(unresolved.into_iter().map(|u| {
        let bar = &bar;
        async move {
            let archive = resolve_comments(api, u).await;
            bar.inc(1);
            archive
        }
    }))
    .await;
    bar.finish_and_clear();

    archives
}

/// Fetch the comment-id list for every post concurrently. A post whose
/// listing fails is dropped from the page; the failure is logged and the rest
/// of the page proceeds.
pub async fn resolve_comment_ids<A: PushshiftApi>(
    api: &A,
    posts: Vec<Post>,
    bar: &ProgressBar,
) -> Vec<UnresolvedArchive> {
    let results = join_all(posts.into_iter().map(|post| async move {
        let result = api.comment_ids(&post.id).await;
        bar.inc(1);
        match result {
            Ok(ids) => Some(UnresolvedArchive::new(post, ids)),
            Err(err) => {
                debug!(post_id = %post.id, error = %err, "comment id listing failed, dropping post");
                None
            }
        }
    }))
    .await;

    results.into_iter().flatten().collect()
}

/// Fetch the comment bodies for one post.
///
/// Zero ids is a valid archive, not an error. Past the single-request
/// ceiling the ids are split into contiguous chunks so every id is requested
/// exactly once; a chunk that fails contributes no comments and the rest are
/// kept.
pub async fn resolve_comments<A: PushshiftApi>(
    api: &A,
    unresolved: UnresolvedArchive,
) -> PostArchive {
    let UnresolvedArchive { post, comment_ids } = unresolved;

    if comment_ids.is_empty() {
        return PostArchive {
            post,
            comments: Vec::new(),
        };
    }

    if comment_ids.len() < SINGLE_REQUEST_CEILING {
        let comments = fetch_batch(api, &post.id, &comment_ids).await;
        return PostArchive { post, comments };
    }

    let comments: Vec<Comment> = stream::iter(comment_ids.chunks(CHUNK_SIZE))
        .map(|chunk| fetch_batch(api, &post.id, chunk))
        .buffer_unordered(MAX_CHUNKS_IN_FLIGHT)
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

    PostArchive { post, comments }
}

async fn fetch_batch<A: PushshiftApi>(api: &A, post_id: &str, ids: &[String]) -> Vec<Comment> {
    match api.comments(ids).await {
        Ok(comments) => comments,
        Err(err) => {
            debug!(
                post_id,
                batch = ids.len(),
                error = %err,
                "comment batch failed, continuing without it"
            );
            Vec::new()
        }
    }
}
