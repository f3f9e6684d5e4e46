use thiserror::Error;

/// A single upstream request that could not produce a usable response.
///
/// Both variants are recoverable at the call site: the enclosing post or
/// comment batch degrades to an empty result instead of aborting the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Fatal pagination condition: a page fetch did not move the cursor strictly
/// backward, so the surrounding loop has no forward-progress guarantee.
#[derive(Debug, Error)]
#[error("pagination cursor stalled: next_before {next_before} did not advance past oldest post at {oldest_created_utc}")]
pub struct CursorStalled {
    pub next_before: i64,
    pub oldest_created_utc: i64,
}
