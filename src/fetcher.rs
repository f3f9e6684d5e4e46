use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::throttle::RequestGate;

/// Issues one HTTP GET per call, gated by the shared [`RequestGate`].
///
/// The permit is held for the full request lifetime and released on every
/// exit path. No retries here; callers decide how to degrade.
pub struct Fetcher {
    client: Client,
    gate: RequestGate,
}

impl Fetcher {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            client: Client::new(),
            gate: RequestGate::new(max_in_flight),
        }
    }

    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let _permit = self.gate.admit().await;
        let response = self.client.get(url).send().await?.error_for_status()?;
        let body = response.text().await?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }
}
