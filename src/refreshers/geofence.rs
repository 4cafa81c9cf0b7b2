//! Geofence refresher: pulls the current area-polygon set from an upstream
//! Koji-compatible API and publishes it into [`crate::shared_state::SharedState`].
//!
//! Client shape grounded in `openaip_client.rs` (bearer-token header, JSON
//! GET, status-code + body error reporting); endpoint shape grounded in
//! `utils/koji_geofences.py`: `GET {url}` with `Authorization: Bearer
//! {token}`, response `{data: {features: [...]}}`, each feature a named
//! polygon.

use anyhow::{Context, Result, bail};
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::shared_state::SharedState;

use super::with_bounded_retry;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct GeofenceClient {
    http: Client,
    api_url: String,
    api_token: String,
}

impl GeofenceClient {
    pub fn new(api_url: String, api_token: String) -> Self {
        Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build().expect("build geofence http client"),
            api_url,
            api_token,
        }
    }

    /// Fetches `{data: {features: [...]}}` and returns the simplified feature list.
    async fn fetch_features(&self) -> Result<Vec<serde_json::Value>> {
        let response = self
            .http
            .get(&self.api_url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .context("sending geofence API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("geofence API error {status}: {body}");
        }

        let payload: serde_json::Value = response.json().await.context("parsing geofence API response")?;
        let features = payload
            .get("data")
            .and_then(|d| d.get("features"))
            .cloned()
            .context("geofence API response missing data.features")?;
        let features = features.as_array().cloned().context("geofence API response data.features is not an array")?;
        Ok(features.into_iter().filter_map(simplify_feature).collect())
    }
}

/// Reduces one raw GeoJSON `Feature` down to `{name, coordinates}`, where
/// `coordinates` is the exterior ring of the first polygon — the shape
/// [`pokestop_counts`](super::pokestop_counts) and the cached-geofence
/// consumers expect, matching the original's cached-geofence shape.
fn simplify_feature(feature: serde_json::Value) -> Option<serde_json::Value> {
    let name = feature
        .get("properties")
        .and_then(|p| p.get("name"))
        .or_else(|| feature.get("name"))
        .and_then(|v| v.as_str())?
        .to_string();
    let coordinates = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .or_else(|| feature.get("coordinates"))
        .cloned()?;
    Some(serde_json::json!({ "name": name, "coordinates": coordinates }))
}

/// One refresh cycle: fetch with retry, then publish into shared state.
pub async fn refresh_once(client: &GeofenceClient, shared: &SharedState) -> Result<()> {
    let features = with_bounded_retry(RETRY_ATTEMPTS, RETRY_DELAY, || client.fetch_features()).await?;
    let count = features.len();
    shared.set_geofences(serde_json::Value::Array(features)).await?;
    info!(count, "refreshed geofences");
    Ok(())
}

pub fn spawn_geofence_refresh_loop(
    client: GeofenceClient,
    shared: SharedState,
    interval: Duration,
    cancel: CancellationToken,
) {
    super::spawn_refresh_loop("geofence", interval, Duration::from_millis(500), cancel, move || {
        let client = client.clone();
        let shared = shared.clone();
        async move { refresh_once(&client, &shared).await }
    });
}
