//! HTTP client for the scoring service

use crate::geography::Geography;
use crate::schema::CustomerRecord;
use crate::scoring::{FeatureImportanceMap, PredictionResult};
use anyhow::{bail, Context};
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct BatchEnvelope<'a> {
    clients: &'a [CustomerRecord],
}

/// Thin wrapper over the two scoring endpoints. No retries.
#[derive(Debug, Clone)]
pub struct ScoringClient {
    base_url: String,
    http: reqwest::Client,
}

impl ScoringClient {
    pub fn new(base_url: &str, timeout: Duration) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn predict_batch(
        &self,
        records: &[CustomerRecord],
    ) -> crate::Result<Vec<PredictionResult>> {
        let url = format!("{}/predict_batch", self.base_url);
        tracing::debug!(records = records.len(), %url, "submitting batch");
        let response = self
            .http
            .post(&url)
            .json(&BatchEnvelope { clients: records })
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        decode(response).await
    }

    pub async fn feature_importances(
        &self,
        geography: Geography,
    ) -> crate::Result<FeatureImportanceMap> {
        let url = format!("{}/feature_importances", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("country", geography.as_str())])
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?;
        decode(response).await
    }

    /// Importance maps for every geography, requested concurrently.
    pub async fn all_feature_importances(
        &self,
    ) -> Vec<(Geography, crate::Result<FeatureImportanceMap>)> {
        let [first, second, third] = Geography::ALL;
        let (a, b, c) = tokio::join!(
            self.feature_importances(first),
            self.feature_importances(second),
            self.feature_importances(third),
        );
        vec![(first, a), (second, b), (third, c)]
    }
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> crate::Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("scoring service returned {}: {}", status, error_detail(&body));
    }
    response
        .json::<T>()
        .await
        .context("failed to decode scoring service response")
}

/// The `detail` field of an error body, or the raw body when absent.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
