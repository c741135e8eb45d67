use crate::core::cache::{KeyValueCollection, Store};
use crate::core::{PriceProvider, PriceResult};
use crate::providers::util::{seconds_until, with_retry};
use crate::store::memory::MemoryCollection;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// AMFI publishes NAVs in the evening IST; cached prices expire after that.
const NAV_REFRESH_HOUR_UTC: u32 = 18;

/// Latest NAV lookup against an mfapi.in compatible endpoint.
pub struct MfApiProvider {
    base_url: String,
    cache: Arc<dyn KeyValueCollection>,
}

impl MfApiProvider {
    pub fn new(base_url: &str, store: &dyn Store) -> Self {
        let cache = store
            .get_collection("mfapi", true, true)
            .unwrap_or_else(|| Arc::new(MemoryCollection::new()));
        Self::new_with_collection(base_url, cache)
    }

    pub fn new_with_collection(base_url: &str, cache: Arc<dyn KeyValueCollection>) -> Self {
        MfApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MfApiMeta {
    scheme_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MfApiNav {
    date: String,
    nav: String,
}

#[derive(Debug, Deserialize)]
struct MfApiResponse {
    meta: MfApiMeta,
    #[serde(default)]
    data: Vec<MfApiNav>,
    status: Option<String>,
}

fn parse_response(scheme_code: u32, response: MfApiResponse) -> Result<PriceResult> {
    if let Some(status) = response.status.as_deref()
        && status != "SUCCESS"
    {
        bail!("mfapi reported status '{status}' for scheme {scheme_code}");
    }

    let latest = response
        .data
        .first()
        .ok_or_else(|| anyhow!("No NAV data for scheme {scheme_code}"))?;
    let price: f64 = latest
        .nav
        .trim()
        .parse()
        .with_context(|| format!("Invalid NAV '{}' for scheme {scheme_code}", latest.nav))?;
    let date = NaiveDate::parse_from_str(&latest.date, "%d-%m-%Y")
        .inspect_err(|e| {
            debug!(
                "Could not parse NAV date '{}' for scheme {scheme_code}: {e}",
                latest.date
            )
        })
        .ok();

    Ok(PriceResult {
        price,
        date,
        scheme_name: response.meta.scheme_name,
    })
}

#[async_trait]
impl PriceProvider for MfApiProvider {
    async fn fetch_price(&self, scheme_code: u32) -> Result<PriceResult> {
        let key = scheme_code.to_string();
        if let Some(cached) = self.cache.get(key.as_bytes()).await {
            match serde_json::from_slice(&cached) {
                Ok(result) => return Ok(result),
                Err(e) => debug!("Ignoring unreadable cache entry for {scheme_code}: {e}"),
            }
        }

        let url = format!("{}/mf/{scheme_code}/latest", self.base_url);
        debug!("Requesting NAV from {}", url);

        let client = reqwest::Client::builder().user_agent("mfxirr/0.1").build()?;
        let response = with_retry(|| async { client.get(&url).send().await }, 3, 500)
            .await
            .with_context(|| format!("Failed to send request for scheme: {scheme_code}"))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for scheme: {scheme_code}"))?;
        if !status.is_success() {
            bail!("mfapi returned HTTP {status} for scheme: {scheme_code}");
        }
        if response_text.trim().is_empty() {
            bail!("Received empty response for scheme: {scheme_code}");
        }

        let mfapi_response: MfApiResponse =
            serde_json::from_str(&response_text).with_context(|| {
                format!(
                    "Failed to parse mfapi response for scheme: {scheme_code}. Response: '{response_text}'"
                )
            })?;
        let result = parse_response(scheme_code, mfapi_response)?;
        debug!("Fetched NAV for scheme {scheme_code}: {result:?}");

        let ttl_seconds = seconds_until(NAV_REFRESH_HOUR_UTC, 0).unwrap_or_else(|e| {
            warn!("Failed calculating NAV refresh TTL: {e}. Using fallback 1 hour");
            60 * 60
        });
        match serde_json::to_vec(&result) {
            Ok(bytes) => {
                self.cache
                    .put(key.as_bytes(), &bytes, Some(Duration::from_secs(ttl_seconds)))
                    .await
            }
            Err(e) => debug!("Could not cache NAV for scheme {scheme_code}: {e}"),
        }

        Ok(result)
    }
}
