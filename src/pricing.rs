//! Pricing API client: submits decided prices to the marketplace.
//!
//! One batch POST per range to the fixed `manualPrice/save` endpoint.
//! Debug mode logs the payload instead of sending it, so a full pipeline
//! run can be rehearsed without touching live listings.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{info, warn};

use crate::types::ListingRecord;

const SAVE_PRICE_URL: &str =
    "https://api.megamarket.tech/api/merchantIntegration/v1/offerService/manualPrice/save";

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceEntry {
    pub offer_id: String,
    pub price: i64,
    pub is_deleted: bool,
}

#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    meta: serde_json::Map<String, serde_json::Value>,
    data: SaveData<'a>,
}

#[derive(Debug, Serialize)]
struct SaveData<'a> {
    token: &'a str,
    prices: &'a [PriceEntry],
}

/// Build the wire entries for a batch of repriced records.
///
/// Every record in the submission set carries a freshly decided price, so a
/// missing or non-integral value here is a programming error surfaced as a
/// submission failure rather than silently dropped.
pub fn build_entries(records: &[ListingRecord]) -> Result<Vec<PriceEntry>> {
    records
        .iter()
        .map(|rec| {
            let price = rec
                .price
                .value
                .and_then(|d| d.round().to_i64())
                .with_context(|| {
                    format!(
                        "Record {} has no submittable price (raw: '{}')",
                        rec.seller_id, rec.price.raw
                    )
                })?;
            Ok(PriceEntry {
                offer_id: rec.seller_id.canonical(),
                price,
                is_deleted: false,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Submitter trait + client
// ---------------------------------------------------------------------------

/// Final price delivery to the marketplace, one token per seller range.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSubmitter: Send + Sync {
    async fn submit(&self, records: &[ListingRecord], token: &SecretString) -> Result<()>;
}

pub struct MarketplaceApiClient {
    http: Client,
    /// Log the payload instead of sending it.
    debug: bool,
}

impl MarketplaceApiClient {
    pub fn new(debug: bool) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("repricer/0.1.0")
            .build()
            .context("Failed to build HTTP client for the pricing API")?;
        Ok(Self { http, debug })
    }
}

#[async_trait]
impl PriceSubmitter for MarketplaceApiClient {
    async fn submit(&self, records: &[ListingRecord], token: &SecretString) -> Result<()> {
        let entries = build_entries(records)?;
        let request = SaveRequest {
            meta: serde_json::Map::new(),
            data: SaveData {
                token: token.expose_secret(),
                prices: &entries,
            },
        };

        if self.debug {
            // Redact the token before logging the rehearsal payload
            let preview = SaveRequest {
                meta: serde_json::Map::new(),
                data: SaveData {
                    token: "<redacted>",
                    prices: &entries,
                },
            };
            warn!("Pricing debug mode on, request will not be sent");
            info!(
                payload = %serde_json::to_string_pretty(&preview)
                    .unwrap_or_else(|e| format!("<serialization failed: {e}>")),
                "Prices that would be submitted"
            );
            return Ok(());
        }

        let resp = self
            .http
            .post(SAVE_PRICE_URL)
            .json(&request)
            .send()
            .await
            .context("Price submission request failed")?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            bail!("Pricing API returned {status}: {body}");
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .context("Pricing API returned a non-JSON body")?;
        info!(prices = entries.len(), response = %body, "Prices submitted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
