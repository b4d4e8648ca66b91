//! Competitor offer discovery.
//!
//! The pipeline consumes the scraper through the [`OfferScraper`] trait:
//! given the tracked products of one range, return at most one best
//! competitor offer per product. The browser-automation implementation
//! lives in [`browser`]; the pure HTML extraction in [`parse`]; the offer
//! reduction policy (exclusion filter + minimum price) here, where it can
//! be tested without a browser.

pub mod browser;
pub mod parse;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::types::{CompetitorObservation, ListingRecord, SellerId};
use parse::RawOffer;

// ---------------------------------------------------------------------------
// Scrape queries
// ---------------------------------------------------------------------------

/// What the scraper needs to know about one tracked product.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuery {
    pub seller_id: SellerId,
    pub name: String,
    pub link: String,
}

impl From<&ListingRecord> for ProductQuery {
    fn from(rec: &ListingRecord) -> Self {
        Self {
            seller_id: rec.seller_id.clone(),
            name: rec.name.clone(),
            link: rec.link.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scraper trait
// ---------------------------------------------------------------------------

/// Black-box competitor offer source.
///
/// Contract: at most one observation per input product (minimum-price
/// selected); products with no discoverable offer may be omitted or
/// returned with a null price; the merger handles both.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OfferScraper: Send + Sync {
    async fn scrape(&self, products: &[ProductQuery]) -> Result<Vec<CompetitorObservation>>;
}

// ---------------------------------------------------------------------------
// Offer reduction
// ---------------------------------------------------------------------------

/// Collapse the raw offers found on each product page into one observation
/// per product: drop offers from sellers on the exclusion list (our own
/// storefronts), then keep the cheapest remaining offer.
///
/// Products where nothing priced survives still yield an observation with a
/// null price, so downstream merging carries prior competitor data forward.
pub fn reduce_offers(
    pages: Vec<(ProductQuery, Vec<RawOffer>)>,
    exclude_sellers: &[String],
) -> Vec<CompetitorObservation> {
    let excluded: HashSet<&str> = exclude_sellers.iter().map(String::as_str).collect();

    pages
        .into_iter()
        .map(|(query, offers)| {
            let best: Option<(Decimal, String)> = offers
                .into_iter()
                .filter(|o| !excluded.contains(o.seller.as_str()))
                .filter_map(|o| o.price.map(|p| (p, o.seller)))
                .min_by_key(|(price, _)| *price);

            match best {
                Some((price, seller)) => CompetitorObservation {
                    seller_id: query.seller_id,
                    name: query.name,
                    mp_on_market: Some(price),
                    market_with_mp: Some(seller),
                },
                None => CompetitorObservation {
                    seller_id: query.seller_id,
                    name: query.name,
                    mp_on_market: None,
                    market_with_mp: None,
                },
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
