//! Listing merger: folds freshly scraped competitor observations into the
//! seller's own listing records.
//!
//! A left join on the canonical seller id: every own record survives, and
//! competitor columns are only ever overwritten by values the scrape
//! actually produced. A scrape that found nothing for a product leaves the
//! previously known competitor data in place (fill-forward, never null-out).

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::types::{CompetitorObservation, ListingRecord, StageError};

/// Merge scraped observations into own records.
///
/// Duplicate own ids are a shape violation (the id is the join key and must
/// be unique within a range). Duplicate scrape rows should not happen per
/// the scraper contract, but are tolerated: first wins, with a warning.
pub fn merge(
    own: Vec<ListingRecord>,
    scraped: Vec<CompetitorObservation>,
) -> Result<Vec<ListingRecord>, StageError> {
    let mut seen = HashSet::new();
    for rec in &own {
        if !seen.insert(rec.seller_id.canonical()) {
            return Err(StageError::Merge(format!(
                "Duplicate seller_id {} in own records",
                rec.seller_id
            )));
        }
    }

    let mut by_key: HashMap<String, CompetitorObservation> = HashMap::new();
    for obs in scraped {
        let key = obs.seller_id.canonical();
        if by_key.contains_key(&key) {
            warn!(seller_id = %obs.seller_id, "Duplicate scrape row, keeping first");
            continue;
        }
        by_key.insert(key, obs);
    }

    let merged = own
        .into_iter()
        .map(|mut rec| {
            if let Some(obs) = by_key.get(&rec.seller_id.canonical()) {
                // seller_id keeps the record's own representation; only the
                // competitor columns come from the scrape
                rec.mp_on_market = obs.mp_on_market.or(rec.mp_on_market);
                rec.market_with_mp = obs.market_with_mp.clone().or(rec.market_with_mp);
            }
            rec
        })
        .collect();

    Ok(merged)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
