//! Price decision engine.
//!
//! Applies the bounded-repricing rule to every record independently:
//! undercut the competitor by a random amount inside the
//! `[mp - 200, mp - 50]` window, never below the floor price. The pick must
//! stay uniform over the integer window; a fixed offset would make the
//! repricing pattern detectable by the same scraping we do ourselves.
//!
//! Records are never dropped: unparseable or failing rows pass through with
//! their original price and an annotation for human review.

use futures::future::join_all;
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{error, warn};

use crate::types::{ListingRecord, StageError};

/// Undercut window below the competitor price, in currency units.
const UNDERCUT_MAX: Decimal = dec!(200);
const UNDERCUT_MIN: Decimal = dec!(50);

/// Outcome of one decision pass over a range's records.
#[derive(Debug, Clone)]
pub struct Decision {
    /// Every input record, annotated, prices updated where decided.
    pub updated: Vec<ListingRecord>,
    /// Exactly the records whose price changed.
    pub to_submit: Vec<ListingRecord>,
}

/// Decide new prices for a batch of records.
///
/// Each record is independent; they are evaluated concurrently and
/// reassembled in input order.
pub async fn decide(records: Vec<ListingRecord>) -> Decision {
    let outcomes = join_all(records.into_iter().map(|rec| async move {
        let mut rng = rand::rng();
        decide_record(rec, &mut rng)
    }))
    .await;
    collect(outcomes)
}

/// Deterministic variant for tests: sequential, caller-supplied RNG.
pub fn decide_with<R: Rng>(records: Vec<ListingRecord>, rng: &mut R) -> Decision {
    let outcomes = records
        .into_iter()
        .map(|rec| decide_record(rec, rng))
        .collect();
    collect(outcomes)
}

fn collect(outcomes: Vec<(ListingRecord, bool)>) -> Decision {
    let mut updated = Vec::with_capacity(outcomes.len());
    let mut to_submit = Vec::new();
    for (rec, changed) in outcomes {
        if changed {
            to_submit.push(rec.clone());
        }
        updated.push(rec);
    }
    Decision { updated, to_submit }
}

/// Apply the decision rule to one record. Returns the (possibly updated)
/// record and whether its price changed.
fn decide_record<R: Rng>(mut rec: ListingRecord, rng: &mut R) -> (ListingRecord, bool) {
    let (price, stop) = match (rec.price.value, rec.stop.value) {
        (Some(p), Some(s)) => (p, s),
        _ => {
            warn!(
                seller_id = %rec.seller_id,
                price = %rec.price.raw,
                stop = %rec.stop.raw,
                "Unparseable numeric cell, record carried through unchanged"
            );
            rec.prim = format!(
                "Invalid numeric value (price: '{}', stop: '{}'), not repriced",
                rec.price.raw, rec.stop.raw
            );
            return (rec, false);
        }
    };

    let Some(mp) = rec.mp_on_market else {
        // No competitor data, nothing to react to
        return (rec, false);
    };

    if price > mp && mp > stop {
        match pick_new_price(mp, stop, rng) {
            Ok(Some(new_price)) => {
                let market = rec.market_with_mp.as_deref().unwrap_or("unknown");
                rec.prim = format!(
                    "Price changed from {price:.2} to {new_price:.2} \
                     (mp_on_market: {mp:.2}, {market})"
                );
                rec.price = crate::types::NumericCell::from_decimal(new_price);
                (rec, true)
            }
            Ok(None) => {
                rec.prim = format!(
                    "Price unchanged, window infeasible \
                     (price: {price:.2}, mp_on_market: {mp:.2}, stop: {stop:.2})"
                );
                (rec, false)
            }
            Err(message) => {
                // A single bad row never aborts the batch
                let e = StageError::Decision {
                    seller_id: rec.seller_id.canonical(),
                    message,
                };
                error!(error = %e, "Record passed through unmodified");
                (rec, false)
            }
        }
    } else if mp <= stop {
        // Competitor is at or below our floor: a business decision, not ours
        let msg = format!(
            "Competitor price mp_on_market ({mp:.2}) is at or below the floor \
             stop ({stop:.2}) for seller_id {}",
            rec.seller_id
        );
        warn!(seller_id = %rec.seller_id, "{msg}");
        rec.prim = msg;
        (rec, false)
    } else {
        // Already at or below the competitor: leave the record alone
        (rec, false)
    }
}

/// Pick a uniform random integer price in `[max(mp - 200, stop), mp - 50]`.
/// `Ok(None)` means the window is infeasible.
fn pick_new_price<R: Rng>(
    mp: Decimal,
    stop: Decimal,
    rng: &mut R,
) -> Result<Option<Decimal>, String> {
    let min_new = (mp - UNDERCUT_MAX).max(stop);
    let max_new = mp - UNDERCUT_MIN;

    // Integer bounds are rounded inward so a fractional window never lets a
    // pick escape it. A window narrower than one integer is infeasible.
    let numeric = |d: Decimal, what: &str| {
        d.to_i64()
            .ok_or_else(|| format!("{what} {d} is out of integer range"))
    };
    let lo = numeric(min_new.ceil(), "window lower bound")?;
    let hi = numeric(max_new.floor(), "window upper bound")?;

    if lo > hi {
        return Ok(None);
    }
    Ok(Some(Decimal::from(rng.random_range(lo..=hi))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
