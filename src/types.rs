//! Shared types for the repricer.
//!
//! The data model mirrors the tracked-listing table one-to-one so the
//! pipeline stages (merge, decide, submit, write) can pass records around
//! without re-validating. All coercion from loose sheet cells happens once,
//! at the Sheet Store boundary.

use std::fmt;

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Seller id
// ---------------------------------------------------------------------------

/// Key joining a seller's own listing to a scraped competitor offer.
///
/// Sheet cells carry these sometimes as numbers, sometimes as text. Joins
/// always go through [`SellerId::canonical`]; the original representation
/// is kept so it round-trips back to the sheet unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SellerId {
    Integer(i64),
    Text(String),
}

impl SellerId {
    /// Parse a raw sheet cell. Integer-looking cells keep their numeric type.
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.parse::<i64>() {
            Ok(n) => SellerId::Integer(n),
            Err(_) => SellerId::Text(trimmed.to_string()),
        }
    }

    /// Canonical textual join key, independent of the source cell type.
    pub fn canonical(&self) -> String {
        match self {
            SellerId::Integer(n) => n.to_string(),
            SellerId::Text(s) => s.trim().to_string(),
        }
    }
}

impl fmt::Display for SellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SellerId::Integer(n) => write!(f, "{n}"),
            SellerId::Text(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Numeric cells
// ---------------------------------------------------------------------------

/// A money cell parsed once at the sheet boundary.
///
/// The raw text is kept alongside the parsed value so cells that fail to
/// parse survive the pipeline untouched and are written back verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericCell {
    pub raw: String,
    pub value: Option<Decimal>,
}

impl NumericCell {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            value: parse_money(raw),
        }
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Self {
            raw: value.normalize().to_string(),
            value: Some(value),
        }
    }
}

/// Best-effort money parser for sheet/page text: keeps digits, the decimal
/// point and a minus sign, drops currency glyphs, spaces and separators.
pub fn parse_money(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<Decimal>().ok()
}

// ---------------------------------------------------------------------------
// Listing records
// ---------------------------------------------------------------------------

/// One tracked product for one seller range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub seller_id: SellerId,
    /// Product display name, also the scrape lookup key.
    pub name: String,
    /// Product page URL used by the scraper.
    pub link: String,
    /// Current own listed price.
    pub price: NumericCell,
    /// Floor price. Immutable input, hard lower bound for any decided price.
    pub stop: NumericCell,
    /// Best known competitor price, carried forward across cycles.
    pub mp_on_market: Option<Decimal>,
    /// Competitor holding `mp_on_market`.
    pub market_with_mp: Option<String>,
    /// Free-form annotation of the last decision. Advisory, never read back.
    pub prim: String,
}

/// Transient scraper output: the best competitor offer found for one
/// listing. Consumed once per merge cycle, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorObservation {
    pub seller_id: SellerId,
    pub name: String,
    pub mp_on_market: Option<Decimal>,
    pub market_with_mp: Option<String>,
}

// ---------------------------------------------------------------------------
// Range configuration
// ---------------------------------------------------------------------------

/// One seller account's slice of the listing table, processed as an
/// independent unit of work with its own API credential.
#[derive(Debug, Clone)]
pub struct RangeSpec {
    pub range_name: String,
    /// A1-notation read range, header row included (e.g. `MM_Shop!A1:H`).
    pub sheet_range: String,
    pub api_token: SecretString,
}

impl RangeSpec {
    /// Write-back range: the read range with its start row bumped past the
    /// header, so data rows land back where they were read from.
    pub fn write_range(&self) -> String {
        bump_start_row(&self.sheet_range, 1)
    }
}

/// Shift the start row of an A1-notation range down by `by` rows.
/// Ranges without a start row number are returned unchanged.
fn bump_start_row(range: &str, by: u32) -> String {
    let (sheet, cells) = match range.split_once('!') {
        Some((s, c)) => (Some(s), c),
        None => (None, range),
    };
    let (start, rest) = match cells.split_once(':') {
        Some((a, b)) => (a, Some(b)),
        None => (cells, None),
    };

    let col: String = start.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let row: String = start.chars().skip_while(|c| c.is_ascii_alphabetic()).collect();

    let bumped = match row.parse::<u32>() {
        Ok(n) => format!("{col}{}", n + by),
        Err(_) => return range.to_string(),
    };

    let cells = match rest {
        Some(r) => format!("{bumped}:{r}"),
        None => bumped,
    };
    match sheet {
        Some(s) => format!("{s}!{cells}"),
        None => cells,
    }
}

// ---------------------------------------------------------------------------
// Pipeline stages and error taxonomy
// ---------------------------------------------------------------------------

/// Stages of one range cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Scraping,
    Merging,
    Deciding,
    Submitting,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetching => "fetching",
            Stage::Scraping => "scraping",
            Stage::Merging => "merging",
            Stage::Deciding => "deciding",
            Stage::Submitting => "submitting",
            Stage::Writing => "writing",
        };
        write!(f, "{name}")
    }
}

/// Failures at stage boundaries. Each variant is caught by the
/// `RangeProcessor`, logged with range and stage context, and never
/// propagates past the current range.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("sheet fetch failed: {0}")]
    Fetch(#[source] anyhow::Error),

    #[error("offer scrape failed: {0}")]
    Scrape(#[source] anyhow::Error),

    #[error("merge failed: {0}")]
    Merge(String),

    #[error("price decision failed for {seller_id}: {message}")]
    Decision { seller_id: String, message: String },

    #[error("price submission failed: {0}")]
    Submission(#[source] anyhow::Error),

    #[error("sheet write failed: {0}")]
    Write(#[source] anyhow::Error),
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::Fetch(_) => Stage::Fetching,
            StageError::Scrape(_) => Stage::Scraping,
            StageError::Merge(_) => Stage::Merging,
            StageError::Decision { .. } => Stage::Deciding,
            StageError::Submission(_) => Stage::Submitting,
            StageError::Write(_) => Stage::Writing,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
