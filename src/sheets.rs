//! Sheet Store boundary: the seller's listing table lives in a Google
//! spreadsheet, one sheet range per seller account.
//!
//! All coercion from loose sheet cells into [`ListingRecord`] happens here
//! and only here: `seller_id` keeps its source type, money columns are
//! parsed once with their raw text preserved, and the header row is dropped
//! on read. Downstream stages never touch raw cells again.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::types::{ListingRecord, NumericCell, SellerId};

// ---------------------------------------------------------------------------
// Table shape
// ---------------------------------------------------------------------------

/// Listing table columns, in sheet order. The first row of every read is a
/// header matching these and is dropped before use.
pub const LISTING_COLUMNS: [&str; 8] = [
    "seller_id",
    "name",
    "link",
    "price",
    "stop",
    "mp_on_market",
    "market_with_mp",
    "prim",
];

/// Columns that must be present for a row to be usable at all.
/// Trailing optional columns (competitor data, annotation) may be absent.
const REQUIRED_COLUMNS: usize = 5;

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Read/write access to one listing table.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Read a range and return its data rows as records (header dropped).
    async fn read(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<ListingRecord>>;

    /// Overwrite a range with the given records, in table column order.
    async fn write(
        &self,
        records: &[ListingRecord],
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

/// Convert one data row into a record. Rows shorter than the required
/// column count are a shape error; missing trailing cells are tolerated.
pub fn record_from_row(row: &[String]) -> Result<ListingRecord> {
    if row.len() < REQUIRED_COLUMNS {
        bail!(
            "Row has {} columns, expected at least {REQUIRED_COLUMNS} ({:?})",
            row.len(),
            row
        );
    }

    let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("");

    Ok(ListingRecord {
        seller_id: SellerId::from_cell(cell(0)),
        name: cell(1).trim().to_string(),
        link: cell(2).trim().to_string(),
        price: NumericCell::parse(cell(3)),
        stop: NumericCell::parse(cell(4)),
        mp_on_market: crate::types::parse_money(cell(5)),
        market_with_mp: match cell(6).trim() {
            "" => None,
            s => Some(s.to_string()),
        },
        prim: cell(7).to_string(),
    })
}

/// Convert a record back into a sheet row, in table column order.
pub fn record_to_row(rec: &ListingRecord) -> Vec<String> {
    vec![
        rec.seller_id.to_string(),
        rec.name.clone(),
        rec.link.clone(),
        rec.price.raw.clone(),
        rec.stop.raw.clone(),
        rec.mp_on_market
            .map(|d| d.normalize().to_string())
            .unwrap_or_default(),
        rec.market_with_mp.clone().unwrap_or_default(),
        rec.prim.clone(),
    ]
}

// ---------------------------------------------------------------------------
// Google Sheets client
// ---------------------------------------------------------------------------

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// `values` payload shape shared by reads and writes.
#[derive(Debug, Serialize, Deserialize)]
struct ValueRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    range: Option<String>,
    #[serde(default)]
    values: Option<Vec<Vec<serde_json::Value>>>,
}

/// Sheets API v4 client over plain REST with a bearer token.
pub struct GoogleSheetsClient {
    http: Client,
    token: SecretString,
}

impl GoogleSheetsClient {
    pub fn new(token: SecretString) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("repricer/0.1.0")
            .build()
            .context("Failed to build HTTP client for Sheets")?;
        Ok(Self { http, token })
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{SHEETS_BASE_URL}/{spreadsheet_id}/values/{}",
            urlencoding::encode(range)
        )
    }
}

#[async_trait]
impl SheetStore for GoogleSheetsClient {
    async fn read(&self, spreadsheet_id: &str, range: &str) -> Result<Vec<ListingRecord>> {
        let url = self.values_url(spreadsheet_id, range);
        debug!(range, "Fetching sheet range");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .context("Sheets read request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Sheets read returned {status}: {body}");
        }

        let value_range: ValueRange = resp
            .json()
            .await
            .context("Failed to parse Sheets read response")?;

        let rows = value_range.values.unwrap_or_default();
        if rows.is_empty() {
            bail!("Sheet range {range} is empty (expected at least a header row)");
        }

        // First row is the header
        let records = rows[1..]
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(cell_to_string).collect();
                record_from_row(&cells)
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Malformed row in range {range}"))?;

        info!(range, records = records.len(), "Sheet range loaded");
        Ok(records)
    }

    async fn write(
        &self,
        records: &[ListingRecord],
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<()> {
        let values: Vec<Vec<serde_json::Value>> = records
            .iter()
            .map(|rec| {
                record_to_row(rec)
                    .into_iter()
                    .map(serde_json::Value::String)
                    .collect()
            })
            .collect();

        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(spreadsheet_id, range)
        );
        let body = ValueRange {
            range: Some(range.to_string()),
            values: Some(values),
        };

        let resp = self
            .http
            .put(&url)
            .bearer_auth(self.token.expose_secret())
            .json(&body)
            .send()
            .await
            .context("Sheets write request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("Sheets write returned {status}: {text}");
        }

        info!(range, records = records.len(), "Sheet range written");
        Ok(())
    }
}

/// Sheets returns formatted cells as strings, but unformatted reads can
/// surface bare numbers. Normalize both to text.
fn cell_to_string(cell: &serde_json::Value) -> String {
    match cell {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_record_from_full_row() {
        let rec = record_from_row(&row(&[
            "103616",
            "Краска для волос",
            "https://example.com/p/103616",
            "1000",
            "150",
            "990",
            "TopShop",
            "old note",
        ]))
        .unwrap();

        assert_eq!(rec.seller_id, SellerId::Integer(103616));
        assert_eq!(rec.name, "Краска для волос");
        assert_eq!(rec.price.value, Some(dec!(1000)));
        assert_eq!(rec.stop.value, Some(dec!(150)));
        assert_eq!(rec.mp_on_market, Some(dec!(990)));
        assert_eq!(rec.market_with_mp.as_deref(), Some("TopShop"));
        assert_eq!(rec.prim, "old note");
    }

    #[test]
    fn test_record_from_row_missing_trailing_cells() {
        // Sheets drops trailing empty cells; competitor columns may be absent
        let rec = record_from_row(&row(&["7", "Widget", "http://x", "300", "250"])).unwrap();
        assert_eq!(rec.mp_on_market, None);
        assert_eq!(rec.market_with_mp, None);
        assert_eq!(rec.prim, "");
    }

    #[test]
    fn test_record_from_short_row_is_error() {
        assert!(record_from_row(&row(&["7", "Widget", "http://x"])).is_err());
    }

    #[test]
    fn test_record_row_round_trip_preserves_id_type() {
        let rec = record_from_row(&row(&[
            "42", "Widget", "http://x", "500", "100", "450", "Gusi", "",
        ]))
        .unwrap();
        assert_eq!(rec.seller_id, SellerId::Integer(42));

        let out = record_to_row(&rec);
        assert_eq!(out[0], "42");
        assert_eq!(out[3], "500");
        assert_eq!(out[5], "450");
    }

    #[test]
    fn test_unparseable_price_round_trips_verbatim() {
        let rec =
            record_from_row(&row(&["7", "Widget", "http://x", "n/a", "100"])).unwrap();
        assert_eq!(rec.price.value, None);
        assert_eq!(record_to_row(&rec)[3], "n/a");
    }

    #[test]
    fn test_cell_to_string_handles_numbers() {
        assert_eq!(cell_to_string(&serde_json::json!("abc")), "abc");
        assert_eq!(cell_to_string(&serde_json::json!(990)), "990");
        assert_eq!(cell_to_string(&serde_json::json!(null)), "");
    }
}
