//! Debug snapshots: CSV dumps of intermediate pipeline tables.
//!
//! Strictly a side channel for offline audit: every write is best-effort,
//! failures are logged and swallowed, and a disabled sink is a no-op. The
//! pipeline never blocks or fails because of a snapshot.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::sheets::{record_to_row, LISTING_COLUMNS};
use crate::types::{CompetitorObservation, ListingRecord};

pub struct DebugSink {
    enabled: bool,
    dir: PathBuf,
}

impl DebugSink {
    pub fn new(enabled: bool, dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled,
            dir: dir.into(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            dir: PathBuf::new(),
        }
    }

    /// Snapshot a listing table. `stamp` groups the files of one range
    /// cycle; `tag` names the stage that produced the table.
    pub fn snapshot(&self, range_name: &str, stamp: &str, tag: &str, records: &[ListingRecord]) {
        if !self.enabled {
            return;
        }
        let path = self.file_path(range_name, stamp, tag);
        if let Err(e) = write_records(&path, records) {
            error!(path = %path.display(), error = %e, "Snapshot write failed");
        } else {
            debug!(path = %path.display(), rows = records.len(), "Snapshot saved");
        }
    }

    /// Snapshot the scraped competitor observations.
    pub fn snapshot_offers(
        &self,
        range_name: &str,
        stamp: &str,
        tag: &str,
        observations: &[CompetitorObservation],
    ) {
        if !self.enabled {
            return;
        }
        let path = self.file_path(range_name, stamp, tag);
        if let Err(e) = write_observations(&path, observations) {
            error!(path = %path.display(), error = %e, "Snapshot write failed");
        } else {
            debug!(path = %path.display(), rows = observations.len(), "Snapshot saved");
        }
    }

    fn file_path(&self, range_name: &str, stamp: &str, tag: &str) -> PathBuf {
        self.dir.join(format!("{range_name}{stamp}_{tag}.csv"))
    }
}

fn write_records(path: &Path, records: &[ListingRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create snapshot dir")?;
    }
    let mut writer = csv::Writer::from_path(path).context("Failed to open snapshot file")?;
    writer.write_record(LISTING_COLUMNS)?;
    for rec in records {
        writer.write_record(record_to_row(rec))?;
    }
    writer.flush().context("Failed to flush snapshot")?;
    Ok(())
}

fn write_observations(path: &Path, observations: &[CompetitorObservation]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create snapshot dir")?;
    }
    let mut writer = csv::Writer::from_path(path).context("Failed to open snapshot file")?;
    writer.write_record(["seller_id", "name", "mp_on_market", "market_with_mp"])?;
    for obs in observations {
        writer.write_record([
            obs.seller_id.to_string(),
            obs.name.clone(),
            obs.mp_on_market
                .map(|d| d.normalize().to_string())
                .unwrap_or_default(),
            obs.market_with_mp.clone().unwrap_or_default(),
        ])?;
    }
    writer.flush().context("Failed to flush snapshot")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NumericCell, SellerId};
    use rust_decimal_macros::dec;

    fn temp_dir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("repricer_snapshots_{}", uuid::Uuid::new_v4()));
        p
    }

    fn sample_record() -> ListingRecord {
        ListingRecord {
            seller_id: SellerId::Integer(7),
            name: "Widget".into(),
            link: "http://x".into(),
            price: NumericCell::from_decimal(dec!(900)),
            stop: NumericCell::parse("150"),
            mp_on_market: Some(dec!(990)),
            market_with_mp: Some("TopShop".into()),
            prim: "Price changed".into(),
        }
    }

    #[test]
    fn test_snapshot_writes_csv() {
        let dir = temp_dir();
        let sink = DebugSink::new(true, &dir);
        sink.snapshot("ЮР1-Shop", "20260825_120000", "updated", &[sample_record()]);

        let path = dir.join("ЮР1-Shop20260825_120000_updated.csv");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("seller_id,name,link,price,stop"));
        assert!(contents.contains("7,Widget,http://x,900,150,990,TopShop,Price changed"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_disabled_sink_writes_nothing() {
        let dir = temp_dir();
        let sink = DebugSink::new(false, &dir);
        sink.snapshot("range", "stamp", "own", &[sample_record()]);
        assert!(!dir.exists());
    }

    #[test]
    fn test_snapshot_offers() {
        let dir = temp_dir();
        let sink = DebugSink::new(true, &dir);
        let obs = CompetitorObservation {
            seller_id: SellerId::Text("ART-9".into()),
            name: "Widget".into(),
            mp_on_market: None,
            market_with_mp: None,
        };
        sink.snapshot_offers("r", "s", "scraped", &[obs]);

        let contents = std::fs::read_to_string(dir.join("rs_scraped.csv")).unwrap();
        assert!(contents.contains("ART-9,Widget,,"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_snapshot_failure_is_swallowed() {
        // Point the sink at an unwritable location; snapshot must not panic
        let sink = DebugSink::new(true, "/proc/definitely/not/writable");
        sink.snapshot("r", "s", "own", &[sample_record()]);
    }
}
