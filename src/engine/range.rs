//! Range processor: drives one seller range through a full cycle:
//! fetch → scrape → merge → decide → submit → write.
//!
//! Every stage boundary catches its own failures. A failed stage is logged
//! with range and stage context and absorbs the range into `Failed`; nothing
//! propagates to the orchestrator, so one range can never take down the
//! others or the long-running service.

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::engine::decide::{decide, Decision};
use crate::engine::merge::merge;
use crate::pricing::PriceSubmitter;
use crate::scraper::{OfferScraper, ProductQuery};
use crate::sheets::SheetStore;
use crate::snapshot::DebugSink;
use crate::types::{RangeSpec, Stage, StageError};

/// Terminal state of one range cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeOutcome {
    Completed { records: usize, repriced: usize },
    /// Absorbing failure state; the stage that failed is kept for reporting.
    Failed { stage: Stage },
}

pub struct RangeProcessor {
    store: Arc<dyn SheetStore>,
    scraper: Arc<dyn OfferScraper>,
    submitter: Arc<dyn PriceSubmitter>,
    sink: Arc<DebugSink>,
    spreadsheet_id: String,
}

impl RangeProcessor {
    pub fn new(
        store: Arc<dyn SheetStore>,
        scraper: Arc<dyn OfferScraper>,
        submitter: Arc<dyn PriceSubmitter>,
        sink: Arc<DebugSink>,
        spreadsheet_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            scraper,
            submitter,
            sink,
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    /// Run one full cycle for one range.
    pub async fn process(&self, spec: &RangeSpec) -> RangeOutcome {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        info!(range = %spec.range_name, "Range processing started");

        // -- Fetching --
        let own = match self.store.read(&self.spreadsheet_id, &spec.sheet_range).await {
            Ok(records) => records,
            Err(e) => return self.fail(spec, StageError::Fetch(e)),
        };
        self.sink.snapshot(&spec.range_name, &stamp, "first", &own);

        // -- Scraping --
        let queries: Vec<ProductQuery> = own.iter().map(ProductQuery::from).collect();
        let scraped = match self.scraper.scrape(&queries).await {
            Ok(observations) => observations,
            Err(e) => return self.fail(spec, StageError::Scrape(e)),
        };
        self.sink
            .snapshot_offers(&spec.range_name, &stamp, "scraped", &scraped);

        // -- Merging --
        let merged = match merge(own, scraped) {
            Ok(records) => records,
            Err(e) => return self.fail(spec, e),
        };

        // -- Deciding (per-record failures are contained inside) --
        let Decision { updated, to_submit } = decide(merged).await;
        self.sink.snapshot(&spec.range_name, &stamp, "updated", &updated);

        // -- Submitting (skipped entirely when nothing changed) --
        if to_submit.is_empty() {
            info!(range = %spec.range_name, "No price changes, submission skipped");
        } else {
            self.sink
                .snapshot(&spec.range_name, &stamp, "for_update", &to_submit);
            info!(
                range = %spec.range_name,
                count = to_submit.len(),
                "Submitting repriced listings"
            );
            if let Err(e) = self.submitter.submit(&to_submit, &spec.api_token).await {
                return self.fail(spec, StageError::Submission(e));
            }
        }

        // -- Writing (decisions and annotations made durable) --
        if let Err(e) = self
            .store
            .write(&updated, &self.spreadsheet_id, &spec.write_range())
            .await
        {
            return self.fail(spec, StageError::Write(e));
        }

        info!(
            range = %spec.range_name,
            records = updated.len(),
            repriced = to_submit.len(),
            "Range processing complete"
        );
        RangeOutcome::Completed {
            records: updated.len(),
            repriced: to_submit.len(),
        }
    }

    fn fail(&self, spec: &RangeSpec, err: StageError) -> RangeOutcome {
        let stage = err.stage();
        error!(
            range = %spec.range_name,
            stage = %stage,
            error = %err,
            "Stage failed, range aborted"
        );
        RangeOutcome::Failed { stage }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::MockPriceSubmitter;
    use crate::scraper::MockOfferScraper;
    use crate::sheets::MockSheetStore;
    use crate::types::{CompetitorObservation, ListingRecord, NumericCell, SellerId};
    use rust_decimal_macros::dec;
    use secrecy::SecretString;

    fn spec() -> RangeSpec {
        RangeSpec {
            range_name: "Tech PC Components".into(),
            sheet_range: "MM_Tech_PC!A1:H".into(),
            api_token: SecretString::new("token".into()),
        }
    }

    fn listing(id: i64, price: &str, stop: &str) -> ListingRecord {
        ListingRecord {
            seller_id: SellerId::Integer(id),
            name: format!("Product {id}"),
            link: format!("http://x/{id}"),
            price: NumericCell::parse(price),
            stop: NumericCell::parse(stop),
            mp_on_market: None,
            market_with_mp: None,
            prim: String::new(),
        }
    }

    fn processor(
        store: MockSheetStore,
        scraper: MockOfferScraper,
        submitter: MockPriceSubmitter,
    ) -> RangeProcessor {
        RangeProcessor::new(
            Arc::new(store),
            Arc::new(scraper),
            Arc::new(submitter),
            Arc::new(DebugSink::disabled()),
            "sheet-1",
        )
    }

    #[tokio::test]
    async fn test_happy_path_submits_and_writes() {
        let mut store = MockSheetStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|_, _| Ok(vec![listing(1, "1000", "150")]));
        store
            .expect_write()
            .times(1)
            .withf(|records, sheet, range| {
                records.len() == 1 && sheet == "sheet-1" && range == "MM_Tech_PC!A2:H"
            })
            .returning(|_, _, _| Ok(()));

        let mut scraper = MockOfferScraper::new();
        scraper.expect_scrape().times(1).returning(|_| {
            Ok(vec![CompetitorObservation {
                seller_id: SellerId::Integer(1),
                name: "Product 1".into(),
                mp_on_market: Some(dec!(990)),
                market_with_mp: Some("TopShop".into()),
            }])
        });

        let mut submitter = MockPriceSubmitter::new();
        submitter
            .expect_submit()
            .times(1)
            .withf(|records, _| {
                let price = records[0].price.value.unwrap();
                records.len() == 1 && price >= dec!(790) && price <= dec!(940)
            })
            .returning(|_, _| Ok(()));

        let outcome = processor(store, scraper, submitter).process(&spec()).await;
        assert_eq!(
            outcome,
            RangeOutcome::Completed {
                records: 1,
                repriced: 1
            }
        );
    }

    #[tokio::test]
    async fn test_empty_scrape_skips_submission_but_writes() {
        let mut store = MockSheetStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|_, _| Ok(vec![listing(1, "1000", "150")]));
        store.expect_write().times(1).returning(|_, _, _| Ok(()));

        let mut scraper = MockOfferScraper::new();
        scraper.expect_scrape().times(1).returning(|_| Ok(vec![]));

        let mut submitter = MockPriceSubmitter::new();
        submitter.expect_submit().times(0);

        let outcome = processor(store, scraper, submitter).process(&spec()).await;
        assert_eq!(
            outcome,
            RangeOutcome::Completed {
                records: 1,
                repriced: 0
            }
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_the_range() {
        let mut store = MockSheetStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("sheet unavailable")));
        store.expect_write().times(0);

        let mut scraper = MockOfferScraper::new();
        scraper.expect_scrape().times(0);

        let outcome = processor(store, scraper, MockPriceSubmitter::new())
            .process(&spec())
            .await;
        assert_eq!(
            outcome,
            RangeOutcome::Failed {
                stage: Stage::Fetching
            }
        );
    }

    #[tokio::test]
    async fn test_scrape_failure_stops_the_range() {
        let mut store = MockSheetStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|_, _| Ok(vec![listing(1, "1000", "150")]));
        store.expect_write().times(0);

        let mut scraper = MockOfferScraper::new();
        scraper
            .expect_scrape()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("browser crashed")));

        let outcome = processor(store, scraper, MockPriceSubmitter::new())
            .process(&spec())
            .await;
        assert_eq!(
            outcome,
            RangeOutcome::Failed {
                stage: Stage::Scraping
            }
        );
    }

    #[tokio::test]
    async fn test_submission_failure_stops_the_range() {
        let mut store = MockSheetStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|_, _| Ok(vec![listing(1, "1000", "150")]));
        store.expect_write().times(0);

        let mut scraper = MockOfferScraper::new();
        scraper.expect_scrape().times(1).returning(|_| {
            Ok(vec![CompetitorObservation {
                seller_id: SellerId::Integer(1),
                name: "Product 1".into(),
                mp_on_market: Some(dec!(990)),
                market_with_mp: None,
            }])
        });

        let mut submitter = MockPriceSubmitter::new();
        submitter
            .expect_submit()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("api returned 500")));

        let outcome = processor(store, scraper, submitter).process(&spec()).await;
        assert_eq!(
            outcome,
            RangeOutcome::Failed {
                stage: Stage::Submitting
            }
        );
    }

    #[tokio::test]
    async fn test_write_failure_after_successful_submission() {
        let mut store = MockSheetStore::new();
        store
            .expect_read()
            .times(1)
            .returning(|_, _| Ok(vec![listing(1, "1000", "150")]));
        store
            .expect_write()
            .times(1)
            .returning(|_, _, _| Err(anyhow::anyhow!("quota exceeded")));

        let mut scraper = MockOfferScraper::new();
        scraper.expect_scrape().times(1).returning(|_| {
            Ok(vec![CompetitorObservation {
                seller_id: SellerId::Integer(1),
                name: "Product 1".into(),
                mp_on_market: Some(dec!(990)),
                market_with_mp: None,
            }])
        });

        let mut submitter = MockPriceSubmitter::new();
        submitter.expect_submit().times(1).returning(|_, _| Ok(()));

        let outcome = processor(store, scraper, submitter).process(&spec()).await;
        assert_eq!(
            outcome,
            RangeOutcome::Failed {
                stage: Stage::Writing
            }
        );
    }
}
