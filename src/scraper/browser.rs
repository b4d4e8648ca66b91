//! Headless-browser implementation of [`OfferScraper`].
//!
//! Drives a real Chrome session because the marketplace renders offer lists
//! client-side and fences them behind bot heuristics: rotating user agents,
//! human-jitter scrolling and randomized inter-page delays keep the session
//! inconspicuous. The whole session is blocking I/O, so it runs on the
//! blocking thread pool and is awaited; the browser is torn down before the
//! call returns, success or error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use rand::Rng;
use std::ffi::OsStr;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::parse::{extract_offers, RawOffer, PAGE_READY_SELECTOR};
use super::{reduce_offers, OfferScraper, ProductQuery};
use crate::config::ScraperConfig;
use crate::types::CompetitorObservation;

pub struct BrowserScraper {
    config: ScraperConfig,
}

impl BrowserScraper {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OfferScraper for BrowserScraper {
    async fn scrape(&self, products: &[ProductQuery]) -> Result<Vec<CompetitorObservation>> {
        if products.is_empty() {
            return Ok(Vec::new());
        }

        let config = self.config.clone();
        let products = products.to_vec();

        // Blocking browser session on the blocking pool; the orchestrator
        // awaits it, so ranges never overlap.
        let pages = tokio::task::spawn_blocking(move || fetch_product_pages(&config, &products))
            .await
            .context("Scrape worker panicked")??;

        Ok(reduce_offers(pages, &self.config.exclude_sellers))
    }
}

/// Visit every product page in one browser session and collect the raw
/// offers found on each. The session (and its Chrome process) ends when
/// this function returns.
fn fetch_product_pages(
    config: &ScraperConfig,
    products: &[ProductQuery],
) -> Result<Vec<(ProductQuery, Vec<RawOffer>)>> {
    let user_agent = pick_user_agent(config);
    info!(products = products.len(), "Starting browser session");

    let options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .args(vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-extensions"),
            OsStr::new("--disable-gpu"),
        ])
        .build()
        .context("Failed to build browser launch options")?;

    let browser = Browser::new(options).context("Failed to launch browser")?;
    let tab = browser.new_tab().context("Failed to open tab")?;
    tab.set_user_agent(&user_agent, None, None)
        .context("Failed to set user agent")?;

    let page_timeout = Duration::from_secs(config.page_timeout_secs);
    let mut pages = Vec::with_capacity(products.len());

    for (i, product) in products.iter().enumerate() {
        debug!(name = %product.name, link = %product.link, "Loading product page");

        let offers = match load_page(&tab, product, page_timeout) {
            Ok(html) => {
                let offers = extract_offers(&html)?;
                if offers.is_empty() {
                    warn!(name = %product.name, "No offers found on page");
                } else {
                    debug!(name = %product.name, offers = offers.len(), "Offers extracted");
                }
                offers
            }
            Err(e) => {
                // One broken page must not lose the rest of the range
                warn!(name = %product.name, error = %e, "Product page failed to load");
                Vec::new()
            }
        };
        pages.push((product.clone(), offers));

        if i + 1 < products.len() {
            let delay = rand::rng()
                .random_range(config.min_page_delay_secs..=config.max_page_delay_secs);
            std::thread::sleep(Duration::from_secs(delay));
        }
    }

    info!(pages = pages.len(), "Browser session complete");
    Ok(pages)
}

fn load_page(
    tab: &headless_chrome::Tab,
    product: &ProductQuery,
    timeout: Duration,
) -> Result<String> {
    tab.navigate_to(&product.link)
        .with_context(|| format!("Navigation to {} failed", product.link))?;
    tab.wait_until_navigated().context("Page never settled")?;

    jitter_scroll(tab);

    // Offer block or explicit not-found marker: either means the page
    // finished rendering whatever it has.
    if tab
        .wait_for_element_with_custom_timeout(PAGE_READY_SELECTOR, timeout)
        .is_err()
    {
        warn!(link = %product.link, "Timed out waiting for offer block");
    }

    tab.get_content().context("Failed to read page source")
}

/// Scroll down and back up with small pauses, like a human skimming the page.
fn jitter_scroll(tab: &headless_chrome::Tab) {
    let steps = [
        "window.scrollTo(0, document.body.scrollHeight / 2);",
        "window.scrollTo(0, document.body.scrollHeight);",
        "window.scrollTo(0, 0);",
    ];
    for step in steps {
        if let Err(e) = tab.evaluate(step, false) {
            debug!(error = %e, "Scroll step failed");
            return;
        }
        let millis = rand::rng().random_range(300..=1200);
        std::thread::sleep(Duration::from_millis(millis));
    }
}

fn pick_user_agent(config: &ScraperConfig) -> String {
    if config.user_agents.is_empty() {
        return "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36".to_string();
    }
    let idx = rand::rng().random_range(0..config.user_agents.len());
    config.user_agents[idx].clone()
}
