//! HTML extraction of competitor offers from a product page.
//!
//! Pure functions over page source. No browser here, so the selectors and
//! price cleaning are testable against fixture HTML.

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use scraper::{Html, Selector};
use tracing::warn;

use crate::types::parse_money;

/// One competitor offer as it appears in the product page's offer list.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOffer {
    pub seller: String,
    /// None when the price cell is missing or unparseable.
    pub price: Option<Decimal>,
}

const OFFER_SELECTOR: &str = "div.product-offer";
const SELLER_SELECTOR: &str = "span.pdp-merchant-rating-block__merchant-name";
const PRICE_SELECTOR: &str = "span.product-offer-price__amount";

/// The selector the browser waits on before snapshotting page source:
/// either the offer list or the explicit not-found marker.
pub const PAGE_READY_SELECTOR: &str = ".product-offer, .product-not-found";

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {css}: {e}"))
}

/// Extract every competitor offer from one product page.
///
/// Pages with no offer block (product not found, layout change) return an
/// empty list; the caller decides whether that warrants a warning.
pub fn extract_offers(html: &str) -> Result<Vec<RawOffer>> {
    let document = Html::parse_document(html);
    let offer_sel = selector(OFFER_SELECTOR)?;
    let seller_sel = selector(SELLER_SELECTOR)?;
    let price_sel = selector(PRICE_SELECTOR)?;

    let mut offers = Vec::new();
    for offer_el in document.select(&offer_sel) {
        let seller = offer_el
            .select(&seller_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_else(|| "N/A".to_string());

        let price = offer_el
            .select(&price_sel)
            .next()
            .map(|el| el.text().collect::<String>())
            .and_then(|text| parse_money(&text));

        if price.is_none() {
            warn!(seller, "Offer without a parseable price");
        }

        offers.push(RawOffer { seller, price });
    }

    Ok(offers)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const PAGE: &str = r#"
        <html><body>
          <div class="product-offer">
            <span class="pdp-merchant-rating-block__merchant-name">TopShop</span>
            <span class="product-offer-price__amount">12 990 ₽</span>
          </div>
          <div class="product-offer">
            <span class="pdp-merchant-rating-block__merchant-name"> Gusi </span>
            <span class="product-offer-price__amount">13 450 ₽</span>
          </div>
          <div class="product-offer">
            <span class="product-offer-price__amount">9 999 ₽</span>
          </div>
        </body></html>
    "#;

    #[test]
    fn test_extract_offers_from_page() {
        let offers = extract_offers(PAGE).unwrap();
        assert_eq!(offers.len(), 3);

        assert_eq!(offers[0].seller, "TopShop");
        assert_eq!(offers[0].price, Some(dec!(12990)));

        // Seller names are trimmed
        assert_eq!(offers[1].seller, "Gusi");

        // Nameless offer falls back to N/A but keeps its price
        assert_eq!(offers[2].seller, "N/A");
        assert_eq!(offers[2].price, Some(dec!(9999)));
    }

    #[test]
    fn test_extract_offers_missing_price() {
        let html = r#"
            <div class="product-offer">
              <span class="pdp-merchant-rating-block__merchant-name">Shop</span>
            </div>
        "#;
        let offers = extract_offers(html).unwrap();
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].price, None);
    }

    #[test]
    fn test_extract_offers_empty_page() {
        let offers = extract_offers("<html><body>nothing here</body></html>").unwrap();
        assert!(offers.is_empty());
    }
}
