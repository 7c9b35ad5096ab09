//! Product listing extraction.
//!
//! A page is parsed once into a [`ParsedPage`]; its records are produced
//! lazily from product cards located by the configured [`PageLayout`].
//! Cards without a usable name or price are skipped, not reported as errors.

use crate::config::PageLayout;
use crate::error::{Result, TrackerError};
use crate::types::PriceRecord;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

// Optional currency prefix, one number with optional thousands separators,
// optional unit suffix. No second number anywhere.
static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\d-]*?(-?\d[\d,]*(?:\.\d+)?)[^\d]*$").expect("price regex is valid")
});

/// Parses a scraped price string such as `$12.50`, `฿1,299.00` or
/// `Rs. 140 /kg`. Returns `None` unless the result is a finite positive number.
pub fn parse_price(text: &str) -> Option<f64> {
    let caps = PRICE_RE.captures(text.trim())?;
    let digits: String = caps.get(1)?.as_str().chars().filter(|c| *c != ',').collect();
    let price: f64 = digits.parse().ok()?;
    (price.is_finite() && price > 0.0).then_some(price)
}

pub struct ProductPageParser {
    card: Selector,
    name: Selector,
    price: Selector,
}

impl ProductPageParser {
    pub fn new(layout: &PageLayout) -> Result<Self> {
        Ok(Self {
            card: compile(&layout.card)?,
            name: compile(&layout.name)?,
            price: compile(&layout.price)?,
        })
    }

    /// Parses `html` once. Every record of the page carries `captured_at`.
    pub fn parse(&self, html: &str, source_url: &str, captured_at: DateTime<Utc>) -> ParsedPage<'_> {
        ParsedPage {
            parser: self,
            document: Html::parse_document(html),
            source_url: source_url.to_string(),
            captured_at,
        }
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
        source_url: &str,
        captured_at: DateTime<Utc>,
    ) -> Option<PriceRecord> {
        let Some(name) = card.select(&self.name).next().map(element_text) else {
            debug!(source_url, "skipping card without name element");
            return None;
        };
        let Some(price_text) = card.select(&self.price).next().map(element_text) else {
            debug!(source_url, %name, "skipping card without price element");
            return None;
        };
        let Some(price) = parse_price(&price_text) else {
            debug!(source_url, %name, %price_text, "skipping card with unparseable price");
            return None;
        };
        PriceRecord::new(&name, price, captured_at, source_url)
    }
}

/// One parsed page.
pub struct ParsedPage<'p> {
    parser: &'p ProductPageParser,
    document: Html,
    source_url: String,
    captured_at: DateTime<Utc>,
}

impl ParsedPage<'_> {
    pub fn records(&self) -> impl Iterator<Item = PriceRecord> + '_ {
        self.document
            .select(&self.parser.card)
            .filter_map(move |card| self.parser.extract_card(card, &self.source_url, self.captured_at))
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| TrackerError::Config(format!("invalid selector '{}': {}", selector, e)))
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").trim().to_string()
}
