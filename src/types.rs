use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observed price for one product at one capture time.
///
/// Field order is the column order of the durable store file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub product_name: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub source_url: String,
}

impl PriceRecord {
    /// Builds a record, or `None` when the name is blank or the price is not
    /// a finite positive number. Inner whitespace in the name is collapsed.
    pub fn new(
        product_name: &str,
        price: f64,
        timestamp: DateTime<Utc>,
        source_url: &str,
    ) -> Option<Self> {
        let product_name = normalize_ws(product_name);
        if product_name.is_empty() || !price.is_finite() || price <= 0.0 {
            return None;
        }
        Some(Self {
            product_name,
            price,
            timestamp,
            source_url: source_url.trim().to_string(),
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.product_name.trim().is_empty() && self.price.is_finite() && self.price > 0.0
    }

    pub fn point(&self) -> PricePoint {
        PricePoint {
            timestamp: self.timestamp,
            price: self.price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

/// Price history of one product, ordered by timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedSeries {
    pub product_name: String,
    pub points: Vec<PricePoint>,
}

/// One plot unit: a chart with one line per series.
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    /// Stable identifier the image file name is derived from
    pub id: String,
    pub title: String,
    pub series: Vec<GroupedSeries>,
}

impl Chart {
    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
