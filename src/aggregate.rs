use crate::types::{Chart, GroupedSeries, PricePoint, PriceRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

/// Groups records by product name. Each history is sorted by timestamp;
/// the sort is stable, so equal timestamps keep their row order.
pub fn group_records(records: &[PriceRecord]) -> BTreeMap<String, Vec<PricePoint>> {
    let mut grouped: BTreeMap<String, Vec<PricePoint>> = BTreeMap::new();
    for record in records {
        grouped
            .entry(record.product_name.clone())
            .or_default()
            .push(record.point());
    }
    for points in grouped.values_mut() {
        points.sort_by_key(|p| p.timestamp);
    }
    grouped
}

/// Which products get charted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "values", rename_all = "snake_case")]
pub enum ProductFilter {
    /// One chart per product
    All,
    /// One chart per listed product name (exact match)
    Products(Vec<String>),
    /// One chart per term, holding every product whose name contains it
    Categories(Vec<String>),
}

pub struct Aggregator {
    filter: ProductFilter,
}

impl Aggregator {
    pub fn new(filter: ProductFilter) -> Self {
        Self { filter }
    }

    pub fn charts(&self, grouped: &BTreeMap<String, Vec<PricePoint>>) -> Vec<Chart> {
        match &self.filter {
            ProductFilter::All => grouped
                .iter()
                .map(|(name, points)| product_chart(name, points))
                .collect(),
            ProductFilter::Products(names) => unique(names)
                .filter_map(|name| match grouped.get(name) {
                    Some(points) => Some(product_chart(name, points)),
                    None => {
                        warn!(product = %name, "no price history for listed product");
                        None
                    }
                })
                .collect(),
            ProductFilter::Categories(terms) => unique(terms)
                .map(|term| {
                    let series: Vec<_> = grouped
                        .iter()
                        .filter(|(name, _)| name.contains(term.as_str()))
                        .map(|(name, points)| to_series(name, points))
                        .collect();
                    if series.is_empty() {
                        warn!(category = %term, "no products match category");
                    }
                    Chart {
                        id: term.clone(),
                        title: format!("Price Variation Over Time - {term}"),
                        series,
                    }
                })
                .collect(),
        }
    }

    pub fn summaries(&self, grouped: &BTreeMap<String, Vec<PricePoint>>) -> Vec<ProductSummary> {
        grouped
            .iter()
            .filter_map(|(name, points)| {
                SeriesStats::from_points(points).map(|stats| ProductSummary {
                    product_name: name.clone(),
                    stats,
                })
            })
            .collect()
    }
}

fn unique(values: &[String]) -> impl Iterator<Item = &String> {
    let mut seen = HashSet::new();
    values.iter().filter(move |v| seen.insert(*v))
}

fn to_series(name: &str, points: &[PricePoint]) -> GroupedSeries {
    GroupedSeries {
        product_name: name.to_string(),
        points: points.to_vec(),
    }
}

fn product_chart(name: &str, points: &[PricePoint]) -> Chart {
    Chart {
        id: name.to_string(),
        title: name.to_string(),
        series: vec![to_series(name, points)],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub product_name: String,
    #[serde(flatten)]
    pub stats: SeriesStats,
}

/// Descriptive statistics over one price history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub first: f64,
    pub latest: f64,
    /// `latest - first`
    pub change: f64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl SeriesStats {
    /// `points` must be in timestamp order. `None` for an empty history.
    pub fn from_points(points: &[PricePoint]) -> Option<Self> {
        let first = points.first()?;
        let last = points.last()?;
        let (min, max, sum) = points.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sum), p| (lo.min(p.price), hi.max(p.price), sum + p.price),
        );
        Some(Self {
            count: points.len(),
            min,
            max,
            mean: sum / points.len() as f64,
            first: first.price,
            latest: last.price,
            change: last.price - first.price,
            first_seen: first.timestamp,
            last_seen: last.timestamp,
        })
    }
}
