use crate::aggregate::{Aggregator, ProductSummary};
use crate::app::ports::PageFetcher;
use crate::config::Config;
use crate::error::Result;
use crate::gallery;
use crate::infra::ReqwestFetcher;
use crate::parser::ProductPageParser;
use crate::plot::Plotter;
use crate::storage::CsvStore;
use crate::types::PriceRecord;
use chrono::{DateTime, SubsecRound, Utc};
use metrics::{counter, histogram};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// Outcome of one complete run, also written to `run_summary.json`.
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub started_at: DateTime<Utc>,
    pub urls_total: usize,
    pub urls_failed: usize,
    pub records_scraped: usize,
    pub records_stored: usize,
    pub products: usize,
    pub charts_written: Vec<PathBuf>,
    pub chart_failures: usize,
    pub gallery_file: PathBuf,
    pub summaries: Vec<ProductSummary>,
    pub errors: Vec<String>,
}

pub struct Pipeline {
    config: Config,
    fetcher: Box<dyn PageFetcher>,
    parser: ProductPageParser,
    store: CsvStore,
    aggregator: Aggregator,
    plotter: Plotter,
}

impl Pipeline {
    pub fn new(config: Config, fetcher: Box<dyn PageFetcher>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            parser: ProductPageParser::new(&config.layout)?,
            store: CsvStore::from_config(&config),
            aggregator: Aggregator::new(config.filter.clone()),
            plotter: Plotter::new(config.results_dir.clone(), &config.plot),
            fetcher,
            config,
        })
    }

    /// Pipeline backed by a real HTTP client built from `config.http`.
    pub fn with_http(config: Config) -> Result<Self> {
        let fetcher = ReqwestFetcher::new(&config.http)?;
        Self::new(config, Box::new(fetcher))
    }

    pub fn store(&self) -> &CsvStore {
        &self.store
    }

    /// Runs fetch → extract → append → dedupe → group → chart → gallery.
    ///
    /// Only a store failure aborts the run with `Err`. Fetch, chart, gallery
    /// and run summary failures are logged and collected in the result.
    #[instrument(skip(self), fields(urls = self.config.urls.len()))]
    pub async fn run(&self) -> Result<PipelineResult> {
        let started_at = Utc::now();
        let t_run = Instant::now();
        let mut errors = Vec::new();

        // Step 1: scrape every URL in order
        let (batch, urls_failed) = self.scrape_all(&mut errors).await;
        info!(
            "scraped {} records from {} urls ({} failed)",
            batch.len(),
            self.config.urls.len(),
            urls_failed
        );

        // Step 2: persist and clean the history
        self.store.append(&batch)?;
        let deduped = self.store.dedupe()?;

        // Step 3: per-product histories
        let grouped = self.store.group_by_product()?;
        let summaries = self.aggregator.summaries(&grouped);
        for s in &summaries {
            info!(
                product = %s.product_name,
                points = s.stats.count,
                latest = s.stats.latest,
                min = s.stats.min,
                max = s.stats.max,
                change = s.stats.change,
                "price history"
            );
        }

        // Step 4: charts; one bad chart never stops the others
        let charts = self.aggregator.charts(&grouped);
        let mut charts_written = Vec::with_capacity(charts.len());
        let mut chart_failures = 0;
        for chart in &charts {
            match self.plotter.render(chart) {
                Ok(path) => {
                    counter!("price_tracker_charts_rendered_total").increment(1);
                    charts_written.push(path);
                }
                Err(e) => {
                    error!("chart skipped: {}", e);
                    chart_failures += 1;
                    errors.push(e.to_string());
                }
            }
        }

        // Step 5: gallery of exactly this run's charts
        let gallery_file = self.config.gallery_path();
        match gallery::write_gallery(&gallery_file, &charts_written) {
            Ok(()) => info!("wrote gallery with {} charts to {}", charts_written.len(), gallery_file.display()),
            Err(e) => {
                error!("gallery not written: {}", e);
                errors.push(format!("failed to write gallery {}: {}", gallery_file.display(), e));
            }
        }

        histogram!("price_tracker_pipeline_duration_seconds").record(t_run.elapsed().as_secs_f64());

        let mut result = PipelineResult {
            started_at,
            urls_total: self.config.urls.len(),
            urls_failed,
            records_scraped: batch.len(),
            records_stored: deduped.len(),
            products: grouped.len(),
            charts_written,
            chart_failures,
            gallery_file,
            summaries,
            errors,
        };
        if let Err(e) = self.write_summary(&result) {
            warn!("run summary not written: {}", e);
            result.errors.push(e.to_string());
        }
        Ok(result)
    }

    fn write_summary(&self, result: &PipelineResult) -> Result<()> {
        fs::write(self.config.summary_path(), serde_json::to_string_pretty(result)?)?;
        Ok(())
    }

    async fn scrape_all(&self, errors: &mut Vec<String>) -> (Vec<PriceRecord>, usize) {
        let mut batch = Vec::new();
        let mut failed = 0;

        for url in &self.config.urls {
            let body = match self.fetcher.fetch(url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url = e.url(), "fetch failed, skipping: {}", e);
                    counter!("price_tracker_fetch_failures_total").increment(1);
                    failed += 1;
                    errors.push(e.to_string());
                    continue;
                }
            };
            counter!("price_tracker_urls_fetched_total").increment(1);

            let records = self.extract(&body, url, capture_time());
            if records.is_empty() {
                warn!(%url, "page yielded no product records");
            } else {
                info!(%url, count = records.len(), "extracted records");
            }
            counter!("price_tracker_records_scraped_total").increment(records.len() as u64);
            batch.extend(records);
        }

        (batch, failed)
    }

    fn extract(&self, body: &str, url: &str, captured_at: DateTime<Utc>) -> Vec<PriceRecord> {
        self.parser.parse(body, url, captured_at).records().collect()
    }
}

/// One capture time per fetched page, at whole-second precision.
fn capture_time() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}
