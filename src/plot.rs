use crate::config::PlotConfig;
use crate::constants::PLOT_SUFFIX;
use crate::error::PlotError;
use crate::types::Chart;
use chrono::{DateTime, Duration, Utc};
use plotters::prelude::*;
use sha2::{Digest, Sha256};
use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::debug;

const MAX_SLUG_CHARS: usize = 80;

// tab10
const SERIES_COLORS: [RGBColor; 10] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
    RGBColor(188, 189, 34),
    RGBColor(23, 190, 207),
];

/// File name for a chart id: readable slug plus a short digest of the id,
/// so two ids that slug the same still get distinct files.
pub fn chart_file_name(id: &str) -> String {
    let digest = hex::encode(Sha256::digest(id.as_bytes()));
    format!("{}-{}{}", slugify(id), &digest[..8], PLOT_SUFFIX)
}

/// Lowercases, keeps ASCII alphanumerics and any non-ASCII letters, and turns
/// every other run of characters into a single `-`.
pub fn slugify(id: &str) -> String {
    let mut slug = String::new();
    let mut gap = false;
    for c in id.chars() {
        let keep = if c.is_ascii() {
            c.is_ascii_alphanumeric()
        } else {
            !c.is_whitespace() && !c.is_control()
        };
        if !keep {
            gap = true;
            continue;
        }
        if gap && !slug.is_empty() {
            slug.push('-');
        }
        gap = false;
        slug.extend(c.to_lowercase());
    }
    let slug: String = slug.chars().take(MAX_SLUG_CHARS).collect();
    if slug.is_empty() {
        "chart".to_string()
    } else {
        slug
    }
}

pub struct Plotter {
    out_dir: PathBuf,
    width: u32,
    height: u32,
}

impl Plotter {
    pub fn new(out_dir: impl Into<PathBuf>, config: &PlotConfig) -> Self {
        Self {
            out_dir: out_dir.into(),
            width: config.width,
            height: config.height,
        }
    }

    /// Renders `chart` as an SVG line chart, replacing any previous file of
    /// the same name. Charts with zero or one point still render.
    pub fn render(&self, chart: &Chart) -> Result<PathBuf, PlotError> {
        fs::create_dir_all(&self.out_dir).map_err(|e| PlotError::Io {
            path: self.out_dir.clone(),
            source: e,
        })?;
        let path = self.out_dir.join(chart_file_name(&chart.id));

        draw(&path, (self.width, self.height), chart).map_err(|e| PlotError::Render {
            chart: chart.id.clone(),
            message: e.to_string(),
        })?;

        debug!(chart = %chart.id, path = %path.display(), points = chart.point_count(), "rendered chart");
        Ok(path)
    }
}

fn draw(path: &Path, size: (u32, u32), chart: &Chart) -> Result<(), Box<dyn std::error::Error>> {
    let (x_range, y_max) = bounds(chart);

    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(&chart.title, ("sans-serif", 28))
        .margin(24)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(RangedDateTime::from(x_range), 0f64..y_max)?;

    ctx.configure_mesh()
        .x_desc("Captured at")
        .y_desc("Price")
        .x_labels(8)
        .x_label_formatter(&|t: &DateTime<Utc>| t.format("%Y-%m-%d").to_string())
        .y_label_formatter(&|p: &f64| format!("{p:.0}"))
        .draw()?;

    for (i, series) in chart.series.iter().enumerate() {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        let points: Vec<(DateTime<Utc>, f64)> =
            series.points.iter().map(|p| (p.timestamp, p.price)).collect();

        ctx.draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
            .label(series.product_name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));

        // Marker plus price annotation above each observation
        ctx.draw_series(PointSeries::of_element(
            points.iter().copied(),
            4,
            color,
            &|c: (DateTime<Utc>, f64), s: i32, st: ShapeStyle| {
                EmptyElement::at(c)
                    + Circle::new((0, 0), s, st.filled())
                    + Text::new(format!("{:.2}", c.1), (-14, -22), ("sans-serif", 13).into_font())
            },
        ))?;
    }

    if !chart.series.is_empty() {
        ctx.configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(WHITE.mix(0.85))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Time range and y ceiling for the chart. A single instant is padded by a
/// day on each side; an empty chart spans the day around now.
fn bounds(chart: &Chart) -> (Range<DateTime<Utc>>, f64) {
    let points = chart.series.iter().flat_map(|s| s.points.iter());
    let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    let mut max_price = 0f64;
    for p in points {
        span = Some(match span {
            Some((lo, hi)) => (lo.min(p.timestamp), hi.max(p.timestamp)),
            None => (p.timestamp, p.timestamp),
        });
        max_price = max_price.max(p.price);
    }

    let x_range = match span {
        Some((lo, hi)) if lo < hi => lo..hi,
        Some((at, _)) => (at - Duration::days(1))..(at + Duration::days(1)),
        None => {
            let now = Utc::now();
            (now - Duration::days(1))..(now + Duration::days(1))
        }
    };
    let y_max = if max_price > 0.0 { max_price * 1.15 } else { 1.0 };
    (x_range, y_max)
}
