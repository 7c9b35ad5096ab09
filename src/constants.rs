//! Fixed inputs and output file names shared across the pipeline.

// Output files, all relative to the results directory
pub const RESULTS_DIR: &str = "results";
pub const STORE_FILE: &str = "product_price.csv";
pub const GROUPED_FILE: &str = "grouped_product_prices.csv";
pub const GALLERY_FILE: &str = "plot_gallery.html";
pub const RUN_SUMMARY_FILE: &str = "run_summary.json";

pub const PLOT_SUFFIX: &str = "_plot.svg";

// Log files, relative to the working directory
pub const LOG_DIR: &str = "logs";
pub const LOG_FILE_PREFIX: &str = "price_tracker.log";
pub const DEFAULT_LOG_FILTER: &str = "price_tracker=info,warn";

// Makro search result pages
pub const DEFAULT_URLS: &[&str] = &[
    // เนื้อพิคานย่า
    "https://www.makro.pro/c/search?q=%E0%B9%80%E0%B8%99%E0%B8%B7%E0%B9%89%E0%B8%AD%E0%B8%9E%E0%B8%B4%E0%B8%84%E0%B8%B2%E0%B8%99%E0%B8%A2%E0%B9%88%E0%B8%B2",
    // โปรบุชเชอร์ สันนอก
    "https://www.makro.pro/c/search?q=%E0%B9%82%E0%B8%9B%E0%B8%A3%E0%B8%9A%E0%B8%B8%E0%B8%8A%E0%B9%80%E0%B8%8A%E0%B8%AD%E0%B8%A3%E0%B9%8C+%E0%B8%AA%E0%B8%B1%E0%B8%99%E0%B8%99%E0%B8%AD%E0%B8%81",
    // สันนอกวัว
    "https://www.makro.pro/c/search?q=%E0%B8%AA%E0%B8%B1%E0%B8%99%E0%B8%99%E0%B8%AD%E0%B8%81%E0%B8%A7%E0%B8%B1%E0%B8%A7",
    // สันแหลม
    "https://www.makro.pro/c/search?q=%E0%B8%AA%E0%B8%B1%E0%B8%99%E0%B9%81%E0%B8%AB%E0%B8%A5%E0%B8%A1",
    // เนื้อสันแหลมริบอาย
    "https://www.makro.pro/c/search?q=%E0%B9%80%E0%B8%99%E0%B8%B7%E0%B9%89%E0%B8%AD%E0%B8%AA%E0%B8%B1%E0%B8%99%E0%B9%81%E0%B8%AB%E0%B8%A5%E0%B8%A1%E0%B8%A3%E0%B8%B4%E0%B8%9A%E0%B8%AD%E0%B8%B2%E0%B8%A2",
    // โปรบุชเชอร์ เนื้อ สันคอ
    "https://www.makro.pro/c/search?q=%E0%B9%82%E0%B8%9B%E0%B8%A3%E0%B8%9A%E0%B8%B8%E0%B8%8A%E0%B9%80%E0%B8%8A%E0%B8%AD%E0%B8%A3%E0%B9%8C+%E0%B9%80%E0%B8%99%E0%B8%B7%E0%B9%89%E0%B8%AD+%E0%B8%AA%E0%B8%B1%E0%B8%99%E0%B8%84%E0%B8%AD",
];

// One chart per beef cut
pub const DEFAULT_CATEGORIES: &[&str] = &["พิคานย่า", "สันคอ", "สันนอก", "สันแหลม", "วากิว"];

// Makro product card markup
pub const CARD_SELECTOR: &str = "div.MuiBox-root.css-1p9qlrd";
pub const NAME_SELECTOR: &str = "div.MuiBox-root.css-r0hfyj";
pub const PRICE_SELECTOR: &str = "p.MuiTypography-root.MuiTypography-body1.css-ez05by";

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
pub const DEFAULT_USER_AGENT: &str = concat!("price_tracker/", env!("CARGO_PKG_VERSION"));

pub const DEFAULT_PLOT_WIDTH: u32 = 1300;
pub const DEFAULT_PLOT_HEIGHT: u32 = 900;
