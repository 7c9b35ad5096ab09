use clap::Parser;
use price_tracker::config::Config;
use price_tracker::logging;
use price_tracker::pipeline::Pipeline;
use tracing::{error, info};

const CONFIG_FILE: &str = "config.toml";

#[derive(Parser)]
#[command(name = "price_tracker")]
#[command(about = "Scrapes product prices, updates the price history and renders price charts")]
#[command(version)]
struct Cli {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let _cli = Cli::parse();
    logging::init_logging();

    let config = Config::load_or_default(CONFIG_FILE)?;
    let pipeline = Pipeline::with_http(config)?;

    println!("🚀 Running price tracker...");
    let result = match pipeline.run().await {
        Ok(result) => result,
        Err(e) => {
            error!("Pipeline failed: {}", e);
            return Err(e.into());
        }
    };
    info!("Pipeline finished");

    println!("\n📊 Run results:");
    println!("   URLs fetched: {}/{}", result.urls_total - result.urls_failed, result.urls_total);
    println!("   Records scraped: {}", result.records_scraped);
    println!("   Records in store: {}", result.records_stored);
    println!("   Products: {}", result.products);
    println!("   Charts: {} ({} failed)", result.charts_written.len(), result.chart_failures);
    println!("   Gallery: {}", result.gallery_file.display());

    if !result.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &result.errors {
            println!("   - {}", error);
        }
    }
    Ok(())
}
