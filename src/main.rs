//! Command-line front end for options-analytics
//!
//! Fetches a ticker's full options chain from the configured provider, runs
//! the analysis and writes the chart specifications as JSON files:
//!
//! ```text
//! options-analytics <TICKER> [--log-moneyness]
//! ```

use options_analytics::analysis::{analyze, AnalysisRequest, SurfaceOutcome, SurfaceRequest};
use options_analytics::api::{fetch_full_chain, PriceSource, RestClient};
use options_analytics::config::Config;
use options_analytics::error::{OptionsError, Result};
use options_analytics::utils::{
    canonical_frame, greeks_chart, monthly_sentiment_chart, surface_chart, volume_by_type,
    GreekKind,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

fn write_chart(dir: &Path, name: &str, chart: &Value) -> Result<PathBuf> {
    let path = dir.join(format!("{}.json", name));
    std::fs::write(&path, serde_json::to_vec_pretty(chart)?)?;
    Ok(path)
}

async fn run(config: &Config, ticker: &str, log_moneyness: bool) -> Result<()> {
    let client = RestClient::new(&config.provider)?;
    let provider = client.provider();
    info!("{} Using provider {}", provider.icon, provider.name);

    let spot = client.latest_price(ticker).await?;
    match spot {
        Some(price) => info!("{} last traded at {:.2}", ticker, price),
        None => warn!("No price available for {}", ticker),
    }

    let batches = fetch_full_chain(&client, ticker).await?;

    let surface = SurfaceRequest {
        log_moneyness,
        ..SurfaceRequest::default()
    };
    let request =
        AnalysisRequest::new(ticker, spot, config.risk_free_rate).with_surface(surface);
    let report = analyze(&request, &batches)?;

    info!(
        "Calls {} / puts {}: ratio {} ({})",
        report.sentiment.total_calls,
        report.sentiment.total_puts,
        report.sentiment.ratio,
        report.sentiment.sentiment()
    );
    for month in &report.monthly {
        info!(
            "  {}: {} calls / {} puts, ratio {}",
            month.month, month.call_volume, month.put_volume, month.ratio
        );
    }

    let frame = canonical_frame(&report.table)?;
    info!("Volume by type:\n{}", volume_by_type(&frame)?);

    let out_dir = Path::new(&config.output_dir).join(ticker);
    std::fs::create_dir_all(&out_dir)?;

    let path = write_chart(&out_dir, "monthly_sentiment", &monthly_sentiment_chart(&report.monthly))?;
    info!("Monthly sentiment chart saved to {:?}", path);

    if let Some(greeks) = &report.greeks {
        for greek in [
            GreekKind::Delta,
            GreekKind::Gamma,
            GreekKind::Theta,
            GreekKind::Vega,
            GreekKind::Rho,
        ] {
            let chart = greeks_chart(&report.table, greeks, greek)?;
            let name = greek.label().to_ascii_lowercase();
            write_chart(&out_dir, &name, &chart)?;
        }
        info!("Greeks charts saved to {:?}", out_dir);
    }

    match &report.surface {
        SurfaceOutcome::Built(grid) => {
            let title = format!("{} implied volatility surface", ticker);
            let path = write_chart(&out_dir, "volatility_surface", &surface_chart(grid, &title))?;
            info!(
                "Volatility surface from {} samples saved to {:?}",
                grid.samples, path
            );
        }
        SurfaceOutcome::Unavailable(reason) => warn!("No volatility surface: {}", reason),
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    config.init_logging()?;

    let mut args = std::env::args().skip(1);
    let ticker = args
        .next()
        .map(|t| t.trim().to_ascii_uppercase())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            OptionsError::ConfigError("usage: options-analytics <TICKER> [--log-moneyness]".to_string())
        })?;
    let log_moneyness = args.any(|a| a == "--log-moneyness");

    info!("Starting options-analytics for {}", ticker);

    match run(&config, &ticker, log_moneyness).await {
        Err(OptionsError::DataUnavailable(reason)) => {
            error!("No data for {}: {}", ticker, reason);
            Ok(())
        }
        other => other,
    }
}
