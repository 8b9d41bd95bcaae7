use crate::api::provider::{Endpoint, ProviderDescriptor};
use crate::api::{ChainSource, PriceSource};
use crate::config::ProviderConfig;
use crate::error::{OptionsError, Result};
use crate::models::option::{ExpirationBatch, RawContractRecord};
use chrono::{DateTime, NaiveDate, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

static PROVIDER_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut h = HeaderMap::new();
    h.insert(
        USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        ),
    );
    h.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    h.insert("accept-language", HeaderValue::from_static("en-US,en;q=0.9"));
    h
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionChainEnvelope {
    option_chain: OptionChainBody,
}

#[derive(Debug, Deserialize)]
struct OptionChainBody {
    #[serde(default)]
    result: Vec<OptionChainResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OptionChainResult {
    #[serde(default)]
    expiration_dates: Vec<i64>,
    #[serde(default)]
    options: Vec<OptionChainSlice>,
}

#[derive(Debug, Deserialize)]
struct OptionChainSlice {
    #[serde(default)]
    calls: Vec<RawContractRecord>,
    #[serde(default)]
    puts: Vec<RawContractRecord>,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
}

fn first_chain_result(body: &str) -> Result<OptionChainResult> {
    let envelope: OptionChainEnvelope = serde_json::from_str(body)
        .map_err(|e| OptionsError::ParseError(format!("Failed to parse options chain: {}", e)))?;

    if let Some(error) = envelope.option_chain.error.filter(|e| !e.is_null()) {
        return Err(OptionsError::DataUnavailable(format!(
            "provider reported an error: {}",
            error
        )));
    }

    envelope
        .option_chain
        .result
        .into_iter()
        .next()
        .ok_or_else(|| OptionsError::DataUnavailable("empty options chain result".to_string()))
}

fn date_from_unix(ts: i64) -> Result<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| OptionsError::ParseError(format!("Invalid expiration timestamp {}", ts)))
}

fn unix_from_date(date: NaiveDate) -> Result<i64> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| OptionsError::ParseError(format!("Invalid expiration date {}", date)))
}

/// Listed expiration dates, sorted and deduplicated
pub fn parse_expirations(body: &str) -> Result<Vec<NaiveDate>> {
    let result = first_chain_result(body)?;
    let mut dates = result
        .expiration_dates
        .into_iter()
        .map(date_from_unix)
        .collect::<Result<Vec<_>>>()?;
    dates.sort();
    dates.dedup();
    Ok(dates)
}

/// Calls and puts of a single-expiration chain response
pub fn parse_chain_response(body: &str, expiration: NaiveDate) -> Result<ExpirationBatch> {
    let result = first_chain_result(body)?;
    let slice = result.options.into_iter().next().ok_or_else(|| {
        OptionsError::DataUnavailable(format!("no contracts listed for {}", expiration))
    })?;
    Ok(ExpirationBatch::new(expiration, slice.calls, slice.puts))
}

/// Latest underlying price; `None` when the provider has no price
pub fn parse_latest_price(body: &str) -> Result<Option<f64>> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| OptionsError::ParseError(format!("Failed to parse price chart: {}", e)))?;
    Ok(envelope
        .chart
        .result
        .into_iter()
        .next()
        .and_then(|r| r.meta.regular_market_price)
        .filter(|p| p.is_finite()))
}

/// HTTP client for any provider in the descriptor table
pub struct RestClient {
    client: reqwest::Client,
    provider: &'static ProviderDescriptor,
    timeout: Duration,
    limiter: DefaultDirectRateLimiter,
}

impl RestClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let provider = ProviderDescriptor::by_name(&config.name).ok_or_else(|| {
            OptionsError::ConfigError(format!("Unknown options provider '{}'", config.name))
        })?;
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            OptionsError::ConfigError("requests per second must be at least 1".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            provider,
            timeout: Duration::from_secs(config.request_timeout_secs),
            limiter: RateLimiter::direct(Quota::per_second(per_second).allow_burst(nonzero!(1u32))),
        })
    }

    pub fn provider(&self) -> &'static ProviderDescriptor {
        self.provider
    }

    fn endpoint_url(&self, endpoint: Endpoint, ticker: &str) -> Result<Url> {
        let path = self.provider.path(endpoint, ticker).ok_or_else(|| {
            OptionsError::ConfigError(format!(
                "Provider {} has no {:?} endpoint",
                self.provider.name, endpoint
            ))
        })?;
        Url::parse(&format!("{}{}", self.provider.base_url, path))
            .map_err(|e| OptionsError::RequestError(format!("Invalid endpoint URL: {}", e)))
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        self.limiter.until_ready().await;
        debug!("GET {}", url);

        let resp = self
            .client
            .get(url.clone())
            .headers(PROVIDER_HEADERS.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| OptionsError::RequestError(format!("Request to {} failed: {}", url, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(OptionsError::RequestError(format!(
                "{} answered {}",
                url, status
            )));
        }

        resp.text()
            .await
            .map_err(|e| OptionsError::RequestError(format!("Failed to read response body: {}", e)))
    }
}

impl ChainSource for RestClient {
    async fn expirations(&self, ticker: &str) -> Result<Vec<NaiveDate>> {
        let url = self.endpoint_url(Endpoint::Expirations, ticker)?;
        let body = self.get_text(url).await?;
        let dates = parse_expirations(&body)?;
        info!(
            "{} {} lists {} expirations for {}",
            self.provider.icon,
            self.provider.name,
            dates.len(),
            ticker
        );
        Ok(dates)
    }

    async fn chain(&self, ticker: &str, expiration: NaiveDate) -> Result<ExpirationBatch> {
        let mut url = self.endpoint_url(Endpoint::Chain, ticker)?;
        url.query_pairs_mut()
            .append_pair("date", &unix_from_date(expiration)?.to_string());
        let body = self.get_text(url).await?;
        let batch = parse_chain_response(&body, expiration)?;
        debug!(
            "Fetched {} calls and {} puts for {} {}",
            batch.calls.len(),
            batch.puts.len(),
            ticker,
            expiration
        );
        Ok(batch)
    }
}

impl PriceSource for RestClient {
    async fn latest_price(&self, ticker: &str) -> Result<Option<f64>> {
        let url = self.endpoint_url(Endpoint::LatestPrice, ticker)?;
        let body = self.get_text(url).await?;
        parse_latest_price(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = r#"{
        "optionChain": {
            "result": [{
                "underlyingSymbol": "MA",
                "expirationDates": [1719532800, 1718928000, 1718928000],
                "strikes": [440.0, 450.0],
                "quote": {"regularMarketPrice": 447.1},
                "options": [{
                    "expirationDate": 1718928000,
                    "calls": [{
                        "contractSymbol": "MA240621C00450000",
                        "strike": 450.0,
                        "currency": "USD",
                        "lastPrice": 6.2,
                        "volume": 114,
                        "openInterest": 812,
                        "impliedVolatility": 0.231,
                        "inTheMoney": false
                    }],
                    "puts": [{
                        "contractSymbol": "MA240621P00440000",
                        "strike": 440.0,
                        "lastPrice": 3.9,
                        "impliedVolatility": 0.244
                    }]
                }]
            }],
            "error": null
        }
    }"#;

    #[test]
    fn expirations_are_sorted_dates() {
        let dates = parse_expirations(CHAIN).unwrap();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 6, 21).unwrap(),
                NaiveDate::from_ymd_opt(2024, 6, 28).unwrap(),
            ]
        );
    }

    #[test]
    fn chain_records_keep_missing_fields_absent() {
        let expiration = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        let batch = parse_chain_response(CHAIN, expiration).unwrap();
        assert_eq!(batch.expiration, expiration);
        assert_eq!(batch.calls.len(), 1);
        assert_eq!(batch.calls[0].volume, Some(114));
        assert_eq!(batch.puts[0].volume, None);
        assert_eq!(batch.puts[0].implied_volatility, Some(0.244));
    }

    #[test]
    fn empty_or_failed_results_are_unavailable() {
        let empty = r#"{"optionChain": {"result": [], "error": null}}"#;
        assert!(matches!(
            parse_expirations(empty),
            Err(OptionsError::DataUnavailable(_))
        ));

        let failed = r#"{"optionChain": {"result": [], "error": {"code": "Not Found"}}}"#;
        assert!(matches!(
            parse_expirations(failed),
            Err(OptionsError::DataUnavailable(_))
        ));

        assert!(matches!(
            parse_expirations("<html>"),
            Err(OptionsError::ParseError(_))
        ));
    }

    #[test]
    fn latest_price_distinguishes_missing_from_zero() {
        let priced = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 447.1}}]}}"#;
        assert_eq!(parse_latest_price(priced).unwrap(), Some(447.1));

        let unpriced = r#"{"chart": {"result": [{"meta": {}}]}}"#;
        assert_eq!(parse_latest_price(unpriced).unwrap(), None);

        let empty = r#"{"chart": {"result": []}}"#;
        assert_eq!(parse_latest_price(empty).unwrap(), None);

        let zero = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 0.0}}]}}"#;
        assert_eq!(parse_latest_price(zero).unwrap(), Some(0.0));
    }

    #[test]
    fn chain_url_carries_the_expiration_timestamp() {
        let config = ProviderConfig {
            name: "yahoo".to_string(),
            request_timeout_secs: 5,
            requests_per_second: 2,
        };
        let client = RestClient::new(&config).unwrap();
        let mut url = client.endpoint_url(Endpoint::Chain, "MA").unwrap();
        let expiration = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();
        url.query_pairs_mut()
            .append_pair("date", &unix_from_date(expiration).unwrap().to_string());
        assert_eq!(
            url.as_str(),
            "https://query2.finance.yahoo.com/v7/finance/options/MA?date=1718928000"
        );
    }

    #[test]
    fn unknown_provider_is_a_config_error() {
        let config = ProviderConfig {
            name: "nowhere".to_string(),
            request_timeout_secs: 5,
            requests_per_second: 2,
        };
        assert!(matches!(
            RestClient::new(&config),
            Err(OptionsError::ConfigError(_))
        ));
    }
}
