//! Market-data collaborators
//!
//! The analytics only need two things from the outside world: per-expiration
//! chains and the latest underlying price. `RestClient` serves both for any
//! provider in the descriptor table.

mod provider;
mod rest;

pub use provider::{Endpoint, ProviderDescriptor};
pub use rest::{parse_chain_response, parse_expirations, parse_latest_price, RestClient};

use crate::error::{OptionsError, Result};
use crate::models::option::ExpirationBatch;
use chrono::NaiveDate;
use futures::future::try_join_all;
use std::future::Future;
use tracing::info;

/// Source of per-expiration option chains
pub trait ChainSource {
    fn expirations(&self, ticker: &str) -> impl Future<Output = Result<Vec<NaiveDate>>> + Send;

    fn chain(
        &self,
        ticker: &str,
        expiration: NaiveDate,
    ) -> impl Future<Output = Result<ExpirationBatch>> + Send;
}

/// Source of the latest underlying price
pub trait PriceSource {
    /// `Ok(None)` means the source has no price, which is not the same as zero.
    fn latest_price(&self, ticker: &str) -> impl Future<Output = Result<Option<f64>>> + Send;
}

/// Fetch every listed expiration concurrently.
///
/// Batches come back in expiration order whatever order the requests
/// complete in. Any failed request fails the whole fetch.
pub async fn fetch_full_chain<S>(source: &S, ticker: &str) -> Result<Vec<ExpirationBatch>>
where
    S: ChainSource + Sync,
{
    let mut expirations = source.expirations(ticker).await?;
    if expirations.is_empty() {
        return Err(OptionsError::DataUnavailable(format!(
            "no listed expirations for {}",
            ticker
        )));
    }
    expirations.sort();
    expirations.dedup();

    let batches = try_join_all(
        expirations
            .iter()
            .map(|&expiration| source.chain(ticker, expiration)),
    )
    .await?;

    info!(
        "Fetched {} contracts across {} expirations for {}",
        batches.iter().map(ExpirationBatch::len).sum::<usize>(),
        batches.len(),
        ticker
    );

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::option::RawContractRecord;
    use std::time::Duration;

    struct DelayedSource {
        dates: Vec<NaiveDate>,
        fail_on: Option<NaiveDate>,
    }

    impl ChainSource for DelayedSource {
        async fn expirations(&self, _ticker: &str) -> Result<Vec<NaiveDate>> {
            Ok(self.dates.clone())
        }

        async fn chain(&self, ticker: &str, expiration: NaiveDate) -> Result<ExpirationBatch> {
            // later expirations answer first
            let rank = self.dates.iter().filter(|d| **d > expiration).count() as u64;
            tokio::time::sleep(Duration::from_millis(5 * rank)).await;
            if self.fail_on == Some(expiration) {
                return Err(OptionsError::RequestError("timed out".to_string()));
            }
            let record = RawContractRecord::new(format!("{}-{}", ticker, expiration), 100.0);
            Ok(ExpirationBatch::new(expiration, vec![record], vec![]))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn batches_follow_expiration_order() {
        let source = DelayedSource {
            dates: vec![date(2024, 9, 20), date(2024, 7, 19), date(2024, 8, 16)],
            fail_on: None,
        };
        let batches = fetch_full_chain(&source, "SPY").await.unwrap();
        let order: Vec<NaiveDate> = batches.iter().map(|b| b.expiration).collect();
        assert_eq!(order, vec![date(2024, 7, 19), date(2024, 8, 16), date(2024, 9, 20)]);
    }

    #[tokio::test]
    async fn one_failed_expiration_fails_the_fetch() {
        let source = DelayedSource {
            dates: vec![date(2024, 7, 19), date(2024, 8, 16)],
            fail_on: Some(date(2024, 8, 16)),
        };
        assert!(matches!(
            fetch_full_chain(&source, "SPY").await,
            Err(OptionsError::RequestError(_))
        ));
    }

    #[tokio::test]
    async fn no_expirations_is_unavailable() {
        let source = DelayedSource {
            dates: vec![],
            fail_on: None,
        };
        assert!(matches!(
            fetch_full_chain(&source, "SPY").await,
            Err(OptionsError::DataUnavailable(_))
        ));
    }
}
