//! Chain normalization
//!
//! Turns per-expiration call/put batches into the canonical table every
//! analytic consumes.

use crate::error::{OptionsError, Result};
use crate::models::contract::classify_contract;
use crate::models::option::{CanonicalOptionRow, ExpirationBatch, RawContractRecord};
use chrono::{DateTime, NaiveDate, Utc};
use std::cmp::Ordering;
use tracing::debug;

const DAYS_PER_YEAR: f64 = 365.0;

/// Normalize `batches` using the current instant as evaluation time.
///
/// The evaluation day is the UTC calendar date of that instant. Callers in
/// market time late in the evening should use [`normalize_on`] with the
/// exchange-local date.
pub fn normalize(ticker: &str, batches: &[ExpirationBatch]) -> Result<Vec<CanonicalOptionRow>> {
    normalize_at(ticker, batches, Utc::now())
}

/// Normalize `batches` against a fixed evaluation instant, taking its UTC
/// calendar date as the evaluation day.
pub fn normalize_at(
    ticker: &str,
    batches: &[ExpirationBatch],
    as_of: DateTime<Utc>,
) -> Result<Vec<CanonicalOptionRow>> {
    normalize_on(ticker, batches, as_of.date_naive())
}

/// Normalize `batches` against an explicit evaluation day.
///
/// Fails as a whole if any contract cannot be classified; no partial table
/// is returned.
pub fn normalize_on(
    ticker: &str,
    batches: &[ExpirationBatch],
    as_of_date: NaiveDate,
) -> Result<Vec<CanonicalOptionRow>> {
    let capacity = batches.iter().map(ExpirationBatch::len).sum();
    let mut rows = Vec::with_capacity(capacity);

    for batch in batches {
        let time_to_expiration = years_between(as_of_date, batch.expiration);

        for record in batch.calls.iter().chain(batch.puts.iter()) {
            if time_to_expiration < 0.0 {
                return Err(OptionsError::ExpiredContract {
                    identifier: record.contract_symbol.clone(),
                    expiration: batch.expiration,
                    as_of: as_of_date,
                });
            }
            rows.push(canonical_row(ticker, record, batch.expiration, time_to_expiration)?);
        }
    }

    rows.sort_by(canonical_order);

    debug!(
        "Normalized {} contracts across {} expirations for {}",
        rows.len(),
        batches.len(),
        ticker
    );

    Ok(rows)
}

/// Calendar days from `as_of` to `expiration`, in years
pub fn years_between(as_of: NaiveDate, expiration: NaiveDate) -> f64 {
    (expiration - as_of).num_days() as f64 / DAYS_PER_YEAR
}

/// Canonical row order: strike, then time to expiration, then calls before puts
pub fn canonical_order(a: &CanonicalOptionRow, b: &CanonicalOptionRow) -> Ordering {
    a.strike
        .total_cmp(&b.strike)
        .then_with(|| a.time_to_expiration.total_cmp(&b.time_to_expiration))
        .then_with(|| a.option_type.cmp(&b.option_type))
}

fn canonical_row(
    ticker: &str,
    record: &RawContractRecord,
    expiration: NaiveDate,
    time_to_expiration: f64,
) -> Result<CanonicalOptionRow> {
    let option_type = classify_contract(&record.contract_symbol, ticker).map_err(|e| {
        OptionsError::Normalization {
            identifier: record.contract_symbol.clone(),
            source: Box::new(e),
        }
    })?;

    Ok(CanonicalOptionRow {
        contract_symbol: record.contract_symbol.clone(),
        strike: record.strike,
        last_price: record.last_price,
        implied_volatility: record.implied_volatility,
        volume: record.volume.unwrap_or(0),
        open_interest: record.open_interest,
        bid: record.bid,
        ask: record.ask,
        change: record.change,
        percent_change: record.percent_change,
        in_the_money: record.in_the_money,
        last_trade_date: record.last_trade_date,
        expiration,
        option_type,
        time_to_expiration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::option::{OptionContract, OptionType};
    use approx::assert_relative_eq;
    use chrono::{FixedOffset, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap()
    }

    fn record(option_type: OptionType, strike: f64, expiration: NaiveDate) -> RawContractRecord {
        let symbol = OptionContract::new("MA", option_type, strike, expiration).occ_symbol();
        RawContractRecord::new(symbol, strike).with_volume(1)
    }

    #[test]
    fn sorts_shuffled_input_by_strike_time_and_type() {
        let near = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let far = NaiveDate::from_ymd_opt(2024, 6, 21).unwrap();

        let batches = vec![
            ExpirationBatch::new(
                far,
                vec![record(OptionType::Call, 110.0, far), record(OptionType::Call, 100.0, far)],
                vec![record(OptionType::Put, 100.0, far), record(OptionType::Put, 90.0, far)],
            ),
            ExpirationBatch::new(
                near,
                vec![record(OptionType::Call, 100.0, near)],
                vec![record(OptionType::Put, 110.0, near), record(OptionType::Put, 100.0, near)],
            ),
        ];

        let rows = normalize_at("MA", &batches, as_of()).unwrap();
        assert_eq!(rows.len(), 7);

        for pair in rows.windows(2) {
            assert_ne!(canonical_order(&pair[0], &pair[1]), Ordering::Greater);
        }

        let keys: Vec<(f64, NaiveDate, OptionType)> = rows
            .iter()
            .map(|r| (r.strike, r.expiration, r.option_type))
            .collect();
        assert_eq!(
            keys,
            vec![
                (90.0, far, OptionType::Put),
                (100.0, near, OptionType::Call),
                (100.0, near, OptionType::Put),
                (100.0, far, OptionType::Call),
                (100.0, far, OptionType::Put),
                (110.0, near, OptionType::Put),
                (110.0, far, OptionType::Call),
            ]
        );
    }

    #[test]
    fn time_to_expiration_uses_calendar_days() {
        let today = as_of().date_naive();
        let in_30 = today + chrono::Duration::days(30);
        let in_365 = today + chrono::Duration::days(365);

        let batches = vec![
            ExpirationBatch::new(today, vec![record(OptionType::Call, 100.0, today)], vec![]),
            ExpirationBatch::new(in_30, vec![record(OptionType::Call, 101.0, in_30)], vec![]),
            ExpirationBatch::new(in_365, vec![record(OptionType::Call, 102.0, in_365)], vec![]),
        ];

        let rows = normalize_at("MA", &batches, as_of()).unwrap();
        assert_eq!(rows[0].time_to_expiration, 0.0);
        assert_relative_eq!(rows[1].time_to_expiration, 30.0 / 365.0, epsilon = 1e-12);
        assert_relative_eq!(rows[2].time_to_expiration, 1.0, epsilon = 1e-12);

        let mut by_expiration = rows.clone();
        by_expiration.sort_by_key(|r| r.expiration);
        for pair in by_expiration.windows(2) {
            assert!(pair[0].time_to_expiration <= pair[1].time_to_expiration);
        }
        assert!(rows[1..].iter().all(|r| r.time_to_expiration > 0.0));
    }

    #[test]
    fn missing_volume_defaults_to_zero() {
        let expiration = NaiveDate::from_ymd_opt(2024, 4, 19).unwrap();
        let mut missing = record(OptionType::Put, 95.0, expiration);
        missing.volume = None;

        let rows = normalize_at(
            "MA",
            &[ExpirationBatch::new(expiration, vec![], vec![missing])],
            as_of(),
        )
        .unwrap();
        assert_eq!(rows[0].volume, 0);
        assert_eq!(rows[0].option_type, OptionType::Put);
    }

    #[test]
    fn one_malformed_identifier_fails_the_whole_chain() {
        let expiration = NaiveDate::from_ymd_opt(2024, 4, 19).unwrap();
        let good = record(OptionType::Call, 100.0, expiration);
        let bad = RawContractRecord::new("MA240419Z00100000", 100.0);

        let err = normalize_at(
            "MA",
            &[ExpirationBatch::new(expiration, vec![good, bad], vec![])],
            as_of(),
        )
        .unwrap_err();

        match err {
            OptionsError::Normalization { identifier, .. } => {
                assert_eq!(identifier, "MA240419Z00100000")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn expired_batches_are_rejected() {
        let yesterday = as_of().date_naive() - chrono::Duration::days(1);
        let batches = vec![ExpirationBatch::new(
            yesterday,
            vec![record(OptionType::Call, 100.0, yesterday)],
            vec![],
        )];
        assert!(matches!(
            normalize_at("MA", &batches, as_of()),
            Err(OptionsError::ExpiredContract { .. })
        ));
    }

    #[test]
    fn evening_in_new_york_uses_the_local_day() {
        // 21:30 on March 1 in New York is already March 2 in UTC
        let new_york = FixedOffset::west_opt(5 * 3600).unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 3, 2, 2, 30, 0).unwrap();
        let local_day = instant.with_timezone(&new_york).date_naive();
        assert_eq!(local_day, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let batches = vec![ExpirationBatch::new(
            local_day,
            vec![record(OptionType::Call, 100.0, local_day)],
            vec![],
        )];

        assert!(matches!(
            normalize_at("MA", &batches, instant),
            Err(OptionsError::ExpiredContract { .. })
        ));

        let rows = normalize_on("MA", &batches, local_day).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].time_to_expiration, 0.0);
    }

    #[test]
    fn empty_chain_is_an_empty_table() {
        assert!(normalize_at("MA", &[], as_of()).unwrap().is_empty());
    }
}
