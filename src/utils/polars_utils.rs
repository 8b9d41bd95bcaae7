use crate::error::{OptionsError, Result};
use crate::models::greeks::{GreeksOutcome, GreeksRow};
use crate::models::option::CanonicalOptionRow;
use crate::models::sentiment::MonthlySentiment;
use polars::prelude::*;

/// Convert the canonical table to a Polars DataFrame
pub fn canonical_frame(rows: &[CanonicalOptionRow]) -> Result<DataFrame> {
    let mut symbols = Vec::with_capacity(rows.len());
    let mut option_types = Vec::with_capacity(rows.len());
    let mut strikes = Vec::with_capacity(rows.len());
    let mut expirations = Vec::with_capacity(rows.len());
    let mut times = Vec::with_capacity(rows.len());
    let mut last_prices = Vec::with_capacity(rows.len());
    let mut ivs = Vec::with_capacity(rows.len());
    let mut volumes = Vec::with_capacity(rows.len());
    let mut open_interests = Vec::with_capacity(rows.len());
    let mut bids = Vec::with_capacity(rows.len());
    let mut asks = Vec::with_capacity(rows.len());
    let mut in_the_money = Vec::with_capacity(rows.len());

    for row in rows {
        symbols.push(row.contract_symbol.clone());
        option_types.push(row.option_type.to_string());
        strikes.push(row.strike);
        expirations.push(row.expiration.format("%Y-%m-%d").to_string());
        times.push(row.time_to_expiration);
        last_prices.push(row.last_price);
        ivs.push(row.implied_volatility);
        volumes.push(row.volume);
        open_interests.push(row.open_interest);
        bids.push(row.bid);
        asks.push(row.ask);
        in_the_money.push(row.in_the_money);
    }

    let df = DataFrame::new(vec![
        Series::new("contract_symbol", symbols),
        Series::new("option_type", option_types),
        Series::new("strike", strikes),
        Series::new("expiration", expirations),
        Series::new("time_to_expiration", times),
        Series::new("last_price", last_prices),
        Series::new("implied_volatility", ivs),
        Series::new("volume", volumes),
        Series::new("open_interest", open_interests),
        Series::new("bid", bids),
        Series::new("ask", asks),
        Series::new("in_the_money", in_the_money),
    ])?;

    Ok(df)
}

/// Canonical table with the Greeks columns appended.
///
/// Rows and Greeks are paired by position, so both slices must have the
/// same length. Rejected rows carry nulls and their rejection reason.
pub fn enriched_frame(rows: &[CanonicalOptionRow], greeks: &[GreeksRow]) -> Result<DataFrame> {
    if rows.len() != greeks.len() {
        return Err(OptionsError::DataUnavailable(format!(
            "{} Greeks rows for {} contracts",
            greeks.len(),
            rows.len()
        )));
    }

    let mut deltas = Vec::with_capacity(greeks.len());
    let mut gammas = Vec::with_capacity(greeks.len());
    let mut thetas = Vec::with_capacity(greeks.len());
    let mut vegas = Vec::with_capacity(greeks.len());
    let mut rhos = Vec::with_capacity(greeks.len());
    let mut leverages = Vec::with_capacity(greeks.len());
    let mut rejections: Vec<Option<String>> = Vec::with_capacity(greeks.len());

    for row in greeks {
        match &row.outcome {
            GreeksOutcome::Computed(g) => {
                deltas.push(Some(g.delta));
                gammas.push(Some(g.gamma));
                thetas.push(Some(g.theta));
                vegas.push(Some(g.vega));
                rhos.push(Some(g.rho));
                rejections.push(None);
            }
            GreeksOutcome::Rejected { reason } => {
                deltas.push(None);
                gammas.push(None);
                thetas.push(None);
                vegas.push(None);
                rhos.push(None);
                rejections.push(Some(reason.to_string()));
            }
        }
        leverages.push(row.leverage.value());
    }

    let mut df = canonical_frame(rows)?;
    df.hstack_mut(&[
        Series::new("delta", deltas),
        Series::new("gamma", gammas),
        Series::new("theta", thetas),
        Series::new("vega", vegas),
        Series::new("rho", rhos),
        Series::new("leverage", leverages),
        Series::new("greeks_rejection", rejections),
    ])?;

    Ok(df)
}

/// Monthly call/put ratios as a DataFrame; undefined ratios are null
pub fn monthly_frame(monthly: &MonthlySentiment) -> Result<DataFrame> {
    let months: Vec<String> = monthly.iter().map(|m| m.month.to_string()).collect();
    let calls: Vec<u64> = monthly.iter().map(|m| m.call_volume).collect();
    let puts: Vec<u64> = monthly.iter().map(|m| m.put_volume).collect();
    let ratios: Vec<Option<f64>> = monthly.iter().map(|m| m.ratio.value()).collect();

    let df = DataFrame::new(vec![
        Series::new("month", months),
        Series::new("call_volume", calls),
        Series::new("put_volume", puts),
        Series::new("call_put_ratio", ratios),
    ])?;

    Ok(df)
}

/// Total volume and contract count per option type
pub fn volume_by_type(frame: &DataFrame) -> Result<DataFrame> {
    let summary = frame
        .clone()
        .lazy()
        .group_by([col("option_type")])
        .agg([
            col("volume").sum().alias("volume"),
            col("contract_symbol").count().alias("contracts"),
        ])
        .sort("option_type", SortOptions::default())
        .collect()?;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::greeks::{DomainViolation, Greeks};
    use crate::models::option::OptionType;
    use crate::models::ratio::Ratio;
    use crate::models::sentiment::{MonthlyRatio, YearMonth};
    use chrono::NaiveDate;

    fn row(symbol: &str, option_type: OptionType, volume: u64) -> CanonicalOptionRow {
        CanonicalOptionRow {
            contract_symbol: symbol.to_string(),
            strike: 100.0,
            last_price: Some(3.0),
            implied_volatility: Some(0.25),
            volume,
            open_interest: None,
            bid: None,
            ask: None,
            change: None,
            percent_change: None,
            in_the_money: Some(false),
            last_trade_date: None,
            expiration: NaiveDate::from_ymd_opt(2024, 9, 20).unwrap(),
            option_type,
            time_to_expiration: 0.2,
        }
    }

    fn sample_rows() -> Vec<CanonicalOptionRow> {
        vec![
            row("A", OptionType::Call, 40),
            row("B", OptionType::Put, 15),
            row("C", OptionType::Call, 60),
        ]
    }

    #[test]
    fn canonical_frame_has_one_row_per_contract() {
        let df = canonical_frame(&sample_rows()).unwrap();
        assert_eq!(df.height(), 3);
        assert_eq!(
            df.column("expiration").unwrap().utf8().unwrap().get(0),
            Some("2024-09-20")
        );
        assert_eq!(df.column("open_interest").unwrap().null_count(), 3);
    }

    #[test]
    fn volume_is_summed_per_type() {
        let df = canonical_frame(&sample_rows()).unwrap();
        let summary = volume_by_type(&df).unwrap();
        assert_eq!(summary.height(), 2);

        let types = summary.column("option_type").unwrap().utf8().unwrap();
        let volume = summary.column("volume").unwrap().u64().unwrap();
        assert_eq!(types.get(0), Some("Call"));
        assert_eq!(volume.get(0), Some(100));
        assert_eq!(types.get(1), Some("Put"));
        assert_eq!(volume.get(1), Some(15));
    }

    #[test]
    fn enriched_frame_nulls_rejected_rows() {
        let rows = sample_rows();
        let computed = GreeksOutcome::Computed(Greeks {
            delta: 0.5,
            gamma: 0.02,
            theta: -0.03,
            vega: 0.1,
            rho: 0.04,
        });
        let greeks = vec![
            GreeksRow {
                contract_symbol: "A".into(),
                outcome: computed,
                leverage: Ratio::Defined(16.0),
            },
            GreeksRow {
                contract_symbol: "B".into(),
                outcome: GreeksOutcome::Rejected {
                    reason: DomainViolation::MissingVolatility,
                },
                leverage: Ratio::Undefined,
            },
            GreeksRow {
                contract_symbol: "C".into(),
                outcome: computed,
                leverage: Ratio::Undefined,
            },
        ];

        let df = enriched_frame(&rows, &greeks).unwrap();
        assert_eq!(df.height(), 3);
        let delta = df.column("delta").unwrap().f64().unwrap();
        assert_eq!(delta.get(0), Some(0.5));
        assert_eq!(delta.get(1), None);
        let leverage = df.column("leverage").unwrap().f64().unwrap();
        assert_eq!(leverage.get(2), None);

        assert!(enriched_frame(&rows, &greeks[..2]).is_err());
    }

    #[test]
    fn monthly_frame_keeps_order_and_nulls_undefined() {
        let monthly = vec![
            MonthlyRatio {
                month: YearMonth { year: 2024, month: 7 },
                call_volume: 10,
                put_volume: 0,
                ratio: Ratio::Undefined,
            },
            MonthlyRatio {
                month: YearMonth { year: 2024, month: 8 },
                call_volume: 10,
                put_volume: 20,
                ratio: Ratio::Defined(0.5),
            },
        ];
        let df = monthly_frame(&monthly).unwrap();
        let months = df.column("month").unwrap().utf8().unwrap();
        assert_eq!(months.get(0), Some("2024-07"));
        let ratios = df.column("call_put_ratio").unwrap().f64().unwrap();
        assert_eq!(ratios.get(0), None);
        assert_eq!(ratios.get(1), Some(0.5));
    }
}
