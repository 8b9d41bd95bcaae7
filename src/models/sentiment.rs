//! Call/put volume sentiment.

use crate::models::option::{CanonicalOptionRow, OptionType};
use crate::models::ratio::Ratio;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const BULLISH_ABOVE: f64 = 1.2;
const BEARISH_BELOW: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    Bullish,
    Neutral,
    Bearish,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Bullish => write!(f, "Bullish"),
            Sentiment::Neutral => write!(f, "Neutral"),
            Sentiment::Bearish => write!(f, "Bearish"),
        }
    }
}

/// Aggregate call/put volume over a whole table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentSnapshot {
    pub total_calls: u64,
    pub total_puts: u64,
    pub ratio: Ratio,
}

impl SentimentSnapshot {
    pub fn sentiment(&self) -> Sentiment {
        classify_sentiment(self.ratio)
    }
}

/// Calendar month of an expiration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRatio {
    pub month: YearMonth,
    pub call_volume: u64,
    pub put_volume: u64,
    pub ratio: Ratio,
}

/// Per-expiration-month ratios in chronological order
pub type MonthlySentiment = Vec<MonthlyRatio>;

fn volume_totals<'a>(rows: impl IntoIterator<Item = &'a CanonicalOptionRow>) -> (u64, u64) {
    rows.into_iter()
        .fold((0u64, 0u64), |(calls, puts), row| match row.option_type {
            OptionType::Call => (calls + row.volume, puts),
            OptionType::Put => (calls, puts + row.volume),
        })
}

/// Total call and put volume and their ratio
pub fn aggregate(rows: &[CanonicalOptionRow]) -> SentimentSnapshot {
    let (total_calls, total_puts) = volume_totals(rows);
    SentimentSnapshot {
        total_calls,
        total_puts,
        ratio: Ratio::of(total_calls as f64, total_puts as f64),
    }
}

/// Call/put ratio per calendar month of expiration
pub fn monthly(rows: &[CanonicalOptionRow]) -> MonthlySentiment {
    let mut by_month: BTreeMap<YearMonth, Vec<&CanonicalOptionRow>> = BTreeMap::new();
    for row in rows {
        by_month.entry(YearMonth::of(row.expiration)).or_default().push(row);
    }

    by_month
        .into_iter()
        .map(|(month, rows)| {
            let (call_volume, put_volume) = volume_totals(rows);
            MonthlyRatio {
                month,
                call_volume,
                put_volume,
                ratio: Ratio::of(call_volume as f64, put_volume as f64),
            }
        })
        .collect()
}

/// Bullish above 1.2, bearish below 0.8; an undefined ratio reads as neutral
pub fn classify_sentiment(ratio: Ratio) -> Sentiment {
    match ratio {
        Ratio::Defined(r) if r > BULLISH_ABOVE => Sentiment::Bullish,
        Ratio::Defined(r) if r < BEARISH_BELOW => Sentiment::Bearish,
        _ => Sentiment::Neutral,
    }
}
