use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Option kind. Declaration order is the canonical sort order: calls before puts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Type character used in contract identifiers
    pub fn code(&self) -> char {
        match self {
            OptionType::Call => 'C',
            OptionType::Put => 'P',
        }
    }

    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'C' => Some(OptionType::Call),
            'P' => Some(OptionType::Put),
            _ => None,
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "Call"),
            OptionType::Put => write!(f, "Put"),
        }
    }
}

/// Structural description of a listed contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiration: NaiveDate,
}

impl OptionContract {
    pub fn new(
        underlying: impl Into<String>,
        option_type: OptionType,
        strike: f64,
        expiration: NaiveDate,
    ) -> Self {
        Self {
            underlying: underlying.into(),
            option_type,
            strike,
            expiration,
        }
    }

    /// format: Symbol + YY + MM + DD + C/P + Strike
    /// e.g. AAPL210115C00125000
    pub fn occ_symbol(&self) -> String {
        let strike_str = format!("{:08}", (self.strike * 1000.0).round() as u64);
        let date_str = self.expiration.format("%y%m%d").to_string();
        format!(
            "{}{}{}{}",
            self.underlying,
            date_str,
            self.option_type.code(),
            strike_str
        )
    }
}

/// One contract row as delivered by the chain source.
///
/// Field names follow the provider's camelCase JSON so batches deserialize
/// without an intermediate type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContractRecord {
    pub contract_symbol: String,
    pub strike: f64,
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default)]
    pub implied_volatility: Option<f64>,
    #[serde(default)]
    pub volume: Option<u64>,
    #[serde(default)]
    pub open_interest: Option<u64>,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub percent_change: Option<f64>,
    #[serde(default)]
    pub in_the_money: Option<bool>,
    /// Unix seconds
    #[serde(default)]
    pub last_trade_date: Option<i64>,
}

impl RawContractRecord {
    pub fn new(contract_symbol: impl Into<String>, strike: f64) -> Self {
        Self {
            contract_symbol: contract_symbol.into(),
            strike,
            ..Default::default()
        }
    }

    pub fn with_last_price(mut self, last_price: f64) -> Self {
        self.last_price = Some(last_price);
        self
    }

    pub fn with_implied_volatility(mut self, iv: f64) -> Self {
        self.implied_volatility = Some(iv);
        self
    }

    pub fn with_volume(mut self, volume: u64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_open_interest(mut self, open_interest: u64) -> Self {
        self.open_interest = Some(open_interest);
        self
    }
}

/// Calls and puts for a single expiration date, as returned per chain request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpirationBatch {
    pub expiration: NaiveDate,
    pub calls: Vec<RawContractRecord>,
    pub puts: Vec<RawContractRecord>,
}

impl ExpirationBatch {
    pub fn new(
        expiration: NaiveDate,
        calls: Vec<RawContractRecord>,
        puts: Vec<RawContractRecord>,
    ) -> Self {
        Self {
            expiration,
            calls,
            puts,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len() + self.puts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}

/// Normalized chain row. Built once by the chain normalizer and never mutated;
/// derived analytics live in separate, positionally keyed tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalOptionRow {
    pub contract_symbol: String,
    pub strike: f64,
    pub last_price: Option<f64>,
    pub implied_volatility: Option<f64>,
    pub volume: u64,
    pub open_interest: Option<u64>,
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub change: Option<f64>,
    pub percent_change: Option<f64>,
    pub in_the_money: Option<bool>,
    pub last_trade_date: Option<i64>,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    /// Years, calendar days / 365
    pub time_to_expiration: f64,
}

impl CanonicalOptionRow {
    pub fn is_call(&self) -> bool {
        self.option_type == OptionType::Call
    }

    pub fn is_put(&self) -> bool {
        self.option_type == OptionType::Put
    }

    pub fn mid_price(&self) -> Option<f64> {
        match (self.bid, self.ask) {
            (Some(bid), Some(ask)) if bid > 0.0 && ask > 0.0 => Some((bid + ask) / 2.0),
            _ => None,
        }
    }
}
