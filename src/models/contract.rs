//! Contract identifier decoding
//!
//! Identifiers follow the OCC layout used by the chain providers:
//! `<TICKER><YYMMDD><C|P><strike x 1000, 8 digits>`, e.g. `AAPL250530C00145000`.

use crate::error::{OptionsError, Result};
use crate::models::option::{OptionContract, OptionType};
use chrono::NaiveDate;
use tracing::trace;

const DATE_LEN: usize = 6;
const STRIKE_LEN: usize = 8;

/// Decoded structural fields of a contract identifier
#[derive(Debug, Clone, PartialEq)]
pub struct ContractSymbol {
    pub underlying: String,
    pub expiration: NaiveDate,
    pub option_type: OptionType,
    pub strike: f64,
}

impl ContractSymbol {
    /// Decode `identifier`, which must start with `ticker`.
    pub fn parse(identifier: &str, ticker: &str) -> Result<Self> {
        trace!("Decoding contract identifier {} for {}", identifier, ticker);

        let decode_err = |reason: String| OptionsError::ContractDecode {
            identifier: identifier.to_string(),
            reason,
        };

        if ticker.is_empty() {
            return Err(decode_err("empty ticker".to_string()));
        }

        let rest = identifier
            .strip_prefix(ticker)
            .ok_or_else(|| decode_err(format!("does not start with ticker '{}'", ticker)))?;

        if rest.len() != DATE_LEN + 1 + STRIKE_LEN || !rest.is_ascii() {
            return Err(decode_err(format!(
                "expected {} characters after the ticker, found '{}'",
                DATE_LEN + 1 + STRIKE_LEN,
                rest
            )));
        }

        let date_str = &rest[..DATE_LEN];
        let type_char = rest.as_bytes()[DATE_LEN] as char;
        let strike_str = &rest[DATE_LEN + 1..];

        let option_type = OptionType::from_code(type_char).ok_or_else(|| {
            decode_err(format!("type character '{}' is neither C nor P", type_char))
        })?;

        if !date_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(decode_err(format!("malformed date field '{}'", date_str)));
        }
        let expiration = NaiveDate::parse_from_str(&format!("20{}", date_str), "%Y%m%d")
            .map_err(|e| decode_err(format!("invalid date field '{}': {}", date_str, e)))?;

        if !strike_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(decode_err(format!("malformed strike field '{}'", strike_str)));
        }
        let strike = strike_str
            .parse::<u64>()
            .map_err(|e| decode_err(format!("invalid strike field '{}': {}", strike_str, e)))?
            as f64
            / 1000.0;

        Ok(Self {
            underlying: ticker.to_string(),
            expiration,
            option_type,
            strike,
        })
    }

    pub fn into_contract(self) -> OptionContract {
        OptionContract::new(self.underlying, self.option_type, self.strike, self.expiration)
    }
}

/// Decode the option kind of `identifier`, validating its layout against `ticker`.
pub fn classify_contract(identifier: &str, ticker: &str) -> Result<OptionType> {
    ContractSymbol::parse(identifier, ticker).map(|symbol| symbol.option_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_calls_and_puts() {
        assert_eq!(
            classify_contract("AAPL250530C00145000", "AAPL").unwrap(),
            OptionType::Call
        );
        assert_eq!(
            classify_contract("AAPL250530P00145000", "AAPL").unwrap(),
            OptionType::Put
        );
        assert_eq!(classify_contract("V241220P00270000", "V").unwrap(), OptionType::Put);
    }

    #[test]
    fn parse_decodes_all_fields() {
        let symbol = ContractSymbol::parse("META260116C00612500", "META").unwrap();
        assert_eq!(symbol.underlying, "META");
        assert_eq!(symbol.expiration, NaiveDate::from_ymd_opt(2026, 1, 16).unwrap());
        assert_eq!(symbol.option_type, OptionType::Call);
        assert_eq!(symbol.strike, 612.5);
        assert_eq!(symbol.into_contract().occ_symbol(), "META260116C00612500");
    }

    #[test]
    fn rejects_wrong_type_character() {
        let err = classify_contract("AAPL250530X00145000", "AAPL").unwrap_err();
        assert!(matches!(err, OptionsError::ContractDecode { .. }));
    }

    #[test]
    fn rejects_missing_ticker_prefix() {
        assert!(classify_contract("MSFT250530C00145000", "AAPL").is_err());
        assert!(classify_contract("AAPL250530C00145000", "").is_err());
    }

    #[test]
    fn rejects_malformed_layout() {
        // type character shifted by a short date field
        assert!(classify_contract("AAPL25053C00145000", "AAPL").is_err());
        // non-digit date
        assert!(classify_contract("AAPL25O530C00145000", "AAPL").is_err());
        // impossible calendar date
        assert!(classify_contract("AAPL251332C00145000", "AAPL").is_err());
        // short strike
        assert!(classify_contract("AAPL250530C0014500", "AAPL").is_err());
    }
}
