use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::{Error, Result};

/// Format an amount with thousands separators: $1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let cents = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-${with_commas}.{dec_part}")
    } else {
        format!("${with_commas}.{dec_part}")
    }
}

/// Parse a user-entered amount, tolerating `$` and thousands separators.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned = raw.trim().replace([',', '$'], "");
    Decimal::from_str(&cleaned).map_err(|_| Error::InvalidAmount(raw.to_string()))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidDate(format!("expected YYYY-MM-DD, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(raw: &str) -> Decimal {
        raw.parse().unwrap()
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(dec("1234.56")), "$1,234.56");
        assert_eq!(money(dec("-500")), "-$500.00");
        assert_eq!(money(dec("0")), "$0.00");
        assert_eq!(money(dec("1000000.99")), "$1,000,000.99");
        assert_eq!(money(dec("42.1")), "$42.10");
        assert_eq!(money(dec("9.999")), "$10.00");
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,200.50").unwrap(), dec("1200.50"));
        assert_eq!(parse_amount(" 9.99 ").unwrap(), dec("9.99"));
        assert!(matches!(parse_amount("ten"), Err(Error::InvalidAmount(_))));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-06-15").unwrap(), NaiveDate::from_ymd_opt(2024, 6, 15).unwrap());
        assert!(parse_date("06/15/2024").is_err());
    }
}
