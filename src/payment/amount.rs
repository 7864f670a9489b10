use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::{LawdeskError, Result};

/// Round a money value to cents, midpoint away from zero.
pub fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Parse a money amount typed by the user.
///
/// Accepts Brazilian formatting ("1.234,56", "R$ 1.234,56") and plain
/// decimals ("1234.56"). When a comma is present the dots are thousands
/// separators.
pub fn parse_amount(input: &str) -> Result<Decimal> {
    let cleaned: String = input
        .trim()
        .trim_start_matches("R$")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else {
        cleaned
    };

    if normalized.is_empty() {
        return Err(LawdeskError::InvalidAmountFormat(input.to_string()));
    }

    Decimal::from_str(&normalized)
        .map(round_cents)
        .map_err(|_| LawdeskError::InvalidAmountFormat(input.to_string()))
}

/// Format a money amount as "R$ 1.234,56".
pub fn format_brl(symbol: &str, value: Decimal) -> String {
    let rounded = format!("{:.2}", round_cents(value));
    let (whole, frac) = rounded.split_once('.').unwrap_or((&rounded, "00"));
    let negative = whole.starts_with('-');
    let digits = whole.trim_start_matches('-');

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!(
        "{}{}{},{}",
        if negative { "-" } else { "" },
        symbol,
        grouped,
        frac
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_brazilian_format() {
        assert_eq!(parse_amount("1.234,56").unwrap(), Decimal::new(123456, 2));
        assert_eq!(parse_amount("R$ 1.200,00").unwrap(), Decimal::new(1200, 0));
        assert_eq!(parse_amount("0,5").unwrap(), Decimal::new(50, 2));
    }

    #[test]
    fn parses_plain_decimal() {
        assert_eq!(parse_amount("1234.56").unwrap(), Decimal::new(123456, 2));
        assert_eq!(parse_amount("500").unwrap(), Decimal::new(500, 0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_amount("abc"),
            Err(LawdeskError::InvalidAmountFormat(_))
        ));
        assert!(parse_amount("").is_err());
        assert!(parse_amount("R$").is_err());
    }

    #[test]
    fn rounds_to_cents() {
        assert_eq!(round_cents(Decimal::new(4005, 3)), Decimal::new(401, 2));
        assert_eq!(round_cents(Decimal::new(-4005, 3)), Decimal::new(-401, 2));
    }

    #[test]
    fn formats_with_grouping() {
        assert_eq!(format_brl("R$ ", Decimal::new(123456789, 2)), "R$ 1.234.567,89");
        assert_eq!(format_brl("R$ ", Decimal::new(400, 0)), "R$ 400,00");
        assert_eq!(format_brl("R$ ", Decimal::new(-150, 1)), "-R$ 15,00");
    }
}
