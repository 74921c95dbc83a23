//! Currency registry and amount formatting
//!
//! A closed set of display currencies. Amounts are never converted between
//! currencies; the preferred currency only changes how totals are rendered.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Supported display currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyCode {
    /// Costa Rican colón
    #[default]
    Crc,
    Usd,
    Eur,
    Mxn,
    Ars,
    Clp,
    Cop,
    Pen,
    Brl,
    Gbp,
    Cad,
    Jpy,
}

impl CurrencyCode {
    pub const ALL: [CurrencyCode; 12] = [
        Self::Crc,
        Self::Usd,
        Self::Eur,
        Self::Mxn,
        Self::Ars,
        Self::Clp,
        Self::Cop,
        Self::Pen,
        Self::Brl,
        Self::Gbp,
        Self::Cad,
        Self::Jpy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crc => "CRC",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Mxn => "MXN",
            Self::Ars => "ARS",
            Self::Clp => "CLP",
            Self::Cop => "COP",
            Self::Pen => "PEN",
            Self::Brl => "BRL",
            Self::Gbp => "GBP",
            Self::Cad => "CAD",
            Self::Jpy => "JPY",
        }
    }

    /// Display metadata for this currency
    pub fn info(&self) -> CurrencyInfo {
        let (symbol, name, locale) = match self {
            Self::Crc => ("₡", "Costa Rican Colón", "es-CR"),
            Self::Usd => ("$", "US Dollar", "en-US"),
            Self::Eur => ("€", "Euro", "es-ES"),
            Self::Mxn => ("$", "Mexican Peso", "es-MX"),
            Self::Ars => ("$", "Argentine Peso", "es-AR"),
            Self::Clp => ("$", "Chilean Peso", "es-CL"),
            Self::Cop => ("$", "Colombian Peso", "es-CO"),
            Self::Pen => ("S/", "Peruvian Sol", "es-PE"),
            Self::Brl => ("R$", "Brazilian Real", "pt-BR"),
            Self::Gbp => ("£", "British Pound", "en-GB"),
            Self::Cad => ("CA$", "Canadian Dollar", "en-CA"),
            Self::Jpy => ("¥", "Japanese Yen", "ja-JP"),
        };
        CurrencyInfo {
            code: *self,
            symbol,
            name,
            locale,
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == upper)
            .ok_or_else(|| Error::validation("currency", format!("Unknown currency: {}", s)))
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Display metadata for a currency
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyInfo {
    pub code: CurrencyCode,
    pub symbol: &'static str,
    pub name: &'static str,
    pub locale: &'static str,
}

/// All registered currencies, in registry order
pub fn list_currencies() -> Vec<CurrencyInfo> {
    CurrencyCode::ALL.iter().map(|c| c.info()).collect()
}

/// Number layout for a locale
struct LocaleFormat {
    group: &'static str,
    decimal: char,
    /// Text placed between symbol and number
    spacing: &'static str,
    symbol_after: bool,
}

fn layout(
    group: &'static str,
    decimal: char,
    spacing: &'static str,
    symbol_after: bool,
) -> LocaleFormat {
    LocaleFormat {
        group,
        decimal,
        spacing,
        symbol_after,
    }
}

fn locale_format(locale: &str) -> Option<LocaleFormat> {
    match locale {
        "en-US" | "en-GB" | "en-CA" | "es-MX" => Some(layout(",", '.', "", false)),
        "es-PE" => Some(layout(",", '.', " ", false)),
        "es-CR" => Some(layout("\u{a0}", ',', "", false)),
        "es-CL" => Some(layout(".", ',', "", false)),
        "es-AR" | "es-CO" | "pt-BR" => Some(layout(".", ',', "\u{a0}", false)),
        "es-ES" => Some(layout(".", ',', "\u{a0}", true)),
        _ => None,
    }
}

/// Render an amount as a localized currency string with two fractional digits
///
/// Locales without a formatting rule fall back to `<symbol><plain decimal>`.
pub fn format_amount(value: Decimal, code: CurrencyCode) -> String {
    let info = code.info();
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let plain = format!("{:.2}", rounded.abs());

    let Some(rule) = locale_format(info.locale) else {
        return format!("{}{}{}", sign, info.symbol, plain);
    };

    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));
    let number = format!(
        "{}{}{}",
        group_digits(int_part, rule.group),
        rule.decimal,
        frac_part
    );

    if rule.symbol_after {
        format!("{}{}{}{}", sign, number, rule.spacing, info.symbol)
    } else {
        format!("{}{}{}{}", sign, info.symbol, rule.spacing, number)
    }
}

fn group_digits(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

/// Parse a currency code, rejecting anything outside the registry
pub fn parse_currency(code: &str) -> Result<CurrencyCode> {
    code.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_registry_has_twelve_codes() {
        let all = list_currencies();
        assert_eq!(all.len(), 12);
        assert_eq!(all[0].code, CurrencyCode::Crc);
        assert_eq!(CurrencyCode::default(), CurrencyCode::Crc);
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("USD").unwrap(), CurrencyCode::Usd);
        assert_eq!(parse_currency("eur").unwrap(), CurrencyCode::Eur);
        let err = parse_currency("XXX").unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "currency"));
    }

    #[test]
    fn test_serde_uses_codes() {
        let json = serde_json::to_string(&CurrencyCode::Brl).unwrap();
        assert_eq!(json, "\"BRL\"");
        let code: CurrencyCode = serde_json::from_str("\"GBP\"").unwrap();
        assert_eq!(code, CurrencyCode::Gbp);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_amount(dec("1234.5"), CurrencyCode::Usd), "$1,234.50");
        assert_eq!(format_amount(dec("0"), CurrencyCode::Usd), "$0.00");
        assert_eq!(format_amount(dec("-549.5"), CurrencyCode::Usd), "-$549.50");
        assert_eq!(
            format_amount(dec("1234567.891"), CurrencyCode::Usd),
            "$1,234,567.89"
        );
    }

    #[test]
    fn test_format_european_layouts() {
        assert_eq!(
            format_amount(dec("1234.56"), CurrencyCode::Eur),
            "1.234,56\u{a0}€"
        );
        assert_eq!(
            format_amount(dec("1234.56"), CurrencyCode::Brl),
            "R$\u{a0}1.234,56"
        );
        assert_eq!(
            format_amount(dec("1000000"), CurrencyCode::Crc),
            "₡1\u{a0}000\u{a0}000,00"
        );
    }

    #[test]
    fn test_format_rounds_half_away_from_zero() {
        assert_eq!(format_amount(dec("2.005"), CurrencyCode::Gbp), "£2.01");
        assert_eq!(format_amount(dec("-2.005"), CurrencyCode::Gbp), "-£2.01");
    }

    #[test]
    fn test_format_falls_back_without_locale_rule() {
        assert_eq!(format_amount(dec("1234.5"), CurrencyCode::Jpy), "¥1234.50");
    }

    #[test]
    fn test_group_digits() {
        assert_eq!(group_digits("1", ","), "1");
        assert_eq!(group_digits("123", ","), "123");
        assert_eq!(group_digits("1234", ","), "1,234");
        assert_eq!(group_digits("123456", ","), "123,456");
    }
}
