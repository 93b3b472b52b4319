// Locale capability seam.
//
// Platform locale/date APIs are factored behind this trait so the number and
// date strategies that need locale data (`locale(..)`, `parse_strategy(..)`,
// `locale_aware(..)`, currency symbol stripping) stay testable and
// target-independent. The default implementation is table-driven.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Date rendering styles understood by `locale_aware` date decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    Short,
    Medium,
    Long,
}

/// Locale operations used by the flexible/locale strategies.
pub trait LocaleOps: Send + Sync {
    /// Parse a number formatted for `locale`. Returns None when the value
    /// is not a number in that locale.
    fn parse_number(&self, raw: &str, locale: &str) -> Option<f64>;

    /// Parse a date formatted for `locale` at the given style.
    fn parse_date(&self, raw: &str, locale: &str, style: DateStyle) -> Option<DateTime<Utc>>;

    /// Currency symbols and codes recognized when stripping monetary
    /// decoration from numeric fields.
    fn currency_symbols(&self) -> &[&str];
}

/// Separator conventions for a locale: (decimal, grouping).
pub fn locale_separators(locale: &str) -> (char, char) {
    let lang = locale.split(['_', '-']).next().unwrap_or(locale);
    match lang {
        // Comma-decimal locales.
        "de" | "fr" | "es" | "it" | "pt" | "nl" | "pl" | "ru" | "sv" | "da" | "fi" | "nb"
        | "tr" | "cs" | "el" => (',', '.'),
        // Period-decimal locales.
        _ => ('.', ','),
    }
}

/// Table-driven default: a small set of currency symbols and the common
/// short/medium date shapes per language.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultLocaleOps;

const CURRENCY_SYMBOLS: &[&str] = &[
    "$", "\u{20ac}", "\u{a3}", "\u{a5}", "\u{20b9}", "\u{20a9}", "\u{20bd}", "kr", "CHF", "R$",
    "z\u{142}", "USD", "EUR", "GBP", "JPY", "CAD", "AUD",
];

impl LocaleOps for DefaultLocaleOps {
    fn parse_number(&self, raw: &str, locale: &str) -> Option<f64> {
        let (decimal, grouping) = locale_separators(locale);
        let trimmed = raw.trim();
        let mut canonical = String::with_capacity(trimmed.len());
        for c in trimmed.chars() {
            if c == grouping || c == '\u{a0}' || c == '\u{202f}' || c == ' ' {
                continue;
            }
            if c == decimal {
                canonical.push('.');
            } else {
                canonical.push(c);
            }
        }
        canonical.parse::<f64>().ok()
    }

    fn parse_date(&self, raw: &str, locale: &str, style: DateStyle) -> Option<DateTime<Utc>> {
        let lang = locale.split(['_', '-']).next().unwrap_or(locale);
        let day_first = !matches!(lang, "en" | "us" | "ja" | "zh" | "ko");
        let trimmed = raw.trim();

        let date_formats: &[&str] = match (style, day_first) {
            (DateStyle::Short, false) => &["%m/%d/%y", "%m/%d/%Y"],
            (DateStyle::Short, true) => &["%d/%m/%y", "%d/%m/%Y", "%d.%m.%y", "%d.%m.%Y"],
            (DateStyle::Medium, false) => &["%b %d, %Y", "%m/%d/%Y"],
            (DateStyle::Medium, true) => &["%d %b %Y", "%d.%m.%Y"],
            (DateStyle::Long, false) => &["%B %d, %Y"],
            (DateStyle::Long, true) => &["%d %B %Y"],
        };

        for fmt in date_formats {
            if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
                return naive_midnight(d);
            }
            let with_time = format!("{fmt} %H:%M:%S");
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, &with_time) {
                return Some(dt.and_utc());
            }
        }
        None
    }

    fn currency_symbols(&self) -> &[&str] {
        CURRENCY_SYMBOLS
    }
}

fn naive_midnight(d: NaiveDate) -> Option<DateTime<Utc>> {
    d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locale_separators() {
        assert_eq!(locale_separators("en_US"), ('.', ','));
        assert_eq!(locale_separators("de_DE"), (',', '.'));
        assert_eq!(locale_separators("fr-FR"), (',', '.'));
    }

    #[test]
    fn test_default_parse_number() {
        let ops = DefaultLocaleOps;
        assert_eq!(ops.parse_number("1,234.56", "en_US"), Some(1234.56));
        assert_eq!(ops.parse_number("1.234,56", "de_DE"), Some(1234.56));
        assert_eq!(ops.parse_number("1 234,56", "fr_FR"), Some(1234.56));
        assert_eq!(ops.parse_number("abc", "en_US"), None);
    }

    #[test]
    fn test_default_parse_date_styles() {
        let ops = DefaultLocaleOps;
        let us = ops.parse_date("12/31/2023", "en_US", DateStyle::Short).unwrap();
        assert_eq!(us.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());

        let de = ops.parse_date("31.12.2023", "de_DE", DateStyle::Short).unwrap();
        assert_eq!(de.date_naive(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }
}
