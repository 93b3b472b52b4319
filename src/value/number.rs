// Number decoding strategies.
//
// The flexible path canonicalizes the raw text to a C-locale string and
// parses that, so integer and fixed-precision callers keep full precision
// instead of routing through a double:
//   1. strip currency symbols/codes and unit suffixes,
//   2. detect the decimal separator from the last '.' or ',',
//   3. remove the grouping separator,
//   4. parse the canonical form.
//
// Separator detection: when both '.' and ',' appear, the right-most is the
// decimal; with a single kind, one occurrence is the decimal and repeated
// occurrences are grouping (`1,234,567` cannot be two decimal points).

use std::str::FromStr;

use crate::config::{Config, NumberDecodingStrategy};
use crate::error::{Error, Location, Result};
use crate::value::locale::{locale_separators, LocaleOps};

/// Decode a float per the configured strategy.
pub fn decode_f64(raw: &str, config: &Config, location: &Location) -> Result<f64> {
    let parsed = match &config.number_decoding {
        NumberDecodingStrategy::Standard => raw.trim().parse::<f64>().ok(),
        NumberDecodingStrategy::Flexible => {
            canonicalize_flexible(raw, config.locale_ops.as_ref())
                .and_then(|c| c.parse::<f64>().ok())
        }
        NumberDecodingStrategy::Locale(locale) => {
            canonicalize_locale(raw, locale).and_then(|c| c.parse::<f64>().ok())
        }
        NumberDecodingStrategy::ParseStrategy(locale) => {
            config.locale_ops.parse_number(raw, locale)
        }
        NumberDecodingStrategy::Currency { code, locale } => {
            let stripped = strip_currency(raw, code.as_deref(), config.locale_ops.as_ref());
            let canonical = match locale {
                Some(l) => canonicalize_locale(&stripped, l),
                None => canonicalize_flexible(&stripped, config.locale_ops.as_ref()),
            };
            canonical.and_then(|c| c.parse::<f64>().ok())
        }
    };

    parsed.ok_or_else(|| Error::type_mismatch("number", raw, location.clone()))
}

/// Decode an integer. Flexible/locale strategies strip decoration and
/// grouping, then parse the canonical digits directly (no float round-trip).
pub fn decode_int<T>(raw: &str, config: &Config, location: &Location) -> Result<T>
where
    T: FromStr,
{
    let canonical: Option<String> = match &config.number_decoding {
        NumberDecodingStrategy::Standard => Some(raw.trim().to_string()),
        NumberDecodingStrategy::Locale(locale) => canonicalize_locale(raw, locale),
        NumberDecodingStrategy::ParseStrategy(locale) => config
            .locale_ops
            .parse_number(raw, locale)
            .and_then(|v| if v.fract() == 0.0 { Some(format!("{v:.0}")) } else { None }),
        NumberDecodingStrategy::Flexible | NumberDecodingStrategy::Currency { .. } => {
            let stripped = if let NumberDecodingStrategy::Currency { code, .. } =
                &config.number_decoding
            {
                strip_currency(raw, code.as_deref(), config.locale_ops.as_ref())
            } else {
                raw.to_string()
            };
            canonicalize_flexible(&stripped, config.locale_ops.as_ref())
        }
    };

    canonical
        .and_then(|c| c.parse::<T>().ok())
        .ok_or_else(|| Error::type_mismatch("integer", raw, location.clone()))
}

/// Strip currency decoration and unit suffixes from both ends.
fn strip_currency(raw: &str, code: Option<&str>, ops: &dyn LocaleOps) -> String {
    let mut s = raw.trim();
    loop {
        let before = s;
        s = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{a0}' || c == '\u{202f}');
        if let Some(code) = code {
            s = strip_code_prefix(s, code);
            s = strip_code_suffix(s, code);
        }
        for sym in ops.currency_symbols() {
            if let Some(rest) = s.strip_prefix(sym) {
                s = rest;
            }
            if let Some(rest) = s.strip_suffix(sym) {
                s = rest;
            }
        }
        if s == before {
            break;
        }
    }
    s.to_string()
}

fn strip_code_prefix<'a>(s: &'a str, code: &str) -> &'a str {
    if s.len() >= code.len()
        && s.is_char_boundary(code.len())
        && s[..code.len()].eq_ignore_ascii_case(code)
    {
        &s[code.len()..]
    } else {
        s
    }
}

fn strip_code_suffix<'a>(s: &'a str, code: &str) -> &'a str {
    let cut = s.len().wrapping_sub(code.len());
    if s.len() >= code.len() && s.is_char_boundary(cut) && s[cut..].eq_ignore_ascii_case(code) {
        &s[..cut]
    } else {
        s
    }
}

/// Canonicalize using a known locale's separator pair.
fn canonicalize_locale(raw: &str, locale: &str) -> Option<String> {
    let (decimal, grouping) = locale_separators(locale);
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            c if c == grouping => {}
            ' ' | '\u{a0}' | '\u{202f}' => {}
            c if c == decimal => out.push('.'),
            c => out.push(c),
        }
    }
    Some(out)
}

/// Canonicalize with auto-detected separators. Returns None when the value
/// is clearly not numeric.
pub fn canonicalize_flexible(raw: &str, ops: &dyn LocaleOps) -> Option<String> {
    let stripped = strip_currency(raw, None, ops);
    let mut s = stripped.trim();

    // Unit suffix: a trailing run of alphabetic chars or '%' ("12.5 kg",
    // "80%"). Exponent digits keep "1e5" intact.
    s = s.trim_end_matches('%').trim_end();
    let unit_start = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphabetic())
        .map(|(i, _)| i)
        .last();
    if let Some(start) = unit_start {
        // Never strip a lone exponent marker glued to digits ("1e5").
        let suffix = &s[start..];
        if !(suffix.len() == 1 && (suffix == "e" || suffix == "E")) {
            s = s[..start].trim_end();
        }
    }
    if s.is_empty() {
        return None;
    }

    // Drop grouping spaces before separator detection.
    let compact: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}'))
        .collect();

    let last_dot = compact.rfind('.');
    let last_comma = compact.rfind(',');

    let (decimal, grouping): (Option<char>, Option<char>) = match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            if d > c {
                (Some('.'), Some(','))
            } else {
                (Some(','), Some('.'))
            }
        }
        (Some(_), None) => {
            if compact.matches('.').count() == 1 {
                (Some('.'), None)
            } else {
                (None, Some('.'))
            }
        }
        (None, Some(_)) => {
            if compact.matches(',').count() == 1 {
                (Some(','), None)
            } else {
                (None, Some(','))
            }
        }
        (None, None) => (None, None),
    };

    let mut out = String::with_capacity(compact.len());
    for c in compact.chars() {
        if Some(c) == grouping {
            continue;
        }
        if Some(c) == decimal {
            out.push('.');
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::locale::DefaultLocaleOps;

    fn f64_flex(raw: &str) -> f64 {
        let config = Config::new().number_decoding(NumberDecodingStrategy::Flexible);
        decode_f64(raw, &config, &Location::row(1)).unwrap()
    }

    #[test]
    fn test_flexible_spec_scenarios() {
        assert_eq!(f64_flex("$1,234.56"), 1234.56);
        assert_eq!(f64_flex("1.234,56"), 1234.56);
        assert_eq!(f64_flex("1234.56"), 1234.56);
        assert_eq!(f64_flex("\u{20ac} 45,00"), 45.0);
    }

    #[test]
    fn test_flexible_units_and_percent() {
        assert_eq!(f64_flex("12.5 kg"), 12.5);
        assert_eq!(f64_flex("80%"), 80.0);
        assert_eq!(f64_flex("1e5"), 1e5);
    }

    #[test]
    fn test_flexible_repeated_grouping() {
        assert_eq!(f64_flex("1,234,567"), 1234567.0);
        assert_eq!(f64_flex("1.234.567,89"), 1234567.89);
    }

    #[test]
    fn test_standard_rejects_decorated() {
        let config = Config::new();
        assert!(decode_f64("$5", &config, &Location::row(1)).is_err());
        assert_eq!(decode_f64("5.5", &config, &Location::row(1)).unwrap(), 5.5);
    }

    #[test]
    fn test_locale_strategy() {
        let config =
            Config::new().number_decoding(NumberDecodingStrategy::Locale("de_DE".to_string()));
        assert_eq!(
            decode_f64("1.234,5", &config, &Location::row(1)).unwrap(),
            1234.5
        );
    }

    #[test]
    fn test_currency_strategy_with_code() {
        let config = Config::new().number_decoding(NumberDecodingStrategy::Currency {
            code: Some("SEK".to_string()),
            locale: None,
        });
        assert_eq!(
            decode_f64("SEK 1,250.75", &config, &Location::row(1)).unwrap(),
            1250.75
        );
    }

    #[test]
    fn test_decode_int_keeps_precision() {
        let config = Config::new().number_decoding(NumberDecodingStrategy::Flexible);
        // A value too precise for f64 still decodes exactly as i64.
        let v: i64 = decode_int("9,007,199,254,740,993", &config, &Location::row(1)).unwrap();
        assert_eq!(v, 9_007_199_254_740_993);
    }

    #[test]
    fn test_decode_int_rejects_fractions() {
        let config = Config::new().number_decoding(NumberDecodingStrategy::Flexible);
        let r: Result<i64> = decode_int("12.5", &config, &Location::row(1));
        assert!(r.is_err());
    }

    #[test]
    fn test_canonicalize_rejects_empty() {
        assert_eq!(canonicalize_flexible("   ", &DefaultLocaleOps), None);
        assert_eq!(canonicalize_flexible("$", &DefaultLocaleOps), None);
    }

    #[test]
    fn test_type_mismatch_location() {
        let config = Config::new();
        let err = decode_f64("abc", &config, &Location::row(7).with_column("price"));
        match err {
            Err(Error::TypeMismatch { location, .. }) => {
                assert_eq!(location.row, 7);
                assert_eq!(location.column.as_deref(), Some("price"));
            }
            other => panic!("expected TypeMismatch, got {other:?}"),
        }
    }
}
