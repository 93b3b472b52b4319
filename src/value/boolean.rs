// Bool decoding strategies.

use crate::config::{BoolDecodingStrategy, Config};
use crate::error::{Error, Location, Result};

const STANDARD_TRUE: &[&str] = &["true", "yes", "1"];
const STANDARD_FALSE: &[&str] = &["false", "no", "0"];

// Multilingual additions for the flexible strategy.
const FLEXIBLE_TRUE: &[&str] = &[
    "t", "y", "on", "oui", "ja", "si", "s\u{ed}", "da", "\u{434}\u{430}", "\u{662f}", "hai",
];
const FLEXIBLE_FALSE: &[&str] = &[
    "f", "n", "off", "non", "nein", "no", "net", "\u{43d}\u{435}\u{442}", "\u{5426}", "iie",
];

pub fn decode_bool(raw: &str, config: &Config, location: &Location) -> Result<bool> {
    let value = raw.trim();
    let lowered = value.to_lowercase();

    let result = match &config.bool_decoding {
        BoolDecodingStrategy::Standard => {
            in_set(&lowered, STANDARD_TRUE, STANDARD_FALSE)
        }
        BoolDecodingStrategy::Flexible => in_set(&lowered, STANDARD_TRUE, STANDARD_FALSE)
            .or_else(|| in_set(&lowered, FLEXIBLE_TRUE, FLEXIBLE_FALSE)),
        BoolDecodingStrategy::Custom {
            true_values,
            false_values,
        } => {
            if true_values.iter().any(|v| v == value) {
                Some(true)
            } else if false_values.iter().any(|v| v == value) {
                Some(false)
            } else {
                None
            }
        }
    };

    result.ok_or_else(|| Error::type_mismatch("bool", raw, location.clone()))
}

fn in_set(lowered: &str, truths: &[&str], falses: &[&str]) -> Option<bool> {
    if truths.contains(&lowered) {
        Some(true)
    } else if falses.contains(&lowered) {
        Some(false)
    } else {
        None
    }
}
