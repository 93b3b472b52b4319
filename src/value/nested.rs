// Nested-object decoding support.
//
// `flatten` routes `addr.street`-style columns into a sub-record; `json`
// reads a field as an embedded JSON document; `codable` is `json` with a
// pluggable codec.

use crate::error::{Error, Result};
use crate::record::RowMap;

/// Codec seam for the `codable` strategy. The engine hands it the raw field
/// text and consumes a JSON value.
pub trait NestedCodec: Send + Sync {
    fn decode_value(&self, raw: &str) -> Result<serde_json::Value>;
    fn encode_value(&self, value: &serde_json::Value) -> Result<String>;
}

/// Default codec: serde_json.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl NestedCodec for JsonCodec {
    fn decode_value(&self, raw: &str) -> Result<serde_json::Value> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidValue {
            message: format!("embedded JSON is malformed: {e}"),
        })
    }

    fn encode_value(&self, value: &serde_json::Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::InvalidValue {
            message: format!("cannot serialize embedded JSON: {e}"),
        })
    }
}

/// Collect `key<sep>suffix` columns into a sub-map keyed by suffix,
/// preserving column order.
pub fn flatten_sub_map(map: &RowMap, key: &str, separator: &str) -> RowMap {
    let mut prefix = String::with_capacity(key.len() + separator.len());
    prefix.push_str(key);
    prefix.push_str(separator);

    let mut sub = RowMap::new();
    for (name, value) in map.iter() {
        if let Some(suffix) = name.strip_prefix(&prefix) {
            if !suffix.is_empty() {
                sub.insert(suffix.to_string(), value.clone());
            }
        }
    }
    sub
}
