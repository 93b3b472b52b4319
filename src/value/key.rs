// Header-to-field-name key strategies.
//
// Each strategy converts headers written in a source convention into the
// snake_case names Rust record fields use. `column_mapping` in the config
// bypasses these entirely.

use crate::config::KeyDecodingStrategy;

/// Apply a key strategy to one header cell.
pub fn resolve_key(header: &str, strategy: &KeyDecodingStrategy) -> String {
    match strategy {
        KeyDecodingStrategy::Identity => header.to_string(),
        KeyDecodingStrategy::FromSnakeCase => header.to_lowercase(),
        KeyDecodingStrategy::FromKebabCase => header.to_lowercase().replace('-', "_"),
        KeyDecodingStrategy::FromScreamingSnake => header.to_lowercase(),
        KeyDecodingStrategy::FromPascalCase => pascal_to_snake(header),
        KeyDecodingStrategy::Custom(f) => f(header),
    }
}

/// `UserName` -> `user_name`, `HTTPStatus` -> `http_status`.
fn pascal_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let chars: Vec<char> = s.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if prev_lower || (prev_upper && next_lower) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
