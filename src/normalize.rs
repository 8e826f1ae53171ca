// 🧹 Normalization - city keys, headers, numeric text
// Every source goes through the same functions so join keys line up.

/// Suffix tokens stripped from the end of a city name ("Springfield city")
const CITY_SUFFIXES: [&str; 2] = ["city", "town"];

/// Normalize a city name into a join key.
///
/// Lowercases, trims, then strips trailing whitespace-separated "city"/"town"
/// tokens until none remain. The loop makes the function idempotent:
/// "Foo City Town" and "foo city" both land on "foo".
///
/// A suffix only counts when whitespace precedes it, so "Elizabethtown"
/// and "Town" stay as they are.
pub fn normalize_city(raw: &str) -> String {
    let mut key = raw.trim().to_lowercase();

    loop {
        let stripped = strip_suffix_token(&key);
        match stripped {
            Some(rest) => key = rest.trim_end().to_string(),
            None => break,
        }
    }

    key.trim().to_string()
}

fn strip_suffix_token(key: &str) -> Option<&str> {
    for suffix in CITY_SUFFIXES {
        if let Some(rest) = key.strip_suffix(suffix) {
            if rest.ends_with(char::is_whitespace) && !rest.trim().is_empty() {
                return Some(rest);
            }
        }
    }
    None
}

/// Lowercase + trim a column header ("Median Income " -> "median income")
pub fn normalize_header(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Decode ISO-8859-1 bytes. Every byte maps to the code point of the same
/// value, so decoding can never fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Parse trimmed text as a finite number.
///
/// Returns None for empty text, non-numeric text, NaN and infinities.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a share value that may carry thousands separators ("1,234")
/// or embedded whitespace.
pub fn coerce_separated_numeric(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    coerce_numeric(&cleaned)
}
