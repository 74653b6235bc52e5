//! Conversion between delimited keys and path segments.
//!
//! A key such as `database:host` addresses the nested value
//! `{ "database": { "host": ... } }`. The delimiter is configurable per
//! provider; [`key`] always joins with `:`.

/// Default logical separator between key segments.
pub const DEFAULT_SEPARATOR: &str = ":";

/// Split `key` into path segments.
///
/// `None` addresses the root and yields no segments. The empty string is
/// a literal single-segment key and yields `[""]`.
pub fn path(key: Option<&str>, separator: &str) -> Vec<String> {
    match key {
        None => Vec::new(),
        Some(key) if separator.is_empty() => vec![key.to_string()],
        Some(key) => key.split(separator).map(str::to_string).collect(),
    }
}

/// Join segments with `:`.
///
/// The delimiter is fixed regardless of any provider separator.
pub fn key<S: AsRef<str>>(segments: &[S]) -> String {
    join(segments, DEFAULT_SEPARATOR)
}

/// Join segments with an explicit separator.
pub fn join<S: AsRef<str>>(segments: &[S], separator: &str) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(separator)
}
