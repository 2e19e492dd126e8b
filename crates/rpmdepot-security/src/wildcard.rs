//! Glob-style host patterns.

use regex::Regex;

/// Convert a wildcard host pattern into an anchored regular expression.
///
/// `*` matches any run of characters, `?` matches exactly one, and every
/// other character matches literally (regex metacharacters are escaped).
/// The result matches the entire input; the empty pattern matches only
/// the empty host name. Conversion is pure.
pub fn wildcard_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expression = String::with_capacity(pattern.len() + 8);
    expression.push('^');
    let mut buf = [0_u8; 4];
    for c in pattern.chars() {
        match c {
            '*' => expression.push_str(".*"),
            '?' => expression.push('.'),
            other => expression.push_str(&regex::escape(other.encode_utf8(&mut buf))),
        }
    }
    expression.push('$');
    Regex::new(&expression)
}
