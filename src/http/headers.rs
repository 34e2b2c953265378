//! Case-insensitive header list shared by outgoing requests and parsed responses.

use std::fmt;

/// An ordered, multi-value HTTP header list with case-insensitive lookup.
///
/// # Examples
///
/// ```
/// use taxocache::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.append("Transfer-Encoding", "gzip");
/// headers.append("transfer-encoding", "chunked");
///
/// assert_eq!(headers.get("TRANSFER-ENCODING"), Some("gzip"));
/// assert!(headers.is_chunked());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header, keeping any existing values with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replaces every value for `name` with a single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        self.entries.push((name, value.into()));
    }

    /// First value for `name`, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name` in the order they were added.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parsed `Content-Length`, or `None` when absent or not a number.
    pub fn content_length(&self) -> Option<usize> {
        self.get("content-length")?.trim().parse().ok()
    }

    /// Returns `true` when the last transfer coding applied is `chunked`
    /// (RFC 9112 §6.1).
    pub fn is_chunked(&self) -> bool {
        self.values("transfer-encoding")
            .flat_map(|v| v.split(','))
            .map(str::trim)
            .filter(|coding| !coding.is_empty())
            .last()
            .is_some_and(|coding| coding.eq_ignore_ascii_case("chunked"))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.append("Content-Type", "application/json");
        assert_eq!(h.get("content-type"), Some("application/json"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("application/json"));
        assert!(!h.contains("accept"));
    }

    #[test]
    fn value_outlives_lookup_name() {
        let mut h = Headers::new();
        h.append("X-Taxon", "9606");
        let value = {
            let name = String::from("x-taxon");
            h.get(&name)
        };
        assert_eq!(value, Some("9606"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut h = Headers::new();
        h.append("Accept", "text/html");
        h.append("accept", "text/plain");
        h.set("ACCEPT", "application/json");
        assert_eq!(h.values("accept").collect::<Vec<_>>(), vec!["application/json"]);
        assert_eq!(h.len(), 1);
    }

    #[test]
    fn content_length_parsing() {
        let mut h = Headers::new();
        assert_eq!(h.content_length(), None);
        h.append("Content-Length", " 42 ");
        assert_eq!(h.content_length(), Some(42));
        h.set("Content-Length", "nope");
        assert_eq!(h.content_length(), None);
    }

    #[test]
    fn chunked_must_be_last_coding() {
        let mut h = Headers::new();
        h.append("Transfer-Encoding", "chunked, gzip");
        assert!(!h.is_chunked());
        h.set("Transfer-Encoding", "gzip, Chunked");
        assert!(h.is_chunked());
    }

    #[test]
    fn display_is_wire_format() {
        let mut h = Headers::new();
        h.append("Host", "localhost");
        h.append("Accept", "application/json");
        assert_eq!(h.to_string(), "Host: localhost\r\nAccept: application/json\r\n");
    }
}
