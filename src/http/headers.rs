//! Ordered header mapping.

use std::fmt::Write as _;

use crate::http::CRLF;

/// Header fields in the order they were first seen.
///
/// Keys keep the case they arrived with. Inserting a key that is already
/// present replaces its value but keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field. Matching is exact (case-sensitive).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Drop every field named `key`, ignoring case. Returns how many were removed.
    pub fn remove_ignore_case(&mut self, key: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        before - self.entries.len()
    }

    /// Case-insensitive lookup.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render every field as `Key: Value\r\n`, in order.
    pub fn to_block(&self) -> String {
        let mut block = String::new();
        for (key, value) in &self.entries {
            // Writing into a String cannot fail.
            let _ = write!(block, "{key}: {value}{CRLF}");
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_keeps_first_position() {
        let mut headers = Headers::new();
        headers.insert("Host", "a");
        headers.insert("Accept", "*/*");
        headers.insert("Host", "b");

        let fields: Vec<_> = headers.iter().collect();
        assert_eq!(fields, vec![("Host", "b"), ("Accept", "*/*")]);
    }

    #[test]
    fn lookup_ignores_case_but_insert_does_not() {
        let mut headers = Headers::new();
        headers.insert("content-type", "text/plain");
        headers.insert("Content-Type", "application/json");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/plain"));
        assert!(!headers.contains("Content-Length"));
    }

    #[test]
    fn remove_ignores_case_and_keeps_order() {
        let mut headers = Headers::new();
        headers.insert("x-cache", "HIT");
        headers.insert("Server", "t");
        headers.insert("X-CACHE", "MISS");

        assert_eq!(headers.remove_ignore_case("X-Cache"), 2);
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("Server", "t")]);
        assert_eq!(headers.remove_ignore_case("X-Cache"), 0);
    }

    #[test]
    fn block_rendering() {
        let mut headers = Headers::new();
        headers.insert("Host", "example.com");
        headers.insert("X-Empty", "");
        assert_eq!(headers.to_block(), "Host: example.com\r\nX-Empty: \r\n");
        assert_eq!(Headers::new().to_block(), "");
    }
}
