//! Single-valued header storage.
//!
//! Every name maps to exactly one string. Repeated values are folded into that string joined by
//! `", "` and split again on read. Names compare ASCII case-insensitively; the spelling of the
//! most recent `insert` is kept for output.

use std::fmt;

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// The canonical (possibly comma-joined) value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.index_of(name).map(|i| self.entries[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Every value of `name`, split on `,` and trimmed. Empty when absent.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.get(name)
            .map(|value| value.split(',').map(str::trim).filter(|v| !v.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Sets `name`, discarding any previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index_of(&name) {
            Some(i) => self.entries[i] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    /// Adds `value` to `name`, joining with `", "` when a value already exists.
    pub fn append(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
        let name = name.into();
        match self.index_of(&name) {
            Some(i) => {
                let existing = &mut self.entries[i].1;
                existing.push_str(", ");
                existing.push_str(value.as_ref());
            }
            None => self.entries.push((name, value.as_ref().to_owned())),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.index_of(name).map(|i| self.entries.remove(i).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.append(name.into(), value.into());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "text/plain");
        headers.insert("content-type", "text/html");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("Content-Type"), Some("text/html"));
    }

    #[test]
    fn append_joins_and_splits() {
        let mut headers = Headers::new();
        headers.append("Accept", "text/html");
        headers.append("Accept", "application/json");
        assert_eq!(headers.get("Accept"), Some("text/html, application/json"));
        assert_eq!(headers.get_all("accept"), vec!["text/html", "application/json"]);
        assert!(headers.get_all("missing").is_empty());
    }

    #[test]
    fn remove_and_iterate() {
        let headers: Headers = [("a", "1"), ("b", "2"), ("A", "3")].into_iter().collect();
        assert_eq!(headers.iter().collect::<Vec<_>>(), vec![("a", "1, 3"), ("b", "2")]);

        let mut headers = headers;
        assert_eq!(headers.remove("B").as_deref(), Some("2"));
        assert!(!headers.contains("b"));
    }
}
