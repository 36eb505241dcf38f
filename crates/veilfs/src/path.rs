//! Tree paths as sequences of name segments.
//!
//! A [`Path`] is what the node engine walks: `"a/b/c"` parses to three
//! segments, the empty string (or `"/"`) to the empty path, which addresses
//! the node itself. Empty segments are dropped, so `"a//b"` and `"/a/b/"`
//! both mean `a/b`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(Vec<String>);

impl Path {
    pub fn new(segments: Vec<String>) -> Self {
        Path(segments.into_iter().filter(|s| !s.is_empty()).collect())
    }

    /// Parse a slash-separated path string.
    pub fn parse(s: &str) -> Self {
        Path::new(s.split('/').map(|s| s.to_string()).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Split into the first segment and the remaining path.
    /// Returns `None` on the empty path.
    pub fn shift(&self) -> Option<(&str, Path)> {
        let (head, tail) = self.0.split_first()?;
        Some((head.as_str(), Path(tail.to_vec())))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

impl From<&str> for Path {
    fn from(s: &str) -> Self {
        Path::parse(s)
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(segments: [&str; N]) -> Self {
        Path::new(segments.iter().map(|s| s.to_string()).collect())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Path::parse("a/b/c").segments(), &["a", "b", "c"]);
        assert_eq!(Path::parse("/a//b/").segments(), &["a", "b"]);
        assert!(Path::parse("").is_empty());
        assert!(Path::parse("/").is_empty());
    }

    #[test]
    fn test_shift() {
        let path = Path::parse("a/b");
        let (head, tail) = path.shift().unwrap();
        assert_eq!(head, "a");
        assert_eq!(tail.segments(), &["b"]);

        let (head, tail) = tail.shift().unwrap();
        assert_eq!(head, "b");
        assert!(tail.is_empty());
        assert!(tail.shift().is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(Path::parse("/a/b").to_string(), "a/b");
    }
}
