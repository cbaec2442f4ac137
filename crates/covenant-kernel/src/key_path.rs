//! Locations inside a nested input structure.
//!
//! A key path is an ordered sequence of segments. Each segment is either a
//! hash key (`details`) or an array index (`0`). Paths are rendered in dot
//! notation, so `details.address.street` and `tags.0` name the same
//! locations that rule declarations and error reports use.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One step of a [`KeyPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    /// Position inside an array.
    Index(usize),
    /// Key inside a hash.
    Key(String),
}

impl Segment {
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    /// Parse a single dot-notation token. Purely numeric tokens are indices.
    pub fn parse(token: &str) -> Self {
        match token.parse::<usize>() {
            Ok(index) if !token.starts_with('+') => Self::Index(index),
            _ => Self::Key(token.to_string()),
        }
    }

    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Key(name) => Some(name),
            Self::Index(_) => None,
        }
    }

    /// Step into `value` along this segment.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (Self::Key(name), Value::Object(map)) => map.get(name),
            (Self::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(name) => write!(f, "{name}"),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for Segment {
    fn from(name: &str) -> Self {
        Self::Key(name.to_string())
    }
}

impl From<String> for Segment {
    fn from(name: String) -> Self {
        Self::Key(name)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An immutable, ordered location identifier.
///
/// Two paths are equal iff their segment sequences are equal. The empty path
/// denotes the whole input and is only used internally; error reporting maps
/// it onto the base slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyPath(Vec<Segment>);

impl KeyPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Segment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The empty path (whole input).
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse dot notation. Empty tokens are ignored, so `"a..b"` is `a.b`.
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|token| !token.is_empty())
                .map(Segment::parse)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<&Segment> {
        self.0.first()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.0.last()
    }

    /// True iff `self` is a (non-strict) prefix of `other`.
    pub fn is_ancestor_of(&self, other: &KeyPath) -> bool {
        self.0.len() <= other.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    /// True iff one path is a prefix of the other.
    pub fn overlaps(&self, other: &KeyPath) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    pub fn parent(&self) -> Option<KeyPath> {
        self.0.split_last().map(|(_, head)| Self(head.to_vec()))
    }

    pub fn child(&self, segment: impl Into<Segment>) -> KeyPath {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    /// Prepend `root` to every segment of this path.
    pub fn prefixed(&self, root: &KeyPath) -> KeyPath {
        let mut segments = root.0.clone();
        segments.extend(self.0.iter().cloned());
        Self(segments)
    }

    /// Proper prefixes of this path, shortest first (the root is excluded).
    pub fn ancestors(&self) -> impl Iterator<Item = KeyPath> + '_ {
        (1..self.0.len()).map(|end| Self(self.0[..end].to_vec()))
    }

    /// Resolve this path inside a value tree.
    pub fn lookup<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        self.0
            .iter()
            .try_fold(value, |node, segment| segment.lookup(node))
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for KeyPath {
    fn from(dotted: &str) -> Self {
        Self::parse(dotted)
    }
}

impl From<String> for KeyPath {
    fn from(dotted: String) -> Self {
        Self::parse(&dotted)
    }
}

impl From<&String> for KeyPath {
    fn from(dotted: &String) -> Self {
        Self::parse(dotted)
    }
}

impl From<Segment> for KeyPath {
    fn from(segment: Segment) -> Self {
        Self(vec![segment])
    }
}

impl From<Vec<Segment>> for KeyPath {
    fn from(segments: Vec<Segment>) -> Self {
        Self(segments)
    }
}

impl From<&KeyPath> for KeyPath {
    fn from(path: &KeyPath) -> Self {
        path.clone()
    }
}

impl FromIterator<Segment> for KeyPath {
    fn from_iter<T: IntoIterator<Item = Segment>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
