//! The merged error structure.
//!
//! Schema validation and domain rules both append [`Message`]s into one
//! [`ErrorTree`]. The tree is stored as an insertion-ordered message set; the
//! nested hash view returned by [`ErrorTree::to_h`] is derived from it on
//! demand, so appending never rewrites what is already there.

use crate::key_path::{KeyPath, Segment};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// Which validation phase produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSource {
    Schema,
    Rule,
}

/// A single failure message.
///
/// `path == None` marks a base message: it applies to the whole input and is
/// not reachable through any key path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<KeyPath>,
    pub text: String,
    pub source: MessageSource,
}

impl Message {
    pub fn new(path: Option<KeyPath>, text: impl Into<String>, source: MessageSource) -> Self {
        Self {
            path: path.filter(|p| !p.is_empty()),
            text: text.into(),
            source,
        }
    }

    pub fn schema(path: impl Into<KeyPath>, text: impl Into<String>) -> Self {
        Self::new(Some(path.into()), text, MessageSource::Schema)
    }

    pub fn rule(path: Option<KeyPath>, text: impl Into<String>) -> Self {
        Self::new(path, text, MessageSource::Rule)
    }

    pub fn base(text: impl Into<String>, source: MessageSource) -> Self {
        Self::new(None, text, source)
    }

    pub fn is_base(&self) -> bool {
        self.path.is_none()
    }

    pub fn is_keyed(&self) -> bool {
        self.path.is_some()
    }

    pub fn is_schema(&self) -> bool {
        self.source == MessageSource::Schema
    }

    pub fn is_rule(&self) -> bool {
        self.source == MessageSource::Rule
    }

    /// True iff this message sits at `path` or somewhere below it.
    pub fn is_under(&self, path: &KeyPath) -> bool {
        self.path.as_ref().is_some_and(|own| path.is_ancestor_of(own))
    }
}

/// Top-level key of the nested hash view.
///
/// `Base` holds whole-input messages; it sorts after every real key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ErrorKey {
    Key(Segment),
    Base,
}

impl From<&str> for ErrorKey {
    fn from(name: &str) -> Self {
        Self::Key(Segment::key(name))
    }
}

impl From<Segment> for ErrorKey {
    fn from(segment: Segment) -> Self {
        Self::Key(segment)
    }
}

/// Nested hash view of an [`ErrorTree`].
pub type ErrorHash = BTreeMap<ErrorKey, Value>;

/// Ordered, append-only set of failure messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorTree {
    messages: Vec<Message>,
}

impl ErrorTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Messages matching `predicate`, in insertion order.
    ///
    /// ```
    /// use covenant_kernel::{ErrorTree, Message, MessageSource};
    ///
    /// let mut errors = ErrorTree::new();
    /// errors.push(Message::schema("login", "must be filled"));
    /// errors.push(Message::base("this whole thing is invalid", MessageSource::Rule));
    ///
    /// let base: Vec<&str> = errors.filter(Message::is_base).map(|m| m.text.as_str()).collect();
    /// assert_eq!(base, vec!["this whole thing is invalid"]);
    /// ```
    pub fn filter<'a, P>(&'a self, mut predicate: P) -> impl Iterator<Item = &'a Message> + 'a
    where
        P: FnMut(&Message) -> bool + 'a,
    {
        self.messages.iter().filter(move |message| predicate(*message))
    }

    /// Texts recorded exactly at `path`.
    pub fn messages_at(&self, path: &KeyPath) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|message| message.path.as_ref() == Some(path))
            .map(|message| message.text.as_str())
            .collect()
    }

    /// Texts recorded in the base slot.
    pub fn base_messages(&self) -> Vec<&str> {
        self.filter(Message::is_base)
            .map(|message| message.text.as_str())
            .collect()
    }

    /// True iff any message sits at `path` or below it.
    pub fn error_at(&self, path: &KeyPath) -> bool {
        self.messages.iter().any(|message| message.is_under(path))
    }

    /// Nested hash view mirroring the input shape.
    ///
    /// A path holding only messages renders as a list, a path holding only
    /// children renders as a map, and a path holding both renders as
    /// `[own_messages, children_map]`.
    pub fn to_h(&self) -> ErrorHash {
        let (base, root) = self.build();
        let mut out = ErrorHash::new();
        for (segment, node) in root.children {
            out.insert(ErrorKey::Key(segment), node.render());
        }
        if !base.is_empty() {
            out.insert(ErrorKey::Base, json!(base));
        }
        out
    }

    /// JSON document for machine consumers: keyed errors under `errors`,
    /// whole-input messages under `base`.
    pub fn to_json(&self) -> Value {
        let (base, root) = self.build();
        let mut errors = Map::new();
        for (segment, node) in root.children {
            errors.insert(segment.to_string(), node.render());
        }
        json!({
            "errors": Value::Object(errors),
            "base": base,
        })
    }

    fn build(&self) -> (Vec<String>, Node) {
        let mut base = Vec::new();
        let mut root = Node::default();
        for message in &self.messages {
            match &message.path {
                Some(path) => root.insert(path.segments(), message.text.clone()),
                None => base.push(message.text.clone()),
            }
        }
        (base, root)
    }
}

impl Extend<Message> for ErrorTree {
    fn extend<T: IntoIterator<Item = Message>>(&mut self, iter: T) {
        self.messages.extend(iter);
    }
}

impl FromIterator<Message> for ErrorTree {
    fn from_iter<T: IntoIterator<Item = Message>>(iter: T) -> Self {
        Self {
            messages: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ErrorTree {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[derive(Debug, Default)]
struct Node {
    messages: Vec<String>,
    children: Vec<(Segment, Node)>,
}

impl Node {
    /// Children are matched by rendered name: `Index(1)` and `Key("1")` share
    /// one node, so neither sub-tree is lost when the view is rendered.
    fn insert(&mut self, segments: &[Segment], text: String) {
        let Some((head, rest)) = segments.split_first() else {
            self.messages.push(text);
            return;
        };
        let name = head.to_string();
        let idx = match self
            .children
            .iter()
            .position(|(seg, _)| seg.to_string() == name)
        {
            Some(idx) => idx,
            None => {
                self.children.push((head.clone(), Node::default()));
                self.children.len() - 1
            }
        };
        self.children[idx].1.insert(rest, text);
    }

    fn render(self) -> Value {
        let mut children = Map::new();
        for (segment, node) in self.children {
            children.insert(segment.to_string(), node.render());
        }
        match (self.messages.is_empty(), children.is_empty()) {
            (_, true) => json!(self.messages),
            (true, false) => Value::Object(children),
            (false, false) => json!([self.messages, Value::Object(children)]),
        }
    }
}
