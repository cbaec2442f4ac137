//! Caller-shaped rule key declarations.
//!
//! Rules may name their keys as flat symbols, as a nested hash with one
//! sub-key (recursively), as a nested hash with a list of sub-keys, or as a
//! dotted string. A [`KeySpec`] keeps that shape so diagnostics can echo it
//! verbatim; [`KeySpec::paths`] is the only thing the engine uses at run time.

use covenant_kernel::KeyPath;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySpec {
    /// `:login`
    Key(String),
    /// `"details.address.street"`
    Dotted(String),
    /// `{:details=>:address}` or `{:details=>{:address=>:street}}`
    Nested(String, Box<KeySpec>),
    /// `{:details=>[:address, :phone]}`
    NestedList(String, Vec<KeySpec>),
}

impl KeySpec {
    pub fn key(name: impl Into<String>) -> Self {
        Self::Key(name.into())
    }

    pub fn dotted(path: impl Into<String>) -> Self {
        Self::Dotted(path.into())
    }

    pub fn nested(root: impl Into<String>, inner: impl Into<KeySpec>) -> Self {
        Self::Nested(root.into(), Box::new(inner.into()))
    }

    pub fn nested_list<I, K>(root: impl Into<String>, inner: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<KeySpec>,
    {
        Self::NestedList(root.into(), inner.into_iter().map(Into::into).collect())
    }

    /// Normalized paths this spec designates. A list-valued hash expands to
    /// one path per element.
    pub fn paths(&self) -> Vec<KeyPath> {
        match self {
            Self::Key(name) => vec![KeyPath::new([name.as_str()])],
            Self::Dotted(dotted) => vec![KeyPath::parse(dotted)],
            Self::Nested(root, inner) => prefix_all(root, inner.paths()),
            Self::NestedList(root, inner) => {
                prefix_all(root, inner.iter().flat_map(KeySpec::paths).collect())
            }
        }
    }
}

fn prefix_all(root: &str, paths: Vec<KeyPath>) -> Vec<KeyPath> {
    let root = KeyPath::new([root]);
    paths.iter().map(|path| path.prefixed(&root)).collect()
}

impl fmt::Display for KeySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(name) => write!(f, ":{name}"),
            Self::Dotted(dotted) => write!(f, "{dotted:?}"),
            Self::Nested(root, inner) => write!(f, "{{:{root}=>{inner}}}"),
            Self::NestedList(root, inner) => {
                write!(f, "{{:{root}=>")?;
                write_list(f, inner)?;
                f.write_str("}")
            }
        }
    }
}

/// Render specs as a bracketed list, e.g. `[:invalid, :wrong]`.
pub fn render_list(specs: &[KeySpec]) -> String {
    struct List<'a>(&'a [KeySpec]);
    impl fmt::Display for List<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_list(f, self.0)
        }
    }
    List(specs).to_string()
}

fn write_list(f: &mut fmt::Formatter<'_>, specs: &[KeySpec]) -> fmt::Result {
    f.write_str("[")?;
    for (idx, spec) in specs.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{spec}")?;
    }
    f.write_str("]")
}

impl From<&str> for KeySpec {
    fn from(name: &str) -> Self {
        Self::Key(name.to_string())
    }
}

impl From<String> for KeySpec {
    fn from(name: String) -> Self {
        Self::Key(name)
    }
}

impl From<&KeySpec> for KeySpec {
    fn from(spec: &KeySpec) -> Self {
        spec.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(paths: Vec<KeyPath>) -> Vec<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn every_shape_normalizes_to_paths() {
        assert_eq!(rendered(KeySpec::key("login").paths()), vec!["login"]);
        assert_eq!(
            rendered(KeySpec::dotted("details.address.street").paths()),
            vec!["details.address.street"]
        );
        assert_eq!(
            rendered(KeySpec::nested("details", KeySpec::nested("address", "street")).paths()),
            vec!["details.address.street"]
        );
        assert_eq!(
            rendered(KeySpec::nested_list("details", ["address", "phone"]).paths()),
            vec!["details.address", "details.phone"]
        );
    }

    #[test]
    fn display_echoes_the_caller_shape() {
        assert_eq!(
            render_list(&[KeySpec::key("invalid"), KeySpec::key("wrong")]),
            "[:invalid, :wrong]"
        );
        assert_eq!(
            render_list(&[KeySpec::nested("details", "invalid")]),
            "[{:details=>:invalid}]"
        );
        assert_eq!(
            render_list(&[KeySpec::nested("details", KeySpec::nested("address", "nope"))]),
            "[{:details=>{:address=>:nope}}]"
        );
        assert_eq!(
            render_list(&[KeySpec::nested_list("details", ["address", "invalid"])]),
            "[{:details=>[:address, :invalid]}]"
        );
        assert_eq!(
            render_list(&[KeySpec::dotted("details.invalid")]),
            "[\"details.invalid\"]"
        );
    }
}
