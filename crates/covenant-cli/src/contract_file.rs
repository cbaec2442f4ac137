//! Contract definitions on disk.
//!
//! A contract file is TOML: a `name`, an optional `extends` pointing at a
//! parent file (relative to the including file), `[[schema]]` key
//! declarations, and `[[rules]]` built from a small set of checks.
//!
//! ```toml
//! name = "NewUserContract"
//!
//! [[schema]]
//! key = "login"
//! type = "string"
//! filled = true
//!
//! [[rules]]
//! keys = ["login"]
//! check = "min_size"
//! arg = 3
//! message = "is too short"
//! ```

use covenant_contract::{Contract, ContractBuilder, ContractError, Failures, KeySpec, RuleContext};
use covenant_kernel::KeyPath;
use covenant_schema::{KeyDecl, Schema, SchemaError, ValueType};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContractFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{path} extends itself through {chain}")]
    ExtendsCycle { path: String, chain: String },

    #[error("schema key `{key}` declares nested keys but is not a hash")]
    UnexpectedKeys { key: String },

    #[error("schema key `{key}` nests arrays, which contract files do not support")]
    NestedArray { key: String },

    #[error("rule #{rule} ({check}) needs {expected} as `arg`")]
    InvalidArgument {
        rule: usize,
        check: &'static str,
        expected: &'static str,
    },

    #[error("rule #{rule} ({check}) has an invalid pattern: {source}")]
    InvalidPattern {
        rule: usize,
        check: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("rule #{rule} has {count} keys and therefore needs an explicit `target`")]
    MissingTarget { rule: usize, count: usize },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

/// Raw shape of one contract file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractFile {
    pub name: String,
    #[serde(default)]
    pub extends: Option<String>,
    #[serde(default)]
    pub schema: Vec<KeyEntry>,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeName {
    #[default]
    Any,
    String,
    Integer,
    Number,
    Bool,
    Hash,
    Array,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyEntry {
    pub key: String,
    #[serde(default = "required_by_default")]
    pub required: bool,
    #[serde(rename = "type", default)]
    pub value_type: TypeName,
    /// Element type when `type = "array"`.
    #[serde(default)]
    pub items: Option<TypeName>,
    #[serde(default)]
    pub maybe: bool,
    #[serde(default)]
    pub filled: bool,
    #[serde(default)]
    pub min_size: Option<usize>,
    #[serde(default)]
    pub max_size: Option<usize>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub included_in: Option<Vec<String>>,
    /// Members of a hash, or of each element of an array of hashes.
    #[serde(default)]
    pub keys: Vec<KeyEntry>,
}

fn required_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckName {
    MinSize,
    MaxSize,
    Format,
    IncludedIn,
    EqualsKey,
    Absent,
    Always,
}

impl CheckName {
    fn as_str(self) -> &'static str {
        match self {
            Self::MinSize => "min_size",
            Self::MaxSize => "max_size",
            Self::Format => "format",
            Self::IncludedIn => "included_in",
            Self::EqualsKey => "equals_key",
            Self::Absent => "absent",
            Self::Always => "always",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleEntry {
    /// Dotted trigger paths. Empty means an unconditional rule.
    #[serde(default)]
    pub keys: Vec<String>,
    pub check: CheckName,
    #[serde(default)]
    pub arg: Option<toml::Value>,
    #[serde(default)]
    pub each: bool,
    /// Failure path, or `"base"`. Defaults to the rule's own key.
    #[serde(default)]
    pub target: Option<String>,
    pub message: String,
}

impl ContractFile {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Load the contract at `path`, resolving its `extends` chain.
pub fn load(path: &Path) -> Result<Contract, ContractFileError> {
    load_chain(path, &mut Vec::new())
}

fn load_chain(path: &Path, seen: &mut Vec<PathBuf>) -> Result<Contract, ContractFileError> {
    let identity = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    if seen.contains(&identity) {
        let chain = seen
            .iter()
            .chain(std::iter::once(&identity))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(ContractFileError::ExtendsCycle {
            path: path.display().to_string(),
            chain,
        });
    }
    seen.push(identity);

    let text = fs::read_to_string(path).map_err(|source| ContractFileError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file = ContractFile::parse(&text).map_err(|source| ContractFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(
        target: "covenant::config",
        path = %path.display(),
        contract = %file.name,
        extends = ?file.extends,
        "contract file parsed"
    );

    let parent = match &file.extends {
        Some(relative) => {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            Some(load_chain(&base.join(relative), seen)?)
        }
        None => None,
    };
    build(&file, parent.as_ref())
}

/// Turn a parsed file into a contract, extending `parent` when given.
///
/// A file without `[[schema]]` entries reuses the parent's schema.
pub fn build(file: &ContractFile, parent: Option<&Contract>) -> Result<Contract, ContractFileError> {
    let mut builder = match parent {
        Some(parent) => {
            let builder = ContractBuilder::inherit(file.name.as_str(), parent);
            if file.schema.is_empty() {
                builder
            } else {
                builder.schema(build_schema(&file.schema)?)?
            }
        }
        None => Contract::builder(file.name.as_str(), build_schema(&file.schema)?),
    };

    for (idx, entry) in file.rules.iter().enumerate() {
        builder = add_rule(builder, idx, entry)?;
    }
    Ok(builder.build())
}

fn build_schema(entries: &[KeyEntry]) -> Result<Schema, ContractFileError> {
    let decls = entries
        .iter()
        .map(key_decl)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Schema::new(decls)?)
}

fn key_decl(entry: &KeyEntry) -> Result<KeyDecl, ContractFileError> {
    let value_type = value_type(entry)?;
    let mut decl = if entry.required {
        KeyDecl::required(entry.key.as_str(), value_type)
    } else {
        KeyDecl::optional(entry.key.as_str(), value_type)
    };
    if entry.maybe {
        decl = decl.maybe();
    }
    if entry.filled {
        decl = decl.filled();
    }
    if let Some(size) = entry.min_size {
        decl = decl.min_size(size);
    }
    if let Some(size) = entry.max_size {
        decl = decl.max_size(size);
    }
    if let Some(pattern) = &entry.format {
        decl = decl.format(pattern)?;
    }
    if let Some(allowed) = &entry.included_in {
        decl = decl.included_in(allowed.iter().cloned());
    }
    Ok(decl)
}

fn value_type(entry: &KeyEntry) -> Result<ValueType, ContractFileError> {
    let holds_hash = entry.value_type == TypeName::Hash
        || (entry.value_type == TypeName::Array && entry.items == Some(TypeName::Hash));
    if !entry.keys.is_empty() && !holds_hash {
        return Err(ContractFileError::UnexpectedKeys {
            key: entry.key.clone(),
        });
    }

    let scalar = |name: TypeName| -> Result<ValueType, ContractFileError> {
        Ok(match name {
            TypeName::Any => ValueType::Any,
            TypeName::String => ValueType::String,
            TypeName::Integer => ValueType::Integer,
            TypeName::Number => ValueType::Number,
            TypeName::Bool => ValueType::Bool,
            TypeName::Hash => ValueType::Hash(build_schema(&entry.keys)?),
            TypeName::Array => {
                return Err(ContractFileError::NestedArray {
                    key: entry.key.clone(),
                });
            }
        })
    };

    match entry.value_type {
        TypeName::Array => Ok(ValueType::array_of(scalar(
            entry.items.unwrap_or(TypeName::Any),
        )?)),
        other => scalar(other),
    }
}

/// A compiled rule check. `Ok(false)` means the check failed and the rule's
/// message is recorded.
#[derive(Debug, Clone)]
enum Check {
    MinSize(usize),
    MaxSize(usize),
    Format(Regex),
    IncludedIn(Vec<Value>),
    EqualsKey(KeyPath),
    Absent(KeyPath),
    Always,
}

impl Check {
    fn compile(rule: usize, entry: &RuleEntry) -> Result<Self, ContractFileError> {
        let check = entry.check.as_str();
        let invalid = |expected| ContractFileError::InvalidArgument {
            rule,
            check,
            expected,
        };
        let arg = entry.arg.as_ref();
        let size = || {
            arg.and_then(toml::Value::as_integer)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| invalid("a non-negative integer"))
        };
        let path = || {
            arg.and_then(toml::Value::as_str)
                .map(KeyPath::parse)
                .filter(|path| !path.is_empty())
                .ok_or_else(|| invalid("a dotted key path"))
        };

        Ok(match entry.check {
            CheckName::MinSize => Self::MinSize(size()?),
            CheckName::MaxSize => Self::MaxSize(size()?),
            CheckName::Format => {
                let pattern = arg
                    .and_then(toml::Value::as_str)
                    .ok_or_else(|| invalid("a regular expression"))?;
                Self::Format(Regex::new(pattern).map_err(|source| {
                    ContractFileError::InvalidPattern {
                        rule,
                        check,
                        source,
                    }
                })?)
            }
            CheckName::IncludedIn => {
                let items = arg
                    .and_then(toml::Value::as_array)
                    .ok_or_else(|| invalid("an array of allowed values"))?;
                let allowed = items
                    .iter()
                    .map(|item| serde_json::to_value(item).map_err(|_| invalid("plain values")))
                    .collect::<Result<Vec<_>, _>>()?;
                Self::IncludedIn(allowed)
            }
            CheckName::EqualsKey => Self::EqualsKey(path()?),
            CheckName::Absent => Self::Absent(path()?),
            CheckName::Always => Self::Always,
        })
    }

    fn passes(&self, ctx: &RuleContext<'_>, subject: Option<&Value>) -> bool {
        match self {
            Self::MinSize(min) => size_of(subject).is_none_or(|size| size >= *min),
            Self::MaxSize(max) => size_of(subject).is_none_or(|size| size <= *max),
            Self::Format(pattern) => subject
                .and_then(Value::as_str)
                .is_none_or(|text| pattern.is_match(text)),
            Self::IncludedIn(allowed) => subject.is_none_or(|value| allowed.contains(value)),
            Self::EqualsKey(other) => subject == ctx.value_at(other),
            Self::Absent(other) => ctx.value_at(other).is_none_or(Value::is_null),
            Self::Always => false,
        }
    }
}

fn size_of(value: Option<&Value>) -> Option<usize> {
    match value? {
        Value::String(text) => Some(text.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

#[derive(Debug, Clone)]
enum Target {
    Own,
    Base,
    Path(KeyPath),
}

fn add_rule(
    builder: ContractBuilder,
    idx: usize,
    entry: &RuleEntry,
) -> Result<ContractBuilder, ContractFileError> {
    let check = Check::compile(idx, entry)?;
    let target = match entry.target.as_deref() {
        None => Target::Own,
        Some("base") => Target::Base,
        Some(path) => Target::Path(KeyPath::parse(path)),
    };
    if matches!(target, Target::Own) && entry.keys.len() > 1 {
        return Err(ContractFileError::MissingTarget {
            rule: idx,
            count: entry.keys.len(),
        });
    }

    let message = entry.message.clone();
    let body = move |ctx: &RuleContext<'_>, failures: &mut Failures| {
        let subject = ctx
            .value()
            .or_else(|| ctx.keys().first().and_then(|key| ctx.value_at(key)));
        if !check.passes(ctx, subject) {
            match &target {
                Target::Own => failures.key().failure(message.as_str()),
                Target::Base => failures.base().failure(message.as_str()),
                Target::Path(path) => failures.key_at(path).failure(message.as_str()),
            }
        }
        Ok(())
    };

    if entry.keys.is_empty() {
        return Ok(builder.base_rule(body));
    }
    let specs = entry.keys.iter().map(|key| {
        if key.contains('.') {
            KeySpec::dotted(key.as_str())
        } else {
            KeySpec::key(key.as_str())
        }
    });
    let builder = if entry.each {
        builder.rule_each(specs, body)?
    } else {
        builder.rule(specs, body)?
    };
    Ok(builder)
}
