//! Purpose: Construction-time configuration for plot sessions.
//! Exports: `SessionConfig`, `SessionTemplate`, `builtin_resolver`, `BUILTIN_RESOLVERS`.
//! Role: Splits constructor options into staging settings and renderer options.
//! Invariants: `data_dir` and `path_resolvers` never reach the renderer options.
//! Invariants: An explicit resolver chain replaces the template default; it never merges.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::paths::{absolutize, canonicalize_lenient, normalize_lexically};
use crate::core::resolve::{Resolver, ResolverChain};

pub const BUILTIN_RESOLVERS: &[&str] = &["abspath", "realpath"];

/// Looks up a resolver by name. `abspath` joins onto the current directory
/// and collapses `..` lexically; `realpath` also resolves symlinks.
pub fn builtin_resolver(name: &str) -> Result<Resolver, Error> {
    match name {
        "abspath" => Ok(Resolver::new("abspath", |input: &str| {
            match absolutize(Path::new(input)) {
                Ok(path) => normalize_lexically(&path).to_string_lossy().into_owned(),
                Err(_) => input.to_string(),
            }
        })),
        "realpath" => Ok(Resolver::new("realpath", |input: &str| {
            match canonicalize_lenient(Path::new(input)) {
                Ok(path) => path.to_string_lossy().into_owned(),
                Err(_) => input.to_string(),
            }
        })),
        other => Err(Error::new(ErrorKind::Validation)
            .with_message(format!("unknown path resolver {other:?}"))
            .with_hint(format!("Known resolvers: {}.", BUILTIN_RESOLVERS.join(", ")))),
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// Directory the host serves to the browser. Empty means the current directory.
    pub data_dir: PathBuf,
    /// `None` keeps the template default; `Some` replaces it.
    pub path_resolvers: Option<ResolverChain>,
    /// Passed through untouched as renderer construction options.
    pub options: Map<String, Value>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_path_resolvers(mut self, resolvers: ResolverChain) -> Self {
        self.path_resolvers = Some(resolvers);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Splits keyword-style options. `path_resolvers` accepts `null` (no
    /// resolvers) or an array of builtin resolver names.
    pub fn from_options(mut options: Map<String, Value>) -> Result<Self, Error> {
        let data_dir = match options.remove("data_dir") {
            None | Some(Value::Null) => PathBuf::new(),
            Some(Value::String(dir)) => PathBuf::from(dir),
            Some(other) => {
                return Err(Error::new(ErrorKind::Validation)
                    .with_message(format!("data_dir must be a string, got {other}")));
            }
        };

        let path_resolvers = match options.remove("path_resolvers") {
            None => None,
            Some(value) => Some(resolver_chain_from_json(&value)?),
        };

        Ok(Self {
            data_dir,
            path_resolvers,
            options,
        })
    }
}

fn resolver_chain_from_json(value: &Value) -> Result<ResolverChain, Error> {
    match value {
        Value::Null => Ok(ResolverChain::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(name) => builtin_resolver(name),
                other => Err(Error::new(ErrorKind::Validation)
                    .with_message(format!("path resolver entries must be names, got {other}"))),
            })
            .collect(),
        other => Err(Error::new(ErrorKind::Validation)
            .with_message(format!("path_resolvers must be a list, got {other}"))),
    }
}

/// Holds defaults shared by every session it opens.
#[derive(Clone, Debug, Default)]
pub struct SessionTemplate {
    default_resolvers: ResolverChain,
}

impl SessionTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_resolvers(mut self, resolvers: ResolverChain) -> Self {
        self.default_resolvers = resolvers;
        self
    }

    pub fn default_resolvers(&self) -> &ResolverChain {
        &self.default_resolvers
    }

    pub(crate) fn resolvers_for(&self, config: &SessionConfig) -> ResolverChain {
        config
            .path_resolvers
            .clone()
            .unwrap_or_else(|| self.default_resolvers.clone())
    }
}
