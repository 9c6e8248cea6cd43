//! Purpose: Parse compound href specs and route each entry to fetch or stage.
//! Exports: `INPUT_DELIMITER`, `InputKind`, `split_inputs`, `classify`, `prepare_href_input`.
//! Role: InputSpecParser plus the per-token dispatch used by sessions and the CLI.
//! Invariants: Tokens are trimmed; blank tokens are dropped silently.
//! Invariants: Tokens are prepared strictly in order, one at a time; the first failure aborts.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::error::Error;
use crate::core::fetch::{ProgressFn, RemoteFetcher};
use crate::core::resolve::ResolverChain;
use crate::core::stage::stage_file;

pub const INPUT_DELIMITER: char = '|';

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputKind {
    Remote,
    Local,
}

impl InputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::Remote => "remote",
            InputKind::Local => "local",
        }
    }
}

pub fn split_inputs(spec: &str) -> Vec<String> {
    spec.split(INPUT_DELIMITER)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Anything starting with the literal `http` is fetched; everything else is a
/// filesystem path.
pub fn classify(token: &str) -> InputKind {
    if token.starts_with("http") {
        InputKind::Remote
    } else {
        InputKind::Local
    }
}

pub fn prepare_href_input(
    spec: &str,
    staging_dir: &Path,
    fetcher: &RemoteFetcher,
    resolvers: &ResolverChain,
    mut on_progress: Option<&mut ProgressFn<'_>>,
) -> Result<Vec<PathBuf>, Error> {
    let mut prepared = Vec::new();
    for token in split_inputs(spec) {
        let kind = classify(&token);
        debug!(input = %token, kind = kind.as_str(), "preparing href input");
        let path = match kind {
            InputKind::Remote => {
                let progress = match on_progress.as_mut() {
                    Some(callback) => Some(&mut **callback as &mut ProgressFn<'_>),
                    None => None,
                };
                fetcher.fetch(&token, staging_dir, progress)?
            }
            InputKind::Local => stage_file(&token, staging_dir, resolvers)?.path,
        };
        prepared.push(path);
    }
    Ok(prepared)
}
