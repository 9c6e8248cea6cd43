//! Purpose: Make local files reachable from the served staging directory.
//! Exports: `StagedFile`, `require_dir`, `local_name_for_file`, `stage`, `stage_file`.
//! Role: LocalStager; links files that live outside the staging directory into it.
//! Invariants: Files already under the staging directory are never touched.
//! Invariants: An existing entry at the link location counts as a successful restage.
//! Invariants: Link targets are the expanded input, never the canonical path.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};
use crate::core::paths::{canonicalize_lenient, is_strict_descendant};
use crate::core::resolve::{ResolverChain, unravel_path};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagedFile {
    /// Location under the staging directory the browser can load.
    pub path: PathBuf,
    /// True when the input already lived under the staging directory.
    pub was_local: bool,
}

/// `mkdir -p` that treats an existing entry as success. An empty path means
/// the current directory.
pub fn require_dir(dir: &Path) -> Result<(), Error> {
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(Error::new(ErrorKind::Resource)
            .with_message("failed to create staging directory")
            .with_path(dir)
            .with_source(err)),
    }
}

/// Computes where `input` would be served from without touching the
/// filesystem beyond reading it.
pub fn local_name_for_file(input: &Path, staging_dir: &Path) -> Result<StagedFile, Error> {
    if input.as_os_str().is_empty() {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("input path must not be empty")
            .with_hint("Pass a file path or an http(s) URL."));
    }

    let canonical_input = canonicalize_lenient(input)?;
    let canonical_dir = canonicalize_lenient(staging_dir)?;

    if canonical_input == canonical_dir {
        return Err(Error::new(ErrorKind::Validation)
            .with_message("input path is the staging directory itself")
            .with_path(input));
    }

    if let Some(relative) = is_strict_descendant(&canonical_input, &canonical_dir) {
        return Ok(StagedFile {
            path: staging_dir.join(relative),
            was_local: true,
        });
    }

    let basename = canonical_input.file_name().ok_or_else(|| {
        Error::new(ErrorKind::Validation)
            .with_message("input path has no file name")
            .with_path(input)
    })?;
    Ok(StagedFile {
        path: staging_dir.join(basename),
        was_local: false,
    })
}

/// Stages an already-expanded path. Inputs outside `staging_dir` get a
/// symlink named after their basename.
pub fn stage(input: &Path, staging_dir: &Path) -> Result<StagedFile, Error> {
    let staged = local_name_for_file(input, staging_dir)?;
    if staged.was_local {
        debug!(path = %staged.path.display(), "input already under staging directory");
        return Ok(staged);
    }

    require_dir(staging_dir)?;
    match create_symlink(input, &staged.path) {
        Ok(()) => {
            info!(
                link = %staged.path.display(),
                target = %input.display(),
                "linked input into staging directory"
            );
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            debug!(link = %staged.path.display(), "staging link already present");
        }
        Err(err) => {
            return Err(Error::new(ErrorKind::Resource)
                .with_message("failed to link input into staging directory")
                .with_path(&staged.path)
                .with_source(err));
        }
    }
    Ok(staged)
}

/// Expands `orig` through the resolver chain, then stages the result.
pub fn stage_file(
    orig: &str,
    staging_dir: &Path,
    resolvers: &ResolverChain,
) -> Result<StagedFile, Error> {
    let input = unravel_path(orig, resolvers);
    stage(Path::new(&input), staging_dir)
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
