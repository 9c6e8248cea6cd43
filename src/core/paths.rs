//! Purpose: Path normalisation helpers shared by staging and the builtin resolvers.
//! Exports: `absolutize`, `normalize_lexically`, `canonicalize_lenient`, `is_strict_descendant`.
//! Role: Single place that decides what "canonical" means for staging decisions.
//! Invariants: Never requires the path to exist; missing tails are kept lexically.
//! Invariants: Existing prefixes resolve symlinks before a following `..` applies.

use std::path::{Component, Path, PathBuf};

use crate::core::error::{Error, ErrorKind};

pub fn absolutize(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read current directory")
            .with_source(err)
    })?;
    if path.as_os_str().is_empty() {
        return Ok(cwd);
    }
    Ok(cwd.join(path))
}

/// Collapses `.` and `..` without touching the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Resolves `path` the way `realpath(3)` would, except that components which
/// do not exist yet are appended as-is instead of failing.
pub fn canonicalize_lenient(path: &Path) -> Result<PathBuf, Error> {
    let absolute = absolutize(path)?;
    let mut resolved = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => continue,
            Component::ParentDir => {
                resolved.pop();
                continue;
            }
            other => resolved.push(other.as_os_str()),
        }
        if let Ok(canonical) = std::fs::canonicalize(&resolved) {
            resolved = canonical;
        }
    }
    Ok(resolved)
}

/// Returns the remainder of `path` below `dir`, or `None` when `path` is not
/// strictly inside `dir`. Comparison is per component, so `/data2` is not
/// inside `/data`.
pub fn is_strict_descendant<'a>(path: &'a Path, dir: &Path) -> Option<&'a Path> {
    path.strip_prefix(dir)
        .ok()
        .filter(|rest| !rest.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::{canonicalize_lenient, is_strict_descendant, normalize_lexically};
    use std::path::{Path, PathBuf};

    #[test]
    fn lexical_normalization_collapses_dots() {
        assert_eq!(
            normalize_lexically(Path::new("/a/./b/../c")),
            PathBuf::from("/a/c")
        );
        assert_eq!(normalize_lexically(Path::new("/..")), PathBuf::from("/"));
        assert_eq!(
            normalize_lexically(Path::new("../x/./y")),
            PathBuf::from("../x/y")
        );
        assert_eq!(
            normalize_lexically(Path::new("../../x")),
            PathBuf::from("../../x")
        );
    }

    #[test]
    fn descendant_check_is_component_wise() {
        assert_eq!(
            is_strict_descendant(Path::new("/data/foo.tmp"), Path::new("/data")),
            Some(Path::new("foo.tmp"))
        );
        assert_eq!(
            is_strict_descendant(Path::new("/data2/foo.tmp"), Path::new("/data")),
            None
        );
        assert_eq!(
            is_strict_descendant(Path::new("/data"), Path::new("/data")),
            None
        );
    }

    #[test]
    fn lenient_canonicalization_keeps_missing_tail() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = std::fs::canonicalize(temp.path()).expect("canonical root");
        let missing = temp.path().join("nope").join("..").join("later").join("x.tmp");
        let resolved = canonicalize_lenient(&missing).expect("resolve");
        assert_eq!(resolved, root.join("later").join("x.tmp"));
    }

    #[cfg(unix)]
    #[test]
    fn lenient_canonicalization_resolves_symlinks_before_parent() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = std::fs::canonicalize(temp.path()).expect("canonical root");
        let real = root.join("real").join("inner");
        std::fs::create_dir_all(&real).expect("mkdir");
        std::os::unix::fs::symlink(&real, root.join("link")).expect("symlink");

        let resolved = canonicalize_lenient(&root.join("link").join("..").join("f.tmp"))
            .expect("resolve");
        assert_eq!(resolved, root.join("real").join("f.tmp"));
    }
}
