//! Filesystem path helpers shared by the VFS, the asset database and the CLI.
//!
//! Host paths (`std::path`) are converted to VFS-relative strings here so
//! that everything past this boundary deals in forward-slash strings only.

use anyhow::{Context, Result};
use std::path::{Component, Path, PathBuf};

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(p: impl AsRef<Path>) -> PathBuf {
    let p = p.as_ref();
    if let Ok(stripped) = p.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    p.to_path_buf()
}

/// Resolve `p` against `root` unless it is already absolute (or `~/...`).
pub fn resolve_under(root: impl AsRef<Path>, p: impl AsRef<Path>) -> PathBuf {
    let expanded = expand_tilde(p);
    if expanded.is_absolute() {
        expanded
    } else {
        root.as_ref().join(expanded)
    }
}

/// Convert a host path below `root` into a VFS-relative, forward-slash path.
///
/// Returns `None` when `path` is not below `root`, or when it contains
/// components a VFS path cannot express (`..`, prefixes). `root` itself maps
/// to the empty string.
pub fn to_vfs_relative(path: impl AsRef<Path>, root: impl AsRef<Path>) -> Option<String> {
    let relative = path.as_ref().strip_prefix(root.as_ref()).ok()?;
    let mut out = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => {
                if !out.is_empty() {
                    out.push('/');
                }
                out.push_str(&name.to_string_lossy());
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    Some(out)
}

/// Join a VFS-relative path onto a host root.
pub fn from_vfs_relative(root: impl AsRef<Path>, vfs_path: &str) -> PathBuf {
    let mut out = root.as_ref().to_path_buf();
    for segment in vfs_path.split(['/', '\\']).filter(|s| !s.is_empty()) {
        out.push(segment);
    }
    out
}

/// Validate that path is within directory, returning Result for security checks.
pub fn ensure_within(path: impl AsRef<Path>, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let dir = dir.as_ref();

    let canonical_path = path
        .canonicalize()
        .with_context(|| format!("Cannot resolve path: {}", path.display()))?;
    let canonical_dir = dir
        .canonicalize()
        .with_context(|| format!("Cannot resolve directory: {}", dir.display()))?;

    if canonical_path.starts_with(&canonical_dir) {
        Ok(canonical_path)
    } else {
        anyhow::bail!(
            "Path '{}' is outside directory '{}'",
            path.display(),
            dir.display()
        )
    }
}

/// Check that `dir` exists, is a directory, and is not read-only.
pub fn ensure_writable_dir(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let metadata = std::fs::metadata(dir)
        .with_context(|| format!("Cannot stat destination: {}", dir.display()))?;
    if !metadata.is_dir() {
        anyhow::bail!("Destination '{}' is not a directory", dir.display());
    }
    if metadata.permissions().readonly() {
        anyhow::bail!("Destination '{}' is read-only", dir.display());
    }
    dir.canonicalize()
        .with_context(|| format!("Cannot resolve destination: {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_under() {
        assert_eq!(
            resolve_under("/proj", "assets"),
            PathBuf::from("/proj/assets")
        );
        assert_eq!(resolve_under("/proj", "/abs/x"), PathBuf::from("/abs/x"));
    }

    #[test]
    fn test_to_vfs_relative() {
        let root = Path::new("/proj/assets");
        assert_eq!(
            to_vfs_relative("/proj/assets/tex/hero.png", root),
            Some("tex/hero.png".to_string())
        );
        assert_eq!(to_vfs_relative(root, root), Some(String::new()));
        assert_eq!(to_vfs_relative("/other/file", root), None);
    }

    #[test]
    fn test_from_vfs_relative() {
        assert_eq!(
            from_vfs_relative("/proj", "tex\\sub/hero.png"),
            PathBuf::from("/proj/tex/sub/hero.png")
        );
    }

    #[test]
    fn test_ensure_within_invalid() {
        let temp1 = tempdir().unwrap();
        let temp2 = tempdir().unwrap();
        let file = temp1.path().join("file.txt");
        fs::write(&file, "test").unwrap();

        let result = ensure_within(&file, temp2.path());
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("outside"));
    }

    #[test]
    fn test_ensure_writable_dir() {
        let temp = tempdir().unwrap();
        assert!(ensure_writable_dir(temp.path()).is_ok());

        let file = temp.path().join("plain.txt");
        fs::write(&file, "x").unwrap();
        assert!(ensure_writable_dir(&file).is_err());
        assert!(ensure_writable_dir(temp.path().join("missing")).is_err());
    }
}
