// src/watch/path_utils.rs

//! Utility functions for path handling in the detectors.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
/// - If the path itself is gone (deleted files cannot be canonicalized) we
///   canonicalize its parent and re-attach the file name.
///
/// Returns `None` if the path cannot be related to `root`, and for the root
/// itself.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return non_empty(normalize(rel));
    }

    let root_canon = root.canonicalize().ok()?;

    // Different absolute prefixes for the same directory show up on macOS
    // (/var vs /private/var) and under symlinked project roots.
    if let Ok(path_canon) = path.canonicalize() {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return non_empty(normalize(rel));
        }
    }

    let parent = path.parent()?.canonicalize().ok()?;
    let name = path.file_name()?;
    let rel = parent.strip_prefix(&root_canon).ok()?.join(name);
    non_empty(normalize(&rel))
}

/// Render a relative path with `/` separators.
pub fn normalize(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn strips_root_prefix() {
        let root = PathBuf::from("/project");
        assert_eq!(
            relative_str(&root, &root.join("src/app.py")).as_deref(),
            Some("src/app.py")
        );
    }

    #[test]
    fn root_itself_has_no_relative_form() {
        let root = PathBuf::from("/project");
        assert_eq!(relative_str(&root, &root), None);
    }

    #[test]
    fn deleted_file_under_symlinked_root_is_still_relativized() {
        let dir = tempfile::tempdir().unwrap();
        let canon = dir.path().canonicalize().unwrap();
        std::fs::create_dir(canon.join("src")).unwrap();

        // The file never existed; only its parent does.
        let gone = canon.join("src").join("gone.py");
        assert_eq!(relative_str(dir.path(), &gone).as_deref(), Some("src/gone.py"));
    }
}
