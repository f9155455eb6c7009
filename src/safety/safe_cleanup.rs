use crate::config::types::{ParamountError, Result};
use std::fs::{self, Metadata};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

fn workspace_err(action: &str, path: &Path, e: io::Error) -> ParamountError {
    ParamountError::Workspace(format!("{} failed for {}: {}", action, path.display(), e))
}

// Removes what it can and records the rest; a directory is only removed once
// everything below it is gone.
fn remove_dir_contents<F>(dir: &Path, is_boundary: &F, errors: &mut Vec<String>)
where
    F: Fn(&Path, &Metadata) -> bool,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(format!("read_dir {}: {}", dir.display(), e));
            return;
        }
    };

    for entry in entries {
        let child = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                errors.push(format!("read_dir {}: {}", dir.display(), e));
                continue;
            }
        };
        let meta = match fs::symlink_metadata(&child) {
            Ok(meta) => meta,
            Err(e) => {
                errors.push(format!("lstat {}: {}", child.display(), e));
                continue;
            }
        };

        if !meta.is_dir() {
            if let Err(e) = fs::remove_file(&child) {
                errors.push(format!("unlink {}: {}", child.display(), e));
            }
            continue;
        }

        // A different device below the root is a live mount; never descend into it.
        if is_boundary(&child, &meta) {
            errors.push(format!(
                "refusing to cross filesystem boundary at {}",
                child.display()
            ));
            continue;
        }

        let before = errors.len();
        remove_dir_contents(&child, is_boundary, errors);
        if errors.len() == before {
            if let Err(e) = fs::remove_dir(&child) {
                errors.push(format!("rmdir {}: {}", child.display(), e));
            }
        }
    }
}

fn remove_tree_with<F>(path: &Path, is_boundary: F) -> Result<()>
where
    F: Fn(&Path, &Metadata) -> bool,
{
    let mut errors = Vec::new();
    remove_dir_contents(path, &is_boundary, &mut errors);
    if errors.is_empty() {
        return fs::remove_dir(path).map_err(|e| workspace_err("rmdir", path, e));
    }

    Err(ParamountError::Workspace(format!(
        "{} entries left under {}: {}",
        errors.len(),
        path.display(),
        errors.join("; ")
    )))
}

/// Remove a tree without following symlinks or crossing into other mounted filesystems.
/// Entries that cannot be removed are skipped and reported together; everything
/// else is still removed. A missing path is treated as already removed.
pub fn remove_tree_secure(path: &Path) -> Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(workspace_err("lstat", path, e)),
    };

    if !meta.is_dir() {
        return fs::remove_file(path).map_err(|e| workspace_err("unlink", path, e));
    }

    let root_dev = meta.dev();
    remove_tree_with(path, |_, child| child.dev() != root_dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "paramount_test_{}_{}",
            name,
            uuid::Uuid::new_v4().simple()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_remove_nested_tree() {
        let root = scratch("nested");
        fs::create_dir_all(root.join("mount/d0000")).unwrap();
        fs::create_dir_all(root.join("client/d0000")).unwrap();
        fs::write(root.join("mount/d0000/file"), b"data").unwrap();

        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_path_is_ok() {
        let root = scratch("missing");
        remove_tree_secure(&root).unwrap();
        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_symlink_target_untouched() {
        let outside = scratch("outside");
        fs::write(outside.join("keep"), b"keep").unwrap();

        let root = scratch("linked");
        std::os::unix::fs::symlink(&outside, root.join("link")).unwrap();

        remove_tree_secure(&root).unwrap();
        assert!(!root.exists());
        assert!(outside.join("keep").exists());

        remove_tree_secure(&outside).unwrap();
    }

    #[test]
    fn test_stuck_mountpoint_does_not_stop_siblings() {
        let root = scratch("stuck");
        for i in 0..6 {
            fs::create_dir_all(root.join(format!("mount/d{:04}", i))).unwrap();
            fs::create_dir_all(root.join(format!("client/d{:04}", i))).unwrap();
        }
        fs::write(root.join("client/d0000/remote-file"), b"data").unwrap();

        // Stand-in for a client directory that is still mounted.
        let err = remove_tree_with(&root, |path, _| path.ends_with("client/d0000")).unwrap_err();
        assert!(err.to_string().contains("client/d0000"));

        assert!(root.join("client/d0000/remote-file").exists());
        assert!(!root.join("mount").exists());
        let left: Vec<_> = fs::read_dir(root.join("client"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(left, vec![std::ffi::OsString::from("d0000")]);

        remove_tree_secure(&root).unwrap();
    }
}
