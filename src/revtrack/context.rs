use crate::api::RevtrackApi;
use crate::error::Result;
use crate::store::fs_backend::FsBackend;
use crate::store::STATE_DIR;
use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Find the tracked folder by walking up from cwd looking for a `.revtrack` directory.
/// Returns None if none is found before reaching home or the filesystem root.
pub fn find_tracked_root(cwd: &Path) -> Option<PathBuf> {
    let home_dir = BaseDirs::new().map(|bd| bd.home_dir().to_path_buf());
    let mut current = cwd.to_path_buf();

    loop {
        if current.join(STATE_DIR).is_dir() {
            return Some(current);
        }

        // Check stop conditions: reached home dir or volume root
        if let Some(ref home) = home_dir {
            if &current == home {
                return None;
            }
        }

        match current.parent() {
            Some(parent) if parent != current => {
                current = parent.to_path_buf();
            }
            _ => return None,
        }
    }
}

/// The folder to operate on: `dir` when given, else the nearest tracked ancestor of
/// `cwd`, else `cwd` itself (so `init` can start tracking it).
pub fn resolve_folder(cwd: &Path, dir: Option<&Path>) -> PathBuf {
    match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => find_tracked_root(cwd).unwrap_or_else(|| cwd.to_path_buf()),
    }
}

pub fn open(cwd: &Path, dir: Option<&Path>) -> Result<RevtrackApi<FsBackend>> {
    let folder = resolve_folder(cwd, dir);
    tracing::debug!(folder = %folder.display(), "opening tracked folder");
    RevtrackApi::open(folder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_the_nearest_tracked_ancestor() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("docs");
        let nested = root.join("a/b");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(root.join(STATE_DIR)).unwrap();

        assert_eq!(find_tracked_root(&nested), Some(root.clone()));
        assert_eq!(find_tracked_root(&root), Some(root));
    }

    #[test]
    fn untracked_tree_falls_back_to_cwd() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path().join("plain");
        fs::create_dir_all(&cwd).unwrap();

        assert_eq!(resolve_folder(&cwd, None), cwd);
    }

    #[test]
    fn explicit_dir_wins() {
        let dir = TempDir::new().unwrap();
        let cwd = dir.path();
        fs::create_dir_all(cwd.join(STATE_DIR)).unwrap();

        assert_eq!(resolve_folder(cwd, Some(Path::new("other"))), cwd.join("other"));
        assert_eq!(
            resolve_folder(cwd, Some(Path::new("/abs/folder"))),
            PathBuf::from("/abs/folder")
        );
    }
}
