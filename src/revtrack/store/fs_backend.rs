use super::backend::{Area, StorageBackend};
use crate::error::{Result, RevtrackError};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Artifacts as plain files below a state directory (normally `<folder>/.revtrack`).
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn area_dir(&self, area: Area) -> PathBuf {
        match area.dir_name() {
            Some(dir) => self.root.join(dir),
            None => self.root.clone(),
        }
    }

    fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).map_err(RevtrackError::Io)?;
        }
        Ok(())
    }
}

/// Write `content` next to `target` under a unique temporary name, then rename over it.
pub(crate) fn write_atomic(target: &Path, content: &str) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| RevtrackError::Store(format!("no parent for {}", target.display())))?;
    let stem = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = dir.join(format!(".{}-{}.tmp", stem, Uuid::new_v4()));
    fs::write(&tmp_path, content).map_err(RevtrackError::Io)?;
    if let Err(err) = fs::rename(&tmp_path, target) {
        let _ = fs::remove_file(&tmp_path);
        return Err(RevtrackError::Io(err));
    }
    Ok(())
}

impl StorageBackend for FsBackend {
    fn read(&self, area: Area, name: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path(area, name)) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(RevtrackError::Io(err)),
        }
    }

    fn write(&self, area: Area, name: &str, content: &str) -> Result<()> {
        let dir = self.area_dir(area);
        self.ensure_dir(&dir)?;
        write_atomic(&dir.join(name), content)
    }

    fn create_new(&self, area: Area, name: &str, content: &str) -> Result<bool> {
        let dir = self.area_dir(area);
        self.ensure_dir(&dir)?;
        let tmp_path = dir.join(format!(".{}-{}.tmp", name, Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(RevtrackError::Io)?;
        let linked = fs::hard_link(&tmp_path, dir.join(name));
        let _ = fs::remove_file(&tmp_path);
        match linked {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(err) => Err(RevtrackError::Io(err)),
        }
    }

    fn delete(&self, area: Area, name: &str) -> Result<bool> {
        match fs::remove_file(self.path(area, name)) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(RevtrackError::Io(err)),
        }
    }

    fn relocate(&self, from: (Area, &str), to: (Area, &str)) -> Result<bool> {
        let source = self.path(from.0, from.1);
        if !source.exists() {
            return Ok(false);
        }
        self.ensure_dir(&self.area_dir(to.0))?;
        fs::rename(&source, self.path(to.0, to.1)).map_err(RevtrackError::Io)?;
        Ok(true)
    }

    fn list(&self, area: Area) -> Result<Vec<String>> {
        let dir = self.area_dir(area);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&dir).map_err(RevtrackError::Io)? {
            let entry = entry.map_err(RevtrackError::Io)?;
            if !entry.file_type().map_err(RevtrackError::Io)?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn modified(&self, area: Area, name: &str) -> Result<Option<DateTime<Utc>>> {
        match fs::metadata(self.path(area, name)) {
            Ok(meta) => Ok(Some(meta.modified().map_err(RevtrackError::Io)?.into())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(RevtrackError::Io(err)),
        }
    }

    fn path(&self, area: Area, name: &str) -> PathBuf {
        self.area_dir(area).join(name)
    }
}
