//! Turning raw notifier events into save pipeline calls.

use crate::api::RevtrackApi;
use crate::commands::save::SaveOutcome;
use crate::error::Result;
use crate::store::StorageBackend;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

/// Removals, access and metadata-only changes yield nothing. A rename seen only from its
/// source side left the folder; seen only from its destination side, it arrived.
pub fn classify(event: &Event) -> Vec<FileEvent> {
    match &event.kind {
        EventKind::Create(_) => event.paths.iter().cloned().map(FileEvent::Created).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => match event.paths.as_slice() {
            [from, to] => vec![FileEvent::Moved {
                from: from.clone(),
                to: to.clone(),
            }],
            _ => Vec::new(),
        },
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().cloned().map(FileEvent::Created).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .filter(|path| path.exists())
            .cloned()
            .map(FileEvent::Modified)
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event.paths.iter().cloned().map(FileEvent::Modified).collect(),
        _ => Vec::new(),
    }
}

pub fn handle<B: StorageBackend>(api: &RevtrackApi<B>, event: &FileEvent) -> Result<SaveOutcome> {
    match event {
        FileEvent::Created(path) => api.on_created(path),
        FileEvent::Modified(path) => api.on_modified(path),
        FileEvent::Moved { from, to } => api.on_moved(from, to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for path in paths {
            event = event.add_path(PathBuf::from(path));
        }
        event
    }

    #[test]
    fn create_and_write() {
        let created = event(EventKind::Create(CreateKind::File), &["/d/a.txt"]);
        assert_eq!(classify(&created), vec![FileEvent::Created("/d/a.txt".into())]);

        let written = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/d/a.txt"],
        );
        assert_eq!(classify(&written), vec![FileEvent::Modified("/d/a.txt".into())]);
    }

    #[test]
    fn renames() {
        let both = event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/d/a.txt", "/d/b.txt"],
        );
        assert_eq!(
            classify(&both),
            vec![FileEvent::Moved {
                from: "/d/a.txt".into(),
                to: "/d/b.txt".into()
            }]
        );

        let arrived = event(EventKind::Modify(ModifyKind::Name(RenameMode::To)), &["/d/b.txt"]);
        assert_eq!(classify(&arrived), vec![FileEvent::Created("/d/b.txt".into())]);

        let left = event(EventKind::Modify(ModifyKind::Name(RenameMode::From)), &["/d/a.txt"]);
        assert!(classify(&left).is_empty());
    }

    #[test]
    fn noise_is_dropped() {
        let removed = event(EventKind::Remove(RemoveKind::File), &["/d/a.txt"]);
        assert!(classify(&removed).is_empty());
        let touched = event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            &["/d/a.txt"],
        );
        assert!(classify(&touched).is_empty());
    }
}
