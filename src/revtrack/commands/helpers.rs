use crate::commands::{Context, Target};
use crate::error::{Result, RevtrackError};
use crate::folder::{read_document, Workspace};
use crate::header;
use crate::model::StorageKey;
use crate::revision::RevisionId;
use crate::store::StorageBackend;

/// Header revision of the document a `./path` reference points at, `None` when the
/// document is missing or has no readable header.
pub fn reference_revision(workspace: &Workspace, reference: &str) -> Result<Option<RevisionId>> {
    let path = workspace.resolve(reference);
    Ok(read_document(&path)?.and_then(|content| header::header_revision(&content)))
}

/// Record keys a target expands to. A single key must have a record.
pub fn target_keys<B: StorageBackend>(ctx: Context<'_, B>, target: &Target) -> Result<Vec<StorageKey>> {
    match target {
        Target::All => ctx.store.record_keys(),
        Target::Key(key) => {
            if ctx.store.has_record(key)? {
                Ok(vec![key.clone()])
            } else {
                Err(RevtrackError::NotTracked(key.display_path()))
            }
        }
    }
}
