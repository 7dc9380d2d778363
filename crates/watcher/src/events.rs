//! File change event types
//!
//! This module defines the transient change values the supervisor reacts to
//! and their conversion from raw notify events.

use notify::event::{CreateKind, MetadataKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event as NotifyEvent, EventKind};
use std::path::{Path, PathBuf};

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single filesystem change delivered by the watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Path as reported by the backend
    pub path: PathBuf,
    /// Kind of change
    pub kind: ChangeKind,
    /// Whether the backend reported the path as a directory
    pub is_dir: bool,
}

impl ChangeEvent {
    /// Create a change event for a file
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: false,
        }
    }

    /// Create a change event for a directory
    pub fn dir(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
            is_dir: true,
        }
    }

    /// Shorthand for a modified file
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self::new(path, ChangeKind::Modified)
    }

    /// Get the path associated with this change
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Convert a notify event into zero or more change events
    ///
    /// Renames are split into a removal of the old path and a creation of the
    /// new one. Access events and access-time-only metadata updates are
    /// dropped since reading a file must never restart the child.
    pub fn from_notify(event: &NotifyEvent) -> Vec<Self> {
        let each = |kind: ChangeKind, is_dir: bool| -> Vec<Self> {
            event
                .paths
                .iter()
                .map(|path| Self {
                    path: path.clone(),
                    kind,
                    is_dir,
                })
                .collect()
        };

        match event.kind {
            EventKind::Create(kind) => each(ChangeKind::Created, kind == CreateKind::Folder),
            EventKind::Remove(kind) => each(ChangeKind::Removed, kind == RemoveKind::Folder),
            EventKind::Modify(ModifyKind::Name(mode)) => match mode {
                RenameMode::From => each(ChangeKind::Removed, false),
                RenameMode::To => each(ChangeKind::Created, false),
                RenameMode::Both => event
                    .paths
                    .iter()
                    .enumerate()
                    .map(|(i, path)| {
                        let kind = if i == 0 {
                            ChangeKind::Removed
                        } else {
                            ChangeKind::Created
                        };
                        Self::new(path.clone(), kind)
                    })
                    .collect(),
                _ => each(ChangeKind::Modified, false),
            },
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => Vec::new(),
            // Backends that cannot classify a change still report a change
            EventKind::Modify(_) | EventKind::Any => each(ChangeKind::Modified, false),
            EventKind::Access(_) | EventKind::Other => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange};
    use pretty_assertions::assert_eq;

    fn notify_event(kind: EventKind, paths: &[&str]) -> NotifyEvent {
        paths
            .iter()
            .fold(NotifyEvent::new(kind), |event, p| event.add_path(PathBuf::from(p)))
    }

    #[test]
    fn test_create_and_remove_conversion() {
        let created = ChangeEvent::from_notify(&notify_event(
            EventKind::Create(CreateKind::File),
            &["/app/server.js"],
        ));
        assert_eq!(
            created,
            vec![ChangeEvent::new("/app/server.js", ChangeKind::Created)]
        );

        let removed = ChangeEvent::from_notify(&notify_event(
            EventKind::Remove(RemoveKind::Folder),
            &["/app/lib"],
        ));
        assert_eq!(removed, vec![ChangeEvent::dir("/app/lib", ChangeKind::Removed)]);
    }

    #[test]
    fn test_rename_both_is_split() {
        let events = ChangeEvent::from_notify(&notify_event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/app/.server.js.swp", "/app/server.js"],
        ));

        assert_eq!(
            events,
            vec![
                ChangeEvent::new("/app/.server.js.swp", ChangeKind::Removed),
                ChangeEvent::new("/app/server.js", ChangeKind::Created),
            ]
        );
    }

    #[test]
    fn test_data_change_is_modification() {
        let events = ChangeEvent::from_notify(&notify_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/app/server.js"],
        ));
        assert_eq!(events, vec![ChangeEvent::modified("/app/server.js")]);
    }

    #[test]
    fn test_reads_are_dropped() {
        let access = notify_event(EventKind::Access(AccessKind::Any), &["/app/server.js"]);
        assert!(ChangeEvent::from_notify(&access).is_empty());

        let atime = notify_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)),
            &["/app/server.js"],
        );
        assert!(ChangeEvent::from_notify(&atime).is_empty());

        let touch = notify_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::WriteTime)),
            &["/app/server.js"],
        );
        assert_eq!(ChangeEvent::from_notify(&touch).len(), 1);
    }
}
