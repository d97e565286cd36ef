//! Opens CSV results in an external viewer without waiting for it.

use crate::model::InfoEvent;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Launches a program with one argument and does not wait for it.
pub trait DetachedSpawn {
    fn spawn_detached(&self, program: &Path, arg: &Path) -> std::io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawn;

impl DetachedSpawn for SystemSpawn {
    fn spawn_detached(&self, program: &Path, arg: &Path) -> std::io::Result<()> {
        // Dropping the Child neither waits for nor kills the viewer.
        Command::new(program)
            .arg(arg)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }
}

#[derive(Debug, Clone)]
pub struct ResultOpener<S = SystemSpawn> {
    viewer: Option<PathBuf>,
    spawner: S,
}

impl ResultOpener<SystemSpawn> {
    pub fn new(viewer: Option<PathBuf>) -> Self {
        Self::with_spawner(viewer, SystemSpawn)
    }
}

impl<S: DetachedSpawn> ResultOpener<S> {
    pub fn with_spawner(viewer: Option<PathBuf>, spawner: S) -> Self {
        Self { viewer, spawner }
    }

    pub fn is_enabled(&self) -> bool {
        self.viewer.is_some()
    }

    /// Launch the viewer once per file. A missing viewer is reported and
    /// skipped; it never fails the run.
    pub fn open_all(&self, files: &[PathBuf]) -> Vec<InfoEvent> {
        let Some(viewer) = self.viewer.as_deref() else {
            return Vec::new();
        };
        if files.is_empty() {
            return Vec::new();
        }
        if !viewer.exists() {
            tracing::warn!(viewer = %viewer.display(), "CSV viewer not found");
            return vec![InfoEvent::ViewerMissing {
                path: viewer.to_path_buf(),
            }];
        }

        let mut events = Vec::with_capacity(files.len());
        for file in files {
            events.push(InfoEvent::OpeningViewer { file: file.clone() });
            if let Err(e) = self.spawner.spawn_detached(viewer, file) {
                events.push(InfoEvent::ViewerFailed {
                    file: file.clone(),
                    error: e.to_string(),
                });
            }
        }
        events
    }
}
