//! The four supported forensic parsers and where they live on disk.
//!
//! Each tool is a [`ToolKind`] variant carrying its own input flag, batch-file
//! requirement and default-input rule. A [`Registry`] binds the variants to a
//! deployment layout (tools directory, batch file, CSV viewer).

use crate::drives::Drive;
use std::path::{Path, PathBuf};

/// Accepted-file filter shown when picking an input: (label, glob).
pub type FileFilter = (&'static str, &'static str);

const ALL_FILES: &[FileFilter] = &[("All files", "*.*")];

/// Per-user folders holding jump lists, relative to the profile directory.
const RECENT_DIR: [&str; 5] = ["AppData", "Roaming", "Microsoft", "Windows", "Recent"];
const JUMP_LIST_DIRS: [&str; 2] = ["CustomDestinations", "AutomaticDestinations"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Mft,
    Registry,
    JumpLists,
    Prefetch,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown tool: {0} (expected one of MFTECmd, RECmd, JLECmd, PECmd)")]
    UnknownTool(String),
}

/// Why a tool's default input could not be derived.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissingInput {
    #[error("no user selected")]
    NoUser,
    #[error("no Jump List folders found")]
    NoJumpListFolders { searched: Vec<PathBuf> },
}

impl ToolKind {
    pub const ALL: [ToolKind; 4] = [
        ToolKind::Mft,
        ToolKind::Registry,
        ToolKind::JumpLists,
        ToolKind::Prefetch,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ToolKind::Mft => "MFTECmd",
            ToolKind::Registry => "RECmd",
            ToolKind::JumpLists => "JLECmd",
            ToolKind::Prefetch => "PECmd",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(id.trim()))
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::Mft => "MFT analysis",
            ToolKind::Registry => "Registry analysis",
            ToolKind::JumpLists => "Jump List analysis",
            ToolKind::Prefetch => "Prefetch analysis",
        }
    }

    pub fn file_filters(self) -> &'static [FileFilter] {
        ALL_FILES
    }

    /// `-f` for tools reading a single file, `-d` for directory inputs.
    pub fn input_flag(self) -> &'static str {
        match self {
            ToolKind::Mft => "-f",
            _ => "-d",
        }
    }

    /// The MFT parser reads `$MFT` straight off the volume root.
    pub fn uses_drive_directly(self) -> bool {
        matches!(self, ToolKind::Mft)
    }

    pub fn requires_batch_file(self) -> bool {
        matches!(self, ToolKind::Registry)
    }

    /// Multi-input tools run once per input folder into a shared output directory.
    pub fn is_multi_input(self) -> bool {
        matches!(self, ToolKind::JumpLists)
    }

    /// Executable location relative to the tools directory.
    fn relative_executable(self) -> PathBuf {
        match self {
            ToolKind::Registry => Path::new("RECmd").join("RECmd.exe"),
            other => PathBuf::from(format!("{}.exe", other.id())),
        }
    }

    /// Default input path(s) for this tool on `drive`.
    ///
    /// Pure for every tool except the jump-list parser, whose two Recent
    /// subfolders are filtered to the ones present on disk.
    pub fn default_input(
        self,
        drive: &Drive,
        user: Option<&str>,
    ) -> Result<Vec<PathBuf>, MissingInput> {
        match self {
            ToolKind::Mft => Ok(vec![drive.join(["$MFT"])]),
            ToolKind::Registry => Ok(vec![drive.join(["Windows", "System32", "config"])]),
            ToolKind::Prefetch => Ok(vec![drive.join(["Windows", "Prefetch"])]),
            ToolKind::JumpLists => {
                let user = user.ok_or(MissingInput::NoUser)?;
                let searched = jump_list_folders(drive, user);
                let found: Vec<PathBuf> = searched.iter().filter(|p| p.exists()).cloned().collect();
                if found.is_empty() {
                    Err(MissingInput::NoJumpListFolders {
                        searched: searched.to_vec(),
                    })
                } else {
                    Ok(found)
                }
            }
        }
    }
}

/// `CustomDestinations` and `AutomaticDestinations` for `user`, whether or not they exist.
pub fn jump_list_folders(drive: &Drive, user: &str) -> [PathBuf; 2] {
    let recent = drive
        .join(["Users", user])
        .join(RECENT_DIR.iter().collect::<PathBuf>());
    JUMP_LIST_DIRS.map(|d| recent.join(d))
}

/// Immutable description of one tool as deployed on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub kind: ToolKind,
    pub id: &'static str,
    pub description: &'static str,
    pub filters: &'static [FileFilter],
    pub executable: PathBuf,
    pub direct_drive: bool,
}

/// How the tools directory is located when it is not given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ToolsBase {
    /// `../net6` next to the directory holding this executable.
    Exe,
    /// `../net6` relative to the current working directory.
    Cwd,
}

/// Deployment layout: where executables, the batch file and the viewer live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub tools_dir: PathBuf,
    pub batch_file: PathBuf,
    /// `None` disables opening results.
    pub viewer: Option<PathBuf>,
}

impl ToolPaths {
    pub fn from_tools_dir(tools_dir: impl Into<PathBuf>) -> Self {
        let tools_dir = tools_dir.into();
        Self {
            batch_file: tools_dir
                .join("RECmd")
                .join("BatchExamples")
                .join("CTL.reb"),
            viewer: Some(
                tools_dir
                    .join("TimelineExplorer")
                    .join("TimelineExplorer.exe"),
            ),
            tools_dir,
        }
    }

    pub fn resolve_tools_dir(base: ToolsBase) -> PathBuf {
        let anchor = match base {
            ToolsBase::Exe => app_directory(),
            ToolsBase::Cwd => PathBuf::from("."),
        };
        anchor.join("..").join("net6")
    }
}

/// Directory holding the running executable, without the `\\?\` prefix canonicalize adds on Windows.
pub fn app_directory() -> PathBuf {
    if let Ok(exe_path) = std::env::current_exe() {
        let resolved = exe_path.canonicalize().unwrap_or(exe_path);
        if let Some(parent) = resolved.parent() {
            let parent_str = parent.to_string_lossy();
            if let Some(stripped) = parent_str.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
            return parent.to_path_buf();
        }
    }
    tracing::warn!("could not determine executable directory, using current directory");
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[derive(Debug, Clone)]
pub struct Registry {
    paths: ToolPaths,
}

impl Registry {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ToolPaths {
        &self.paths
    }

    pub fn batch_file(&self) -> &Path {
        &self.paths.batch_file
    }

    pub fn viewer(&self) -> Option<&Path> {
        self.paths.viewer.as_deref()
    }

    pub fn descriptor(&self, kind: ToolKind) -> ToolDescriptor {
        ToolDescriptor {
            kind,
            id: kind.id(),
            description: kind.description(),
            filters: kind.file_filters(),
            executable: self.paths.tools_dir.join(kind.relative_executable()),
            direct_drive: kind.uses_drive_directly(),
        }
    }

    pub fn lookup(&self, id: &str) -> Result<ToolDescriptor, RegistryError> {
        ToolKind::from_id(id)
            .map(|kind| self.descriptor(kind))
            .ok_or_else(|| RegistryError::UnknownTool(id.to_string()))
    }

    pub fn all(&self) -> Vec<ToolDescriptor> {
        ToolKind::ALL.iter().map(|k| self.descriptor(*k)).collect()
    }
}
