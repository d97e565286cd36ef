use std::path::PathBuf;
use std::time::Duration;

/// Where a plan writes its CSV output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Single-input tools write exactly one CSV file.
    File(PathBuf),
    /// The jump-list tool writes one CSV per input folder into this directory.
    Directory(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> &std::path::Path {
        match self {
            OutputTarget::File(p) | OutputTarget::Directory(p) => p,
        }
    }
}

/// Outcome of one external process, as returned by the runner.
#[derive(Debug, Clone, Default)]
pub struct InvocationResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: String,
}

impl InvocationResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone)]
pub struct CommandRecord {
    pub input: PathBuf,
    pub exit_code: Option<i32>,
    pub stdout_lines: usize,
    pub stderr: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    /// A command exited non-zero; later commands were not started.
    ExitFailure {
        index: usize,
        code: Option<i32>,
    },
    /// A command could not be started at all.
    LaunchFailed {
        index: usize,
        error: String,
    },
}

/// Everything known about a finished run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub tool: String,
    pub elapsed_ms: u64,
    pub output: OutputTarget,
    pub commands: Vec<CommandRecord>,
    pub status: RunStatus,
    pub result_files: Vec<PathBuf>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

#[derive(Debug, Clone)]
pub enum RunEvent {
    CommandStarted {
        index: usize,
        total: usize,
        display: String,
        input: PathBuf,
    },
    /// One stdout line, relayed as soon as it was read.
    OutputLine {
        line: String,
    },
    /// Accumulated stderr of a command, sent once after its stdout closed.
    ErrorOutput {
        text: String,
    },
    CommandFinished {
        index: usize,
        exit_code: Option<i32>,
        elapsed: Duration,
    },
    Info(InfoEvent),
    RunCompleted {
        // Boxed to keep the per-line events small.
        summary: Box<RunSummary>,
    },
    /// The run stopped on an I/O fault before a summary could be built.
    RunFailed {
        error: String,
    },
}

/// Structured status messages emitted by the engine and orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InfoEvent {
    Message(String),
    LaunchFailed { program: PathBuf, error: String },
    ExitFailure { code: Option<i32> },
    Abandoned { remaining: usize },
    Completed { output: OutputTarget },
    ViewerMissing { path: PathBuf },
    OpeningViewer { file: PathBuf },
    ViewerFailed { file: PathBuf, error: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::LaunchFailed { program, error } => {
                format!("Error: could not start {}: {}", program.display(), error)
            }
            InfoEvent::ExitFailure { code: Some(code) } => {
                format!("Execution error (code {})", code)
            }
            InfoEvent::ExitFailure { code: None } => {
                "Execution error (terminated without exit code)".to_string()
            }
            InfoEvent::Abandoned { remaining } => {
                format!("Skipped {} remaining folder(s)", remaining)
            }
            InfoEvent::Completed { output } => match output {
                OutputTarget::File(p) => {
                    format!("Analysis completed successfully. File created: {}", p.display())
                }
                OutputTarget::Directory(p) => {
                    format!(
                        "Analysis completed successfully. Files created in: {}",
                        p.display()
                    )
                }
            },
            InfoEvent::ViewerMissing { path } => {
                format!("Error: CSV viewer not found at {}", path.display())
            }
            InfoEvent::OpeningViewer { file } => {
                format!("Opening with CSV viewer: {}", file.display())
            }
            InfoEvent::ViewerFailed { file, error } => {
                format!("Error opening {} with CSV viewer: {}", file.display(), error)
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            InfoEvent::LaunchFailed { .. }
                | InfoEvent::ExitFailure { .. }
                | InfoEvent::ViewerMissing { .. }
                | InfoEvent::ViewerFailed { .. }
        )
    }
}
