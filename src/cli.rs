use crate::drives::{self, Drive};
use crate::registry::{Registry, ToolPaths, ToolsBase};
use crate::session::{self, SessionState};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "ez-forensics",
    version,
    about = "Run MFTECmd, RECmd, JLECmd and PECmd against a drive with a live console"
)]
pub struct Cli {
    /// Tool to preselect: MFTECmd, RECmd, JLECmd or PECmd
    #[arg(long)]
    pub tool: Option<String>,

    /// Drive to open (e.g. C:) or a directory used as the volume root
    #[arg(long)]
    pub drive: Option<String>,

    /// User profile to preselect (defaults to the first one found)
    #[arg(long)]
    pub user: Option<String>,

    /// Initial input path(s); several folders are separated by ';'
    #[arg(long, value_delimiter = ';')]
    pub input: Vec<PathBuf>,

    /// Initial folder receiving the CSV output
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Output file name (a folder name for JLECmd); defaults to output_<timestamp>.csv
    #[arg(long)]
    pub output_name: Option<String>,

    /// Directory holding the parser executables (overrides --tools-base)
    #[arg(long)]
    pub tools_dir: Option<PathBuf>,

    /// Where to look for ../net6 when --tools-dir is not given
    #[arg(long, value_enum, default_value_t = ToolsBase::Exe)]
    pub tools_base: ToolsBase,

    /// RECmd batch file (.reb); defaults to RECmd/BatchExamples/CTL.reb in the tools directory
    #[arg(long)]
    pub batch_file: Option<PathBuf>,

    /// CSV viewer executable; defaults to TimelineExplorer in the tools directory
    #[arg(long)]
    pub viewer: Option<PathBuf>,

    /// Do not open results in the CSV viewer
    #[arg(long)]
    pub no_viewer: bool,

    /// Write diagnostic logs to this file (filter with RUST_LOG)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

pub async fn run(args: Cli) -> Result<()> {
    init_logging(&args)?;
    crate::tui::run(args).await
}

/// Diagnostics go to `--log-file` when given. The TUI owns the terminal, so
/// without a log file nothing is logged.
fn init_logging(args: &Cli) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let Some(path) = args.log_file.as_deref() else {
        return Ok(());
    };
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}

/// Build the deployment layout from CLI arguments.
pub fn build_registry(args: &Cli) -> Registry {
    let tools_dir = args
        .tools_dir
        .clone()
        .unwrap_or_else(|| ToolPaths::resolve_tools_dir(args.tools_base));
    let mut paths = ToolPaths::from_tools_dir(tools_dir);
    if let Some(batch) = args.batch_file.clone() {
        paths.batch_file = batch;
    }
    if let Some(viewer) = args.viewer.clone() {
        paths.viewer = Some(viewer);
    }
    if args.no_viewer {
        paths.viewer = None;
    }
    tracing::info!(tools_dir = %paths.tools_dir.display(), "tool layout resolved");
    Registry::new(paths)
}

/// Build the initial session from CLI arguments (drive, user, tool, paths).
pub fn build_session(args: &Cli, registry: &Registry) -> Result<SessionState> {
    let drive = args
        .drive
        .as_deref()
        .map(Drive::parse)
        .unwrap_or_else(|| Drive::letter(drives::DEFAULT_DRIVE_LETTER));
    let mut state = SessionState::new(drive, drives::list_available_drives());

    if let Some(user) = args.user.as_deref() {
        if !state.select_user_by_name(user) {
            state.warn(format!("User {user} not found on drive {}", state.drive));
        }
    }
    if let Some(id) = args.tool.as_deref() {
        let descriptor = registry.lookup(id)?;
        state.select_tool(descriptor.kind);
    }
    if !args.input.is_empty() {
        state.inputs = args.input.clone();
    }
    if let Some(dir) = args.output_dir.clone() {
        state.select_output(dir, session::now_local());
    }
    if let Some(name) = args.output_name.clone() {
        state.output_name = name;
    }
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_honours_overrides() {
        let args = Cli::parse_from([
            "ez-forensics",
            "--tools-dir",
            "/opt/net6",
            "--batch-file",
            "/cases/custom.reb",
            "--no-viewer",
        ]);
        let registry = build_registry(&args);
        assert_eq!(registry.paths().tools_dir, PathBuf::from("/opt/net6"));
        assert_eq!(registry.batch_file(), std::path::Path::new("/cases/custom.reb"));
        assert!(registry.viewer().is_none());
    }

    #[test]
    fn there_is_no_headless_mode() {
        assert!(Cli::try_parse_from(["ez-forensics", "--text"]).is_err());
    }

    #[test]
    fn input_flag_accepts_semicolon_lists() {
        let args = Cli::parse_from(["ez-forensics", "--input", "/a/Custom;/a/Automatic"]);
        assert_eq!(
            args.input,
            vec![PathBuf::from("/a/Custom"), PathBuf::from("/a/Automatic")]
        );
    }

    #[test]
    fn session_from_args_selects_tool_user_and_output() {
        let tmp = tempfile::tempdir().unwrap();
        for user in ["alice", "bob"] {
            std::fs::create_dir_all(tmp.path().join("Users").join(user)).unwrap();
        }
        let drive = tmp.path().to_string_lossy().into_owned();
        let out = tmp.path().join("out").to_string_lossy().into_owned();
        let args = Cli::parse_from([
            "ez-forensics",
            "--drive",
            drive.as_str(),
            "--user",
            "bob",
            "--tool",
            "pecmd",
            "--output-dir",
            out.as_str(),
            "--output-name",
            "pf.csv",
        ]);
        let registry = build_registry(&args);
        let state = build_session(&args, &registry).unwrap();

        assert_eq!(state.selected_user(), Some("bob"));
        assert_eq!(state.tool, Some(crate::registry::ToolKind::Prefetch));
        assert_eq!(state.output_name, "pf.csv");
        assert_eq!(state.output_dir, Some(tmp.path().join("out")));
    }

    #[test]
    fn unknown_tool_is_rejected() {
        let args = Cli::parse_from(["ez-forensics", "--tool", "EvtxECmd"]);
        let registry = build_registry(&args);
        let err = build_session(&args, &registry).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }
}
