//! Interactive session state and the operations that mutate it.
//!
//! The state is an explicit struct owned by a single thread (the UI thread,
//! which forwards run events into it). Every operation reports what it did as console
//! lines, the same way the interface shows them.

use crate::drives::{self, Drive, UserListing};
use crate::engine::builder::{self, InvocationPlan};
use crate::registry::{MissingInput, Registry, ToolKind};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use time::OffsetDateTime;

/// Console history is capped; the oldest lines are dropped first.
const MAX_CONSOLE_LINES: usize = 20_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Output,
    Error,
    Info,
    Warning,
    Command,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub kind: LineKind,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub drive: Drive,
    pub drives: Vec<Drive>,
    pub users: Vec<String>,
    pub selected_user: Option<usize>,
    pub tool: Option<ToolKind>,
    /// One path, or several folders for the jump-list tool.
    pub inputs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub output_name: String,
    pub console: VecDeque<ConsoleLine>,
}

impl SessionState {
    /// New session on `drive`; `drives` is the selectable set (the drive is added if missing).
    pub fn new(drive: Drive, mut drives: Vec<Drive>) -> Self {
        if !drives.contains(&drive) {
            drives.push(drive.clone());
        }
        let mut state = Self {
            drive,
            drives,
            users: Vec::new(),
            selected_user: None,
            tool: None,
            inputs: Vec::new(),
            output_dir: None,
            output_name: String::new(),
            console: VecDeque::new(),
        };
        state.refresh_users();
        state
    }

    /// Append `text`, one console line per line of text. An empty string is
    /// kept as a blank line.
    pub fn push(&mut self, kind: LineKind, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.push_line(kind, String::new());
        } else {
            for line in text.lines() {
                self.push_line(kind, line.to_string());
            }
        }
    }

    fn push_line(&mut self, kind: LineKind, text: String) {
        if self.console.len() == MAX_CONSOLE_LINES {
            self.console.pop_front();
        }
        self.console.push_back(ConsoleLine { kind, text });
    }

    pub fn info(&mut self, text: impl AsRef<str>) {
        self.push(LineKind::Info, text);
    }

    pub fn warn(&mut self, text: impl AsRef<str>) {
        self.push(LineKind::Warning, text);
    }

    pub fn error(&mut self, text: impl AsRef<str>) {
        self.push(LineKind::Error, text);
    }

    pub fn clear_console(&mut self) {
        self.console.clear();
    }

    /// Switch drive: clears the console, re-lists users and, for the MFT
    /// tool, re-derives the input path on the new volume.
    pub fn set_drive(&mut self, drive: Drive) {
        if !self.drives.contains(&drive) {
            self.drives.push(drive.clone());
        }
        self.drive = drive;
        self.clear_console();
        self.refresh_users();
        if self.tool == Some(ToolKind::Mft) {
            self.select_input();
        }
    }

    /// Re-list user profiles on the current drive and select the first one.
    pub fn refresh_users(&mut self) {
        self.refresh_users_with(drives::list_users);
    }

    /// [`Self::refresh_users`] with an injectable profile lister.
    pub fn refresh_users_with(&mut self, list: impl FnOnce(&Drive) -> io::Result<UserListing>) {
        self.users.clear();
        self.selected_user = None;
        match list(&self.drive) {
            Ok(UserListing::Found { users, .. }) => {
                self.info(format!("Users found: {}", users.join(", ")));
                self.selected_user = if users.is_empty() { None } else { Some(0) };
                self.users = users;
            }
            Ok(UserListing::NoProfilesDir { .. }) => {
                let msg = format!("Users folder not found on drive {}", self.drive);
                self.warn(msg);
            }
            Err(e) => {
                tracing::warn!(drive = %self.drive, error = %e, "listing users failed");
                self.error(format!("Error reading users: {e}"));
            }
        }
    }

    pub fn selected_user(&self) -> Option<&str> {
        self.selected_user
            .and_then(|i| self.users.get(i))
            .map(String::as_str)
    }

    pub fn select_user(&mut self, index: usize) {
        if index < self.users.len() {
            self.selected_user = Some(index);
        }
    }

    pub fn select_user_by_name(&mut self, name: &str) -> bool {
        match self.users.iter().position(|u| u.eq_ignore_ascii_case(name)) {
            Some(i) => {
                self.selected_user = Some(i);
                true
            }
            None => false,
        }
    }

    /// Select a tool. Switching away from a previously selected tool clears
    /// the input; the MFT and registry tools then pre-fill their default.
    pub fn select_tool(&mut self, kind: ToolKind) {
        if self.tool.is_some() {
            self.inputs.clear();
        }
        self.tool = Some(kind);
        match kind {
            ToolKind::Mft | ToolKind::Registry => self.select_input(),
            ToolKind::JumpLists | ToolKind::Prefetch => {}
        }
    }

    /// Resolve the selected tool's default input on the current drive.
    pub fn select_input(&mut self) {
        let Some(tool) = self.tool else {
            self.error("Error: select a tool first");
            return;
        };
        let user = self.selected_user().map(str::to_owned);
        match tool.default_input(&self.drive, user.as_deref()) {
            Ok(paths) => {
                if paths.len() == 1 {
                    self.info(format!("Input selected: {}", paths[0].display()));
                } else {
                    self.info("Inputs selected:");
                    for p in &paths {
                        self.info(format!("- {}", p.display()));
                    }
                }
                self.inputs = paths;
            }
            Err(MissingInput::NoUser) => self.warn("No user selected"),
            Err(MissingInput::NoJumpListFolders { searched }) => {
                tracing::debug!(?searched, "no jump list folders on disk");
                self.warn("No Jump List folders found");
            }
        }
    }

    /// Set inputs from user-entered text; several paths are separated by `;`.
    pub fn set_inputs_from_text(&mut self, text: &str) {
        self.inputs = text
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
    }

    pub fn input_display(&self) -> String {
        self.inputs
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Choose the output directory and propose a timestamped output name.
    pub fn select_output(&mut self, dir: PathBuf, now: OffsetDateTime) {
        self.output_name = default_output_name(now);
        self.info(format!("Output folder selected: {}", dir.display()));
        self.output_dir = Some(dir);
    }

    /// Validate the selection and build the plan. Problems are written to the
    /// console and yield `None`; no process is started here.
    pub fn prepare_run(&mut self, registry: &Registry) -> Option<InvocationPlan> {
        if self.tool.is_some() && self.inputs.is_empty() {
            self.select_input();
        }

        let mut missing = Vec::new();
        if self.tool.is_none() {
            missing.push("tool");
        }
        if self.inputs.is_empty() {
            missing.push("input");
        }
        if self.output_dir.is_none() {
            missing.push("output folder");
        }
        if self.output_name.trim().is_empty() {
            missing.push("output name");
        }
        let (Some(tool), Some(output_dir), true) =
            (self.tool, self.output_dir.clone(), missing.is_empty())
        else {
            self.error(format!(
                "Error: all fields are required (missing: {})",
                missing.join(", ")
            ));
            return None;
        };

        let descriptor = registry.descriptor(tool);
        match builder::build_plan(
            &descriptor,
            &self.inputs,
            &output_dir,
            self.output_name.trim(),
            registry.batch_file(),
        ) {
            Ok(plan) => Some(plan),
            Err(e @ builder::BuildError::MissingBatchFile(_)) => {
                self.warn(e.to_string());
                None
            }
            Err(e) => {
                self.error(format!("Error: {e}"));
                None
            }
        }
    }
}

/// `output_YYYYMMDD_HHMMSS.csv` for `now`.
pub fn default_output_name(now: OffsetDateTime) -> String {
    let fmt = time::macros::format_description!(
        "output_[year][month][day]_[hour][minute][second].csv"
    );
    now.format(&fmt)
        .unwrap_or_else(|_| "output.csv".to_string())
}

/// Local time when the offset is known, UTC otherwise.
pub fn now_local() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutputTarget;
    use crate::registry::{jump_list_folders, ToolPaths};
    use std::path::Path;
    use time::macros::datetime;

    fn evidence() -> (tempfile::TempDir, Drive) {
        let tmp = tempfile::tempdir().unwrap();
        for user in ["alice", "Public", "bob"] {
            std::fs::create_dir_all(tmp.path().join("Users").join(user)).unwrap();
        }
        let drive = Drive::mounted_at(tmp.path());
        (tmp, drive)
    }

    #[test]
    fn new_session_lists_users_and_selects_the_first() {
        let (_tmp, drive) = evidence();
        let s = SessionState::new(drive.clone(), vec![]);
        assert_eq!(s.users, vec!["alice".to_string(), "bob".to_string()]);
        assert_eq!(s.selected_user(), Some("alice"));
        assert!(s.drives.contains(&drive));
        assert!(s.console.iter().any(|l| l.text == "Users found: alice, bob"));
    }

    #[test]
    fn missing_users_folder_is_reported_distinctly() {
        let tmp = tempfile::tempdir().unwrap();
        let s = SessionState::new(Drive::mounted_at(tmp.path()), vec![]);
        assert!(s.users.is_empty());
        assert_eq!(s.selected_user(), None);
        assert!(s
            .console
            .iter()
            .any(|l| l.kind == LineKind::Warning && l.text.starts_with("Users folder not found")));
    }

    #[test]
    fn user_listing_fault_is_reported_and_leaves_no_users() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive, vec![]);
        assert_eq!(s.selected_user(), Some("alice"));

        s.refresh_users_with(|_| {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "access denied"))
        });

        assert!(s.users.is_empty());
        assert_eq!(s.selected_user, None);
        let last = s.console.back().unwrap();
        assert_eq!(last.kind, LineKind::Error);
        assert_eq!(last.text, "Error reading users: access denied");
    }

    #[test]
    fn blank_lines_are_kept_in_the_console() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive, vec![]);
        s.clear_console();
        for line in ["Processed 3 files", "", "Done"] {
            s.push(LineKind::Output, line);
        }
        let texts: Vec<&str> = s.console.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Processed 3 files", "", "Done"]);
    }

    #[test]
    fn console_drops_oldest_lines_past_the_cap() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive, vec![]);
        s.clear_console();
        for i in 0..MAX_CONSOLE_LINES + 3 {
            s.push(LineKind::Output, i.to_string());
        }
        assert_eq!(s.console.len(), MAX_CONSOLE_LINES);
        assert_eq!(s.console.front().unwrap().text, "3");
        assert_eq!(
            s.console.back().unwrap().text,
            (MAX_CONSOLE_LINES + 2).to_string()
        );
    }

    #[test]
    fn switching_tools_clears_auto_populated_input() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive.clone(), vec![]);

        s.select_tool(ToolKind::Mft);
        assert_eq!(s.inputs, vec![drive.join(["$MFT"])]);

        s.select_tool(ToolKind::Prefetch);
        assert!(s.inputs.is_empty());
        assert_eq!(s.input_display(), "");
    }

    #[test]
    fn registry_tool_prefills_config_directory() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive.clone(), vec![]);
        s.select_tool(ToolKind::Registry);
        assert_eq!(s.inputs, vec![drive.join(["Windows", "System32", "config"])]);
    }

    #[test]
    fn changing_drive_rederives_mft_input_and_clears_console() {
        let (_tmp, first) = evidence();
        let (_tmp2, second) = evidence();
        let mut s = SessionState::new(first, vec![]);
        s.select_tool(ToolKind::Mft);
        s.info("old line");

        s.set_drive(second.clone());

        assert_eq!(s.inputs, vec![second.join(["$MFT"])]);
        assert!(!s.console.iter().any(|l| l.text == "old line"));
        assert_eq!(s.drive, second);
    }

    #[test]
    fn jump_list_input_uses_selected_user_folders() {
        let (_tmp, drive) = evidence();
        let [custom, automatic] = jump_list_folders(&drive, "bob");
        std::fs::create_dir_all(&custom).unwrap();
        std::fs::create_dir_all(&automatic).unwrap();

        let mut s = SessionState::new(drive, vec![]);
        assert!(s.select_user_by_name("bob"));
        s.select_tool(ToolKind::JumpLists);
        s.select_input();

        assert_eq!(s.inputs, vec![custom.clone(), automatic.clone()]);
        assert_eq!(
            s.input_display(),
            format!("{};{}", custom.display(), automatic.display())
        );
    }

    #[test]
    fn select_input_without_tool_is_an_error() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive, vec![]);
        s.select_input();
        assert!(s.inputs.is_empty());
        assert_eq!(s.console.back().map(|l| l.kind), Some(LineKind::Error));
    }

    #[test]
    fn text_inputs_split_on_semicolons() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive, vec![]);
        s.set_inputs_from_text(" /a/Custom ; ;/a/Automatic");
        assert_eq!(
            s.inputs,
            vec![PathBuf::from("/a/Custom"), PathBuf::from("/a/Automatic")]
        );
    }

    #[test]
    fn output_selection_proposes_timestamped_name() {
        let (_tmp, drive) = evidence();
        let mut s = SessionState::new(drive, vec![]);
        s.select_output(PathBuf::from("/cases"), datetime!(2024-03-05 07:08:09 UTC));
        assert_eq!(s.output_name, "output_20240305_070809.csv");
        assert_eq!(s.output_dir.as_deref(), Some(Path::new("/cases")));
    }

    #[test]
    fn prepare_run_requires_every_field() {
        let (_tmp, drive) = evidence();
        let registry = Registry::new(ToolPaths::from_tools_dir("/tools"));
        let mut s = SessionState::new(drive, vec![]);

        assert!(s.prepare_run(&registry).is_none());
        let last = s.console.back().unwrap();
        assert_eq!(last.kind, LineKind::Error);
        assert!(last.text.contains("tool"));
        assert!(last.text.contains("output folder"));
    }

    #[test]
    fn prefetch_without_explicit_input_resolves_default() {
        let (tmp, drive) = evidence();
        let registry = Registry::new(ToolPaths::from_tools_dir("/tools"));
        let mut s = SessionState::new(drive.clone(), vec![]);
        s.select_tool(ToolKind::Prefetch);
        s.select_output(tmp.path().join("out"), datetime!(2024-01-01 0:00 UTC));

        let plan = s.prepare_run(&registry).unwrap();

        assert_eq!(s.inputs, vec![drive.join(["Windows", "Prefetch"])]);
        assert_eq!(plan.commands.len(), 1);
        assert_eq!(
            plan.output,
            OutputTarget::File(tmp.path().join("out").join("output_20240101_000000.csv"))
        );
    }

    #[test]
    fn missing_batch_file_is_a_warning_with_the_path() {
        let (tmp, drive) = evidence();
        let registry = Registry::new(ToolPaths::from_tools_dir(tmp.path().join("net6")));
        let mut s = SessionState::new(drive, vec![]);
        s.select_tool(ToolKind::Registry);
        s.select_output(tmp.path().to_path_buf(), datetime!(2024-01-01 0:00 UTC));

        assert!(s.prepare_run(&registry).is_none());
        let last = s.console.back().unwrap();
        assert_eq!(last.kind, LineKind::Warning);
        assert!(last
            .text
            .contains(&registry.batch_file().display().to_string()));
    }

    #[cfg(windows)]
    #[test]
    fn prefetch_default_on_c_drive() {
        let drive = Drive::letter('C');
        let paths = ToolKind::Prefetch.default_input(&drive, None).unwrap();
        assert_eq!(paths[0].display().to_string(), r"C:\Windows\Prefetch");
    }
}
