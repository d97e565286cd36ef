use crate::model::{CommandRecord, InfoEvent, RunEvent, RunSummary};
use crate::registry::{Registry, ToolKind};
use crate::session::{self, LineKind, SessionState};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use std::path::PathBuf;
use std::time::Duration;

/// Panel that receives navigation keys on the workspace tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Drive,
    Users,
    Tools,
    Input,
    OutputDir,
    OutputName,
}

impl Focus {
    const ORDER: [Focus; 6] = [
        Focus::Drive,
        Focus::Users,
        Focus::Tools,
        Focus::Input,
        Focus::OutputDir,
        Focus::OutputName,
    ];

    pub fn next(self) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(i + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let i = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(i + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    pub fn is_text_field(self) -> bool {
        matches!(self, Focus::Input | Focus::OutputDir | Focus::OutputName)
    }
}

/// In-progress edit of one of the path fields.
#[derive(Debug, Clone)]
pub struct FieldEdit {
    pub field: Focus,
    pub buffer: String,
}

pub struct UiState {
    pub tab: usize,
    pub session: SessionState,
    pub registry: Registry,
    pub focus: Focus,
    pub tool_cursor: usize,
    pub editing: Option<FieldEdit>,
    /// Lines scrolled up from the newest console line; 0 follows the output.
    pub scroll_back: usize,
    pub running: bool,
    pub info: String,
    pub last_summary: Option<RunSummary>,
    pub last_exported_path: Option<String>,
}

impl UiState {
    pub fn new(session: SessionState, registry: Registry) -> Self {
        let tool_cursor = session
            .tool
            .and_then(|t| ToolKind::ALL.iter().position(|k| *k == t))
            .unwrap_or(0);
        Self {
            tab: 0,
            session,
            registry,
            focus: Focus::Drive,
            tool_cursor,
            editing: None,
            scroll_back: 0,
            running: false,
            info: "Select a drive, a tool and an output folder, then press r".into(),
            last_summary: None,
            last_exported_path: None,
        }
    }

    /// Move to the previous (`-1`) or next (`+1`) known drive.
    pub fn cycle_drive(&mut self, step: isize) {
        let drives = &self.session.drives;
        if drives.is_empty() {
            return;
        }
        let len = drives.len() as isize;
        let current = drives
            .iter()
            .position(|d| *d == self.session.drive)
            .unwrap_or(0) as isize;
        let next = (current + step).rem_euclid(len) as usize;
        let drive = drives[next].clone();
        if drive != self.session.drive {
            self.session.set_drive(drive);
            self.scroll_back = 0;
        }
    }

    pub fn move_user(&mut self, step: isize) {
        let len = self.session.users.len();
        if len == 0 {
            return;
        }
        let current = self.session.selected_user.unwrap_or(0) as isize;
        let next = (current + step).clamp(0, len as isize - 1) as usize;
        self.session.select_user(next);
    }

    pub fn move_tool_cursor(&mut self, step: isize) {
        let last = ToolKind::ALL.len() as isize - 1;
        self.tool_cursor = (self.tool_cursor as isize + step).clamp(0, last) as usize;
    }

    pub fn select_tool_at(&mut self, index: usize) {
        if let Some(kind) = ToolKind::ALL.get(index).copied() {
            self.tool_cursor = index;
            self.session.select_tool(kind);
            self.info = format!("{} selected", kind.id());
        }
    }

    /// Start editing the focused field with its current value.
    pub fn begin_edit(&mut self) {
        let buffer = match self.focus {
            Focus::Input => self.session.input_display(),
            Focus::OutputDir => self
                .session
                .output_dir
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            Focus::OutputName => self.session.output_name.clone(),
            _ => return,
        };
        self.editing = Some(FieldEdit {
            field: self.focus,
            buffer,
        });
    }

    pub fn commit_edit(&mut self) {
        let Some(edit) = self.editing.take() else {
            return;
        };
        let value = edit.buffer.trim();
        match edit.field {
            Focus::Input => self.session.set_inputs_from_text(value),
            Focus::OutputDir if value.is_empty() => self.session.output_dir = None,
            Focus::OutputDir => self
                .session
                .select_output(PathBuf::from(value), session::now_local()),
            Focus::OutputName => self.session.output_name = value.to_string(),
            _ => {}
        }
    }

    pub fn scroll_up(&mut self, lines: usize) {
        let max = self.session.console.len().saturating_sub(1);
        self.scroll_back = (self.scroll_back + lines).min(max);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_back = self.scroll_back.saturating_sub(lines);
    }

    /// Map one engine/orchestrator event onto the console.
    pub fn apply_event(&mut self, ev: RunEvent) {
        match ev {
            RunEvent::CommandStarted {
                index,
                total,
                display,
                input,
            } => {
                if total > 1 {
                    self.session.info(format!(
                        "Processing folder: {} ({}/{})",
                        input.display(),
                        index + 1,
                        total
                    ));
                }
                self.session
                    .push(LineKind::Command, format!("Executing: {display}"));
            }
            RunEvent::OutputLine { line } => self.session.push(LineKind::Output, line),
            RunEvent::ErrorOutput { text } => {
                self.session.error("Errors:");
                self.session.error(text);
            }
            RunEvent::CommandFinished {
                index,
                exit_code,
                elapsed,
            } => {
                tracing::debug!(index, ?exit_code, ?elapsed, "command finished");
            }
            RunEvent::Info(info) => {
                let kind = match &info {
                    InfoEvent::Completed { .. } => LineKind::Success,
                    InfoEvent::Abandoned { .. } => LineKind::Warning,
                    e if e.is_error() => LineKind::Error,
                    _ => LineKind::Info,
                };
                self.session.push(kind, info.to_message());
            }
            RunEvent::RunCompleted { summary } => {
                self.running = false;
                self.info = if summary.succeeded() {
                    format!(
                        "{} finished: {} result file(s)",
                        summary.tool,
                        summary.result_files.len()
                    )
                } else {
                    format!("{} failed", summary.tool)
                };
                self.last_summary = Some(*summary);
            }
            RunEvent::RunFailed { error } => {
                self.running = false;
                self.session.error(format!("Run failed: {error}"));
                self.info = "Run failed".into();
            }
        }
    }
}

/// One status-panel line per finished command of the last run.
pub fn command_recap(rec: &CommandRecord) -> String {
    let name = rec
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| rec.input.display().to_string());
    let code = rec
        .exit_code
        .map_or_else(|| "killed".to_string(), |c| format!("exit {c}"));
    format!(
        "{name}: {code}, {} line(s), {}",
        rec.stdout_lines,
        humantime::format_duration(Duration::from_millis(rec.elapsed_ms))
    )
}

pub fn console_style(kind: LineKind) -> Style {
    match kind {
        LineKind::Output => Style::default(),
        LineKind::Error => Style::default().fg(Color::Red),
        LineKind::Info => Style::default().fg(Color::Cyan),
        LineKind::Warning => Style::default().fg(Color::Yellow),
        LineKind::Command => Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
        LineKind::Success => Style::default().fg(Color::Green),
    }
}

pub fn push_wrapped_status_kv(
    out: &mut Vec<Line<'static>>,
    label: &str,
    value: &str,
    status_area_width: u16,
) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = status_area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}
