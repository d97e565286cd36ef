mod export;
mod help;
mod state;

use crate::cli::Cli;
use crate::engine::viewer::ResultOpener;
use crate::model::RunEvent;
use crate::orchestrator::{self, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs},
    Terminal,
};
use state::{command_recap, console_style, push_wrapped_status_kv, Focus, UiState};
use std::path::PathBuf;
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

const PAGE: usize = 10;

pub async fn run(args: Cli) -> Result<()> {
    // Unbounded channels keep the line relay from ever waiting on the UI.
    let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    let registry = crate::cli::build_registry(&args);
    let session = crate::cli::build_session(&args, &registry)?;
    let opener = ResultOpener::new(registry.viewer().map(PathBuf::from));
    let ui_state = UiState::new(session, registry);

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(ui_state, event_rx, cmd_tx));

    let res = orchestrator::run_controller(opener, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<RunEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now();

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }

                if let Some(edit) = state.editing.as_mut() {
                    match k.code {
                        KeyCode::Enter => state.commit_edit(),
                        KeyCode::Esc => state.editing = None,
                        KeyCode::Backspace => {
                            edit.buffer.pop();
                        }
                        KeyCode::Char(c) if !k.modifiers.contains(KeyModifiers::CONTROL) => {
                            edit.buffer.push(c);
                        }
                        _ => {}
                    }
                    continue;
                }

                match (k.modifiers, k.code) {
                    (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                        let _ = cmd_tx.send(UiCommand::Quit);
                        break Ok(());
                    }
                    (_, KeyCode::Char('?')) => {
                        state.tab = 1;
                    }
                    (_, KeyCode::Esc) if state.tab == 1 => {
                        state.tab = 0;
                    }
                    _ if state.tab == 1 => {
                        // Any other key leaves the help tab.
                        state.tab = 0;
                    }
                    (_, KeyCode::Tab) => state.focus = state.focus.next(),
                    (_, KeyCode::BackTab) => state.focus = state.focus.prev(),
                    (_, KeyCode::Char('r')) | (_, KeyCode::F(5)) => start_run(&mut state, &cmd_tx),
                    (_, KeyCode::Char(c @ '1'..='4')) => {
                        state.select_tool_at(c as usize - '1' as usize);
                    }
                    (_, KeyCode::Char('i')) => state.session.select_input(),
                    (_, KeyCode::Char('c')) => {
                        state.session.clear_console();
                        state.scroll_back = 0;
                    }
                    (_, KeyCode::Char('s')) => {
                        let saved = export::export_dir(state.session.output_dir.as_deref())
                            .and_then(|dir| export::save_console_log(&state.session.console, &dir));
                        match saved {
                            Ok(p) => {
                                state.last_exported_path = Some(p.to_string_lossy().to_string());
                                state.info =
                                    format!("Saved console: {} (press 'y' to copy path)", p.display());
                            }
                            Err(e) => state.info = format!("Save failed: {e:#}"),
                        }
                    }
                    (_, KeyCode::Char('y')) => {
                        let path = state.last_exported_path.clone().or_else(|| {
                            state
                                .last_summary
                                .as_ref()
                                .map(|s| s.output.path().display().to_string())
                        });
                        match path {
                            Some(path) => match export::copy_to_clipboard(&path) {
                                Ok(_) => state.info = format!("✓ Copied to clipboard: {path}"),
                                Err(e) => state.info = format!("Clipboard copy failed: {e:#}"),
                            },
                            None => {
                                state.info = "No path to copy. Run a tool or save the console first.".into()
                            }
                        }
                    }
                    (_, KeyCode::PageUp) => state.scroll_up(PAGE),
                    (_, KeyCode::PageDown) => state.scroll_down(PAGE),
                    (_, KeyCode::End) => state.scroll_back = 0,
                    (_, KeyCode::Left) if state.focus == Focus::Drive => state.cycle_drive(-1),
                    (_, KeyCode::Right) if state.focus == Focus::Drive => state.cycle_drive(1),
                    (_, KeyCode::Up) | (_, KeyCode::Char('k')) => match state.focus {
                        Focus::Users => state.move_user(-1),
                        Focus::Tools => state.move_tool_cursor(-1),
                        Focus::Drive => state.cycle_drive(-1),
                        _ => state.scroll_up(1),
                    },
                    (_, KeyCode::Down) | (_, KeyCode::Char('j')) => match state.focus {
                        Focus::Users => state.move_user(1),
                        Focus::Tools => state.move_tool_cursor(1),
                        Focus::Drive => state.cycle_drive(1),
                        _ => state.scroll_down(1),
                    },
                    (_, KeyCode::Enter) => match state.focus {
                        Focus::Tools => state.select_tool_at(state.tool_cursor),
                        f if f.is_text_field() => state.begin_edit(),
                        _ => {}
                    },
                    _ => {}
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// Validate the session and hand the plan to the controller.
fn start_run(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    if state.running {
        state.info = "A run is already in progress".into();
        return;
    }
    state.scroll_back = 0;
    let Some(plan) = state.session.prepare_run(&state.registry) else {
        state.info = "Run not started, see console".into();
        return;
    };
    let tool = plan.tool;
    if cmd_tx.send(UiCommand::Run(Box::new(plan))).is_ok() {
        state.running = true;
        state.last_summary = None;
        state.info = format!("Running {}…", tool.id());
    } else {
        state.info = "Controller is not running".into();
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Workspace"), Line::from("Help")])
        .select(state.tab)
        .block(Block::default().borders(Borders::ALL).title("ez-forensics"))
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        0 => draw_workspace(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }
}

fn panel(title: &str, focused: bool) -> Block<'static> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(title.to_string())
}

fn draw_workspace(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(44), Constraint::Min(0)].as_ref())
        .split(area);

    let user_rows = (state.session.users.len().max(1) as u16 + 2).min(8);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),         // Drive
                Constraint::Length(user_rows), // Users
                Constraint::Length(6),         // Tools
                Constraint::Length(3),         // Input
                Constraint::Length(3),         // Output folder
                Constraint::Length(3),         // Output name
                Constraint::Min(0),            // Status
            ]
            .as_ref(),
        )
        .split(cols[0]);

    let drive = Paragraph::new(Line::from(vec![
        Span::raw("◀ "),
        Span::styled(
            state.session.drive.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!(
            " ▶  ({} available)",
            state.session.drives.len()
        )),
    ]))
    .block(panel("Drive", state.focus == Focus::Drive));
    f.render_widget(drive, left[0]);

    let users: Vec<ListItem> = if state.session.users.is_empty() {
        vec![ListItem::new(Span::styled(
            "(no user profiles)",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        state
            .session
            .users
            .iter()
            .map(|u| ListItem::new(u.as_str()))
            .collect()
    };
    let mut user_state = ListState::default();
    user_state.select(state.session.selected_user);
    let users = List::new(users)
        .block(panel("User", state.focus == Focus::Users))
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .highlight_symbol("> ");
    f.render_stateful_widget(users, left[1], &mut user_state);

    let tools: Vec<ListItem> = state
        .registry
        .all()
        .into_iter()
        .enumerate()
        .map(|(i, tool)| {
            let selected = state.session.tool == Some(tool.kind);
            let marker = if selected { "●" } else { "○" };
            let style = if selected {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            let mut spans = vec![
                Span::styled(format!("{} {} {:<8}", i + 1, marker, tool.id), style),
                Span::styled(
                    format!(" {}", tool.description),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if !tool.executable.exists() {
                spans.push(Span::styled(" (missing)", Style::default().fg(Color::Red)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();
    let mut tool_state = ListState::default();
    if state.focus == Focus::Tools {
        tool_state.select(Some(state.tool_cursor));
    }
    let tools = List::new(tools)
        .block(panel("Tool", state.focus == Focus::Tools))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    f.render_stateful_widget(tools, left[2], &mut tool_state);

    let output_dir = state
        .session
        .output_dir
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let input_title = match state.session.tool.map(|k| state.registry.descriptor(k)) {
        Some(tool) if tool.direct_drive => "Input (volume file)".to_string(),
        Some(tool) => {
            let filters: Vec<String> = tool
                .filters
                .iter()
                .map(|(label, glob)| format!("{label} {glob}"))
                .collect();
            format!("Input ({})", filters.join(", "))
        }
        None => "Input".to_string(),
    };
    let fields = [
        (Focus::Input, input_title.as_str(), state.session.input_display(), left[3]),
        (Focus::OutputDir, "Output folder", output_dir, left[4]),
        (
            Focus::OutputName,
            "Output name",
            state.session.output_name.clone(),
            left[5],
        ),
    ];
    for (field, title, value, rect) in fields {
        let editing = state.editing.as_ref().filter(|e| e.field == field);
        let line = match editing {
            Some(e) => Line::from(vec![
                Span::raw(e.buffer.clone()),
                Span::styled("▏", Style::default().fg(Color::Yellow)),
            ]),
            None if value.is_empty() => Line::from(Span::styled(
                "(enter to set)",
                Style::default().fg(Color::DarkGray),
            )),
            None => Line::from(value),
        };
        let title = if editing.is_some() {
            format!("{title} (editing)")
        } else {
            title.to_string()
        };
        f.render_widget(
            Paragraph::new(line).block(panel(&title, state.focus == field)),
            rect,
        );
    }

    draw_status(left[6], f, state);
    draw_console(cols[1], f, state);
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut lines = Vec::new();
    let run_state = if state.running { "running" } else { "idle" };
    lines.push(Line::from(vec![
        Span::styled("State:", Style::default().fg(Color::Gray)),
        Span::raw(" "),
        Span::styled(
            run_state,
            if state.running {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default()
            },
        ),
    ]));
    push_wrapped_status_kv(&mut lines, "Info", &state.info, area.width);
    if let Some(summary) = state.last_summary.as_ref() {
        let elapsed = humantime::format_duration(Duration::from_millis(summary.elapsed_ms));
        push_wrapped_status_kv(&mut lines, "Last run", &elapsed.to_string(), area.width);
        push_wrapped_status_kv(
            &mut lines,
            "Output",
            &summary.output.path().display().to_string(),
            area.width,
        );
        for rec in &summary.commands {
            push_wrapped_status_kv(&mut lines, "Step", &command_recap(rec), area.width);
        }
        if let Some(err) = summary
            .commands
            .last()
            .filter(|_| !summary.succeeded())
            .and_then(|rec| rec.stderr.lines().next())
        {
            push_wrapped_status_kv(&mut lines, "Error", err, area.width);
        }
    }
    push_wrapped_status_kv(
        &mut lines,
        "Tools",
        &state.registry.paths().tools_dir.display().to_string(),
        area.width,
    );
    lines.push(Line::from(Span::styled(
        "r run · ? help · q quit",
        Style::default().fg(Color::DarkGray),
    )));
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Status")),
        area,
    );
}

fn draw_console(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let console = &state.session.console;
    let height = area.height.saturating_sub(2) as usize;
    let end = console.len().saturating_sub(state.scroll_back);
    let start = end.saturating_sub(height);

    let lines: Vec<Line> = console
        .range(start..end)
        .map(|l| Line::from(Span::styled(l.text.as_str(), console_style(l.kind))))
        .collect();

    let title = if state.scroll_back > 0 {
        format!("Console ({} lines below, End to follow)", state.scroll_back)
    } else {
        "Console".to_string()
    };
    f.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title)),
        area,
    );
}
