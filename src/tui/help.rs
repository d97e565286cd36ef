use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(keys: &[&'static str], text: &'static str) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    let mut width = 0;
    for (i, k) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" / "));
            width += 3;
        }
        spans.push(Span::styled(*k, Style::default().fg(Color::Magenta)));
        width += k.chars().count();
    }
    let pad = 14usize.saturating_sub(width).max(2);
    spans.push(Span::raw(" ".repeat(pad)));
    spans.push(Span::raw(text));
    Line::from(spans)
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line(&["q", "Ctrl-C"], "Quit (a running tool keeps running)"),
        key_line(&["r", "F5"], "Run the selected tool"),
        key_line(&["tab", "shift-tab"], "Move between fields"),
        key_line(&["1-4"], "Select MFTECmd, RECmd, JLECmd, PECmd"),
        key_line(&["i"], "Fill the default input for the tool"),
        key_line(&["c"], "Clear the console"),
        key_line(&["s"], "Save the console to a log file"),
        key_line(&["y"], "Copy the last saved file or output path"),
        key_line(&["PgUp", "PgDn"], "Scroll the console (End follows output)"),
        key_line(&["?"], "Show this help"),
        Line::from(""),
        Line::from("Fields:"),
        key_line(&["←/→"], "Drive: previous / next drive"),
        key_line(&["↑/↓"], "Users, Tools: move the selection"),
        key_line(&["enter"], "Tools: select; paths: edit, enter again to apply"),
        key_line(&["esc"], "Cancel editing"),
        Line::from(""),
        Line::from("Paths:"),
        Line::from("  Several Jump List folders are separated by ';'."),
        Line::from("  Choosing an output folder proposes output_<timestamp>.csv."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
