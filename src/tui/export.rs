use crate::session::ConsoleLine;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::OnceLock;
use std::time::Duration;

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Where saved console logs go: the selected output folder when it
/// exists, else the user's documents folder, else the working directory.
pub fn export_dir(output_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = output_dir.filter(|d| d.is_dir()) {
        return Ok(dir.to_path_buf());
    }
    if let Some(docs) = dirs::document_dir() {
        return Ok(docs);
    }
    std::env::current_dir().context("get current directory")
}

fn file_stamp() -> String {
    let fmt = time::macros::format_description!("[year][month][day]_[hour][minute][second]");
    crate::session::now_local()
        .format(&fmt)
        .unwrap_or_else(|_| "now".into())
}

/// Write the console as plain text into `dir`. Returns the file path.
pub fn save_console_log<'a>(
    lines: impl IntoIterator<Item = &'a ConsoleLine>,
    dir: &Path,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(format!("console_{}.log", file_stamp()));
    let file = std::fs::File::create(&path).with_context(|| format!("create {}", path.display()))?;
    let mut w = std::io::BufWriter::new(file);
    for line in lines {
        writeln!(w, "{}", line.text).context("write console log")?;
    }
    w.flush().context("flush console log")?;
    Ok(path)
}

/// Initialize the clipboard manager thread if not already initialized.
/// This creates a background thread that processes clipboard operations sequentially,
/// keeping each clipboard instance alive for a sufficient duration.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            use arboard::Clipboard;

            for text in rx {
                if let Ok(mut clipboard) = Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        // Clipboard managers on Linux read lazily from the owner.
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LineKind;

    #[test]
    fn existing_output_dir_is_preferred() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(export_dir(Some(tmp.path())).unwrap(), tmp.path());
    }

    #[test]
    fn console_log_keeps_line_order() {
        let tmp = tempfile::tempdir().unwrap();
        let lines = vec![
            ConsoleLine {
                kind: LineKind::Command,
                text: "Executing: PECmd.exe".into(),
            },
            ConsoleLine {
                kind: LineKind::Output,
                text: "Processed 12 files".into(),
            },
        ];
        let path = save_console_log(&lines, tmp.path()).unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "Executing: PECmd.exe\nProcessed 12 files\n");
    }
}
