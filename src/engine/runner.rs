//! Launches one external command and relays its console output line by line.

use super::builder::Invocation;
use crate::model::{InvocationResult, RunEvent};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("could not start {}: {source}", .program.display())]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("reading output of {}: {source}", .program.display())]
    Io {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Strip the line terminator and decode lossily; the parsers write CRLF on Windows.
fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// Forward every line of `reader` as [`RunEvent::OutputLine`] as soon as it is read.
async fn relay_lines<R: AsyncRead + Unpin>(
    reader: R,
    event_tx: &UnboundedSender<RunEvent>,
) -> std::io::Result<Vec<String>> {
    let mut reader = BufReader::new(reader);
    let mut lines = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            return Ok(lines);
        }
        let line = decode_line(&buf);
        let _ = event_tx.send(RunEvent::OutputLine { line: line.clone() });
        lines.push(line);
    }
}

/// Run `inv` to completion.
///
/// Every stdout line is sent as [`RunEvent::OutputLine`] as soon as it is
/// read. Stderr is drained concurrently so a chatty tool cannot stall on a
/// full pipe, then sent once as [`RunEvent::ErrorOutput`] after stdout closed.
pub async fn run_invocation(
    inv: &Invocation,
    event_tx: &UnboundedSender<RunEvent>,
) -> Result<InvocationResult, RunError> {
    let io_err = |source: std::io::Error| RunError::Io {
        program: inv.program.clone(),
        source,
    };

    let mut child = Command::new(&inv.program)
        .args(&inv.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Launch {
            program: inv.program.clone(),
            source,
        })?;
    tracing::debug!(program = %inv.program.display(), pid = ?child.id(), "spawned");

    let stderr = child.stderr.take();
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            stderr.read_to_end(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
    });

    let relayed = match child.stdout.take() {
        Some(stdout) => relay_lines(stdout, event_tx).await,
        None => Ok(Vec::new()),
    };
    let stdout_lines = match relayed {
        Ok(lines) => lines,
        Err(e) => {
            // The child is still reaped; its stderr is discarded.
            stderr_task.abort();
            if let Err(wait_err) = child.wait().await {
                tracing::warn!(program = %inv.program.display(), error = %wait_err, "wait failed");
            }
            return Err(io_err(e));
        }
    };

    let stderr_text = stderr_task
        .await
        .map_err(|e| io_err(std::io::Error::other(e.to_string())))?
        .map_err(io_err)?;
    if !stderr_text.trim().is_empty() {
        let _ = event_tx.send(RunEvent::ErrorOutput {
            text: stderr_text.trim_end().to_string(),
        });
    }

    let status = child.wait().await.map_err(io_err)?;
    Ok(InvocationResult {
        exit_code: status.code(),
        stdout: stdout_lines,
        stderr: stderr_text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn decode_strips_crlf_and_replaces_invalid_utf8() {
        assert_eq!(decode_line(b"Processed 12 files\r\n"), "Processed 12 files");
        assert_eq!(decode_line(b"tail"), "tail");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{fffd} byte");
        assert_eq!(decode_line(b"\n"), "");
    }

    #[cfg(unix)]
    fn sh(script: &str) -> Invocation {
        Invocation {
            program: PathBuf::from("sh"),
            args: vec!["-c".into(), script.into()],
            input: PathBuf::from("."),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn relays_stdout_in_order_then_stderr() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let res = run_invocation(&sh("echo one; echo oops >&2; echo two"), &tx)
            .await
            .unwrap();
        drop(tx);

        assert!(res.success());
        assert_eq!(res.stdout, vec!["one".to_string(), "two".to_string()]);
        assert_eq!(res.stderr.trim(), "oops");

        let mut seen = Vec::new();
        while let Some(ev) = rx.recv().await {
            match ev {
                RunEvent::OutputLine { line } => seen.push(format!("out:{line}")),
                RunEvent::ErrorOutput { text } => seen.push(format!("err:{text}")),
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(seen, vec!["out:one", "out:two", "err:oops"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_code_is_reported_verbatim() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let res = run_invocation(&sh("echo partial; exit 3"), &tx).await.unwrap();
        assert_eq!(res.exit_code, Some(3));
        assert!(!res.success());
        assert!(res.stderr.is_empty());
    }

    /// Yields its data once, then fails every further read.
    struct BrokenPipe {
        data: &'static [u8],
        sent: bool,
    }

    impl AsyncRead for BrokenPipe {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.sent {
                return std::task::Poll::Ready(Err(std::io::Error::other("pipe broke")));
            }
            self.sent = true;
            buf.put_slice(self.data);
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn read_fault_ends_the_relay_after_the_lines_already_read() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = BrokenPipe {
            data: b"first\nsecond\n",
            sent: false,
        };
        let err = relay_lines(reader, &tx).await.unwrap_err();
        assert_eq!(err.to_string(), "pipe broke");
        drop(tx);

        let mut seen = Vec::new();
        while let Some(RunEvent::OutputLine { line }) = rx.recv().await {
            seen.push(line);
        }
        assert_eq!(seen, vec!["first", "second"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blank_stdout_lines_are_relayed() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let res = run_invocation(&sh("printf 'a\\n\\nb\\n'"), &tx).await.unwrap();
        assert_eq!(res.stdout, vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn missing_executable_is_a_launch_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inv = Invocation {
            program: PathBuf::from("/definitely/not/here/MFTECmd.exe"),
            args: vec![],
            input: PathBuf::from("."),
        };
        let err = run_invocation(&inv, &tx).await.unwrap_err();
        assert!(matches!(err, RunError::Launch { .. }));
        assert!(err.to_string().contains("MFTECmd.exe"));
        drop(tx);
        assert!(rx.recv().await.is_none());
    }
}
