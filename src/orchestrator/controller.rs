//! Run lifecycle controller.
//!
//! Owns run start/completion and emits events for presentation layers.

use super::post_process::process_run_completion;
use crate::engine::builder::InvocationPlan;
use crate::engine::viewer::{DetachedSpawn, ResultOpener};
use crate::engine::InvocationEngine;
use crate::model::{InfoEvent, RunEvent, RunSummary};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Commands emitted by UI layers.
#[derive(Debug, Clone)]
pub(crate) enum UiCommand {
    Run(Box<InvocationPlan>),
    Quit,
}

/// Spawn the engine for `plan` and return its join handle.
fn start_run(
    plan: InvocationPlan,
    event_tx: UnboundedSender<RunEvent>,
) -> tokio::task::JoinHandle<Result<RunSummary>> {
    let engine = InvocationEngine::new(plan);
    tokio::spawn(async move { engine.run(event_tx).await })
}

/// Start runs requested by the UI, one at a time, and post-process each on completion.
///
/// There is no cancellation: on quit the controller stops relaying and any
/// running child process is left to finish on its own.
pub(crate) async fn run_controller<S: DetachedSpawn>(
    opener: ResultOpener<S>,
    event_tx: UnboundedSender<RunEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut active: Option<tokio::task::JoinHandle<Result<RunSummary>>> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Run(plan)) => {
                        if active.is_some() {
                            let _ = event_tx.send(RunEvent::Info(InfoEvent::Message(
                                "A run is already in progress".into(),
                            )));
                        } else {
                            active = Some(start_run(*plan, event_tx.clone()));
                        }
                    }
                    Some(UiCommand::Quit) | None => break,
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            join_res = async {
                match active.as_mut() {
                    Some(h) => h.await,
                    None => futures::future::pending().await,
                }
            } => {
                active = None;
                match join_res {
                    Ok(Ok(summary)) => {
                        let processed = process_run_completion(&opener, summary);
                        for msg in processed.messages {
                            let _ = event_tx.send(RunEvent::Info(msg));
                        }
                        let _ = event_tx.send(RunEvent::RunCompleted {
                            summary: Box::new(processed.summary),
                        });
                    }
                    Ok(Err(e)) => {
                        tracing::error!("run failed: {e:#}");
                        let _ = event_tx.send(RunEvent::RunFailed {
                            error: format!("{e:#}"),
                        });
                    }
                    Err(e) => {
                        tracing::error!("run task join failed: {e}");
                        let _ = event_tx.send(RunEvent::RunFailed {
                            error: format!("run task ended unexpectedly: {e}"),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::engine::builder::Invocation;
    use crate::engine::viewer::tests::RecordingSpawn;
    use crate::model::OutputTarget;
    use crate::registry::ToolKind;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn plan(script: &str, output: PathBuf) -> InvocationPlan {
        InvocationPlan {
            tool: ToolKind::Prefetch,
            commands: vec![Invocation {
                program: PathBuf::from("sh"),
                args: vec!["-c".into(), script.into()],
                input: PathBuf::from("C:/Windows/Prefetch"),
            }],
            output: OutputTarget::File(output),
        }
    }

    #[tokio::test]
    async fn completed_run_is_post_processed_and_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let viewer = tmp.path().join("TimelineExplorer.exe");
        std::fs::write(&viewer, b"").unwrap();
        let csv = tmp.path().join("pf.csv");
        let spawn = RecordingSpawn::default();
        let opener = ResultOpener::with_spawner(Some(viewer.clone()), spawn.clone());

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = tokio::spawn(run_controller(opener, event_tx, cmd_rx));

        cmd_tx
            .send(UiCommand::Run(Box::new(plan("echo parsing", csv.clone()))))
            .unwrap();

        let mut saw_line = false;
        let summary = loop {
            match event_rx.recv().await.expect("controller hung up") {
                RunEvent::OutputLine { line } => saw_line |= line == "parsing",
                RunEvent::RunCompleted { summary } => break summary,
                _ => {}
            }
        };

        assert!(saw_line);
        assert!(summary.succeeded());
        assert_eq!(spawn.calls(), vec![(viewer, csv)]);

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
    }
}
