pub mod builder;
pub mod runner;
pub mod viewer;

use crate::model::{CommandRecord, InfoEvent, RunEvent, RunStatus, RunSummary};
use anyhow::Result;
use builder::InvocationPlan;
use runner::RunError;
use std::time::Instant;
use tokio::sync::mpsc;

/// Executes the commands of one plan strictly in order.
pub struct InvocationEngine {
    plan: InvocationPlan,
}

impl InvocationEngine {
    pub fn new(plan: InvocationPlan) -> Self {
        Self { plan }
    }

    /// Run every command, relaying output through `event_tx`.
    ///
    /// A launch fault or a non-zero exit ends the run; remaining commands are
    /// never started. Both are reported in the returned summary rather than
    /// as an `Err`, which is reserved for I/O failures while relaying.
    pub async fn run(self, event_tx: mpsc::UnboundedSender<RunEvent>) -> Result<RunSummary> {
        let run_start = Instant::now();
        let total = self.plan.commands.len();
        let mut commands = Vec::with_capacity(total);
        let mut status = RunStatus::Succeeded;

        for (index, cmd) in self.plan.commands.iter().enumerate() {
            let display = cmd.display();
            let command_display = &display;
            tracing::info!(
                tool = self.plan.tool.id(),
                step = index + 1,
                total,
                command = %command_display,
                "executing"
            );
            let _ = event_tx.send(RunEvent::CommandStarted {
                index,
                total,
                display: display.clone(),
                input: cmd.input.clone(),
            });

            let cmd_start = Instant::now();
            let res = match runner::run_invocation(cmd, &event_tx).await {
                Ok(res) => res,
                Err(RunError::Launch { program, source }) => {
                    tracing::warn!(program = %program.display(), error = %source, "launch failed");
                    let error = source.to_string();
                    let _ = event_tx.send(RunEvent::Info(InfoEvent::LaunchFailed {
                        program,
                        error: error.clone(),
                    }));
                    status = RunStatus::LaunchFailed { index, error };
                    abandon(&event_tx, total - index - 1);
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            let elapsed = cmd_start.elapsed();

            let _ = event_tx.send(RunEvent::CommandFinished {
                index,
                exit_code: res.exit_code,
                elapsed,
            });
            commands.push(CommandRecord {
                input: cmd.input.clone(),
                exit_code: res.exit_code,
                stdout_lines: res.stdout.len(),
                stderr: res.stderr.trim_end().to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
            });

            if !res.success() {
                tracing::warn!(code = ?res.exit_code, "command failed");
                let _ = event_tx.send(RunEvent::Info(InfoEvent::ExitFailure {
                    code: res.exit_code,
                }));
                status = RunStatus::ExitFailure {
                    index,
                    code: res.exit_code,
                };
                abandon(&event_tx, total - index - 1);
                break;
            }
        }

        Ok(RunSummary {
            tool: self.plan.tool.id().to_string(),
            elapsed_ms: run_start.elapsed().as_millis() as u64,
            output: self.plan.output,
            commands,
            status,
            result_files: Vec::new(),
        })
    }
}

fn abandon(event_tx: &mpsc::UnboundedSender<RunEvent>, remaining: usize) {
    if remaining > 0 {
        let _ = event_tx.send(RunEvent::Info(InfoEvent::Abandoned { remaining }));
    }
}
