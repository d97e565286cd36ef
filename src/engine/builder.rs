//! Turns a tool selection into concrete command lines.

use crate::model::OutputTarget;
use crate::registry::{ToolDescriptor, ToolKind};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// One external command: program plus a discrete argv (no shell involved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Input file or folder this command processes.
    pub input: PathBuf,
}

impl Invocation {
    /// Command line as shown in the console, paths quoted.
    pub fn display(&self) -> String {
        let mut out = quote(&self.program.to_string_lossy());
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            out.push(' ');
            if arg.starts_with('-') {
                out.push_str(&arg);
            } else {
                out.push_str(&quote(&arg));
            }
        }
        out
    }
}

fn quote(s: &str) -> String {
    format!("\"{s}\"")
}

/// Commands for one analysis, run strictly in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationPlan {
    pub tool: ToolKind,
    pub commands: Vec<Invocation>,
    pub output: OutputTarget,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no input path selected")]
    NoInput,
    #[error("{tool} takes a single input, got {count}")]
    TooManyInputs { tool: &'static str, count: usize },
    #[error("Warning: batch file (.reb) not found at {}", .0.display())]
    MissingBatchFile(PathBuf),
    #[error("could not create output directory {}: {source}", .path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Build the command lines for `tool`.
///
/// Single-input tools produce one command writing `<output_dir>/<output_name>`.
/// The jump-list tool creates `<output_dir>/<output_name>` as a directory and
/// produces one command per input folder, all writing into it. Creating that
/// directory is the only filesystem change made here.
pub fn build_plan(
    tool: &ToolDescriptor,
    inputs: &[PathBuf],
    output_dir: &Path,
    output_name: &str,
    batch_file: &Path,
) -> Result<InvocationPlan, BuildError> {
    if inputs.is_empty() {
        return Err(BuildError::NoInput);
    }
    let output = output_dir.join(output_name);

    if tool.kind.is_multi_input() {
        std::fs::create_dir_all(&output).map_err(|source| BuildError::CreateOutputDir {
            path: output.clone(),
            source,
        })?;
        let commands = inputs
            .iter()
            .map(|input| command(tool, input, &output, None))
            .collect();
        return Ok(InvocationPlan {
            tool: tool.kind,
            commands,
            output: OutputTarget::Directory(output),
        });
    }

    if inputs.len() > 1 {
        return Err(BuildError::TooManyInputs {
            tool: tool.id,
            count: inputs.len(),
        });
    }

    let batch = if tool.kind.requires_batch_file() {
        if !batch_file.exists() {
            return Err(BuildError::MissingBatchFile(batch_file.to_path_buf()));
        }
        Some(batch_file)
    } else {
        None
    };

    Ok(InvocationPlan {
        tool: tool.kind,
        commands: vec![command(tool, &inputs[0], &output, batch)],
        output: OutputTarget::File(output),
    })
}

fn command(tool: &ToolDescriptor, input: &Path, csv: &Path, batch: Option<&Path>) -> Invocation {
    let mut args: Vec<OsString> = vec![
        tool.kind.input_flag().into(),
        input.as_os_str().to_owned(),
        "--csv".into(),
        csv.as_os_str().to_owned(),
    ];
    if let Some(batch) = batch {
        args.push("--bn".into());
        args.push(batch.as_os_str().to_owned());
    }
    Invocation {
        program: tool.executable.clone(),
        args,
        input: input.to_path_buf(),
    }
}
