//! Post-run processing utilities.
//!
//! Discovers the CSV files a successful run produced and hands them to the viewer.

use crate::engine::viewer::{DetachedSpawn, ResultOpener};
use crate::model::{InfoEvent, OutputTarget, RunSummary};
use std::path::PathBuf;

/// Result of post-run processing, ready for presentation layers.
pub(crate) struct ProcessedRun {
    pub summary: RunSummary,
    pub messages: Vec<InfoEvent>,
}

/// CSV files produced by a run, each listed once, sorted.
pub(crate) fn discover_results(output: &OutputTarget) -> std::io::Result<Vec<PathBuf>> {
    match output {
        OutputTarget::File(p) => Ok(vec![p.clone()]),
        OutputTarget::Directory(dir) => {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                let is_csv = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
                if is_csv && path.is_file() {
                    files.push(path);
                }
            }
            files.sort();
            Ok(files)
        }
    }
}

/// Process a finished run: on success, list its results and open them.
pub(crate) fn process_run_completion<S: DetachedSpawn>(
    opener: &ResultOpener<S>,
    mut summary: RunSummary,
) -> ProcessedRun {
    let mut messages = Vec::new();
    if !summary.succeeded() {
        return ProcessedRun { summary, messages };
    }

    messages.push(InfoEvent::Completed {
        output: summary.output.clone(),
    });
    match discover_results(&summary.output) {
        Ok(files) => summary.result_files = files,
        Err(e) => messages.push(InfoEvent::Message(format!(
            "Could not list results in {}: {e}",
            summary.output.path().display()
        ))),
    }
    messages.extend(opener.open_all(&summary.result_files));

    ProcessedRun { summary, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::viewer::tests::RecordingSpawn;
    use crate::model::RunStatus;

    fn summary(output: OutputTarget, status: RunStatus) -> RunSummary {
        RunSummary {
            tool: "JLECmd".into(),
            elapsed_ms: 5,
            output,
            commands: Vec::new(),
            status,
            result_files: Vec::new(),
        }
    }

    fn viewer_in(dir: &std::path::Path) -> PathBuf {
        let viewer = dir.join("TimelineExplorer.exe");
        std::fs::write(&viewer, b"").unwrap();
        viewer
    }

    #[test]
    fn directory_results_are_the_csv_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("jl");
        std::fs::create_dir_all(out.join("nested.csv")).unwrap();
        for name in ["b_AutomaticDestinations.csv", "a_CustomDestinations.CSV", "notes.txt"] {
            std::fs::write(out.join(name), b"x").unwrap();
        }

        let files = discover_results(&OutputTarget::Directory(out.clone())).unwrap();
        assert_eq!(
            files,
            vec![
                out.join("a_CustomDestinations.CSV"),
                out.join("b_AutomaticDestinations.csv")
            ]
        );
    }

    #[test]
    fn successful_single_output_is_opened_exactly_once() {
        let tmp = tempfile::tempdir().unwrap();
        let viewer = viewer_in(tmp.path());
        let spawn = RecordingSpawn::default();
        let opener = ResultOpener::with_spawner(Some(viewer.clone()), spawn.clone());
        let csv = tmp.path().join("pf.csv");

        let processed = process_run_completion(
            &opener,
            summary(OutputTarget::File(csv.clone()), RunStatus::Succeeded),
        );

        assert_eq!(spawn.calls(), vec![(viewer, csv.clone())]);
        assert_eq!(processed.summary.result_files, vec![csv]);
        assert!(matches!(processed.messages[0], InfoEvent::Completed { .. }));
    }

    #[test]
    fn failed_run_opens_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let spawn = RecordingSpawn::default();
        let opener = ResultOpener::with_spawner(Some(viewer_in(tmp.path())), spawn.clone());

        let processed = process_run_completion(
            &opener,
            summary(
                OutputTarget::File(tmp.path().join("pf.csv")),
                RunStatus::ExitFailure {
                    index: 0,
                    code: Some(1),
                },
            ),
        );

        assert!(spawn.calls().is_empty());
        assert!(processed.messages.is_empty());
        assert!(processed.summary.result_files.is_empty());
    }
}
