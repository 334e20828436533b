//! Forwarding of container output into the process log.

use std::collections::HashMap;

use bollard::Docker;
use bollard::container::{LogOutput, LogsOptions};
use futures::StreamExt;
use tokio::task::JoinHandle;

/// Stream label used as the prefix of every forwarded line.
fn stream_name(output: &LogOutput) -> &'static str {
    match output {
        LogOutput::StdOut { .. } => "stdout",
        LogOutput::StdErr { .. } => "stderr",
        LogOutput::StdIn { .. } => "stdin",
        LogOutput::Console { .. } => "console",
    }
}

/// Reassembles `<stream>: <line>` records from raw log frames.
///
/// Docker frames do not follow line boundaries, so a trailing partial line
/// is held per stream until its newline arrives or the stream ends.
#[derive(Debug, Default)]
pub(crate) struct LineAssembler {
    pending: HashMap<&'static str, Vec<u8>>,
}

impl LineAssembler {
    pub(crate) fn push(&mut self, output: &LogOutput) -> Vec<String> {
        let stream = stream_name(output);
        let pending = self.pending.entry(stream).or_default();
        pending.extend_from_slice(output.as_ref());

        let mut records = Vec::new();
        while let Some(end) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=end).collect();
            records.extend(record(stream, &line));
        }
        records
    }

    /// Flush partial lines left when the stream ends.
    pub(crate) fn finish(self) -> Vec<String> {
        let mut pending: Vec<_> = self.pending.into_iter().collect();
        pending.sort_by_key(|(stream, _)| *stream);
        pending
            .into_iter()
            .filter_map(|(stream, line)| record(stream, &line))
            .collect()
    }
}

fn record(stream: &str, line: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim_end_matches(['\n', '\r']);
    (!text.is_empty()).then(|| format!("{stream}: {text}"))
}

/// Follow the container's stdout/stderr until the stream ends.
pub(crate) fn spawn_forwarder(docker: Docker, container_id: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = Box::pin(docker.logs(&container_id, Some(options)));
        let mut lines = LineAssembler::default();

        while let Some(frame) = stream.next().await {
            match frame {
                Ok(output) => {
                    for record in lines.push(&output) {
                        tracing::info!(target: "itestcontainer::container", "{}", record);
                    }
                }
                Err(e) => {
                    tracing::warn!(container_id = %container_id, error = %e, "Log stream failed");
                    break;
                }
            }
        }

        for record in lines.finish() {
            tracing::info!(target: "itestcontainer::container", "{}", record);
        }
        tracing::debug!(container_id = %container_id, "Log stream ended");
    })
}
