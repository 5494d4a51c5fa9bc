pub mod encoder;
pub mod launcher;

use crate::error::StreamError;
use crate::playlist::PlaylistEntry;
use crate::target::StreamTarget;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle as TokioJoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// Re-exports for convenience
pub use encoder::{EncoderInvocation, probe_encoder};
pub use launcher::{Diagnostics, Launcher, ProcessLauncher, prepare_command};

/// Longest encoder output line kept for the log; the rest of a longer line is dropped.
const MAX_DIAGNOSTIC_LINE: usize = 8 * 1024;

/// How long the output drains may run once the encoder is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Result of streaming one playlist entry.
#[derive(Debug)]
pub enum JobOutcome {
    /// The encoder exited on its own. `exit_code` is `None` when it died from a signal.
    Completed { exit_code: Option<i32> },
    /// Cancellation was observed; the encoder has been killed and reaped.
    Cancelled,
    /// The encoder could not be started or waited on.
    Failed(StreamError),
}

/// Streams one file at a time through the external encoder.
#[derive(Debug, Clone)]
pub struct StreamJobRunner<P> {
    launcher: P,
    encoder: String,
    diagnostics: Diagnostics,
}

impl<P: Launcher> StreamJobRunner<P> {
    pub fn new(launcher: P, encoder: impl Into<String>, verbose: bool) -> Self {
        Self {
            launcher,
            encoder: encoder.into(),
            diagnostics: Diagnostics::from_verbose(verbose),
        }
    }

    pub fn encoder(&self) -> &str {
        &self.encoder
    }

    /// Runs `entry` to completion or until `cancel` fires.
    ///
    /// When cancelled, the encoder and everything in its process group are
    /// killed and the encoder is waited for before returning, so no encoder
    /// outlives this call.
    pub async fn run(
        &self,
        entry: &PlaylistEntry,
        target: &StreamTarget,
        cancel: &CancellationToken,
    ) -> JobOutcome {
        if cancel.is_cancelled() {
            return JobOutcome::Cancelled;
        }

        let invocation = EncoderInvocation::stream(&self.encoder, entry.path(), target);
        let mut child = match self.launcher.launch(&invocation, self.diagnostics) {
            Ok(child) => child,
            Err(source) => {
                return JobOutcome::Failed(StreamError::Launch {
                    program: self.encoder.clone(),
                    source,
                });
            }
        };

        let pid = child.id();
        debug!(?pid, %entry, destination = %target, "Encoder started");
        let drains = drain_output(&mut child);

        let outcome = tokio::select! {
            status = child.wait() => match status {
                Ok(status) => JobOutcome::Completed { exit_code: status.code() },
                Err(source) => {
                    terminate_and_reap(&mut child, pid).await;
                    JobOutcome::Failed(StreamError::Wait { source })
                }
            },
            _ = cancel.cancelled() => {
                info!(?pid, %entry, "Stopping encoder");
                terminate_and_reap(&mut child, pid).await;
                JobOutcome::Cancelled
            }
        };

        // Anything the encoder left behind would keep the pipes open
        kill_process_group(pid);
        settle_drains(drains).await;

        outcome
    }
}

/// Two-phase stop: ask the process group to die, then wait for the encoder
/// without looking at the cancellation token again.
async fn terminate_and_reap(child: &mut Child, pid: Option<u32>) {
    kill_process_group(pid);
    if let Err(error) = child.start_kill() {
        // Already exited, the wait below just collects the status
        debug!(%error, "Kill request not delivered");
    }

    match child.wait().await {
        Ok(status) => debug!(%status, "Encoder reaped"),
        Err(error) => error!(%error, "Failed to reap encoder"),
    }
}

/// Sends SIGKILL to the process group led by `pid`.
#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pgid) = pid.and_then(|pid| libc::pid_t::try_from(pid).ok()) else {
        return;
    };
    if pgid <= 1 {
        return;
    }

    // SAFETY: kill(2) with a negative pid only signals that process group
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result != 0 {
        // ESRCH: the group is already empty
        debug!(pgid, error = %std::io::Error::last_os_error(), "Process group not signalled");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

fn drain_output(child: &mut Child) -> Vec<TokioJoinHandle<()>> {
    let mut drains = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        drains.push(tokio::spawn(drain_lines(stdout, "stdout")));
    }
    if let Some(stderr) = child.stderr.take() {
        drains.push(tokio::spawn(drain_lines(stderr, "stderr")));
    }
    drains
}

/// Waits for the drains to hit end of file, aborting any that outlast [`DRAIN_GRACE`].
async fn settle_drains(drains: Vec<TokioJoinHandle<()>>) {
    for mut drain in drains {
        match tokio::time::timeout(DRAIN_GRACE, &mut drain).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => warn!(%error, "Encoder output drain panicked"),
            Err(_) => {
                warn!("Encoder output still open after exit, dropping it");
                drain.abort();
            }
        }
    }
}

/// Logs every line (split on `\r` or `\n`) until the pipe closes.
async fn drain_lines<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = OutputLines::new(reader);
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.text.is_empty() => {}
            Ok(Some(line)) => info!(
                target: "encoder",
                stream,
                truncated = line.truncated,
                "{}",
                String::from_utf8_lossy(&line.text)
            ),
            Ok(None) => break,
            Err(error) => {
                debug!(stream, %error, "Encoder output closed");
                break;
            }
        }
    }
}

/// One line of encoder output, capped at [`MAX_DIAGNOSTIC_LINE`] bytes.
#[derive(Debug, Default, PartialEq, Eq)]
struct OutputLine {
    text: Vec<u8>,
    truncated: bool,
}

/// Splits a byte stream on `\r` and `\n`.
///
/// Overlong lines are cut at the cap and the remainder skipped up to the next
/// delimiter, so one runaway line never stops the lines after it.
struct OutputLines<R> {
    reader: BufReader<R>,
}

impl<R: AsyncRead + Unpin> OutputLines<R> {
    fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
        }
    }

    async fn next_line(&mut self) -> std::io::Result<Option<OutputLine>> {
        let mut line = OutputLine::default();
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                let pending = !line.text.is_empty() || line.truncated;
                return Ok(pending.then_some(line));
            }

            let end = chunk.iter().position(|&byte| matches!(byte, b'\r' | b'\n'));
            let content = &chunk[..end.unwrap_or(chunk.len())];
            let room = MAX_DIAGNOSTIC_LINE - line.text.len();
            line.truncated |= content.len() > room;
            line.text.extend_from_slice(&content[..content.len().min(room)]);

            let consumed = end.map_or(chunk.len(), |index| index + 1);
            self.reader.consume(consumed);
            if end.is_some() {
                return Ok(Some(line));
            }
        }
    }
}
