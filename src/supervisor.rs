use crate::job::{JobOutcome, Launcher, StreamJobRunner};
use crate::playlist::{DirectoryLister, OrderingMode, PlaylistEntry, build_playlist};
use crate::target::StreamTarget;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Pause between scans of a folder with nothing to play.
pub const DEFAULT_RESCAN_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorState {
    ScanningForFiles,
    PlayingOne {
        playlist: Vec<PlaylistEntry>,
        position: usize,
    },
    WaitingForContent,
    Stopped,
}

impl SupervisorState {
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorState::ScanningForFiles => "scanning",
            SupervisorState::PlayingOne { .. } => "playing",
            SupervisorState::WaitingForContent => "waiting",
            SupervisorState::Stopped => "stopped",
        }
    }
}

/// Counters reported when the supervisor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub passes: u64,
    pub scan_failures: u64,
    pub jobs_started: u64,
    pub completed: u64,
    pub non_zero_exits: u64,
    pub failed: u64,
}

/// Drives the scan, play, repeat cycle until the cancellation token fires.
///
/// Exactly one encoder runs at a time. Every wait inside the loop (directory
/// scan, empty-folder delay, encoder exit) observes the token.
pub struct Supervisor<L, P> {
    lister: L,
    runner: StreamJobRunner<P>,
    folder: PathBuf,
    target: StreamTarget,
    ordering: OrderingMode,
    rescan_interval: Duration,
    cancel: CancellationToken,
    stats: RunStats,
}

impl<L, P> Supervisor<L, P>
where
    L: DirectoryLister,
    P: Launcher,
{
    pub fn new(
        lister: L,
        runner: StreamJobRunner<P>,
        folder: impl Into<PathBuf>,
        target: StreamTarget,
        ordering: OrderingMode,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            lister,
            runner,
            folder: folder.into(),
            target,
            ordering,
            rescan_interval: DEFAULT_RESCAN_INTERVAL,
            cancel,
            stats: RunStats::default(),
        }
    }

    pub fn with_rescan_interval(mut self, interval: Duration) -> Self {
        self.rescan_interval = interval;
        self
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub async fn run(mut self) -> RunStats {
        info!(
            folder = %self.folder.display(),
            destination = %self.target,
            ordering = %self.ordering,
            encoder = self.runner.encoder(),
            "Streaming started"
        );

        let mut state = SupervisorState::ScanningForFiles;
        while !matches!(state, SupervisorState::Stopped) {
            state = self.step(state).await;
            debug!(state = state.name(), "Supervisor transition");
        }

        let stats = self.stats;
        info!(
            passes = stats.passes,
            jobs = stats.jobs_started,
            non_zero_exits = stats.non_zero_exits,
            failed = stats.failed,
            "Streaming stopped"
        );
        stats
    }

    /// Performs one transition of the state machine.
    pub async fn step(&mut self, state: SupervisorState) -> SupervisorState {
        match state {
            SupervisorState::ScanningForFiles => self.scan().await,
            SupervisorState::WaitingForContent => self.wait_for_content().await,
            SupervisorState::PlayingOne { playlist, position } => {
                self.play(playlist, position).await
            }
            SupervisorState::Stopped => SupervisorState::Stopped,
        }
    }

    async fn scan(&mut self) -> SupervisorState {
        if self.cancel.is_cancelled() {
            return SupervisorState::Stopped;
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return SupervisorState::Stopped,
            result = build_playlist(&self.lister, &self.folder, self.ordering) => result,
        };

        match result {
            Ok(playlist) if playlist.is_empty() => {
                info!(
                    folder = %self.folder.display(),
                    retry_in = ?self.rescan_interval,
                    "No media files found, waiting"
                );
                SupervisorState::WaitingForContent
            }
            Ok(playlist) => {
                self.stats.passes += 1;
                info!(pass = self.stats.passes, files = playlist.len(), "Starting pass");
                SupervisorState::PlayingOne {
                    playlist,
                    position: 0,
                }
            }
            Err(error) => {
                self.stats.scan_failures += 1;
                error!(?error, kind = error.kind(), "Scan failed, waiting");
                SupervisorState::WaitingForContent
            }
        }
    }

    async fn wait_for_content(&mut self) -> SupervisorState {
        tokio::select! {
            _ = self.cancel.cancelled() => {
                info!("Stopped while waiting for content");
                SupervisorState::Stopped
            }
            _ = tokio::time::sleep(self.rescan_interval) => SupervisorState::ScanningForFiles,
        }
    }

    async fn play(&mut self, playlist: Vec<PlaylistEntry>, position: usize) -> SupervisorState {
        if self.cancel.is_cancelled() {
            return SupervisorState::Stopped;
        }

        let total = playlist.len();
        let Some(entry) = playlist.get(position) else {
            return SupervisorState::ScanningForFiles;
        };

        info!(%entry, position = position + 1, total, "Streaming file");
        self.stats.jobs_started += 1;

        match self.runner.run(entry, &self.target, &self.cancel).await {
            JobOutcome::Completed { exit_code: Some(0) } => {
                self.stats.completed += 1;
                info!(%entry, "Finished streaming file");
            }
            JobOutcome::Completed { exit_code } => {
                self.stats.completed += 1;
                self.stats.non_zero_exits += 1;
                warn!(%entry, ?exit_code, "Encoder exited with an error, skipping to next file");
            }
            JobOutcome::Failed(error) => {
                self.stats.failed += 1;
                error!(%entry, ?error, kind = error.kind(), "Encoder job failed, skipping to next file");
            }
            JobOutcome::Cancelled => {
                info!(%entry, "Streaming cancelled");
                return SupervisorState::Stopped;
            }
        }

        let next = position + 1;
        if next < total {
            SupervisorState::PlayingOne {
                playlist,
                position: next,
            }
        } else {
            info!(pass = self.stats.passes, "Pass finished, rescanning folder");
            SupervisorState::ScanningForFiles
        }
    }
}
