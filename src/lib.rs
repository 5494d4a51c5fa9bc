pub mod config;
pub mod error;
pub mod job;
pub mod playlist;
pub mod prompt;
pub mod shutdown;
pub mod supervisor;
pub mod target;

use tokio_util::sync::CancellationToken;
use tracing::info;

//
// Re-export
//
pub use config::{Config, Settings};
pub use error::StreamError;
pub use job::{
    Diagnostics, EncoderInvocation, JobOutcome, Launcher, ProcessLauncher, StreamJobRunner,
    prepare_command, probe_encoder,
};
pub use playlist::{
    DirectoryLister, FsLister, MEDIA_EXTENSIONS, OrderingMode, PlaylistEntry, build_playlist,
};
pub use shutdown::CancellationBridge;
pub use supervisor::{DEFAULT_RESCAN_INTERVAL, RunStats, Supervisor, SupervisorState};
pub use target::StreamTarget;

/// Streams `settings.folder` until Ctrl-C (or SIGTERM) is received.
///
/// Fails early if the encoder cannot be started at all.
pub async fn run(settings: Settings) -> anyhow::Result<RunStats> {
    let version = probe_encoder(&settings.ffmpeg).await?;
    info!(encoder = %settings.ffmpeg, version, "Encoder ready");

    let cancel = CancellationToken::new();
    let _interrupts = shutdown::install(cancel.clone());

    let runner = StreamJobRunner::new(ProcessLauncher, settings.ffmpeg, settings.verbose);
    let supervisor = Supervisor::new(
        FsLister,
        runner,
        settings.folder,
        settings.target,
        settings.ordering,
        cancel,
    )
    .with_rescan_interval(settings.rescan_interval);

    Ok(supervisor.run().await)
}
